//! `mod-side-checker` library.

pub mod classify;
pub mod commands;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod manifest;
pub mod modpack;
pub mod prompt;
pub mod registry;
pub mod report;
pub mod styles;

#[cfg(test)]
mod testing;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use classify::*;
pub use commands::*;
pub use config::*;
pub use constants::*;
pub use dispatch::*;
pub use error::*;
pub use manifest::*;
pub use modpack::*;
pub use registry::*;
pub use report::*;
