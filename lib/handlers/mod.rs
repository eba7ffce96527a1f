//! Command handlers.

mod check;
mod common;
mod config_cmd;
mod interactive;
mod pack_cmd;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use check::{check_mods, export_lists};
pub use common::{analyse, load_config, open_manifest, print_summary, resolve_input, resolve_threads};
pub use config_cmd::show_config;
pub use interactive::run_interactive;
pub use pack_cmd::{create_packs, write_packs};
