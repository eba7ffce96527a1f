//! `modside config` handler.

use colored::Colorize;

use crate::config::{ConfigOrigin, LoadedConfig};
use crate::error::CheckResult;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Print the configuration path and the effective values.
pub fn show_config(loaded: &LoadedConfig) -> CheckResult<()> {
    let origin = match &loaded.origin {
        ConfigOrigin::Loaded => "loaded".to_string(),
        ConfigOrigin::Created => "created with defaults".to_string(),
        ConfigOrigin::Defaults(reason) => format!("defaults ({})", reason),
    };

    println!();
    println!(
        "  {} {}",
        "Config:".dimmed(),
        loaded.path.display().to_string().bright_white()
    );
    println!("  {} {}", "Source:".dimmed(), origin);
    println!();

    let json = serde_json::to_string_pretty(&loaded.config)?;
    for line in json.lines() {
        println!("  {}", line);
    }
    println!();
    Ok(())
}
