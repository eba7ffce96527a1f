//! `modside` is the primary CLI binary.

use clap::Parser;
use colored::Colorize;
use mod_side_checker::constants::DEFAULT_CONFIG_PATH;
use mod_side_checker::handlers;
use mod_side_checker::{CheckError, CheckResult, Cli, Command};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    // Logging is only enabled when RUST_LOG is set.
    init_tracing();

    if let Err(e) = run().await {
        print_error(&e);
        if !matches!(e, CheckError::Cancelled) {
            std::process::exit(1);
        }
    }
}

/// Print an error with appropriate formatting based on error type.
fn print_error(e: &CheckError) {
    println!();
    match e {
        CheckError::InputNotFound(path) => {
            println!("  {} No modpack found", "error".bright_red().bold());
            println!();
            println!("    {}: {}", "Searched".dimmed(), path.display());
            println!();
            println!(
                "    {}: Put {} or a {} file there, or pass {}",
                "hint".bright_blue().bold(),
                "modrinth.index.json".bright_white(),
                ".mrpack".bright_white(),
                "--input <PATH>".bright_white()
            );
        }
        CheckError::MalformedManifest(msg) => {
            println!("  {} Malformed manifest", "error".bright_red().bold());
            println!();
            println!("    {}", msg);
        }
        CheckError::InvalidWorkerCount(count) => {
            println!(
                "  {} Invalid worker count {}",
                "error".bright_red().bold(),
                count.to_string().bright_white()
            );
            println!();
            println!(
                "    {}: Use a value between 1 and {} (see threading.max_threads)",
                "hint".bright_blue().bold(),
                mod_side_checker::constants::MAX_WORKERS
            );
        }
        CheckError::Cancelled => {
            println!("  {} Operation cancelled", "✗".bright_red());
        }
        // For all other errors, use a consistent styled format
        _ => {
            let msg = e.to_string();
            if let Some((prefix, rest)) = msg.split_once(": ") {
                if prefix.len() < 30 && !prefix.contains(' ') || prefix.ends_with("error") {
                    println!(
                        "  {} {}",
                        format!("error[{}]", prefix.to_lowercase().replace(" error", ""))
                            .bright_red()
                            .bold(),
                        rest.dimmed()
                    );
                } else {
                    println!("  {} {}", "error".bright_red().bold(), msg);
                }
            } else {
                println!("  {} {}", "error".bright_red().bold(), msg);
            }
        }
    }
    println!();
}

/// Initialize tracing. Only enables logging when RUST_LOG is set.
fn init_tracing() {
    let rust_log_set = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .is_some();

    if !rust_log_set {
        return;
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .init();
}

async fn run() -> CheckResult<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.clone());
    let loaded = handlers::load_config(&config_path);
    let config = &loaded.config;

    match cli.command {
        None => handlers::run_interactive(&loaded).await,

        Some(Command::Check {
            input,
            threads,
            format,
            export,
            output,
        }) => handlers::check_mods(config, input, threads, format, export, output).await,

        Some(Command::Pack {
            input,
            threads,
            target,
            output,
        }) => handlers::create_packs(config, input, threads, target, output).await,

        Some(Command::Config) => handlers::show_config(&loaded),
    }
}
