//! CLI command definitions.

use crate::config::ExportFormat;
use crate::modpack::PackTarget;
use crate::report::ExportSelection;
use crate::styles::styles;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const CHECK_EXAMPLES: &str = "\
Examples:
  modside check                              Check the pack found in input/
  modside check -i pack.mrpack               Check a specific .mrpack
  modside check -t 4 -e separately           Four workers, one list per category
  modside check -f json -o reports/          JSON lists in reports/";

const PACK_EXAMPLES: &str = "\
Examples:
  modside pack                               Build server and client packs
  modside pack --target server               Build the server pack only
  modside pack -i pack.mrpack -o dist/       Read pack.mrpack, write into dist/";

const CLI_EXAMPLES: &str = "\
Examples:
  modside                                    Interactive mode
  modside check                              Classify every mod and export lists
  modside pack --target both                 Build client and server packs
  modside config                             Show the effective configuration

Getting started:
  1. Put modrinth.index.json or a .mrpack into input/
  2. Run modside and pick a mode
  3. Collect the results from output/";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Mod side checker - find out where each mod of a modpack has to run.
#[derive(Debug, Parser)]
#[command(name = "modside", author, version, styles=styles())]
#[command(
    about = "Classify modpack mods as client, server or both",
    after_help = CLI_EXAMPLES
)]
pub struct Cli {
    /// Path to config.json (defaults to ./config.json).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to run. Interactive mode when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify every mod and export the lists.
    #[command(after_help = CHECK_EXAMPLES)]
    Check {
        /// modrinth.index.json or .mrpack to read (defaults to the input folder).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Number of workers (1-10).
        #[arg(short, long)]
        threads: Option<usize>,

        /// Output format: csv, json or markdown.
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Lists to export: all, client, server, both or separately.
        #[arg(short, long, default_value = "separately")]
        export: ExportSelection,

        /// Output directory (defaults to the output folder).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build client and server packs.
    #[command(after_help = PACK_EXAMPLES)]
    Pack {
        /// modrinth.index.json or .mrpack to read (defaults to the input folder).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Number of workers (1-10).
        #[arg(short, long)]
        threads: Option<usize>,

        /// Packs to build: server, client or both.
        #[arg(long, default_value = "both")]
        target: PackTarget,

        /// Output directory (defaults to the output folder).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the configuration path and effective values.
    Config,
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_command_is_interactive() {
        let cli = Cli::try_parse_from(["modside"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_check_args() {
        let cli = Cli::try_parse_from([
            "modside", "check", "-i", "pack.mrpack", "-t", "4", "-f", "json", "-e", "client",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Check {
                input,
                threads,
                format,
                export,
                output,
            }) => {
                assert_eq!(input, Some(PathBuf::from("pack.mrpack")));
                assert_eq!(threads, Some(4));
                assert_eq!(format, Some(ExportFormat::Json));
                assert_eq!(export, ExportSelection::Client);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_pack_defaults_to_both() {
        let cli = Cli::try_parse_from(["modside", "--config", "c.json", "pack"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        assert!(matches!(
            cli.command,
            Some(Command::Pack {
                target: PackTarget::Both,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        assert!(Cli::try_parse_from(["modside", "pack", "--target", "desktop"]).is_err());
    }
}
