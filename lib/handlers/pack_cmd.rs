//! `modside pack` handler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use indicatif::ProgressBar;

use crate::config::Config;
use crate::dispatch::AnalysisResult;
use crate::error::{CheckError, CheckResult};
use crate::manifest::Manifest;
use crate::modpack::{PackOptions, PackProgress, PackTarget, build_packs};
use crate::styles::pack_spinner_style;

use super::common::{analyse, open_manifest, print_summary, resolve_input, resolve_threads};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Classify every mod and build the packs of `target`.
pub async fn create_packs(
    config: &Config,
    input: Option<PathBuf>,
    threads: Option<usize>,
    target: PackTarget,
    output: Option<PathBuf>,
) -> CheckResult<()> {
    let threads = resolve_threads(config, threads)?;
    let input = resolve_input(config, input)?;
    let manifest = open_manifest(&input)?;

    if manifest.archive_path().is_none() {
        println!(
            "  {} Reading a bare index: packs will not contain override files",
            "!".bright_yellow().bold()
        );
    }

    let outcome = analyse(&manifest, config, threads).await?;
    print_summary(&outcome);

    match write_packs(
        &manifest,
        &outcome.results,
        target,
        config,
        output.as_deref(),
    ) {
        0 => Ok(()),
        failed => Err(CheckError::Generic(format!(
            "{} pack(s) could not be built",
            failed
        ))),
    }
}

/// Build the packs and print one line per archive.
///
/// Returns the number of packs that failed.
pub fn write_packs(
    manifest: &Manifest,
    results: &[AnalysisResult],
    target: PackTarget,
    config: &Config,
    output: Option<&Path>,
) -> usize {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(pack_spinner_style());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let pb = spinner.clone();
    let options = PackOptions::from_config(config, output).with_progress(Arc::new(
        move |event: PackProgress| match event {
            PackProgress::Started { side, .. } => {
                pb.set_message(format!("Building {} pack...", side));
            }
            PackProgress::EntryAdded { side, path, .. } => {
                pb.set_message(format!("{}: {}", side, path));
            }
            PackProgress::Finished { .. } => {}
        },
    ));

    let outcomes = build_packs(manifest, results, target, &options);
    spinner.finish_and_clear();

    let mut failed = 0;
    for (side, outcome) in outcomes {
        match outcome {
            Ok(summary) => {
                println!(
                    "  {} {} pack: {} mods, {} override files -> {}",
                    "✓".bright_green(),
                    side,
                    summary.mods,
                    summary.overrides,
                    summary.path.display().to_string().bright_white()
                );
            }
            Err(e) => {
                failed += 1;
                println!("  {} {} pack: {}", "✗".bright_red(), side, e);
            }
        }
    }
    failed
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
