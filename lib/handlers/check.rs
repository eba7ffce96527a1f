//! `modside check` handler.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::config::{Config, ExportFormat};
use crate::dispatch::AnalysisResult;
use crate::error::{CheckError, CheckResult};
use crate::report::{ExportSelection, ReportOutcome, write_reports};

use super::common::{analyse, open_manifest, print_summary, resolve_input, resolve_threads};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Classify every mod and export the selected lists.
pub async fn check_mods(
    config: &Config,
    input: Option<PathBuf>,
    threads: Option<usize>,
    format: Option<ExportFormat>,
    export: ExportSelection,
    output: Option<PathBuf>,
) -> CheckResult<()> {
    let threads = resolve_threads(config, threads)?;
    let input = resolve_input(config, input)?;
    let manifest = open_manifest(&input)?;

    let outcome = analyse(&manifest, config, threads).await?;
    print_summary(&outcome);

    let format = format.unwrap_or(config.export.format);
    let dir = output.unwrap_or_else(|| config.folders.output.clone());
    match export_lists(&outcome.results, export, format, &dir) {
        0 => Ok(()),
        failed => Err(CheckError::Generic(format!(
            "{} list(s) could not be written to {}",
            failed,
            dir.display()
        ))),
    }
}

/// Write the lists for `selection` and print one line per file.
///
/// Returns the number of files that could not be written.
pub fn export_lists(
    results: &[AnalysisResult],
    selection: ExportSelection,
    format: ExportFormat,
    dir: &Path,
) -> usize {
    let outcomes = write_reports(results, selection, format, dir);
    for outcome in &outcomes {
        print_outcome(outcome);
    }
    outcomes.iter().filter(|o| !o.is_ok()).count()
}

fn print_outcome(outcome: &ReportOutcome) {
    let name = outcome
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match &outcome.error {
        None => println!(
            "  {} Saved {} mods to {}",
            "✓".bright_green(),
            outcome.rows,
            name.bright_white()
        ),
        Some(e) => println!("  {} {}", "✗".bright_red(), e),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
