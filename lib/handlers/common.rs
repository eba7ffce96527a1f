//! Shared steps of the check and pack commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar};
use tokio_util::sync::CancellationToken;

use crate::classify::Category;
use crate::config::{Config, ConfigOrigin, LoadedConfig};
use crate::dispatch::{DispatchEvent, DispatchOptions, DispatchOutcome, dispatch, partition};
use crate::error::{CheckError, CheckResult};
use crate::manifest::{Manifest, discover_input, load_manifest};
use crate::prompt::InterruptGuard;
use crate::registry::{RegistryClient, SideLookup};
use crate::styles::worker_progress_style;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Load the configuration and tell the user where it came from.
pub fn load_config(path: &Path) -> LoadedConfig {
    let loaded = Config::load_or_init(path);
    match &loaded.origin {
        ConfigOrigin::Loaded => {
            tracing::debug!("loaded configuration from {}", loaded.path.display());
        }
        ConfigOrigin::Created => {
            println!(
                "  {} Created {} with default settings",
                "✓".bright_green(),
                loaded.path.display().to_string().bright_white()
            );
        }
        ConfigOrigin::Defaults(reason) => {
            println!(
                "  {} Using default settings: {}",
                "!".bright_yellow().bold(),
                reason.dimmed()
            );
        }
    }
    loaded
}

/// Pick the input file: the explicit path, or the first match in the input folder.
pub fn resolve_input(config: &Config, input: Option<PathBuf>) -> CheckResult<PathBuf> {
    if let Some(path) = input {
        return Ok(path);
    }

    let dir = &config.folders.input;
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        return Err(CheckError::InputNotFound(dir.clone()));
    }
    discover_input(dir, &config.files.mod_index)
}

/// Resolve the worker count from a flag or the configured recommendation.
pub fn resolve_threads(config: &Config, threads: Option<usize>) -> CheckResult<usize> {
    let max = config.threading.max_threads;
    let threads = threads.unwrap_or_else(|| config.threading.recommended_max.min(max));
    if threads == 0 || threads > max {
        return Err(CheckError::InvalidWorkerCount(threads));
    }
    Ok(threads)
}

/// Load the manifest and print what was found.
pub fn open_manifest(path: &Path) -> CheckResult<Manifest> {
    let manifest = load_manifest(path)?;
    let name = match (manifest.name(), manifest.version_id()) {
        (Some(name), Some(version)) => format!("{} {}", name, version),
        (Some(name), None) => name.to_string(),
        _ => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    println!(
        "  {} {} ({} mods)",
        "→".bright_cyan(),
        name.bold(),
        manifest.mods.len()
    );
    Ok(manifest)
}

/// Classify every mod of `manifest` with one progress bar per worker.
///
/// Ctrl+C cancels the run; whatever completed is returned.
pub async fn analyse(
    manifest: &Manifest,
    config: &Config,
    threads: usize,
) -> CheckResult<DispatchOutcome> {
    let client = RegistryClient::new(config)?;
    tracing::debug!(
        "querying {} as {}",
        client.registry_url(),
        client.user_agent()
    );
    let lookup: Arc<dyn SideLookup> = Arc::new(client);
    let ranges = partition(manifest.mods.len(), threads)?;

    println!(
        "  {} Analysing {} mods with {} workers",
        "→".bright_cyan(),
        manifest.mods.len(),
        threads
    );
    println!();

    let mp = MultiProgress::new();
    let style = worker_progress_style(&config.ui);
    let bars: Vec<ProgressBar> = ranges
        .iter()
        .enumerate()
        .map(|(worker, range)| {
            let pb = mp.add(ProgressBar::new(range.len() as u64));
            pb.set_style(style.clone());
            pb.set_prefix(format!("worker {}", worker + 1));
            pb
        })
        .collect();

    let guard = InterruptGuard::register(CancellationToken::new());
    let event_bars = bars.clone();
    let options = DispatchOptions::from_config(config, threads)
        .with_cancel(guard.token().clone())
        .with_events(Arc::new(move |event: DispatchEvent| match event {
            DispatchEvent::WorkerStarted { worker, batch_len } => {
                if let Some(pb) = event_bars.get(worker) {
                    pb.set_length(batch_len as u64);
                }
            }
            DispatchEvent::ModFinished {
                worker,
                label,
                category,
                ..
            } => {
                if let Some(pb) = event_bars.get(worker) {
                    pb.set_message(format!("{} ({})", label, category));
                    pb.inc(1);
                }
            }
            DispatchEvent::WorkerFinished { worker, .. } => {
                if let Some(pb) = event_bars.get(worker) {
                    pb.set_message("done");
                    pb.finish();
                }
            }
        }));

    let outcome = dispatch(manifest.mods.clone(), lookup, options).await;
    drop(guard);

    for pb in &bars {
        if !pb.is_finished() {
            pb.abandon();
        }
    }
    let _ = mp.clear();

    let outcome = outcome?;
    if outcome.cancelled {
        println!(
            "  {} Cancelled: {} analysed, {} skipped",
            "!".bright_yellow().bold(),
            outcome.results.len(),
            outcome.skipped
        );
    }
    Ok(outcome)
}

/// Print the per-category counts.
pub fn print_summary(outcome: &DispatchOutcome) {
    println!();
    println!(
        "  {} {} mods analysed",
        "✓".bright_green(),
        outcome.results.len().to_string().bold()
    );
    for category in Category::ALL {
        let count = outcome.count(category);
        let label = format!("{:<9}", category.as_str());
        let line = format!("    {} {}", label, count);
        if category == Category::Unknown && count > 0 {
            println!("{}", line.bright_yellow());
        } else {
            println!("{}", line.dimmed());
        }
    }

    let failed: Vec<_> = outcome
        .results
        .iter()
        .filter(|r| r.category == Category::Unknown)
        .filter_map(|r| r.note.as_deref().map(|note| (r.descriptor.label(), note)))
        .collect();
    if !failed.is_empty() {
        println!();
        println!("  {}", "Lookups that failed:".bright_yellow());
        for (label, note) in failed {
            println!("    {} {}", label, note.dimmed());
        }
    }
    println!();
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
