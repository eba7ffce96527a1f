//! Interactive prompts and terminal interrupt handling.
//!
//! Uses cliclack with a custom theme (emerald green accents).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use cliclack::{Theme, ThemeState, input, log, select, set_theme};
use console::{Style, Term};
use tokio_util::sync::CancellationToken;

use crate::config::ThreadingConfig;
use crate::constants::MIN_WORKERS;
use crate::error::{CheckError, CheckResult};
use crate::modpack::PackTarget;
use crate::report::ExportSelection;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static CTRLC_HANDLER_SET: AtomicBool = AtomicBool::new(false);

/// Token of the analysis currently running, cancelled on the first Ctrl+C.
static ACTIVE_RUN: Mutex<Option<CancellationToken>> = Mutex::new(None);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Custom prompt theme.
pub struct CheckerTheme;

/// Top-level choice in interactive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Check,
    Pack,
    Exit,
}

/// Routes Ctrl+C to a run's cancellation token while alive.
pub struct InterruptGuard {
    token: CancellationToken,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl InterruptGuard {
    /// Register `token` as the active run.
    pub fn register(token: CancellationToken) -> Self {
        install_interrupt_handler();
        if let Ok(mut active) = ACTIVE_RUN.lock() {
            *active = Some(token.clone());
        }
        Self { token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Theme for CheckerTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().color256(42),
            ThemeState::Error(_) => Style::new().red(),
            _ => Style::new().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().color256(42),
            ThemeState::Submit => Style::new().color256(42),
            ThemeState::Error(_) => Style::new().red(),
            _ => Style::new().dim(),
        }
    }

    fn input_style(&self, _state: &ThemeState) -> Style {
        Style::new()
    }

    fn placeholder_style(&self, _state: &ThemeState) -> Style {
        Style::new().dim()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = ACTIVE_RUN.lock() {
            *active = None;
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Initialize the prompt theme and the Ctrl+C handler.
pub fn init_theme() {
    set_theme(CheckerTheme);
    install_interrupt_handler();
}

/// Install the process-wide Ctrl+C handler (only once).
///
/// While a run is registered the first Ctrl+C cancels it and the run ends with
/// partial results. Otherwise the terminal is restored and the process exits.
pub fn install_interrupt_handler() {
    if !CTRLC_HANDLER_SET.swap(true, Ordering::SeqCst) {
        let _ = ctrlc::set_handler(|| {
            let active = ACTIVE_RUN.lock().ok().and_then(|guard| guard.clone());
            match active {
                Some(token) if !token.is_cancelled() => token.cancel(),
                _ => {
                    let term = Term::stderr();
                    let _ = term.show_cursor();
                    std::process::exit(130);
                }
            }
        });
    }
}

/// Check if an error indicates the user cancelled (ESC or Ctrl+C).
fn is_cancelled(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::Interrupted
}

/// Convert IO interrupted errors to Cancelled for clean exit on ESC.
fn map_cancelled<T>(result: Result<T, std::io::Error>) -> CheckResult<T> {
    result.map_err(|e| {
        if is_cancelled(&e) {
            CheckError::Cancelled
        } else {
            CheckError::Io(e)
        }
    })
}

/// Ask what to do next.
pub fn prompt_mode() -> CheckResult<Mode> {
    map_cancelled(
        select("What do you want to do?")
            .item(Mode::Check, "Check mod sides", "Classify every mod and export lists")
            .item(Mode::Pack, "Create modpacks", "Build server and client packs")
            .item(Mode::Exit, "Exit", "")
            .interact(),
    )
}

/// Ask for the worker count, re-prompting until it is within `1..=max_threads`.
pub fn prompt_threads(threading: &ThreadingConfig) -> CheckResult<usize> {
    let max = threading.max_threads;
    let recommended = threading.recommended_max.min(max);

    let answer: String = map_cancelled(
        input(format!("Number of workers ({}-{})", MIN_WORKERS, max))
            .placeholder(&recommended.to_string())
            .default_input(&recommended.to_string())
            .validate(move |value: &String| parse_thread_count(value, max).map(|_| ()))
            .interact(),
    )?;

    let threads = parse_thread_count(&answer, max).map_err(CheckError::Generic)?;
    if threads > recommended {
        let _ = log::warning(format!(
            "More than {} workers may trigger registry rate limits",
            recommended
        ));
    }
    Ok(threads)
}

/// Ask which lists to export. `None` means the user is done.
pub fn prompt_export() -> CheckResult<Option<ExportSelection>> {
    let mut menu = select("Export which list?");
    for selection in ExportSelection::ALL {
        let (label, hint) = match selection {
            ExportSelection::All => ("All mods", "One list with every mod"),
            ExportSelection::Client => ("Client only", "Mods that only run on the client"),
            ExportSelection::Server => ("Server only", "Mods that only run on the server"),
            ExportSelection::Both => ("Both sides", "Mods required on client and server"),
            ExportSelection::Separately => ("Everything", "The full list and one per category"),
        };
        menu = menu.item(Some(selection), label, hint);
    }
    map_cancelled(menu.item(None, "Done", "").interact())
}

/// Ask which packs to build.
pub fn prompt_pack_target() -> CheckResult<PackTarget> {
    map_cancelled(
        select("Which packs?")
            .item(PackTarget::Both, "Both", "Server and client packs")
            .item(PackTarget::Server, "Server", "Server + Both mods")
            .item(PackTarget::Client, "Client", "Client + Both mods")
            .interact(),
    )
}

/// Parse a worker count typed by the user.
pub fn parse_thread_count(value: &str, max: usize) -> Result<usize, String> {
    let threads: usize = value
        .trim()
        .parse()
        .map_err(|_| format!("Enter a number between {} and {}", MIN_WORKERS, max))?;
    if !(MIN_WORKERS..=max).contains(&threads) {
        return Err(format!(
            "Worker count must be between {} and {}",
            MIN_WORKERS, max
        ));
    }
    Ok(threads)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
