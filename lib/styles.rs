//! Terminal styles for clap help and progress bars.

use crate::config::UiConfig;
use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use indicatif::ProgressStyle;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Bar characters when `ui.use_ascii_bars` is set.
const ASCII_BAR_CHARS: &str = "#>-";

/// Bar characters otherwise.
const BLOCK_BAR_CHARS: &str = "█░░";

/// Columns taken by everything on a worker line except the bar itself.
const WORKER_LINE_OVERHEAD: u16 = 50;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

pub fn styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .usage(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
}

/// Style for one worker's progress line.
///
/// `ui.progress_bar_width` is the width of the whole line; the bar gets what is
/// left after the label and counters.
pub fn worker_progress_style(ui: &UiConfig) -> ProgressStyle {
    let bar_width = ui
        .progress_bar_width
        .saturating_sub(WORKER_LINE_OVERHEAD)
        .max(10);
    let template = format!(
        "  {{prefix:<10}} [{{bar:{}.cyan/dim}}] {{pos:>3}}/{{len:<3}} {{wide_msg}}",
        bar_width
    );
    let chars = if ui.use_ascii_bars {
        ASCII_BAR_CHARS
    } else {
        BLOCK_BAR_CHARS
    };

    ProgressStyle::default_bar()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}

/// Style for the spinner shown while packs are written.
pub fn pack_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("  {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
