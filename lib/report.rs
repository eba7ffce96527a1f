//! Report writer.
//!
//! Writes the analysis results as CSV, JSON or Markdown lists into the output
//! folder. Every file is written on its own: a failure on one file is returned
//! in its [`ReportOutcome`] and the remaining files are still attempted.

use crate::classify::Category;
use crate::config::ExportFormat;
use crate::constants::{
    REPORT_ALL_STEM, REPORT_BOTH_STEM, REPORT_CLIENT_STEM, REPORT_OPTIONAL_STEM,
    REPORT_SERVER_STEM, REPORT_UNKNOWN_STEM,
};
use crate::dispatch::{AnalysisResult, SupportSource};
use crate::error::{CheckError, CheckResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Which lists to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSelection {
    /// Every mod in one list.
    All,
    /// Client-only mods.
    Client,
    /// Server-only mods.
    Server,
    /// Mods required on both sides.
    Both,
    /// The full list plus one list per category.
    Separately,
}

/// One list to write: a file stem and an optional category filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportKind {
    pub stem: &'static str,
    /// `None` for the full list.
    pub category: Option<Category>,
}

/// Result of writing one report file.
#[derive(Debug)]
pub struct ReportOutcome {
    pub path: PathBuf,
    /// Rows written (or that would have been written on failure).
    pub rows: usize,
    pub error: Option<CheckError>,
}

/// One row of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow<'a> {
    pub name: &'a str,
    pub id: &'a str,
    pub side: Category,
    pub client: &'a str,
    pub server: &'a str,
    /// Where the side support came from.
    pub source: SupportSource,
    pub download_url: &'a str,
    pub note: &'a str,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    list: &'static str,
    count: usize,
    mods: Vec<ReportRow<'a>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExportSelection {
    /// Selections in menu order.
    pub const ALL: [ExportSelection; 5] = [
        ExportSelection::All,
        ExportSelection::Client,
        ExportSelection::Server,
        ExportSelection::Both,
        ExportSelection::Separately,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportSelection::All => "all",
            ExportSelection::Client => "client",
            ExportSelection::Server => "server",
            ExportSelection::Both => "both",
            ExportSelection::Separately => "separately",
        }
    }

    /// Lists produced by this selection, in write order.
    pub fn kinds(&self) -> Vec<ReportKind> {
        match self {
            ExportSelection::All => vec![ReportKind::ALL_MODS],
            ExportSelection::Client => vec![ReportKind::for_category(Category::Client)],
            ExportSelection::Server => vec![ReportKind::for_category(Category::Server)],
            ExportSelection::Both => vec![ReportKind::for_category(Category::Both)],
            ExportSelection::Separately => std::iter::once(ReportKind::ALL_MODS)
                .chain(Category::ALL.into_iter().map(ReportKind::for_category))
                .collect(),
        }
    }
}

impl ReportKind {
    /// The list holding every mod.
    pub const ALL_MODS: ReportKind = ReportKind {
        stem: REPORT_ALL_STEM,
        category: None,
    };

    pub fn for_category(category: Category) -> Self {
        let stem = match category {
            Category::Client => REPORT_CLIENT_STEM,
            Category::Server => REPORT_SERVER_STEM,
            Category::Both => REPORT_BOTH_STEM,
            Category::Optional => REPORT_OPTIONAL_STEM,
            Category::Unknown => REPORT_UNKNOWN_STEM,
        };
        Self {
            stem,
            category: Some(category),
        }
    }

    /// File name for the given format.
    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("{}.{}", self.stem, format.extension())
    }

    fn includes(&self, result: &AnalysisResult) -> bool {
        self.category.is_none_or(|c| c == result.category)
    }

    fn title(&self) -> &'static str {
        match self.category {
            None => "All mods",
            Some(Category::Client) => "Client-only mods",
            Some(Category::Server) => "Server-only mods",
            Some(Category::Both) => "Mods required on both sides",
            Some(Category::Optional) => "Optional mods",
            Some(Category::Unknown) => "Mods with unknown side",
        }
    }
}

impl ReportOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl<'a> ReportRow<'a> {
    pub fn from_result(result: &'a AnalysisResult) -> Self {
        let descriptor = &result.descriptor;
        Self {
            name: &descriptor.filename,
            id: descriptor.project_id.as_deref().unwrap_or_default(),
            side: result.category,
            client: result.support.client.as_str(),
            server: result.support.server.as_str(),
            source: result.source,
            download_url: descriptor.download_url().unwrap_or_default(),
            note: result.note.as_deref().unwrap_or_default(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Write the lists for `selection` into `dir`, creating it when missing.
///
/// Returns one outcome per file, in write order.
pub fn write_reports(
    results: &[AnalysisResult],
    selection: ExportSelection,
    format: ExportFormat,
    dir: &Path,
) -> Vec<ReportOutcome> {
    let generated_at = Utc::now();

    if let Err(e) = fs::create_dir_all(dir) {
        let reason = e.to_string();
        return selection
            .kinds()
            .into_iter()
            .map(|kind| ReportOutcome {
                path: dir.join(kind.file_name(format)),
                rows: count_rows(results, kind),
                error: Some(CheckError::output_write(dir, reason.clone())),
            })
            .collect();
    }

    selection
        .kinds()
        .into_iter()
        .map(|kind| write_report(results, kind, format, dir, generated_at))
        .collect()
}

/// Write a single list.
pub fn write_report(
    results: &[AnalysisResult],
    kind: ReportKind,
    format: ExportFormat,
    dir: &Path,
    generated_at: DateTime<Utc>,
) -> ReportOutcome {
    let path = dir.join(kind.file_name(format));
    let rows: Vec<ReportRow> = results
        .iter()
        .filter(|r| kind.includes(r))
        .map(ReportRow::from_result)
        .collect();
    let count = rows.len();

    let written = match format {
        ExportFormat::Csv => write_csv(&path, &rows),
        ExportFormat::Json => write_json(&path, kind, rows, generated_at),
        ExportFormat::Markdown => write_markdown(&path, kind, &rows, generated_at),
    };

    match written {
        Ok(()) => {
            tracing::info!("wrote {} rows to {}", count, path.display());
            ReportOutcome {
                path,
                rows: count,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!("failed to write {}: {}", path.display(), e);
            ReportOutcome {
                error: Some(CheckError::output_write(&path, e.to_string())),
                path,
                rows: count,
            }
        }
    }
}

fn count_rows(results: &[AnalysisResult], kind: ReportKind) -> usize {
    results.iter().filter(|r| kind.includes(r)).count()
}

fn write_csv(path: &Path, rows: &[ReportRow]) -> CheckResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record([
            "name",
            "id",
            "side",
            "client",
            "server",
            "source",
            "download_url",
            "note",
        ])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(
    path: &Path,
    kind: ReportKind,
    mods: Vec<ReportRow>,
    generated_at: DateTime<Utc>,
) -> CheckResult<()> {
    let report = JsonReport {
        generated_at: generated_at.to_rfc3339(),
        list: kind.stem,
        count: mods.len(),
        mods,
    };
    let content = serde_json::to_string_pretty(&report)?;
    fs::write(path, content)?;
    Ok(())
}

fn write_markdown(
    path: &Path,
    kind: ReportKind,
    rows: &[ReportRow],
    generated_at: DateTime<Utc>,
) -> CheckResult<()> {
    let mut out = Vec::new();
    writeln!(out, "# {}", kind.title())?;
    writeln!(out)?;
    writeln!(
        out,
        "Generated {} ({} mods)",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        rows.len()
    )?;
    writeln!(out)?;
    writeln!(out, "| Name | Id | Side | Client | Server | Source | Note |")?;
    writeln!(out, "|------|----|------|--------|--------|--------|------|")?;
    for row in rows {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            escape_cell(row.name),
            escape_cell(row.id),
            row.side,
            row.client,
            row.server,
            row.source.as_str(),
            escape_cell(row.note)
        )?;
    }
    fs::write(path, out)?;
    Ok(())
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for ExportSelection {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ExportSelection::All),
            "client" => Ok(ExportSelection::Client),
            "server" => Ok(ExportSelection::Server),
            "both" => Ok(ExportSelection::Both),
            "separately" | "separate" => Ok(ExportSelection::Separately),
            other => Err(CheckError::Generic(format!(
                "Unknown export selection '{}' (expected all, client, server, both or separately)",
                other
            ))),
        }
    }
}

impl fmt::Display for ExportSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
