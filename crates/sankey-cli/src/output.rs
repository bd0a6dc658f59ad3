//! Human and JSON output for the `sankey` binary.
//!
//! Results go to stdout, errors to stderr. With `--json` both are a single
//! pretty-printed JSON object so scripts can parse them; otherwise they are
//! short labelled lines.

use std::io::{self, Write};
use std::path::PathBuf;

use sankey_core::error::SankeyError;
use sankey_core::pipeline::{LoadStats, RunSummary};
use serde::Serialize;

/// Write a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "  {:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Everything reported after a successful run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<PathBuf>,
    pub load: LoadStats,
    #[serde(flatten)]
    pub summary: RunSummary,
    pub opened: bool,
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E1001").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    pub fn with_suggestion(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: None,
        }
    }
}

impl From<&SankeyError> for CliError {
    fn from(err: &SankeyError) -> Self {
        Self {
            message: err.to_string(),
            suggestion: err.hint().map(str::to_string),
            error_code: Some(err.code().code().to_string()),
        }
    }
}

impl From<&anyhow::Error> for CliError {
    fn from(err: &anyhow::Error) -> Self {
        err.downcast_ref::<SankeyError>().map_or_else(
            || Self::new(format!("{err:#}")),
            |inner| {
                let mut cli = Self::from(inner);
                // Keep any context the CLI added around the library error.
                cli.message = format!("{err:#}");
                cli
            },
        )
    }
}

/// Render a successful run to stdout.
pub fn render_report(mode: OutputMode, report: &RunReport) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(mode, report, &mut out)?;
    Ok(())
}

fn write_report(mode: OutputMode, report: &RunReport, out: &mut dyn Write) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputMode::Human => {
            let artifact = &report.summary.artifact;
            let stats = &report.summary.stats;
            writeln!(
                out,
                "✓ Saved {} diagram to {}",
                artifact.format,
                artifact.path.display()
            )?;
            pretty_kv(out, "input", report.input.display().to_string())?;
            pretty_kv(
                out,
                "records",
                format!("{} ({} dropped)", report.load.records, report.load.dropped),
            )?;
            pretty_kv(out, "nodes", stats.node_count.to_string())?;
            pretty_kv(out, "links", stats.edge_count.to_string())?;
            pretty_kv(out, "total flow", format!("{}", stats.total_flow))?;
            pretty_kv(out, "bytes", artifact.bytes.to_string())?;
            if report.opened {
                pretty_kv(out, "opened", "default browser")?;
            }
        }
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(mode, error, &mut out)?;
    Ok(())
}

fn write_error(mode: OutputMode, error: &CliError, out: &mut dyn Write) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Human => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// Print a one-line progress message unless quiet or in JSON mode.
pub fn status(mode: OutputMode, quiet: bool, message: &str) {
    if quiet || mode.is_json() {
        return;
    }
    println!("{message}");
}
