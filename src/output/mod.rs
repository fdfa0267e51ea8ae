mod cli;
mod json;

pub use cli::{render_findings_table, render_report_text};
pub use json::render_json;

use crate::model::{Report, ScanResult};
use anyhow::Result;

/// Output format for scan results and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain report text
    Text,
    /// Findings as a table
    Table,
    /// JSON for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Unknown format: {}. Use 'text', 'table', or 'json'",
                s
            )),
        }
    }
}

/// Format a scan-stage result for display or file output
pub fn format_scan_result(result: &ScanResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(result),
        OutputFormat::Table | OutputFormat::Text => Ok(render_findings_table(result)),
    }
}

/// Format a report for display or file output
pub fn format_report(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(report),
        OutputFormat::Text | OutputFormat::Table => Ok(render_report_text(report)),
    }
}
