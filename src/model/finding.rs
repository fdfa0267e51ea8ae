use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Summary used when the first matching advisory carries none.
pub const SUMMARY_PLACEHOLDER: &str = "No summary available";

/// A dependency with one or more known vulnerabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub package: String,
    pub version: String,
    /// Advisory identifiers in the order the database returned them.
    pub identifiers: Vec<String>,
    pub summary: String,
}

impl Finding {
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        identifiers: Vec<String>,
        summary: Option<String>,
    ) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            identifiers,
            summary: summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| SUMMARY_PLACEHOLDER.to_string()),
        }
    }
}

/// Result of the scan stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// At least one dependency has known vulnerabilities.
    Vulnerable(Vec<Finding>),
    /// Every queried dependency came back clean.
    Healthy,
    /// The scan could not run to completion.
    Failed(ScanError),
}

impl ScanOutcome {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        if findings.is_empty() {
            ScanOutcome::Healthy
        } else {
            ScanOutcome::Vulnerable(findings)
        }
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            ScanOutcome::Vulnerable(findings) => findings,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        match self {
            ScanOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScanOutcome::Failed(_))
    }
}

/// Serializable form of a [`ScanOutcome`].
///
/// Only a failed scan populates `error`; a clean scan is an empty
/// `findings` list with no error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ScanOutcome> for ScanResult {
    fn from(outcome: &ScanOutcome) -> Self {
        Self {
            findings: outcome.findings().to_vec(),
            error: outcome.error().map(|e| e.to_string()),
        }
    }
}

/// The narrated security report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "report")]
    pub text: String,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_summary_placeholder() {
        let finding = Finding::new("lodash", "4.17.15", vec!["GHSA-1".into()], None);
        assert_eq!(finding.summary, SUMMARY_PLACEHOLDER);

        let finding = Finding::new("lodash", "4.17.15", vec![], Some("  ".into()));
        assert_eq!(finding.summary, SUMMARY_PLACEHOLDER);

        let finding = Finding::new("lodash", "4.17.15", vec![], Some("Prototype pollution".into()));
        assert_eq!(finding.summary, "Prototype pollution");
    }

    #[test]
    fn test_outcome_from_findings() {
        assert_eq!(ScanOutcome::from_findings(vec![]), ScanOutcome::Healthy);

        let finding = Finding::new("minimist", "1.2.0", vec!["GHSA-2".into()], None);
        let outcome = ScanOutcome::from_findings(vec![finding.clone()]);
        assert_eq!(outcome.findings(), &[finding]);
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_scan_result_shape() {
        let healthy = ScanResult::from(&ScanOutcome::Healthy);
        assert_eq!(
            serde_json::to_value(&healthy).unwrap(),
            serde_json::json!({ "findings": [] })
        );

        let failed = ScanResult::from(&ScanOutcome::Failed(ScanError::NoDependencies));
        assert!(failed.findings.is_empty());
        assert_eq!(
            failed.error.as_deref(),
            Some("No dependencies declared in package.json")
        );
    }

    #[test]
    fn test_report_serializes_as_report_field() {
        let report = Report::new("All clear.");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["report"], "All clear.");
        assert!(value.get("generated_at").is_some());
    }
}
