//! Error types for the scan and narration stages.

use thiserror::Error;

/// Terminal failures of the scan stage.
///
/// These never escape the pipeline as `Err`; they are carried inside
/// [`ScanOutcome::Failed`](crate::model::ScanOutcome::Failed) and turned into
/// a diagnostic report by the report stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The input is not a recognizable GitHub repository URL.
    #[error("Malformed repository reference: {input} ({reason})")]
    MalformedReference { input: String, reason: String },

    /// The manifest could not be retrieved or parsed.
    #[error("Failed to fetch package.json: {0}")]
    FetchFailed(String),

    /// The manifest endpoint kept answering with a retryable status.
    #[error("Failed to fetch package.json after {attempts} attempts (last status {status})")]
    RetriesExhausted { attempts: u32, status: u16 },

    /// The manifest declared neither `dependencies` nor `devDependencies`.
    #[error("No dependencies declared in package.json")]
    NoDependencies,
}

impl ScanError {
    /// Short machine-readable tag for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::MalformedReference { .. } => "malformed-reference",
            ScanError::FetchFailed(_) => "fetch-failed",
            ScanError::RetriesExhausted { .. } => "retries-exhausted",
            ScanError::NoDependencies => "no-dependencies",
        }
    }

    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        ScanError::MalformedReference {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of the language-model narrator.
///
/// Unlike [`ScanError`], these are propagated to the caller unchanged.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("Narrator is not configured: {0}")]
    Configuration(String),

    #[error("Narrator authentication failed: {0}")]
    Authentication(String),

    #[error("Narrator rate limited: {0}")]
    RateLimited(String),

    #[error("Narrator API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Narrator network error: {0}")]
    Network(String),

    #[error("Narrator stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for NarratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NarratorError::Network(format!("request timed out: {}", err))
        } else {
            NarratorError::Network(err.to_string())
        }
    }
}
