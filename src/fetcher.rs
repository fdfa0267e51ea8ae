//! Retrieval of `package.json` from GitHub's raw-content host.

use reqwest::StatusCode;
use std::time::Duration;

use crate::error::ScanError;
use crate::model::{DependencyEntry, Manifest, RepositoryReference};
use crate::observer::{ScanEvent, ScanObserver};
use crate::retry::{Attempt, RetryPolicy};

pub const RAW_CONTENT_BASE_URL: &str = "https://raw.githubusercontent.com";

/// Per-request timeout for the manifest download.
const TIMEOUT_SECS: u64 = 15;

pub struct ManifestFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ManifestFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: RAW_CONTENT_BASE_URL.to_string(),
            timeout: Duration::from_secs(TIMEOUT_SECS),
            retry: RetryPolicy::gateway_timeout(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Downloads the manifest and returns its merged dependency list.
    ///
    /// # Errors
    ///
    /// - [`ScanError::RetriesExhausted`] when every attempt hit a gateway timeout
    /// - [`ScanError::FetchFailed`] on transport errors, other non-success
    ///   statuses, or an unparseable body
    /// - [`ScanError::NoDependencies`] when the manifest declares none
    pub async fn fetch(
        &self,
        repo: &RepositoryReference,
        observer: &dyn ScanObserver,
    ) -> Result<Vec<DependencyEntry>, ScanError> {
        let url = repo.manifest_url(&self.base_url);
        observer.on_event(&ScanEvent::ManifestRequested { url: &url });

        let attempt = self
            .retry
            .send(
                || self.client.get(&url).timeout(self.timeout),
                |attempt, status| {
                    observer.on_event(&ScanEvent::ManifestRetry {
                        attempt,
                        status: status.as_u16(),
                    })
                },
            )
            .await
            .map_err(|e| ScanError::FetchFailed(e.to_string()))?;

        let response = match attempt {
            Attempt::Response(response) => response,
            Attempt::Exhausted { attempts, status } => {
                return Err(ScanError::RetriesExhausted {
                    attempts,
                    status: status.as_u16(),
                })
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::FetchFailed(describe_status(status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScanError::FetchFailed(e.to_string()))?;
        let manifest = Manifest::from_json(&body)
            .map_err(|e| ScanError::FetchFailed(format!("invalid JSON: {}", e)))?;

        let dependencies = manifest.dependencies();
        if dependencies.is_empty() {
            return Err(ScanError::NoDependencies);
        }

        observer.on_event(&ScanEvent::ManifestLoaded {
            package: manifest.name.as_deref(),
            dependencies: dependencies.len(),
        });
        Ok(dependencies)
    }
}

impl Default for ManifestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_status(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_status() {
        assert_eq!(describe_status(StatusCode::NOT_FOUND), "HTTP 404 Not Found");
        assert_eq!(
            describe_status(StatusCode::from_u16(599).unwrap()),
            "HTTP 599"
        );
    }

    #[test]
    fn test_defaults() {
        let fetcher = ManifestFetcher::default();
        assert_eq!(fetcher.base_url, RAW_CONTENT_BASE_URL);
        assert_eq!(fetcher.timeout, Duration::from_secs(15));
        assert_eq!(fetcher.retry, RetryPolicy::gateway_timeout());
    }
}
