use crate::config::IgnoreConfig;
use crate::model::{DependencyEntry, Finding};
use crate::observer::{ScanEvent, ScanObserver};
use crate::retry::{Attempt, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OSV_QUERY_URL: &str = "https://api.osv.dev/v1/query";

/// Ecosystem sent with every query.
const ECOSYSTEM: &str = "npm";

/// Maximum number of dependencies queried per scan.
const DEFAULT_LIMIT: usize = 10;

/// Pause between two consecutive dependency queries.
const PAUSE_MS: u64 = 200;

const TIMEOUT_SECS: u64 = 10;

pub struct OsvChecker {
    client: reqwest::Client,
    query_url: String,
    limit: usize,
    pause: Duration,
    timeout: Duration,
    retry: RetryPolicy,
    ignore: IgnoreConfig,
}

impl OsvChecker {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            query_url: OSV_QUERY_URL.to_string(),
            limit: DEFAULT_LIMIT,
            pause: Duration::from_millis(PAUSE_MS),
            timeout: Duration::from_secs(TIMEOUT_SECS),
            retry: RetryPolicy::rate_limited(),
            ignore: IgnoreConfig::default(),
        }
    }

    pub fn with_query_url(mut self, url: impl Into<String>) -> Self {
        self.query_url = url.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
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

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    /// Drops ignored packages, then keeps the first `limit` entries in
    /// declaration order.
    fn select<'a>(
        &self,
        dependencies: &'a [DependencyEntry],
        observer: &dyn ScanObserver,
    ) -> Vec<&'a DependencyEntry> {
        let eligible: Vec<&DependencyEntry> = dependencies
            .iter()
            .filter(|dep| {
                let ignored = self.ignore.should_ignore_package(&dep.name);
                if ignored {
                    observer.on_event(&ScanEvent::DependencyIgnored { name: &dep.name });
                }
                !ignored
            })
            .collect();

        if eligible.len() > self.limit {
            observer.on_event(&ScanEvent::DependenciesCapped {
                declared: eligible.len(),
                limit: self.limit,
            });
        }

        eligible.into_iter().take(self.limit).collect()
    }

    /// Queries OSV for one dependency, retrying on rate limiting.
    async fn query(
        &self,
        dependency: &DependencyEntry,
        version: &str,
        observer: &dyn ScanObserver,
    ) -> Result<Vec<OsvVuln>, String> {
        let body = OsvQuery {
            package: OsvPackage {
                name: &dependency.name,
                ecosystem: ECOSYSTEM,
            },
            version,
        };

        let attempt = self
            .retry
            .send(
                || {
                    self.client
                        .post(&self.query_url)
                        .timeout(self.timeout)
                        .json(&body)
                },
                |attempt, status| {
                    observer.on_event(&ScanEvent::LookupRetry {
                        name: &dependency.name,
                        attempt,
                        status: status.as_u16(),
                    })
                },
            )
            .await
            .map_err(|e| e.to_string())?;

        let response = match attempt {
            Attempt::Response(response) => response,
            Attempt::Exhausted { attempts, status } => {
                return Err(format!(
                    "still rate limited after {} attempts (status {})",
                    attempts, status
                ))
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(format!("OSV API returned status code {}", status));
        }

        let parsed: OsvResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(parsed.vulns.unwrap_or_default())
    }

    /// Builds a finding from the advisories returned for one dependency.
    fn to_finding(&self, package: &str, version: &str, vulns: Vec<OsvVuln>) -> Option<Finding> {
        let vulns: Vec<OsvVuln> = vulns
            .into_iter()
            .filter(|v| !self.ignore.should_ignore_vulnerability(&v.id))
            .collect();

        let summary = vulns.first()?.summary.clone();
        let identifiers = vulns.into_iter().map(|v| v.id).collect();
        Some(Finding::new(package, version, identifiers, summary))
    }
}

impl Default for OsvChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'a str,
}

#[derive(Serialize)]
struct OsvQuery<'a> {
    package: OsvPackage<'a>,
    version: &'a str,
}

#[derive(Deserialize)]
struct OsvResponse {
    vulns: Option<Vec<OsvVuln>>,
}

#[derive(Deserialize)]
struct OsvVuln {
    id: String,
    summary: Option<String>,
}

#[async_trait]
impl super::VulnerabilityChecker for OsvChecker {
    fn name(&self) -> &'static str {
        "OSV.dev"
    }

    async fn check(
        &self,
        dependencies: &[DependencyEntry],
        observer: &dyn ScanObserver,
    ) -> Vec<Finding> {
        let selected = self.select(dependencies, observer);
        let mut findings = Vec::new();

        for (i, dependency) in selected.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pause).await;
            }

            if !dependency.is_resolved() {
                observer.on_event(&ScanEvent::UnresolvedVersion {
                    name: &dependency.name,
                    declared: &dependency.declared_version,
                });
            }

            let version = dependency.normalized_version();
            observer.on_event(&ScanEvent::LookupStarted {
                name: &dependency.name,
                version: &version,
            });

            let vulns = match self.query(dependency, &version, observer).await {
                Ok(vulns) => vulns,
                Err(reason) => {
                    observer.on_event(&ScanEvent::LookupFailed {
                        name: &dependency.name,
                        reason,
                    });
                    continue;
                }
            };

            if let Some(finding) = self.to_finding(&dependency.name, &version, vulns) {
                observer.on_event(&ScanEvent::FindingRecorded {
                    name: &dependency.name,
                    advisories: finding.identifiers.len(),
                });
                findings.push(finding);
            }
        }

        findings
    }
}
