//! Progress events emitted by the pipeline.
//!
//! The scan and report stages never log directly. They report what happens
//! to a [`ScanObserver`], which the host wires to `tracing`, a terminal, or a
//! test recorder.

use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Something that happened during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent<'a> {
    ManifestRequested { url: &'a str },
    ManifestRetry { attempt: u32, status: u16 },
    ManifestLoaded {
        package: Option<&'a str>,
        dependencies: usize,
    },
    DependenciesCapped { declared: usize, limit: usize },
    DependencyIgnored { name: &'a str },
    UnresolvedVersion { name: &'a str, declared: &'a str },
    LookupStarted { name: &'a str, version: &'a str },
    LookupRetry { name: &'a str, attempt: u32, status: u16 },
    LookupFailed { name: &'a str, reason: String },
    FindingRecorded { name: &'a str, advisories: usize },
    ScanFinished { checker: &'a str, findings: usize },
    NarrationStarted { narrator: &'a str },
    ReportFragment(&'a str),
}

pub trait ScanObserver: Send + Sync {
    fn on_event(&self, event: &ScanEvent<'_>);
}

/// Forwards events to `tracing`. Report fragments are not logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ScanObserver for TracingObserver {
    fn on_event(&self, event: &ScanEvent<'_>) {
        match event {
            ScanEvent::ManifestRequested { url } => debug!(%url, "Fetching manifest"),
            ScanEvent::ManifestRetry { attempt, status } => {
                warn!(attempt, status, "Manifest fetch hit a gateway timeout, retrying")
            }
            ScanEvent::ManifestLoaded {
                package,
                dependencies,
            } => info!(
                package = package.unwrap_or("<unnamed>"),
                dependencies,
                "Manifest loaded"
            ),
            ScanEvent::DependenciesCapped { declared, limit } => {
                info!(declared, limit, "Only the first {} dependencies will be checked", limit)
            }
            ScanEvent::DependencyIgnored { name } => debug!(%name, "Dependency ignored by config"),
            ScanEvent::UnresolvedVersion { name, declared } => warn!(
                %name,
                %declared,
                "Declared version is not a concrete version; lookup may be inaccurate"
            ),
            ScanEvent::LookupStarted { name, version } => {
                debug!(%name, %version, "Querying advisories")
            }
            ScanEvent::LookupRetry {
                name,
                attempt,
                status,
            } => warn!(%name, attempt, status, "Advisory query rate limited, retrying"),
            ScanEvent::LookupFailed { name, reason } => {
                warn!(%name, %reason, "Advisory query failed, skipping dependency")
            }
            ScanEvent::FindingRecorded { name, advisories } => {
                info!(%name, advisories, "Vulnerable dependency")
            }
            ScanEvent::ScanFinished { checker, findings } => {
                info!(%checker, findings, "Scan finished")
            }
            ScanEvent::NarrationStarted { narrator } => debug!(%narrator, "Generating report"),
            ScanEvent::ReportFragment(_) => {}
        }
    }
}

/// Keeps a textual trace of every event, mostly for tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events whose debug form starts with `prefix`, e.g. `"LookupRetry"`.
    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl ScanObserver for RecordingObserver {
    fn on_event(&self, event: &ScanEvent<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(format!("{:?}", event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_counts_by_variant() {
        let observer = RecordingObserver::new();
        observer.on_event(&ScanEvent::LookupStarted {
            name: "left-pad",
            version: "1.3.0",
        });
        observer.on_event(&ScanEvent::LookupRetry {
            name: "left-pad",
            attempt: 1,
            status: 429,
        });
        observer.on_event(&ScanEvent::ReportFragment("Hello"));

        assert_eq!(observer.events().len(), 3);
        assert_eq!(observer.count("LookupRetry"), 1);
        assert_eq!(observer.count("ReportFragment(\"Hello\")"), 1);
    }
}
