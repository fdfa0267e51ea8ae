mod osv;

pub use osv::{OsvChecker, OSV_QUERY_URL};

use crate::model::{DependencyEntry, Finding};
use crate::observer::ScanObserver;
use async_trait::async_trait;

/// Looks up known vulnerabilities for declared dependencies.
///
/// Failures for a single dependency are reported to the observer and
/// skipped; they never fail the whole batch.
#[async_trait]
pub trait VulnerabilityChecker: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(
        &self,
        dependencies: &[DependencyEntry],
        observer: &dyn ScanObserver,
    ) -> Vec<Finding>;
}
