//! The scan-then-report pipeline.
//!
//! ```no_run
//! use repoaudit::{Config, OpenAiNarrator, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let narrator = OpenAiNarrator::from_config(&config.narrator)?;
//!     let pipeline = Pipeline::from_config(&config).with_narrator(Box::new(narrator));
//!
//!     let report = pipeline.run("https://github.com/acme/portal").await?;
//!     println!("{}", report.text);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use crate::checker::VulnerabilityChecker;
use crate::config::Config;
use crate::error::NarratorError;
use crate::fetcher::ManifestFetcher;
use crate::model::{RepositoryReference, Report, ScanOutcome, DEFAULT_BRANCH};
use crate::narrator::Narrator;
use crate::observer::{ScanEvent, ScanObserver, TracingObserver};
use crate::report::{diagnostic, ReportGenerator};

pub struct Pipeline {
    fetcher: ManifestFetcher,
    checker: Box<dyn VulnerabilityChecker>,
    generator: Option<ReportGenerator>,
    observer: Arc<dyn ScanObserver>,
    default_branch: String,
    branch_override: Option<String>,
}

impl Pipeline {
    pub fn new(fetcher: ManifestFetcher, checker: Box<dyn VulnerabilityChecker>) -> Self {
        Self {
            fetcher,
            checker,
            generator: None,
            observer: Arc::new(TracingObserver),
            default_branch: DEFAULT_BRANCH.to_string(),
            branch_override: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.manifest_fetcher(), Box::new(config.osv_checker()))
            .with_default_branch(&config.default_branch)
    }

    /// Enables the report stage.
    pub fn with_narrator(mut self, narrator: Box<dyn Narrator>) -> Self {
        self.generator = Some(ReportGenerator::new(narrator));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Scans `branch` regardless of what the URL says.
    pub fn with_branch_override(mut self, branch: Option<String>) -> Self {
        self.branch_override = branch;
        self
    }

    /// Runs the scan stage only.
    ///
    /// Never fails: every stage error is carried in the returned outcome.
    /// A malformed URL is rejected before any request is made.
    pub async fn scan(&self, repository_url: &str) -> ScanOutcome {
        let observer = self.observer.as_ref();

        let mut repo = match RepositoryReference::parse(repository_url, &self.default_branch) {
            Ok(repo) => repo,
            Err(err) => return ScanOutcome::Failed(err),
        };
        if let Some(branch) = &self.branch_override {
            repo = repo.with_branch(branch.as_str());
        }

        let dependencies = match self.fetcher.fetch(&repo, observer).await {
            Ok(dependencies) => dependencies,
            Err(err) => return ScanOutcome::Failed(err),
        };

        let findings = self.checker.check(&dependencies, observer).await;
        observer.on_event(&ScanEvent::ScanFinished {
            checker: self.checker.name(),
            findings: findings.len(),
        });
        ScanOutcome::from_findings(findings)
    }

    /// Produces the report for an outcome obtained from [`Pipeline::scan`].
    ///
    /// # Errors
    ///
    /// Fails with [`NarratorError::Configuration`] when no narrator was set
    /// and the outcome needs narrating. A failed outcome always yields the
    /// diagnostic report, narrator or not.
    pub async fn report(&self, outcome: &ScanOutcome) -> Result<Report, NarratorError> {
        if let ScanOutcome::Failed(err) = outcome {
            return Ok(Report::new(diagnostic(&err.to_string())));
        }

        let generator = self.generator.as_ref().ok_or_else(|| {
            NarratorError::Configuration("pipeline has no narrator".to_string())
        })?;
        generator.generate(outcome, self.observer.as_ref()).await
    }

    /// Runs both stages.
    ///
    /// # Errors
    ///
    /// Only narrator failures are returned as errors; scan failures become
    /// a diagnostic report.
    pub async fn run(&self, repository_url: &str) -> Result<Report, NarratorError> {
        let outcome = self.scan(repository_url).await;
        self.report(&outcome).await
    }
}
