//! Report stage: turns a scan outcome into a narrated report.

use futures::StreamExt;

use crate::error::NarratorError;
use crate::model::{Report, ScanOutcome};
use crate::narrator::{build_prompt, NarrationRequest, Narrator, SYSTEM_PROMPT};
use crate::observer::{ScanEvent, ScanObserver};

pub struct ReportGenerator {
    narrator: Box<dyn Narrator>,
}

impl ReportGenerator {
    pub fn new(narrator: Box<dyn Narrator>) -> Self {
        Self { narrator }
    }

    /// Produces the report for `outcome`.
    ///
    /// A failed scan yields a fixed diagnostic without contacting the
    /// narrator. Otherwise the narrator's fragments are concatenated and
    /// each one is forwarded to `observer` as it arrives.
    ///
    /// # Errors
    ///
    /// Narrator failures are returned as-is; there is no retry.
    pub async fn generate(
        &self,
        outcome: &ScanOutcome,
        observer: &dyn ScanObserver,
    ) -> Result<Report, NarratorError> {
        if let ScanOutcome::Failed(err) = outcome {
            return Ok(Report::new(diagnostic(&err.to_string())));
        }

        let request = NarrationRequest::new(SYSTEM_PROMPT, build_prompt(outcome.findings()));
        observer.on_event(&ScanEvent::NarrationStarted {
            narrator: self.narrator.name(),
        });

        let mut fragments = self.narrator.narrate(request).await?;
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            observer.on_event(&ScanEvent::ReportFragment(&fragment));
            text.push_str(&fragment);
        }

        Ok(Report::new(text))
    }
}

/// Fixed report text for a scan that could not complete.
pub fn diagnostic(error: &str) -> String {
    format!(
        "Unable to generate a security report: {}. \
         No dependency findings are available for this repository; \
         resolve the problem above and run the scan again.",
        error
    )
}
