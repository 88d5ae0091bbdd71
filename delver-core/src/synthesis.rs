//! Report synthesis — the adapter between the finding set and the writer.
//!
//! The one place in the pipeline where failure is surfaced rather than
//! absorbed: a tree that completed with findings but produced no report is
//! a user-visible failure.

use crate::collaborators::ReportWriter;
use crate::error::SynthesisError;
use crate::types::ResearchResult;
use std::sync::Arc;
use tracing::{debug, error};

/// Hands the deduplicated finding set to the external report writer.
pub struct ReportSynthesizer {
    writer: Arc<dyn ReportWriter>,
}

impl ReportSynthesizer {
    pub fn new(writer: Arc<dyn ReportWriter>) -> Self {
        Self { writer }
    }

    /// Synthesize a prose report from the research result.
    ///
    /// `learnings` and `visited_urls` arrive already deduplicated and in
    /// first-seen order from the dedup store; this adapter only rejects an
    /// empty report and propagates writer failures.
    pub async fn synthesize(
        &self,
        result: &ResearchResult,
        query: &str,
    ) -> Result<String, SynthesisError> {
        debug!(
            learnings = result.learnings.len(),
            sources = result.visited_urls.len(),
            "Requesting report synthesis"
        );

        let report = self.writer.write_report(result, query).await.map_err(|e| {
            error!(error = %e, "Report synthesis failed");
            e
        })?;

        if report.trim().is_empty() {
            error!("Synthesizer returned an empty report");
            return Err(SynthesisError::EmptyReport);
        }

        Ok(report)
    }
}
