//! Search task execution — one sub-query, one isolated failure domain.
//!
//! A task calls the search provider (with retry and backoff on transient
//! errors), hands the raw documents to the summarizer, and registers every
//! discovered source and finding into the dedup store as soon as it is
//! produced. A task that fails does so locally: it returns an empty result
//! carrying the error and never aborts siblings or ancestors.

use crate::collaborators::{SearchProvider, Summarizer};
use crate::config::ResearchConfig;
use crate::dedup::DedupStore;
use crate::error::SearchError;
use crate::types::{RawDocument, SearchTaskResult, SourceRef, SubQuery};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Executes one sub-query against the search provider and summarizer.
#[derive(Clone)]
pub struct SearchTask {
    provider: Arc<dyn SearchProvider>,
    summarizer: Arc<dyn Summarizer>,
    store: Arc<DedupStore>,
    max_retries: usize,
    max_follow_ups: usize,
    timeout: Duration,
}

impl SearchTask {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        summarizer: Arc<dyn Summarizer>,
        store: Arc<DedupStore>,
        config: &ResearchConfig,
    ) -> Self {
        Self {
            provider,
            summarizer,
            store,
            max_retries: config.max_retries,
            max_follow_ups: config.max_follow_ups,
            timeout: config.task_timeout(),
        }
    }

    /// Run the task to completion.
    ///
    /// The timeout covers both the provider and summarizer calls. All
    /// failure modes degrade to an empty `SearchTaskResult` carrying the
    /// error; the caller decides what to do with the (lack of) follow-ups.
    pub async fn run(&self, sub_query: &SubQuery) -> SearchTaskResult {
        let outcome = tokio::time::timeout(self.timeout, self.run_inner(sub_query)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    query = sub_query.text.as_str(),
                    timeout_secs = self.timeout.as_secs(),
                    "Search task timed out"
                );
                SearchTaskResult::failed(SearchError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }

    async fn run_inner(&self, sub_query: &SubQuery) -> SearchTaskResult {
        let documents = match self.search_with_retry(&sub_query.text).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(
                    query = sub_query.text.as_str(),
                    error = %e,
                    "Search provider failed, degrading branch to empty result"
                );
                return SearchTaskResult::failed(e);
            }
        };

        // Register sources as soon as they are known, before summarization,
        // so partial results are observable even if the summarizer fails.
        for doc in &documents {
            self.store
                .add_source(SourceRef::new(doc.url.clone(), doc.title.clone()));
        }

        let summary = match self
            .summarizer
            .summarize(&documents, &sub_query.parent_context, self.max_follow_ups)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    query = sub_query.text.as_str(),
                    error = %e,
                    "Summarizer failed, degrading branch to empty result"
                );
                return SearchTaskResult::failed(e);
            }
        };

        let mut findings = Vec::with_capacity(summary.findings.len());
        for finding in summary.findings {
            for source in &finding.source_refs {
                self.store.add_source(source.clone());
            }
            findings.push(self.store.add_finding(finding));
        }

        debug!(
            query = sub_query.text.as_str(),
            findings = findings.len(),
            follow_ups = summary.follow_ups.len(),
            "Search task completed"
        );

        SearchTaskResult {
            findings,
            follow_up_queries: summary.follow_ups,
            error: None,
        }
    }

    /// Call the search provider, retrying transient errors with exponential
    /// backoff (1s, 2s, 4s, ..., capped at 32s). Rate-limit hints from the
    /// provider stretch the backoff but never shrink it.
    async fn search_with_retry(&self, query: &str) -> Result<Vec<RawDocument>, SearchError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.provider.search(query).await {
                Ok(docs) => return Ok(docs),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff_secs = std::cmp::min(1u64 << attempt, 32);
                    let wait = match &e {
                        SearchError::RateLimited { retry_after_secs } => {
                            std::cmp::max(*retry_after_secs, backoff_secs)
                        }
                        _ => backoff_secs,
                    };
                    debug!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_secs = wait,
                        error = %e,
                        "Retrying search after transient error"
                    );
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(SearchError::Connection {
            message: "max retries exceeded".to_string(),
        }))
    }
}
