//! External collaborator seams.
//!
//! The pipeline consumes external services through narrow async traits: a
//! query refiner (clarifying questions before the tree starts), a query
//! generator (root-query expansion into initial sub-queries), a search
//! provider, a summarizer, and a report writer. Concrete HTTP
//! implementations live in `delver-tools`; scripted in-memory mocks for
//! tests live in [`mock`].

pub mod mock;

use crate::error::{PlanError, SearchError, SummarizeError, SynthesisError};
use crate::types::{RawDocument, ResearchResult, Summary};
use async_trait::async_trait;

/// Turns a raw research topic into clarifying follow-up questions.
///
/// Used once, before the tree starts. Failure here is recoverable: the
/// caller proceeds with the raw topic.
#[async_trait]
pub trait QueryRefiner: Send + Sync {
    /// Propose up to `limit` clarifying questions for the topic.
    async fn follow_up_questions(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<String>, PlanError>;
}

/// Expands the composed root query into initial search sub-queries.
///
/// Used once per tree, before any search runs; every deeper level's
/// sub-queries come from summarizer follow-ups instead. Failure degrades
/// the whole tree to an empty (but valid) result.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Propose up to `count` distinct search queries for the topic.
    async fn generate_queries(
        &self,
        topic: &str,
        count: usize,
    ) -> Result<Vec<String>, SummarizeError>;
}

/// Returns raw source documents for a sub-query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<RawDocument>, SearchError>;
}

/// Extracts findings and candidate follow-up queries from raw documents.
///
/// `context` carries the accumulated ancestor queries so follow-ups stay on
/// topic; at most `max_follow_ups` are returned.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        documents: &[RawDocument],
        context: &str,
        max_follow_ups: usize,
    ) -> Result<Summary, SummarizeError>;
}

/// Turns the accumulated finding set into a prose report.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write_report(
        &self,
        result: &ResearchResult,
        query: &str,
    ) -> Result<String, SynthesisError>;
}
