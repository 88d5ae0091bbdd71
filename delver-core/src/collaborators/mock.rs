//! In-memory mock collaborators for tests.
//!
//! Deterministic, scriptable implementations of the collaborator traits:
//! per-query canned documents, failure injection, and call logging. Used by
//! unit and integration tests across the workspace.

use super::{QueryGenerator, QueryRefiner, ReportWriter, SearchProvider, Summarizer};
use crate::error::{PlanError, SearchError, SummarizeError, SynthesisError};
use crate::types::{Finding, RawDocument, ResearchResult, SourceRef, Summary};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

fn slug(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// Mock search provider with canned documents and failure injection.
pub struct MockSearchProvider {
    canned: HashMap<String, Vec<RawDocument>>,
    failures: HashSet<String>,
    docs_per_query: usize,
    call_log: Mutex<Vec<String>>,
}

impl MockSearchProvider {
    /// A provider that fabricates `docs_per_query` documents for any query.
    pub fn new(docs_per_query: usize) -> Self {
        Self {
            canned: HashMap::new(),
            failures: HashSet::new(),
            docs_per_query,
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Serve exact documents for a specific query.
    pub fn with_docs(mut self, query: impl Into<String>, docs: Vec<RawDocument>) -> Self {
        self.canned.insert(query.into(), docs);
        self
    }

    /// Fail (non-retryably) for a specific query.
    pub fn failing_for(mut self, query: impl Into<String>) -> Self {
        self.failures.insert(query.into());
        self
    }

    /// All queries this provider has been asked, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of search calls made.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    fn fabricate(&self, query: &str) -> Vec<RawDocument> {
        let slug = slug(query);
        (0..self.docs_per_query)
            .map(|i| RawDocument {
                url: format!("https://search.example/{slug}/{i}"),
                title: Some(format!("{query} — result {i}")),
                content: format!("Summary of {query}, part {i}."),
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<RawDocument>, SearchError> {
        self.call_log.lock().unwrap().push(query.to_string());

        if self.failures.contains(query) {
            return Err(SearchError::ResponseParse {
                message: format!("injected failure for '{query}'"),
            });
        }
        if let Some(docs) = self.canned.get(query) {
            return Ok(docs.clone());
        }
        Ok(self.fabricate(query))
    }
}

/// Mock query generator fabricating deterministic angle queries.
pub struct MockQueryGenerator {
    canned: Mutex<HashMap<String, Vec<String>>>,
    fail: bool,
}

impl MockQueryGenerator {
    pub fn new() -> Self {
        Self {
            canned: Mutex::new(HashMap::new()),
            fail: false,
        }
    }

    /// Serve exact queries for a specific topic.
    pub fn with_queries(self, topic: impl Into<String>, queries: Vec<String>) -> Self {
        self.canned.lock().unwrap().insert(topic.into(), queries);
        self
    }

    /// A generator that always fails.
    pub fn failing() -> Self {
        Self {
            canned: Mutex::new(HashMap::new()),
            fail: true,
        }
    }
}

impl Default for MockQueryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryGenerator for MockQueryGenerator {
    async fn generate_queries(
        &self,
        topic: &str,
        count: usize,
    ) -> Result<Vec<String>, SummarizeError> {
        if self.fail {
            return Err(SummarizeError::RequestFailed {
                message: "injected generator failure".into(),
            });
        }
        if let Some(queries) = self.canned.lock().unwrap().get(topic) {
            return Ok(queries.iter().take(count).cloned().collect());
        }
        Ok((0..count).map(|i| format!("{topic} angle {i}")).collect())
    }
}

/// Mock summarizer deriving one finding and one follow-up per document.
///
/// Deterministic: the finding text is the document content, sourced at the
/// document URL; the follow-up is derived from the document title. Specific
/// contexts can be scripted to fail instead.
pub struct MockSummarizer {
    failures: HashSet<String>,
    call_log: Mutex<Vec<String>>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            failures: HashSet::new(),
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Fail for any context containing the given fragment.
    pub fn failing_on(mut self, context_fragment: impl Into<String>) -> Self {
        self.failures.insert(context_fragment.into());
        self
    }

    /// Number of summarize calls made.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        documents: &[RawDocument],
        context: &str,
        max_follow_ups: usize,
    ) -> Result<Summary, SummarizeError> {
        self.call_log.lock().unwrap().push(context.to_string());

        if self.failures.iter().any(|frag| context.contains(frag.as_str())) {
            return Err(SummarizeError::RequestFailed {
                message: format!("injected failure for context '{context}'"),
            });
        }

        let findings = documents
            .iter()
            .map(|doc| {
                Finding::new(
                    doc.content.clone(),
                    vec![SourceRef::new(doc.url.clone(), doc.title.clone())],
                )
            })
            .collect();
        let follow_ups = documents
            .iter()
            .take(max_follow_ups)
            .map(|doc| {
                format!(
                    "more about {}",
                    doc.title.clone().unwrap_or_else(|| doc.url.clone())
                )
            })
            .collect();

        Ok(Summary {
            findings,
            follow_ups,
        })
    }
}

/// Mock query refiner with queued questions.
pub struct MockQueryRefiner {
    questions: Mutex<Vec<String>>,
    unavailable: bool,
}

impl MockQueryRefiner {
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions: Mutex::new(questions),
            unavailable: false,
        }
    }

    /// A refiner that always reports itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            questions: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }
}

#[async_trait]
impl QueryRefiner for MockQueryRefiner {
    async fn follow_up_questions(
        &self,
        _topic: &str,
        limit: usize,
    ) -> Result<Vec<String>, PlanError> {
        if self.unavailable {
            return Err(PlanError::Unavailable {
                message: "injected planner outage".into(),
            });
        }
        let questions = self.questions.lock().unwrap();
        Ok(questions.iter().take(limit).cloned().collect())
    }
}

/// Mock report writer producing a deterministic plain-text report.
pub struct MockReportWriter {
    fail: bool,
}

impl MockReportWriter {
    pub fn new() -> Self {
        Self { fail: false }
    }

    /// A writer that always fails, for surfacing tests.
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockReportWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportWriter for MockReportWriter {
    async fn write_report(
        &self,
        result: &ResearchResult,
        query: &str,
    ) -> Result<String, SynthesisError> {
        if self.fail {
            return Err(SynthesisError::RequestFailed {
                message: "injected synthesis failure".into(),
            });
        }
        let mut report = format!("# {query}\n\n");
        for learning in &result.learnings {
            report.push_str(&format!("- {learning}\n"));
        }
        report.push_str("\n## Sources\n");
        for url in &result.visited_urls {
            report.push_str(&format!("- {url}\n"));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_fabricates_docs() {
        let provider = MockSearchProvider::new(2);
        let docs = provider.search("rust futures").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].url.starts_with("https://search.example/"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_failure_injection() {
        let provider = MockSearchProvider::new(2).failing_for("bad query");
        assert!(provider.search("bad query").await.is_err());
        assert!(provider.search("good query").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_generator_fabricates_angles() {
        let generator = MockQueryGenerator::new();
        let queries = generator.generate_queries("rust", 2).await.unwrap();
        assert_eq!(queries, vec!["rust angle 0", "rust angle 1"]);

        assert!(MockQueryGenerator::failing()
            .generate_queries("rust", 2)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_mock_summarizer_one_finding_per_doc() {
        let provider = MockSearchProvider::new(3);
        let docs = provider.search("topic").await.unwrap();
        let summary = MockSummarizer::new().summarize(&docs, "topic", 2).await.unwrap();
        assert_eq!(summary.findings.len(), 3);
        assert_eq!(summary.follow_ups.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_refiner_respects_limit() {
        let refiner = MockQueryRefiner::new(vec![
            "Q1?".into(),
            "Q2?".into(),
            "Q3?".into(),
        ]);
        let questions = refiner.follow_up_questions("topic", 2).await.unwrap();
        assert_eq!(questions, vec!["Q1?", "Q2?"]);
    }

    #[tokio::test]
    async fn test_mock_report_writer() {
        let result = ResearchResult {
            learnings: vec!["fact".into()],
            visited_urls: vec!["https://example.com/a".into()],
        };
        let report = MockReportWriter::new()
            .write_report(&result, "topic")
            .await
            .unwrap();
        assert!(report.contains("# topic"));
        assert!(report.contains("- fact"));
        assert!(report.contains("https://example.com/a"));

        assert!(MockReportWriter::failing()
            .write_report(&result, "topic")
            .await
            .is_err());
    }
}
