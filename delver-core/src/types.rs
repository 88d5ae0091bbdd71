//! Core data model for the research pipeline.
//!
//! Budgets and sub-queries are created per recursion step and die with it;
//! findings and source refs live in the dedup store for the duration of a
//! tree traversal; `ResearchResult` is assembled once, at root completion.

use crate::error::{SearchError, SummarizeError};
use serde::{Deserialize, Serialize};

/// The breadth/depth budget driving a research (sub)tree.
///
/// Depth decreases strictly by 1 per recursion level; recursion stops at
/// depth 0. Breadth is the maximum number of sibling sub-queries spawned at
/// a level; child allocations may be uneven but sum to at most the parent
/// breadth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchBudget {
    /// Maximum sibling sub-queries at this level.
    pub breadth: usize,
    /// Recursion levels remaining before this branch terminates.
    pub depth: usize,
}

impl ResearchBudget {
    /// Create a budget, clamping breadth to at least 1.
    pub fn new(breadth: usize, depth: usize) -> Self {
        Self {
            breadth: breadth.max(1),
            depth,
        }
    }

    /// Whether this budget permits any work at all.
    pub fn is_exhausted(&self) -> bool {
        self.depth == 0 || self.breadth == 0
    }

    /// The budget a child level starts from: one level shallower, with the
    /// given breadth allocation.
    pub fn descend(&self, child_breadth: usize) -> Self {
        Self {
            breadth: child_breadth,
            depth: self.depth.saturating_sub(1),
        }
    }
}

/// A sub-query dispatched to one search task.
///
/// Immutable once created by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuery {
    /// The query text sent to the search provider.
    pub text: String,
    /// Accumulated context from ancestor queries, used to keep the
    /// summarizer's follow-ups on topic.
    pub parent_context: String,
    /// Budget for the subtree rooted at this query.
    pub budget: ResearchBudget,
}

impl SubQuery {
    /// Create the root sub-query for a research tree.
    pub fn root(text: impl Into<String>, budget: ResearchBudget) -> Self {
        let text = text.into();
        Self {
            parent_context: text.clone(),
            text,
            budget,
        }
    }

    /// Create a child sub-query, extending the parent's context.
    pub fn child(&self, text: impl Into<String>, budget: ResearchBudget) -> Self {
        let text = text.into();
        Self {
            parent_context: format!("{}\n{}", self.parent_context, text),
            text,
            budget,
        }
    }
}

/// A raw document returned by the search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Document URL as returned by the provider (not yet normalized).
    pub url: String,
    /// Document title, when the provider supplies one.
    pub title: Option<String>,
    /// Snippet or extracted content.
    pub content: String,
}

/// A reference to a discovered source.
///
/// Identity for dedup purposes is the normalized URL; see
/// [`crate::dedup::normalize_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Normalized URL.
    pub url: String,
    /// Source title, when known.
    pub title: Option<String>,
}

impl SourceRef {
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
        }
    }
}

/// A single extracted fact with its supporting sources.
///
/// Identity for dedup purposes is the normalized text; two findings judged
/// equivalent are merged, unioning their source sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// The finding text.
    pub text: String,
    /// Sources supporting this finding, deduplicated by normalized URL.
    pub source_refs: Vec<SourceRef>,
}

impl Finding {
    pub fn new(text: impl Into<String>, source_refs: Vec<SourceRef>) -> Self {
        Self {
            text: text.into(),
            source_refs,
        }
    }
}

/// What the summarizer extracts from one batch of raw documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Findings extracted from the documents.
    pub findings: Vec<Finding>,
    /// Candidate follow-up sub-queries, in proposal order.
    pub follow_ups: Vec<String>,
}

/// Why a search task failed locally.
///
/// Local failures degrade the affected branch to empty results; they never
/// abort siblings or ancestors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskFailure {
    #[error("provider failure: {0}")]
    Provider(#[from] SearchError),

    #[error("summarizer failure: {0}")]
    Summarizer(#[from] SummarizeError),
}

/// The outcome of one search task. Transient; consumed by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct SearchTaskResult {
    /// Findings extracted for this sub-query.
    pub findings: Vec<Finding>,
    /// Candidate follow-up queries, in summarizer-returned order.
    pub follow_up_queries: Vec<String>,
    /// Set when the task failed locally; findings/follow-ups are empty.
    pub error: Option<TaskFailure>,
}

impl SearchTaskResult {
    /// An empty result carrying a local failure.
    pub fn failed(error: impl Into<TaskFailure>) -> Self {
        Self {
            findings: Vec::new(),
            follow_up_queries: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The terminal artifact of a research tree.
///
/// Both lists are deduplicated and ordered by first registration into the
/// dedup store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    /// Deduplicated finding texts, first-seen order.
    pub learnings: Vec<String>,
    /// Deduplicated normalized URLs, first-seen order.
    pub visited_urls: Vec<String>,
}

impl ResearchResult {
    /// Whether the tree produced nothing at all.
    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty() && self.visited_urls.is_empty()
    }
}
