//! Error types for the Delver research core.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering search, summarization, planning, synthesis, and configuration
//! domains. Branch-local failures (search/summarize) are absorbed by the
//! scheduler; synthesis failures are surfaced to the caller.

use std::path::PathBuf;

/// Top-level error type for the Delver core library.
#[derive(Debug, thiserror::Error)]
pub enum DelverError {
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Summarizer error: {0}")]
    Summarize(#[from] SummarizeError),

    #[error("Planner error: {0}")]
    Plan(#[from] PlanError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the search provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Provider request failed: {message}")]
    Connection { message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider response parse error: {message}")]
    ResponseParse { message: String },
}

impl SearchError {
    /// Whether this error is transient and worth retrying.
    ///
    /// Parse failures are permanent: the provider answered, we just could
    /// not make sense of it, and a retry would get the same bytes back.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Connection { .. }
                | SearchError::RateLimited { .. }
                | SearchError::Timeout { .. }
        )
    }
}

/// Errors from the summarizer collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SummarizeError {
    #[error("Summarizer request failed: {message}")]
    RequestFailed { message: String },

    #[error("Summarizer returned malformed output: {message}")]
    MalformedOutput { message: String },

    #[error("Summarizer timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Errors from the query-refinement planner.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanError {
    #[error("Planner unavailable: {message}")]
    Unavailable { message: String },

    #[error("Planner returned malformed output: {message}")]
    MalformedOutput { message: String },
}

/// Errors from report synthesis.
///
/// Unlike search and summarizer failures, these are surfaced to the caller:
/// a tree that completed with findings but produced no report is a
/// user-visible failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    #[error("Synthesizer request failed: {message}")]
    RequestFailed { message: String },

    #[error("Synthesizer returned an empty report")]
    EmptyReport,

    #[error("Synthesizer timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `DelverError`.
pub type Result<T> = std::result::Result<T, DelverError>;
