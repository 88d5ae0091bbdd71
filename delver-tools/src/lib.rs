//! # Delver Tools
//!
//! Concrete collaborator adapters for the Delver research engine: an HTTP
//! search provider and an OpenAI-compatible chat client implementing the
//! query refiner, query generator, summarizer, and report writer seams.

pub mod llm;
pub mod web;

pub use llm::ChatCompletionClient;
pub use web::HttpSearchProvider;

use delver_core::config::{ProvidersConfig, ResearchConfig};
use delver_core::engine::ResearchEngine;
use delver_core::error::ConfigError;
use std::sync::Arc;

/// Wire a research engine from configuration using the HTTP adapters.
///
/// Loads a `.env` file if one is present (for the LLM API key), then
/// builds one chat client instance to back all four LLM-facing seams.
pub fn build_engine(
    research: ResearchConfig,
    providers: &ProvidersConfig,
) -> Result<ResearchEngine, ConfigError> {
    let _ = dotenvy::dotenv();

    let search = Arc::new(HttpSearchProvider::new(providers));
    let chat = Arc::new(ChatCompletionClient::new(providers)?);

    Ok(ResearchEngine::new(
        chat.clone(),
        chat.clone(),
        search,
        chat.clone(),
        chat,
        research,
    ))
}
