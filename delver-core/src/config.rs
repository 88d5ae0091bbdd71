//! Configuration system for Delver.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! Configuration is loaded from `~/.config/delver/config.toml` and/or
//! `.delver/config.toml` in the workspace directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the Delver engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelverConfig {
    pub research: ResearchConfig,
    pub providers: ProvidersConfig,
}

/// Configuration for the research tree itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Default root breadth when the caller does not specify one.
    pub default_breadth: usize,
    /// Default root depth when the caller does not specify one.
    pub default_depth: usize,
    /// Maximum follow-up queries the summarizer is asked to propose per task.
    pub max_follow_ups: usize,
    /// Retries for transient provider failures within one search task.
    pub max_retries: usize,
    /// Per-task timeout covering the provider and summarizer calls.
    pub task_timeout_secs: u64,
    /// Number of clarifying questions requested from the planner.
    pub clarifying_questions: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            default_breadth: 4,
            default_depth: 2,
            max_follow_ups: 3,
            max_retries: 2,
            task_timeout_secs: 60,
            clarifying_questions: 3,
        }
    }
}

impl ResearchConfig {
    /// The per-task timeout as a `Duration`.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

/// Configuration for the external collaborator adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Base URL of the search provider API.
    pub search_base_url: String,
    /// Maximum documents requested per search call.
    pub search_max_results: usize,
    /// Base URL of the OpenAI-compatible chat API used by the summarizer,
    /// planner, and synthesizer.
    pub llm_base_url: String,
    /// Model name for the chat API.
    pub llm_model: String,
    /// Environment variable holding the chat API key.
    pub llm_api_key_env: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            search_base_url: "https://api.duckduckgo.com".to_string(),
            search_max_results: 5,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            llm_api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `DELVER_`)
/// 2. Workspace-local config (`.delver/config.toml`)
/// 3. User config (`~/.config/delver/config.toml`)
/// 4. Built-in defaults
pub fn load_config(workspace: Option<&Path>) -> Result<DelverConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DelverConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("rs", "delver", "delver") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".delver").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (DELVER_RESEARCH__DEFAULT_BREADTH, etc.)
    figment = figment.merge(Env::prefixed("DELVER_").split("__"));

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_research_config() {
        let config = ResearchConfig::default();
        assert_eq!(config.default_breadth, 4);
        assert_eq!(config.default_depth, 2);
        assert_eq!(config.max_follow_ups, 3);
        assert_eq!(config.task_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).expect("defaults should load");
        assert_eq!(config.research.default_breadth, 4);
        assert_eq!(config.providers.llm_api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_workspace_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let delver_dir = dir.path().join(".delver");
        std::fs::create_dir_all(&delver_dir).unwrap();
        std::fs::write(
            delver_dir.join("config.toml"),
            "[research]\ndefault_breadth = 8\nmax_retries = 5\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path())).expect("workspace config should load");
        assert_eq!(config.research.default_breadth, 8);
        assert_eq!(config.research.max_retries, 5);
        // Untouched fields keep their defaults.
        assert_eq!(config.research.default_depth, 2);
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = DelverConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: DelverConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.research.default_breadth, config.research.default_breadth);
    }
}
