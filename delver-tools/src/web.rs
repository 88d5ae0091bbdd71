//! HTTP search provider.
//!
//! Queries the DuckDuckGo instant-answer API (no API key required) and maps
//! the abstract, related topics, and results arrays into raw documents for
//! the summarizer. Transport failures are classified so the search task can
//! retry the transient ones.

use async_trait::async_trait;
use delver_core::config::ProvidersConfig;
use delver_core::error::SearchError;
use delver_core::types::RawDocument;
use delver_core::SearchProvider;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Search provider backed by the DuckDuckGo instant-answer JSON API.
pub struct HttpSearchProvider {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl HttpSearchProvider {
    pub fn new(config: &ProvidersConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Delver/0.3")
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.search_base_url.trim_end_matches('/').to_string(),
            max_results: config.search_max_results,
        }
    }

    /// Walk the instant-answer payload into raw documents.
    ///
    /// The abstract (when present) is the highest-signal entry, followed by
    /// related topics and the plain results array. Entries without a URL are
    /// skipped: a document the dedup store cannot key on is useless
    /// downstream.
    fn parse_instant_answers(body: &Value, max_results: usize) -> Vec<RawDocument> {
        let mut documents = Vec::new();

        if let Some(abstract_text) = body.get("AbstractText").and_then(|v| v.as_str()) {
            if !abstract_text.is_empty() {
                if let Some(url) = body
                    .get("AbstractURL")
                    .and_then(|v| v.as_str())
                    .filter(|u| !u.is_empty())
                {
                    let title = body
                        .get("AbstractSource")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string());
                    documents.push(RawDocument {
                        url: url.to_string(),
                        title,
                        content: abstract_text.to_string(),
                    });
                }
            }
        }

        for key in ["RelatedTopics", "Results"] {
            if let Some(entries) = body.get(key).and_then(|v| v.as_array()) {
                for entry in entries {
                    if documents.len() >= max_results {
                        break;
                    }
                    let Some(text) = entry.get("Text").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let Some(url) = entry
                        .get("FirstURL")
                        .and_then(|v| v.as_str())
                        .filter(|u| !u.is_empty())
                    else {
                        continue;
                    };
                    documents.push(RawDocument {
                        url: url.to_string(),
                        title: None,
                        content: text.to_string(),
                    });
                }
            }
        }

        documents.truncate(max_results);
        documents
    }

    fn map_transport_error(e: reqwest::Error) -> SearchError {
        if e.is_timeout() {
            SearchError::Timeout {
                timeout_secs: REQUEST_TIMEOUT.as_secs(),
            }
        } else {
            SearchError::Connection {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<RawDocument>, SearchError> {
        let url = format!(
            "{}/?q={}&format=json&no_html=1&skip_disambig=1",
            self.base_url,
            urlencoding::encode(query)
        );

        debug!(query, "Sending search request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SearchError::RateLimited { retry_after_secs: 5 });
        }
        if !status.is_success() {
            return Err(SearchError::Connection {
                message: format!("HTTP {status}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| SearchError::ResponseParse {
            message: format!("Invalid JSON: {e}"),
        })?;

        let documents = Self::parse_instant_answers(&body, self.max_results);
        debug!(query, documents = documents.len(), "Search request complete");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_abstract_entry() {
        let body = json!({
            "AbstractText": "Rust is a systems programming language.",
            "AbstractSource": "Wikipedia",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "RelatedTopics": [],
            "Results": []
        });

        let docs = HttpSearchProvider::parse_instant_answers(&body, 5);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title.as_deref(), Some("Wikipedia"));
        assert!(docs[0].content.contains("systems programming"));
    }

    #[test]
    fn test_parse_related_topics_and_results() {
        let body = json!({
            "AbstractText": "",
            "RelatedTopics": [
                {"Text": "Topic one", "FirstURL": "https://example.com/1"},
                {"Text": "Topic two", "FirstURL": "https://example.com/2"},
                {"Name": "category group without text"}
            ],
            "Results": [
                {"Text": "Result one", "FirstURL": "https://example.com/3"}
            ]
        });

        let docs = HttpSearchProvider::parse_instant_answers(&body, 5);
        let urls: Vec<&str> = docs.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3"
            ]
        );
    }

    #[test]
    fn test_parse_respects_max_results() {
        let topics: Vec<Value> = (0..10)
            .map(|i| json!({"Text": format!("T{i}"), "FirstURL": format!("https://example.com/{i}")}))
            .collect();
        let body = json!({"RelatedTopics": topics});

        let docs = HttpSearchProvider::parse_instant_answers(&body, 3);
        assert_eq!(docs.len(), 3);
    }

    #[test]
    fn test_parse_skips_urlless_entries() {
        let body = json!({
            "AbstractText": "Answer without a URL",
            "AbstractURL": "",
            "RelatedTopics": [{"Text": "no url here"}]
        });

        let docs = HttpSearchProvider::parse_instant_answers(&body, 5);
        assert!(docs.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = ProvidersConfig {
            search_base_url: "https://api.duckduckgo.com/".to_string(),
            ..ProvidersConfig::default()
        };
        let provider = HttpSearchProvider::new(&config);
        assert_eq!(provider.base_url, "https://api.duckduckgo.com");
    }
}
