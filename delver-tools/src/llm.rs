//! OpenAI-compatible chat client backing the LLM-facing collaborator seams.
//!
//! Supports OpenAI, Azure OpenAI, Ollama, vLLM, and any endpoint following
//! the OpenAI chat completions API format. One client implements the query
//! refiner, query generator, summarizer, and report writer; each seam maps
//! the shared transport errors into its own error domain.

use async_trait::async_trait;
use delver_core::config::ProvidersConfig;
use delver_core::error::{ConfigError, PlanError, SummarizeError, SynthesisError};
use delver_core::types::{Finding, RawDocument, ResearchResult, SourceRef, Summary};
use delver_core::{QueryGenerator, QueryRefiner, ReportWriter, Summarizer};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Cap per-document content shipped to the summarizer, so a single long
/// page cannot crowd the whole batch out of the context window.
const MAX_DOC_CHARS: usize = 4_000;

/// Internal transport/parse error shared by all seams.
#[derive(Debug, thiserror::Error)]
enum ChatError {
    #[error("chat request failed: {0}")]
    Request(String),

    #[error("chat response malformed: {0}")]
    Parse(String),
}

/// OpenAI-compatible chat completion client.
#[derive(Debug)]
pub struct ChatCompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    /// Create a client from configuration.
    ///
    /// Reads the API key from the environment variable named in
    /// `config.llm_api_key_env`. Local endpoints (localhost) fall back to a
    /// dummy bearer token, matching how Ollama and vLLM behave.
    pub fn new(config: &ProvidersConfig) -> Result<Self, ConfigError> {
        let is_local = config.llm_base_url.contains("localhost")
            || config.llm_base_url.contains("127.0.0.1");

        let api_key = match std::env::var(&config.llm_api_key_env) {
            Ok(key) => key,
            Err(_) if is_local => {
                debug!("No API key set for local endpoint; using dummy bearer token");
                "local".to_string()
            }
            Err(_) => {
                return Err(ConfigError::EnvVarMissing {
                    var: config.llm_api_key_env.clone(),
                })
            }
        };

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.llm_model.clone(),
        })
    }

    /// Send one system+user exchange and return the assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.3,
            "stream": false,
        });

        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Request(format!("request failed: {e}")))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| ChatError::Request(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(ChatError::Request(format!("HTTP {status}: {response_body}")));
        }

        let parsed: Value = serde_json::from_str(&response_body)
            .map_err(|e| ChatError::Parse(format!("invalid JSON: {e}")))?;

        parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ChatError::Parse("no message content in response".to_string()))
    }
}

/// Strip a Markdown code fence, if the model wrapped its output in one.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the optional language tag on the opening fence line.
    let inner = inner.split_once('\n').map(|(_, rest)| rest).unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse a JSON array of strings out of model output.
fn parse_string_array(text: &str) -> Result<Vec<String>, ChatError> {
    let parsed: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ChatError::Parse(format!("expected JSON array: {e}")))?;
    let items = parsed
        .as_array()
        .ok_or_else(|| ChatError::Parse("expected a top-level JSON array".to_string()))?;
    Ok(items
        .iter()
        .filter_map(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Parse the summarizer's JSON object into a `Summary`.
///
/// Findings may cite their supporting URLs; a finding that cites none is
/// attributed to every document in the batch it was extracted from.
fn parse_summary(text: &str, documents: &[RawDocument]) -> Result<Summary, ChatError> {
    let parsed: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ChatError::Parse(format!("expected JSON object: {e}")))?;

    let batch_refs: Vec<SourceRef> = documents
        .iter()
        .map(|d| SourceRef::new(d.url.clone(), d.title.clone()))
        .collect();

    let mut findings = Vec::new();
    if let Some(entries) = parsed.get("findings").and_then(|v| v.as_array()) {
        for entry in entries {
            let Some(finding_text) = entry.get("text").and_then(|v| v.as_str()) else {
                continue;
            };
            let cited: Vec<SourceRef> = entry
                .get("urls")
                .and_then(|v| v.as_array())
                .map(|urls| {
                    urls.iter()
                        .filter_map(|u| u.as_str())
                        .map(|u| SourceRef::new(u, None))
                        .collect()
                })
                .unwrap_or_default();
            let source_refs = if cited.is_empty() {
                batch_refs.clone()
            } else {
                cited
            };
            findings.push(Finding::new(finding_text, source_refs));
        }
    }

    let follow_ups = parsed
        .get("follow_ups")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(Summary {
        findings,
        follow_ups,
    })
}

/// Render the document batch for the summarizer prompt.
fn render_documents(documents: &[RawDocument]) -> String {
    let mut rendered = String::new();
    for (i, doc) in documents.iter().enumerate() {
        let content: String = doc.content.chars().take(MAX_DOC_CHARS).collect();
        rendered.push_str(&format!(
            "--- Document {} ---\nURL: {}\nTitle: {}\n{}\n\n",
            i + 1,
            doc.url,
            doc.title.as_deref().unwrap_or("(untitled)"),
            content
        ));
    }
    rendered
}

#[async_trait]
impl QueryRefiner for ChatCompletionClient {
    async fn follow_up_questions(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<String>, PlanError> {
        let system = "You help scope research topics. Given a topic, reply with a JSON array \
                      of short clarifying questions whose answers would narrow the research. \
                      Reply with the JSON array only.";
        let user = format!("Topic: {topic}\nPropose at most {limit} questions.");

        let text = self.complete(system, &user).await.map_err(|e| match e {
            ChatError::Request(message) => PlanError::Unavailable { message },
            ChatError::Parse(message) => PlanError::MalformedOutput { message },
        })?;

        let mut questions = parse_string_array(&text).map_err(|e| PlanError::MalformedOutput {
            message: e.to_string(),
        })?;
        questions.truncate(limit);
        Ok(questions)
    }
}

#[async_trait]
impl QueryGenerator for ChatCompletionClient {
    async fn generate_queries(
        &self,
        topic: &str,
        count: usize,
    ) -> Result<Vec<String>, SummarizeError> {
        let system = "You are a research assistant planning web searches. Given a research \
                      goal, reply with a JSON array of distinct search queries that together \
                      cover the goal from different angles. Reply with the JSON array only.";
        let user = format!("Research goal:\n{topic}\n\nPropose at most {count} queries.");

        let text = self.complete(system, &user).await.map_err(|e| match e {
            ChatError::Request(message) => SummarizeError::RequestFailed { message },
            ChatError::Parse(message) => SummarizeError::MalformedOutput { message },
        })?;

        let mut queries =
            parse_string_array(&text).map_err(|e| SummarizeError::MalformedOutput {
                message: e.to_string(),
            })?;
        queries.truncate(count);
        Ok(queries)
    }
}

#[async_trait]
impl Summarizer for ChatCompletionClient {
    async fn summarize(
        &self,
        documents: &[RawDocument],
        context: &str,
        max_follow_ups: usize,
    ) -> Result<Summary, SummarizeError> {
        if documents.is_empty() {
            return Ok(Summary::default());
        }

        let system = "You extract research findings from documents. Reply with a JSON object: \
                      {\"findings\": [{\"text\": \"...\", \"urls\": [\"...\"]}], \
                      \"follow_ups\": [\"...\"]}. Findings must be concrete, information-dense \
                      facts supported by the documents, citing the URLs they came from. \
                      Follow-ups must be search queries that stay on the research topic. \
                      Reply with the JSON object only.";
        let user = format!(
            "Research topic so far:\n{context}\n\nDocuments:\n{}\nExtract the key findings \
             and propose at most {max_follow_ups} follow-up search queries.",
            render_documents(documents)
        );

        let text = self.complete(system, &user).await.map_err(|e| match e {
            ChatError::Request(message) => SummarizeError::RequestFailed { message },
            ChatError::Parse(message) => SummarizeError::MalformedOutput { message },
        })?;

        let mut summary =
            parse_summary(&text, documents).map_err(|e| SummarizeError::MalformedOutput {
                message: e.to_string(),
            })?;
        summary.follow_ups.truncate(max_follow_ups);
        Ok(summary)
    }
}

#[async_trait]
impl ReportWriter for ChatCompletionClient {
    async fn write_report(
        &self,
        result: &ResearchResult,
        query: &str,
    ) -> Result<String, SynthesisError> {
        let system = "You write research reports. Given a research query and the learnings \
                      gathered for it, write a detailed Markdown report that synthesizes the \
                      learnings into a coherent answer. End with a Sources section listing \
                      the provided URLs.";
        let learnings = result
            .learnings
            .iter()
            .map(|l| format!("- {l}"))
            .collect::<Vec<_>>()
            .join("\n");
        let sources = result.visited_urls.join("\n");
        let user = format!(
            "Research query:\n{query}\n\nLearnings:\n{learnings}\n\nSources:\n{sources}"
        );

        let report = self.complete(system, &user).await.map_err(|e| match e {
            ChatError::Request(message) => SynthesisError::RequestFailed { message },
            ChatError::Parse(message) => SynthesisError::RequestFailed { message },
        })?;

        if report.trim().is_empty() {
            return Err(SynthesisError::EmptyReport);
        }
        Ok(report)
    }
}
