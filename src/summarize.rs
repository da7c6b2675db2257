//! Plain-language summaries of query results from a locally hosted model.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::llm::{ChatProvider, ChatRequest, Message, OpenAiAdapter};

pub const LLAMAFILE_URL: &str = "http://localhost:8080/v1/chat/completions";

const SUMMARY_TIMEOUT: Duration = Duration::from_secs(120);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalBackend {
    Ollama,
    Llamafile,
    #[value(name = "openai_compatible", alias = "openai-compatible")]
    OpenaiCompatible,
}

impl fmt::Display for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LocalBackend::Ollama => "ollama",
            LocalBackend::Llamafile => "llamafile",
            LocalBackend::OpenaiCompatible => "openai_compatible",
        })
    }
}

#[derive(Debug, Clone)]
pub struct LocalSummarizer {
    client: reqwest::Client,
    backend: LocalBackend,
    model: String,
    ollama_url: String,
    /// Full `/chat/completions` URL for the OpenAI-style backends.
    endpoint_url: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Business-analyst prompt for a question, its SQL and the rendered results.
pub fn summary_prompt(question: &str, sql: &str, results: &str) -> String {
    format!(
        "You are a business analyst helping to interpret retail store data.

QUERY: {question}
SQL: {sql}

RESULTS:
{results}

Please provide a concise business summary (2-3 paragraphs) that includes:
1. Key findings and insights
2. Notable patterns or trends
3. Actionable recommendations

Focus on business value and avoid technical jargon. Be specific with numbers and store names where relevant.
"
    )
}

impl LocalSummarizer {
    pub fn new(backend: LocalBackend, model: impl Into<String>) -> Result<Self> {
        let d = Config::default();
        let endpoint = match backend {
            LocalBackend::Llamafile => LLAMAFILE_URL.to_string(),
            _ => d.local_llm_url,
        };
        Self::with_urls(backend, model, d.ollama_url, endpoint)
    }

    /// Build from `LOCAL_LLM_BACKEND`, `LOCAL_LLM_MODEL`, `OLLAMA_URL` and
    /// `LOCAL_LLM_URL`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = LocalBackend::from_str(&config.local_llm_backend, true)
            .map_err(|e| anyhow::anyhow!("unsupported LOCAL_LLM_BACKEND: {e}"))?;
        let endpoint = match backend {
            LocalBackend::Llamafile => LLAMAFILE_URL.to_string(),
            _ => config.local_llm_url.clone(),
        };
        Self::with_urls(
            backend,
            config.local_llm_model.clone(),
            config.ollama_url.clone(),
            endpoint,
        )
    }

    pub fn with_urls(
        backend: LocalBackend,
        model: impl Into<String>,
        ollama_url: impl Into<String>,
        endpoint_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SUMMARY_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            backend,
            model: model.into(),
            ollama_url: ollama_url.into().trim_end_matches('/').to_string(),
            endpoint_url: endpoint_url.into(),
        })
    }

    pub fn backend(&self) -> LocalBackend {
        self.backend
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Summarise `results` for a business reader.
    #[tracing::instrument(level = "info", skip(self, sql, results), fields(backend = %self.backend))]
    pub async fn summarize(&self, question: &str, sql: &str, results: &str) -> Result<String> {
        let prompt = summary_prompt(question, sql, results);
        let summary = match self.backend {
            LocalBackend::Ollama => self.ollama_chat(&prompt).await?,
            LocalBackend::Llamafile | LocalBackend::OpenaiCompatible => {
                self.openai_style_chat(&prompt).await?
            }
        };
        info!(chars = summary.len(), "summary generated");
        Ok(summary)
    }

    async fn ollama_chat(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.ollama_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "stream": false,
            }))
            .send()
            .await
            .with_context(|| format!("Error connecting to Ollama at {}", self.ollama_url))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Ollama API error: {} - {}", status.as_u16(), body);
        }
        let parsed: OllamaChatResponse = resp.json().await.context("decoding Ollama reply")?;
        parsed
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .context("Ollama returned no content")
    }

    async fn openai_style_chat(&self, prompt: &str) -> Result<String> {
        // local servers ignore the key, but the header must be well-formed
        let adapter =
            OpenAiAdapter::with_config("local", &self.endpoint_url, self.model.clone(), SUMMARY_TIMEOUT)?
                .with_chat_url(&self.endpoint_url);
        let req = ChatRequest::new(vec![Message::user(prompt)])
            .temperature(0.7)
            .max_tokens(1000);
        let resp = adapter
            .chat(&req)
            .await
            .with_context(|| format!("Error connecting to local LLM at {}", self.endpoint_url))?;
        Ok(resp.content)
    }

    /// Whether the backend answers at all.
    pub async fn is_available(&self) -> bool {
        match self.backend {
            LocalBackend::Ollama => {
                for path in ["/api/version", "/api/tags"] {
                    let url = format!("{}{}", self.ollama_url, path);
                    if let Ok(resp) = self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
                        if resp.status().is_success() {
                            return true;
                        }
                    }
                }
                false
            }
            LocalBackend::Llamafile | LocalBackend::OpenaiCompatible => {
                // any HTTP answer from the server's root counts
                let Some(root) = Url::parse(&self.endpoint_url)
                    .ok()
                    .and_then(|u| u.join("/").ok())
                else {
                    return false;
                };
                let ok = self
                    .client
                    .get(root)
                    .timeout(PROBE_TIMEOUT)
                    .send()
                    .await
                    .is_ok();
                debug!(endpoint = %self.endpoint_url, ok, "probed local LLM");
                ok
            }
        }
    }

    /// Models the backend can serve.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        match self.backend {
            LocalBackend::Ollama => {
                let url = format!("{}/api/tags", self.ollama_url);
                let tags: OllamaTags = self
                    .client
                    .get(&url)
                    .timeout(PROBE_TIMEOUT)
                    .send()
                    .await
                    .context("reaching Ollama")?
                    .error_for_status()?
                    .json()
                    .await
                    .context("decoding Ollama model list")?;
                Ok(tags.models.into_iter().map(|m| m.name).collect())
            }
            LocalBackend::Llamafile | LocalBackend::OpenaiCompatible => {
                let base = self.endpoint_url.trim_end_matches("/chat/completions");
                let list: ModelList = self
                    .client
                    .get(format!("{base}/models"))
                    .timeout(PROBE_TIMEOUT)
                    .send()
                    .await
                    .context("reaching local LLM")?
                    .error_for_status()?
                    .json()
                    .await
                    .context("decoding model list")?;
                Ok(list.data.into_iter().map(|m| m.id).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_question_sql_and_results() {
        let p = summary_prompt("top stores?", "SELECT 1", "a | b");
        assert!(p.starts_with("You are a business analyst"));
        assert!(p.contains("QUERY: top stores?\nSQL: SELECT 1\n\nRESULTS:\na | b"));
        assert!(p.contains("2-3 paragraphs"));
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!(
            LocalBackend::from_str("openai_compatible", true).unwrap(),
            LocalBackend::OpenaiCompatible
        );
        assert_eq!(
            LocalBackend::from_str("OLLAMA", true).unwrap(),
            LocalBackend::Ollama
        );
        assert!(LocalBackend::from_str("gpt4all", true).is_err());
    }

    #[test]
    fn config_selects_endpoint() -> Result<()> {
        let mut cfg = Config {
            local_llm_backend: "llamafile".into(),
            ..Config::default()
        };
        let s = LocalSummarizer::from_config(&cfg)?;
        assert_eq!(s.endpoint_url, LLAMAFILE_URL);

        cfg.local_llm_backend = "nope".into();
        assert!(LocalSummarizer::from_config(&cfg).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() -> Result<()> {
        let s = LocalSummarizer::with_urls(
            LocalBackend::OpenaiCompatible,
            "m",
            "http://127.0.0.1:9",
            "not a url",
        )?;
        assert!(!s.is_available().await);
        Ok(())
    }
}
