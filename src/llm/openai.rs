//! OpenAI-compatible `/chat/completions` adapter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::LlmError;
use super::types::*;
use super::ChatProvider;
use crate::config::{Config, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};

const PROVIDER: &str = "openai";

/// Maximum number of body bytes echoed into an error message.
const MAX_ERROR_BODY: usize = 2_000;

#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    client: reqwest::Client,
    chat_url: String,
    model: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_config(
            api_key,
            DEFAULT_OPENAI_BASE_URL,
            DEFAULT_OPENAI_MODEL,
            Duration::from_secs(120),
        )
    }

    /// Build from `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| LlmError::config("OPENAI_API_KEY not set"))?;
        Self::with_config(
            api_key,
            config.openai_base_url.clone(),
            config.openai_model.clone(),
            Duration::from_secs(120),
        )
    }

    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| LlmError::config("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| LlmError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            chat_url: format!("{}/chat/completions", base_url.into().trim_end_matches('/')),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Post to `url` exactly as given instead of `<base>/chat/completions`.
    pub fn with_chat_url(mut self, url: impl Into<String>) -> Self {
        self.chat_url = url.into();
        self
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    model: Option<String>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl ChatProvider for OpenAiAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let start = Instant::now();
        let model = req.model.as_deref().unwrap_or(&self.model);

        let api_req = ChatApiRequest {
            model,
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let response = self.client.post(&self.chat_url).json(&api_req).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ChatApiResponse>(&body)
                .ok()
                .and_then(|p| p.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| truncate_body(&body));
            return Err(LlmError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::invalid_response(PROVIDER, format!("Invalid JSON: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(LlmError::invalid_response(
                PROVIDER,
                error.message.unwrap_or_default(),
            ));
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::invalid_response(PROVIDER, "No content in response"))?;

        let usage = parsed.usage;
        let latency = start.elapsed();
        debug!(model, latency_ms = latency.as_millis() as u64, "chat completion");

        Ok(ChatResponse {
            content,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            input_tokens: usage.as_ref().and_then(|u| u.prompt_tokens).unwrap_or(0),
            output_tokens: usage.as_ref().and_then(|u| u.completion_tokens).unwrap_or(0),
            latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_a_config_error() {
        let err = OpenAiAdapter::from_config(&Config::default()).unwrap_err();
        assert_eq!(err.code(), "config");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let a = OpenAiAdapter::with_config("k", "http://x/v1/", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(a.chat_url(), "http://x/v1/chat/completions");
        let a = a.with_chat_url("http://x/llm/generate");
        assert_eq!(a.chat_url(), "http://x/llm/generate");
        assert_eq!(a.model(), "m");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let t = truncate_body(&body);
        assert!(t.ends_with("..."));
        assert!(t.len() <= MAX_ERROR_BODY + 3);
    }
}
