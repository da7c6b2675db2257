//! Error type for chat provider calls.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing API key, bad header value, client construction failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP/network error, including timeouts.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("{provider} returned HTTP {status}: {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// Success status, but no usable content in the body.
    #[error("{provider} response unusable: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

impl LlmError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_response(provider: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider,
            message: message.into(),
        }
    }

    /// Short machine-readable code for logs and JSON replies.
    pub fn code(&self) -> &'static str {
        match self {
            LlmError::Config(_) => "config",
            LlmError::Http(e) if e.is_timeout() => "timeout",
            LlmError::Http(_) => "http",
            LlmError::Status { status: 401, .. } | LlmError::Status { status: 403, .. } => "auth",
            LlmError::Status { status: 429, .. } => "rate_limited",
            LlmError::Status { .. } => "provider",
            LlmError::InvalidResponse { .. } => "invalid_response",
        }
    }
}
