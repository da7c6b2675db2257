//! Chat completion providers used for NL-to-SQL.

pub mod error;
pub mod openai;
pub mod types;

use async_trait::async_trait;

pub use error::LlmError;
pub use openai::OpenAiAdapter;
pub use types::*;

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, LlmError>;
}
