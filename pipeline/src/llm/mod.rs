//! Chat-model transport for the Enrich stage
//!
//! The enrichment engine only needs "prompt in, text out"; provider wiring
//! lives behind [`ChatModel`].

pub mod deepseek;

use async_trait::async_trait;
use thiserror::Error;

pub use deepseek::{DeepSeekClient, DeepSeekConfig};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    Connection(String),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM response parse error: {0}")]
    Parse(String),

    #[error("LLM configuration error: {0}")]
    Config(String),
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
