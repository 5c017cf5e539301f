//! Embedding inference transport
//!
//! The pipeline only needs "texts in, vectors out"; everything about the
//! model lives behind [`EmbeddingService`]. The shipped implementation talks
//! to a Text-Embeddings-Inference server over HTTP.

pub mod tei;

use async_trait::async_trait;
use thiserror::Error;

pub use tei::TeiEmbeddingClient;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("embedding response parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}
