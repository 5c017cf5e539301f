//! Text-Embeddings-Inference client
//!
//! Talks to the TEI `/embed` endpoint. Large batches are split into
//! sub-batches sent concurrently under a semaphore so a single payload's
//! worth of nodes cannot overwhelm the inference server.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use super::{EmbeddingError, EmbeddingService};

/// Sub-batch size per request
const MAX_BATCH_SIZE: usize = 32;

/// Concurrent in-flight requests
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Request timeout
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

#[derive(Clone)]
pub struct TeiEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
}

impl TeiEmbeddingClient {
    pub fn new(base_url: &str) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        tracing::debug!(base_url, "embedding client initialized");
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn embed_url(&self) -> String {
        format!("{}/embed", self.base_url)
    }

    async fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(self.embed_url())
            .json(&EmbedRequest { inputs: texts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Parse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait::async_trait]
impl EmbeddingService for TeiEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() <= MAX_BATCH_SIZE {
            return self.embed_single_batch(texts).await;
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS));
        let futures: Vec<_> = texts
            .chunks(MAX_BATCH_SIZE)
            .map(|chunk| {
                let semaphore = Arc::clone(&semaphore);
                let client = self.clone();
                let chunk = chunk.to_vec();
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|e| EmbeddingError::Parse(e.to_string()))?;
                    client.embed_single_batch(&chunk).await
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;
        let mut vectors = Vec::with_capacity(texts.len());
        for result in results {
            vectors.extend(result?);
        }
        Ok(vectors)
    }
}
