//! HTTP embedding client.
//!
//! Talks to an embedding service that accepts `{"texts": [...]}` and
//! returns `{"embeddings": [[...], ...]}`, one vector per input text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::EmbeddingProvider;
use notegraph_core::{EngineConfig, Error, Result};

/// Async client for the external embedding service.
pub struct HttpEmbeddingClient {
    client: Client,
    endpoint: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f64>>,
}

impl HttpEmbeddingClient {
    /// Build a client for `endpoint`, enforcing `dimension` on every
    /// returned vector and `timeout` on every request.
    pub fn new(endpoint: impl Into<String>, dimension: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Upstream(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            dimension,
        })
    }

    /// Build from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(
            config.embedding_url.clone(),
            config.embedding_dim,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let request = EmbedRequest { texts: [text] };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "embedding service returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("malformed embedding response: {}", e)))?;

        let vector = parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Upstream("embedding response had no vectors".to_string()))?;

        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        debug!("Embedded {} chars into {}-dim vector", text.len(), vector.len());
        Ok(vector)
    }
}
