//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the retrieval and graph engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Embedding dimension (384 for all-MiniLM-class models).
    pub embedding_dim: usize,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of chunks retrieved per query.
    pub retrieval_top_k: usize,
    /// Worker pool size for bulk ingestion.
    pub ingest_concurrency: usize,
    /// Default similarity threshold for graph edges.
    pub graph_threshold: f64,
    /// Embedding service endpoint (POST, `{"texts": [...]}`).
    pub embedding_url: String,
    /// Text-completion endpoint (generateContent-style).
    pub completion_url: String,
    /// API key appended to completion requests.
    pub completion_api_key: String,
    /// Timeout applied to every provider request, in seconds.
    pub request_timeout_secs: u64,
}

impl EngineConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Self {
        let embedding_url = std::env::var("NOTEGRAPH_EMBEDDING_URL")
            .unwrap_or_else(|_| "http://localhost:8001/embed".to_string());
        let completion_url = std::env::var("NOTEGRAPH_COMPLETION_URL").unwrap_or_else(|_| {
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
                .to_string()
        });
        let completion_api_key =
            std::env::var("NOTEGRAPH_COMPLETION_API_KEY").unwrap_or_default();
        let embedding_dim = std::env::var("NOTEGRAPH_EMBEDDING_DIM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(384);

        Self {
            embedding_dim,
            embedding_url,
            completion_url,
            completion_api_key,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 384,
            chunk_size: 500,
            retrieval_top_k: 3,
            ingest_concurrency: 10,
            graph_threshold: 0.2,
            embedding_url: "http://localhost:8001/embed".to_string(),
            completion_url:
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
                    .to_string(),
            completion_api_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}
