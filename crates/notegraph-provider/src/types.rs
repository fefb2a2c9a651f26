//! Collaborator traits and the page content DTO.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use notegraph_core::Result;

/// A page as supplied by the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    pub page_id: i64,
    pub workspace_id: i64,
    pub title: String,
    pub tags: Vec<String>,
    pub text_content: String,
}

/// Source of page content, owned by the excluded application layer.
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// All pages belonging to an owner.
    async fn pages_by_owner(&self, owner_id: i64) -> Result<Vec<PageContent>>;

    /// A single page by id. Fails with `NotFound` when absent.
    async fn page_by_id(&self, page_id: i64) -> Result<PageContent>;
}

/// Maps a text string to a fixed-dimension embedding vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;
}

/// Opaque text-completion collaborator. No streaming.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
