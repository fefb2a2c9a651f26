//! Data types for persisted chunks and search results.

use serde::{Deserialize, Serialize};

/// A chunk row from the database, with its vector decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: i64,
    pub text: String,
    pub owner_id: i64,
    pub workspace_id: i64,
    pub page_id: i64,
    pub vector: Vec<f64>,
    pub created_at: i64,
}

/// A chunk pending insertion.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub text: String,
    pub owner_id: i64,
    pub workspace_id: i64,
    pub page_id: i64,
    pub vector: Vec<f64>,
}

/// A retrieved chunk with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f64,
}
