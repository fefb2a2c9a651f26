//! NoteGraph Ingest — text chunking for embedding and retrieval.

pub mod chunker;

pub use chunker::{chunk_text, TextChunker};
