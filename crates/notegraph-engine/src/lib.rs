//! NoteGraph Engine — retrieval-augmented answering over a user's pages
//! and the workspace similarity graph.
//!
//! This is the crate the surrounding application calls: bulk and
//! single-page ingestion, scoped question answering, tag and summary
//! generation, and the page-level knowledge graph.

pub mod graph;
pub mod pipeline;

pub use graph::{GraphBuilder, GraphEdge, GraphNode, KnowledgeGraph};
pub use pipeline::{IngestReport, RagPipeline};
