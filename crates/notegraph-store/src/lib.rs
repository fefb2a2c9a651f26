//! NoteGraph Store — scoped chunk persistence and similarity search.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::ChunkStore;
pub use types::{NewChunk, ScoredChunk, TextChunk};
