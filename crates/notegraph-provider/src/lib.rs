//! NoteGraph Provider — external collaborator interfaces and HTTP clients.
//!
//! The engine talks to three collaborators: the page content source owned
//! by the surrounding application, an embedding service (text → vector),
//! and a text-completion service (prompt → answer). Each is a trait here
//! so the engine can be exercised without the network.

pub mod completion;
pub mod embedding;
pub mod types;

pub use completion::GeminiClient;
pub use embedding::HttpEmbeddingClient;
pub use types::{CompletionProvider, EmbeddingProvider, PageContent, PageProvider};
