//! NoteGraph Core — error types, engine configuration, vector math.

pub mod config;
pub mod error;
pub mod vector;

pub use config::EngineConfig;
pub use error::{Error, Result};
