//! docqa-core
//!
//! Domain types, error taxonomy, collaborator traits, chunking, plain-text
//! extraction, retry policy and configuration shared by the docqa crates.

pub mod chunker;
pub mod config;
pub mod error;
pub mod extract;
pub mod retry;
pub mod traits;
pub mod types;

pub use chunker::{chunk, Chunker, ChunkingConfig};
pub use error::{Error, Result};
