//! Deterministic text chunking (§4.3).

mod chunker;

pub use self::chunker::{Chunk, ChunkerConfig, ChunkerConfigError, TextChunker};
