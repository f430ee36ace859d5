//! Colloquy vector crate - embedding services and vector math.
//!
//! Provides the `EmbeddingService` trait with an ONNX sentence-transformer
//! backend, a deterministic lexical fallback backend, and a resilient wrapper
//! combining the two behind a by-text cache.

pub mod embedding;
pub mod math;

pub use embedding::{
    normalize_for_embedding, DynEmbeddingService, EmbeddingOutput, EmbeddingService,
    LexicalEmbeddingService, OnnxEmbeddingService, ResilientEmbeddingService,
};
