//! Embedding error types.

/// Errors that can occur during embedding generation.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Model initialization failed (download, ONNX runtime, cache issues).
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    /// Embedding generation failed (inference error, invalid input).
    #[error("Embedding generation failed: {0}")]
    EmbedFailed(String),

    /// Provider returned fewer embeddings than inputs.
    #[error("Empty result from embedding model")]
    EmptyResult,

    /// Two vectors that must be compared have different lengths.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
