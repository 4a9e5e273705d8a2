//! # cov-embeddings
//!
//! Embedding providers for the semantic matching tier.
//!
//! The matcher only ever talks to the [`Embedder`] capability, so the real
//! provider is swappable and tests run against deterministic stubs.
//!
//! ## Providers
//!
//! - [`HashEmbedder`]: hashed bag-of-words, deterministic, no model files.
//!   Captures lexical overlap only.
//! - [`CachedEmbedder`]: wraps any provider so repeated phrases (planned
//!   topics are compared on every merge) skip inference.
//! - `FastEmbedder` (feature `fastembed`): `AllMiniLML6V2` through the ONNX
//!   runtime, 384-dimensional output.

pub mod cached;
pub mod error;
pub mod hash;

#[cfg(feature = "fastembed")]
pub mod local;

use async_trait::async_trait;

pub use cached::{CacheStats, CachedEmbedder};
pub use error::EmbeddingError;
pub use hash::HashEmbedder;
#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;

/// Text embedding capability injected into the matcher.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short provider identifier for logs (e.g. `"hash-384"`).
    fn id(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts. Returns one vector per input, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] if the provider fails. Callers treat a failure
    /// as "no semantic evidence", never as fatal.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Cosine similarity between two vectors. Zero vectors have similarity `0.0`.
///
/// # Errors
///
/// Returns [`EmbeddingError::DimensionMismatch`] if the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}
