//! FNV-1a hashed bag-of-features embedder.
//!
//! Deterministic and model-free: every word and every character trigram of a
//! word is hashed to one dimension with a sign taken from the hash's high
//! bit, then the vector is L2-normalized. Similar spellings share trigrams, so
//! `"graph traversal"` and `"graph traversals"` land close together; unrelated
//! vocabulary does not. It is not semantic, which makes it the offline default
//! and a predictable provider for tests.

use async_trait::async_trait;

use crate::{Embedder, EmbeddingError};

/// FNV-1a offset basis (64-bit).
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a prime (64-bit).
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Tokens shorter than this are ignored.
const MIN_TOKEN_LEN: usize = 2;

/// Default embedding dimension (matches `AllMiniLML6V2`).
const DEFAULT_DIMENSION: usize = 384;

/// Weight of a whole-word feature relative to one trigram.
const WORD_WEIGHT: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    id: String,
}

impl HashEmbedder {
    /// # Panics
    ///
    /// Panics if `dimension` is zero.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "dimension must be > 0");
        Self {
            dimension,
            id: format!("hash-{dimension}"),
        }
    }

    #[must_use]
    pub fn default_384() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }

    /// Embed one text synchronously.
    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];

        for token in tokenize(text) {
            self.accumulate(&mut embedding, token.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = format!("<{token}>").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut embedding, trigram.as_bytes(), 1.0);
            }
        }

        l2_normalize(&mut embedding);
        embedding
    }

    fn accumulate(&self, embedding: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a_hash(feature);
        #[allow(clippy::cast_possible_truncation)]
        let index = (hash as usize) % self.dimension;
        let sign = if (hash >> 63) == 1 { 1.0 } else { -1.0 };
        embedding[index] += sign * weight;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::default_384()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

fn fnv1a_hash(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
