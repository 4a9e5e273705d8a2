//! Embedding provider selection for the semantic tier.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default embedding dimension (matches `AllMiniLML6V2`).
const fn default_dimension() -> usize {
    384
}

const fn default_cache_capacity() -> usize {
    1024
}

/// Which embedding backend feeds the semantic tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Deterministic hashed bag-of-words. No model files.
    #[default]
    Hash,
    /// Local ONNX model via fastembed.
    Fastembed,
    /// No provider; the semantic tier never runs.
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Vector dimension of the hash provider.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Number of phrase embeddings kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Model cache directory for fastembed. Empty means `~/.coverage/cache/fastembed`.
    #[serde(default)]
    pub cache_dir: String,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            dimension: default_dimension(),
            cache_capacity: default_cache_capacity(),
            cache_dir: String::new(),
        }
    }
}

impl EmbeddingsConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the hash provider is selected
    /// with a zero dimension.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider == EmbeddingProvider::Hash && self.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embeddings.dimension".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Whether a model cache directory was configured.
    #[must_use]
    pub fn has_cache_dir(&self) -> bool {
        !self.cache_dir.is_empty()
    }
}
