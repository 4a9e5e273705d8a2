//! Embedding provider selection from configuration.

use std::sync::Arc;

use cov_config::{EmbeddingProvider, EmbeddingsConfig};
use cov_embeddings::{CachedEmbedder, Embedder, HashEmbedder};
use tracing::info;

use crate::error::EngineError;

/// Build the provider named by `config`, wrapped in the phrase cache.
///
/// `Ok(None)` means the semantic tier has no provider and never runs.
///
/// # Errors
///
/// Returns [`EngineError::Embedding`] if the fastembed model cannot be loaded,
/// or if it is selected in a build without the `fastembed` feature.
pub fn embedder_from_config(
    config: &EmbeddingsConfig,
) -> Result<Option<Arc<dyn Embedder>>, EngineError> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Disabled => return Ok(None),
        EmbeddingProvider::Hash => Arc::new(CachedEmbedder::new(
            HashEmbedder::new(config.dimension.max(1)),
            config.cache_capacity,
        )),
        EmbeddingProvider::Fastembed => fastembed_provider(config)?,
    };
    info!(embedder = embedder.id(), dimension = embedder.dimension(), "embedding provider ready");
    Ok(Some(embedder))
}

#[cfg(feature = "fastembed")]
fn fastembed_provider(config: &EmbeddingsConfig) -> Result<Arc<dyn Embedder>, EngineError> {
    let cache_dir = config
        .has_cache_dir()
        .then(|| std::path::PathBuf::from(&config.cache_dir));
    let engine = cov_embeddings::FastEmbedder::new(cache_dir)?;
    Ok(Arc::new(CachedEmbedder::new(engine, config.cache_capacity)))
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_provider(_config: &EmbeddingsConfig) -> Result<Arc<dyn Embedder>, EngineError> {
    Err(cov_embeddings::EmbeddingError::InitFailed(
        "this build does not include the `fastembed` feature".to_string(),
    )
    .into())
}
