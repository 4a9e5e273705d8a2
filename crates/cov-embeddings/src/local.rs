//! Local ONNX embeddings through fastembed.
//!
//! Uses `AllMiniLML6V2` (384-dimensional, mean pooling, no query prefix).
//! Model files are downloaded on first use (~80MB).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use tracing::info;

use crate::{Embedder, EmbeddingError};

const DIMENSION: usize = 384;

/// fastembed-backed [`Embedder`].
///
/// [`TextEmbedding::embed`] needs `&mut self` and blocks, so the model sits
/// behind a mutex and every batch runs on the blocking pool.
#[derive(Clone)]
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    /// Load the model, caching files under `cache_dir` or
    /// `~/.coverage/cache/fastembed/` when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::InitFailed`] if download or ONNX initialization fails.
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self, EmbeddingError> {
        let cache_dir = cache_dir.unwrap_or_else(default_cache_dir);
        info!(cache_dir = %cache_dir.display(), "loading fastembed model");

        let model = TextEmbedding::try_new(
            TextInitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(false),
        )
        .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir().map_or_else(
        || PathBuf::from(".fastembed_cache"),
        |h| h.join(".coverage").join("cache").join("fastembed"),
    )
}

#[async_trait]
impl Embedder for FastEmbedder {
    fn id(&self) -> &str {
        "fastembed-minilm-l6-v2"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::EmbedFailed("model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::EmbedFailed(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::EmbedFailed(e.to_string()))?
    }
}
