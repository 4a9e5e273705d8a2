//! Engine error types.

use cov_core::CoreError;
use cov_embeddings::EmbeddingError;
use thiserror::Error;

/// Errors surfaced by reconciliation operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Roadmap, topic, lookup, or validation failure from the core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The course stayed busy (lock held, or roadmap replaced mid-merge)
    /// for the whole retry budget.
    #[error("Course {course_id} is busy: gave up after {attempts} attempts")]
    Conflict { course_id: String, attempts: u32 },

    /// The configured embedding provider could not be built.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl EngineError {
    /// Whether this is a lookup of a course that has no roadmap.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Core(CoreError::NotFound { .. }))
    }

    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
