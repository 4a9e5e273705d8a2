//! Cross-cutting error types for syllabus coverage.
//!
//! This module defines errors that can originate from any crate in the system.
//! Domain-specific errors (e.g., `EmbeddingError`, `EngineError`) are defined in
//! their respective crates and wrap `CoreError` where they overlap.

use thiserror::Error;

/// Errors that can be raised by any coverage crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A topic phrase is empty or carries no comparable content.
    #[error("Invalid topic {phrase:?}: {reason}")]
    InvalidTopic { phrase: String, reason: String },

    /// A roadmap has duplicate or malformed day entries. The whole roadmap is rejected.
    #[error("Invalid roadmap: {0}")]
    InvalidRoadmap(String),

    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A boundary payload failed validation (shape, type, format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Shorthand for a missing course.
    #[must_use]
    pub fn course_not_found(course_id: &str) -> Self {
        Self::NotFound {
            entity_type: "course".to_string(),
            id: course_id.to_string(),
        }
    }
}
