//! # cov-engine
//!
//! Syllabus coverage reconciliation.
//!
//! - [`Matcher`]: exact, fuzzy, and semantic tiers over normalized topics
//! - [`CoverageStore`]: per-course [`CoverageState`] behind per-course locks
//! - [`Reconciler`]: merge, retract, recompute, and roadmap replacement
//! - [`build_report`]: the read-only coverage view
//!
//! The engine consumes typed [`cov_core`] values only. Parsing collaborator
//! payloads happens in [`cov_core::ingest`] before anything reaches it.

pub mod embedder;
pub mod error;
pub mod matcher;
pub mod reconciler;
pub mod report;
pub mod retry;
pub mod state;

#[cfg(test)]
mod test_support;

pub use embedder::embedder_from_config;
pub use error::EngineError;
pub use matcher::{LectureEvaluation, MatchCandidate, Matcher, fuzzy_similarity};
pub use reconciler::{MergeOutcome, RecomputeSummary, Reconciler, RetractOutcome};
pub use report::build_report;
pub use retry::RetryConfig;
pub use state::{Contribution, CoverageState, CoverageStore, Retracted};
