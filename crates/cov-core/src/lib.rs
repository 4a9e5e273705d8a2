//! # cov-core
//!
//! Core types, topic normalization, and error types for syllabus coverage.
//!
//! This crate provides the foundational types shared across all coverage crates:
//! - Roadmap and lecture entities, validated at construction
//! - Match tiers and accepted topic matches
//! - The topic normalizer (canonical keys for exact/fuzzy comparison)
//! - Report types returned to dashboard collaborators
//! - Boundary ingestion that coerces language-model JSON into typed shapes
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod ingest;
pub mod normalize;
pub mod responses;

pub use entities::{LectureTopics, Roadmap, RoadmapEntry, TopicMatch, TopicRef};
pub use enums::{DayStatus, MatchTier};
pub use errors::CoreError;
pub use normalize::{NormalizedTopic, normalize};
pub use responses::{DayCoverage, SyllabusCoverageReport, UnplannedTopic};
