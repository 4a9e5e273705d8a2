//! Report types handed to dashboard and report collaborators.
//!
//! A report is a derived, read-only view. It is never the source of truth and
//! can always be rebuilt from the coverage state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::TopicMatch;
use crate::enums::DayStatus;

/// Coverage of one roadmap day.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DayCoverage {
    pub day_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_label: Option<String>,
    pub covered_count: u32,
    pub total_count: u32,
    pub status: DayStatus,
}

/// An extracted lecture phrase that matched no planned topic at any tier.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct UnplannedTopic {
    pub lecture_id: String,
    pub topic: String,
}

/// Syllabus coverage for one course.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SyllabusCoverageReport {
    pub course_id: String,
    /// Covered planned topics over all planned topics, in `[0, 1]`.
    /// An empty roadmap is trivially fully covered.
    pub percent_covered: f64,
    /// Planned topics with an accepted match, in roadmap order.
    pub covered_topics: Vec<String>,
    /// Planned topics without an accepted match, in roadmap order.
    pub missing_topics: Vec<String>,
    /// One row per roadmap day, ascending `day_index`.
    pub per_day_breakdown: Vec<DayCoverage>,
    /// Accepted matches in roadmap order.
    pub matches: Vec<TopicMatch>,
    /// Lecture phrases that do not correspond to anything planned.
    pub unplanned_topics: Vec<UnplannedTopic>,
    pub lectures_merged: u32,
}
