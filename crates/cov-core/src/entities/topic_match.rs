use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::roadmap::TopicRef;
use crate::enums::MatchTier;

/// An accepted pairing of a planned topic with the lecture phrase that taught it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TopicMatch {
    pub topic: TopicRef,
    pub planned_topic: String,
    pub lecture_id: String,
    pub extracted_topic: String,
    /// Position of `extracted_topic` in the lecture's topic list.
    pub extracted_position: u32,
    pub timestamp: DateTime<Utc>,
    /// Similarity in `[0, 1]`; `1.0` for exact matches.
    pub confidence: f64,
    pub tier: MatchTier,
}

impl TopicMatch {
    /// Total preference order between two candidates for the same planned topic.
    ///
    /// `Greater` means `self` is preferred: higher confidence, then stronger
    /// tier, then earlier timestamp ("first taught wins"), then lecture id and
    /// phrase position so that the order is total.
    #[must_use]
    pub fn preference(&self, other: &Self) -> Ordering {
        self.confidence
            .total_cmp(&other.confidence)
            .then_with(|| self.tier.rank().cmp(&other.tier.rank()))
            .then_with(|| other.timestamp.cmp(&self.timestamp))
            .then_with(|| other.lecture_id.cmp(&self.lecture_id))
            .then_with(|| other.extracted_position.cmp(&self.extracted_position))
    }

    /// Whether `self` should replace `other` as the accepted match.
    #[must_use]
    pub fn beats(&self, other: &Self) -> bool {
        self.preference(other) == Ordering::Greater
    }
}
