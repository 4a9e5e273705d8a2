//! Match tiers and per-day coverage status.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// MatchTier
// ---------------------------------------------------------------------------

/// Strength of the evidence that an extracted phrase teaches a planned topic.
///
/// ```text
/// exact (canonical keys equal) > fuzzy (token / edit similarity) > semantic (embeddings)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Fuzzy,
    Semantic,
}

impl MatchTier {
    /// Precedence of the tier. Higher is stronger.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Exact => 3,
            Self::Fuzzy => 2,
            Self::Semantic => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DayStatus
// ---------------------------------------------------------------------------

/// Coverage status of one roadmap day.
///
/// A day with no planned topics is trivially `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Complete,
    Partial,
    NotStarted,
}

impl DayStatus {
    /// Derive the status from covered and total counts.
    #[must_use]
    pub const fn from_counts(covered: u32, total: u32) -> Self {
        if covered >= total {
            Self::Complete
        } else if covered == 0 {
            Self::NotStarted
        } else {
            Self::Partial
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::NotStarted => "not_started",
        }
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
