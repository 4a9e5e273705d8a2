use chrono::{DateTime, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::CoreError;

/// Topics extracted from one analyzed lecture.
///
/// Reprocessing a lecture produces a new `LectureTopics` with the same
/// `lecture_id`; the engine replaces the old contribution wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LectureTopics {
    pub lecture_id: String,
    /// When the lecture took place (or was uploaded). Orders replays and breaks ties.
    #[serde(deserialize_with = "deserialize_timestamp")]
    #[schemars(with = "TimestampInput")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub extracted_topics: Vec<String>,
}

impl LectureTopics {
    #[must_use]
    pub fn new(
        lecture_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        extracted_topics: Vec<String>,
    ) -> Self {
        Self {
            lecture_id: lecture_id.into(),
            timestamp,
            extracted_topics,
        }
    }

    /// Check the fields the engine relies on.
    ///
    /// An empty topic list is valid: a short or content-free recording is a
    /// legitimate outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `lecture_id` is blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.lecture_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "lecture_id must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Accepted wire forms of a lecture timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TimestampInput {
    /// Unix time in seconds.
    Seconds(i64),
    /// RFC 3339 date-time.
    Text(String),
}

impl TimestampInput {
    /// Resolve to a UTC instant.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the seconds are out of range or the
    /// text is not RFC 3339.
    pub fn resolve(&self) -> Result<DateTime<Utc>, CoreError> {
        match self {
            Self::Seconds(secs) => Utc.timestamp_opt(*secs, 0).single().ok_or_else(|| {
                CoreError::Validation(format!("timestamp {secs} is out of range"))
            }),
            Self::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| CoreError::Validation(format!("timestamp {text:?}: {e}"))),
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    TimestampInput::deserialize(deserializer)?
        .resolve()
        .map_err(serde::de::Error::custom)
}
