//! Boundary ingestion of language-model output.
//!
//! The syllabus planner and the lecture analyzer return loosely-shaped JSON,
//! sometimes wrapped in Markdown fences or prose. Everything here coerces that
//! output into the strongly-typed [`Roadmap`] and [`LectureTopics`] shapes
//! before it reaches the engine. The engine never sees untyped data.
//!
//! Accepted roadmap shapes (top-level array, or an object with a `roadmap` /
//! `days` array):
//! - canonical: `{"day_index": 1, "week_label": "Week 1", "planned_topics": [...]}`
//! - planner:   `{"day": 1, "date": "...", "main_topic": "...", "subtopics": [...]}`
//!
//! Accepted lecture shapes:
//! - canonical: `{"extracted_topics": [...]}`
//! - analysis:  `{"topicsCovered": [{"topic": "...", "subtopics": [...]}]}`
//! - a bare array of strings or of `{"topic", "subtopics"}` objects

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::entities::{LectureTopics, Roadmap, RoadmapEntry};
use crate::errors::CoreError;

/// Pull a JSON value out of raw model output.
///
/// Tries, in order: the whole text, the text with Markdown code fences
/// removed, and the outermost `[...]` / `{...}` span.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if no attempt yields valid JSON.
pub fn extract_json_payload(text: &str) -> Result<Value, CoreError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_code_fences(trimmed);
    if let Ok(value) = serde_json::from_str(&unfenced) {
        return Ok(value);
    }

    let span = outermost_span(&unfenced).ok_or_else(|| {
        CoreError::Validation("no JSON payload found in model output".to_string())
    })?;
    serde_json::from_str(span)
        .map_err(|e| CoreError::Validation(format!("malformed JSON in model output: {e}")))
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn outermost_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let close = if text[start..].starts_with('[') {
        ']'
    } else {
        '}'
    };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

// ---------------------------------------------------------------------------
// Roadmap
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDayIndex {
    Int(i64),
    Text(String),
}

impl RawDayIndex {
    fn resolve(&self) -> Result<u32, CoreError> {
        let n = match self {
            Self::Int(n) => *n,
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| CoreError::Validation(format!("day {s:?} is not an integer")))?,
        };
        u32::try_from(n).map_err(|_| CoreError::Validation(format!("day {n} is out of range")))
    }
}

#[derive(Debug, Deserialize)]
struct RawDay {
    #[serde(default, alias = "day")]
    day_index: Option<RawDayIndex>,
    #[serde(default, alias = "week")]
    week_label: Option<Value>,
    #[serde(default)]
    date: Option<Value>,
    #[serde(default)]
    planned_topics: Option<Vec<String>>,
    #[serde(default)]
    main_topic: Option<String>,
    #[serde(default)]
    subtopics: Option<Vec<String>>,
}

fn label_from(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl RawDay {
    fn into_entry(self, position: usize) -> Result<RoadmapEntry, CoreError> {
        let day_index = match &self.day_index {
            Some(raw) => raw.resolve()?,
            None => u32::try_from(position + 1)
                .map_err(|_| CoreError::Validation("roadmap has too many days".to_string()))?,
        };

        let week_label =
            label_from(self.week_label.as_ref()).or_else(|| label_from(self.date.as_ref()));

        let planned_topics = if let Some(planned) = self.planned_topics {
            planned
        } else if self.main_topic.is_some() || self.subtopics.is_some() {
            self.main_topic
                .into_iter()
                .chain(self.subtopics.unwrap_or_default())
                .filter(|t| !t.trim().is_empty())
                .collect()
        } else {
            return Err(CoreError::Validation(format!(
                "roadmap entry {position} has no planned_topics, main_topic, or subtopics"
            )));
        };

        Ok(RoadmapEntry {
            day_index,
            week_label,
            planned_topics,
        })
    }
}

/// Coerce a JSON value into a validated roadmap.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the value is not a list of day objects
/// or a day field has the wrong type, and [`CoreError::InvalidRoadmap`] if the
/// coerced days fail roadmap validation (duplicate days, blank topics).
pub fn roadmap_from_value(value: Value) -> Result<Roadmap, CoreError> {
    let days = match value {
        Value::Array(days) => days,
        Value::Object(mut map) => match map.remove("roadmap").or_else(|| map.remove("days")) {
            Some(Value::Array(days)) => days,
            _ => {
                return Err(CoreError::Validation(
                    "roadmap must be an array of day entries".to_string(),
                ));
            }
        },
        _ => {
            return Err(CoreError::Validation(
                "roadmap must be an array of day entries".to_string(),
            ));
        }
    };

    let entries = days
        .into_iter()
        .enumerate()
        .map(|(position, day)| {
            let raw: RawDay = serde_json::from_value(day).map_err(|e| {
                CoreError::Validation(format!("roadmap entry {position}: {e}"))
            })?;
            raw.into_entry(position)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Roadmap::new(entries)
}

/// Extract and coerce a roadmap from raw model output.
///
/// # Errors
///
/// See [`extract_json_payload`] and [`roadmap_from_value`].
pub fn parse_roadmap(text: &str) -> Result<Roadmap, CoreError> {
    roadmap_from_value(extract_json_payload(text)?)
}

// ---------------------------------------------------------------------------
// Lecture topics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawCoveredTopic {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    subtopics: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLecture {
    Canonical {
        extracted_topics: Vec<String>,
    },
    Analysis {
        #[serde(rename = "topicsCovered")]
        topics_covered: Vec<RawCoveredTopic>,
    },
    Phrases(Vec<String>),
    Covered(Vec<RawCoveredTopic>),
}

fn flatten_covered(covered: Vec<RawCoveredTopic>) -> Vec<String> {
    covered
        .into_iter()
        .flat_map(|t| t.topic.into_iter().chain(t.subtopics))
        .filter(|t| !t.trim().is_empty())
        .collect()
}

/// Coerce a JSON value into the topics of one lecture.
///
/// Main topics are followed by their subtopics, in the order given.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the value matches none of the accepted
/// shapes or `lecture_id` is blank.
pub fn lecture_from_value(
    lecture_id: &str,
    timestamp: DateTime<Utc>,
    value: Value,
) -> Result<LectureTopics, CoreError> {
    let raw: RawLecture = serde_json::from_value(value).map_err(|_| {
        CoreError::Validation(format!(
            "lecture {lecture_id}: expected extracted_topics, topicsCovered, or a topic list"
        ))
    })?;

    let extracted_topics = match raw {
        RawLecture::Canonical { extracted_topics } | RawLecture::Phrases(extracted_topics) => {
            extracted_topics
        }
        RawLecture::Analysis { topics_covered } | RawLecture::Covered(topics_covered) => {
            flatten_covered(topics_covered)
        }
    };

    let lecture = LectureTopics::new(lecture_id, timestamp, extracted_topics);
    lecture.validate()?;
    Ok(lecture)
}

/// Extract and coerce lecture topics from raw model output.
///
/// # Errors
///
/// See [`extract_json_payload`] and [`lecture_from_value`].
pub fn parse_lecture(
    lecture_id: &str,
    timestamp: DateTime<Utc>,
    text: &str,
) -> Result<LectureTopics, CoreError> {
    lecture_from_value(lecture_id, timestamp, extract_json_payload(text)?)
}
