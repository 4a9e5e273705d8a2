use std::collections::HashSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::normalize::{NormalizedTopic, normalize};

/// One planned teaching unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RoadmapEntry {
    /// Position of the day in the course. Unique within a roadmap.
    pub day_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_label: Option<String>,
    /// Topics planned for the day, in teaching order.
    pub planned_topics: Vec<String>,
}

impl RoadmapEntry {
    #[must_use]
    pub fn new(day_index: u32, planned_topics: Vec<String>) -> Self {
        Self {
            day_index,
            week_label: None,
            planned_topics,
        }
    }

    #[must_use]
    pub fn with_week_label(mut self, label: impl Into<String>) -> Self {
        self.week_label = Some(label.into());
        self
    }
}

/// Address of a planned topic: the day it belongs to and its position in that day.
///
/// The same phrase planned on two days is two distinct planned topics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct TopicRef {
    pub day_index: u32,
    pub position: u32,
}

impl fmt::Display for TopicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {}#{}", self.day_index, self.position)
    }
}

/// A planned topic with its normalized form, computed once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTopic {
    pub topic: TopicRef,
    /// The phrase exactly as it appears in the roadmap.
    pub phrase: String,
    pub normalized: NormalizedTopic,
}

/// A validated, day-ordered syllabus roadmap.
///
/// Construction is the only validation point: day indices are unique and every
/// planned topic normalizes. Entries are kept in ascending `day_index` order.
/// A roadmap is immutable; a new syllabus replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<RoadmapEntry>", into = "Vec<RoadmapEntry>")]
pub struct Roadmap {
    entries: Vec<RoadmapEntry>,
    planned: Vec<PlannedTopic>,
}

impl Roadmap {
    /// Validate and build a roadmap.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRoadmap`] if two entries share a `day_index`
    /// or any planned topic is empty or unusable. Nothing is partially accepted.
    pub fn new(mut entries: Vec<RoadmapEntry>) -> Result<Self, CoreError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.day_index) {
                return Err(CoreError::InvalidRoadmap(format!(
                    "duplicate day_index {}",
                    entry.day_index
                )));
            }
        }

        entries.sort_by_key(|e| e.day_index);

        let mut planned = Vec::new();
        for entry in &entries {
            for (position, phrase) in entry.planned_topics.iter().enumerate() {
                let normalized = normalize(phrase).map_err(|e| {
                    CoreError::InvalidRoadmap(format!(
                        "day {} topic {position}: {e}",
                        entry.day_index
                    ))
                })?;
                let position = u32::try_from(position).map_err(|_| {
                    CoreError::InvalidRoadmap(format!(
                        "day {} has too many planned topics",
                        entry.day_index
                    ))
                })?;
                planned.push(PlannedTopic {
                    topic: TopicRef {
                        day_index: entry.day_index,
                        position,
                    },
                    phrase: phrase.clone(),
                    normalized,
                });
            }
        }

        Ok(Self { entries, planned })
    }

    /// Roadmap with no days.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Entries in ascending `day_index` order.
    #[must_use]
    pub fn entries(&self) -> &[RoadmapEntry] {
        &self.entries
    }

    /// All planned topics in roadmap order (day ascending, then position).
    #[must_use]
    pub fn planned_topics(&self) -> &[PlannedTopic] {
        &self.planned
    }

    #[must_use]
    pub fn planned_count(&self) -> usize {
        self.planned.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.planned.is_empty()
    }

    /// Look up a planned topic by its address.
    #[must_use]
    pub fn planned(&self, topic: TopicRef) -> Option<&PlannedTopic> {
        self.planned
            .binary_search_by(|p| p.topic.cmp(&topic))
            .ok()
            .map(|i| &self.planned[i])
    }

    #[must_use]
    pub fn contains(&self, topic: TopicRef) -> bool {
        self.planned(topic).is_some()
    }
}

impl TryFrom<Vec<RoadmapEntry>> for Roadmap {
    type Error = CoreError;

    fn try_from(entries: Vec<RoadmapEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<Roadmap> for Vec<RoadmapEntry> {
    fn from(roadmap: Roadmap) -> Self {
        roadmap.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(index: u32, topics: &[&str]) -> RoadmapEntry {
        RoadmapEntry::new(index, topics.iter().map(|t| (*t).to_string()).collect())
    }

    #[test]
    fn sorts_days_and_addresses_topics() {
        let roadmap = Roadmap::new(vec![
            day(2, &["Heaps"]),
            day(1, &["Arrays", "Linked Lists"]),
        ])
        .unwrap();

        let days: Vec<u32> = roadmap.entries().iter().map(|e| e.day_index).collect();
        assert_eq!(days, vec![1, 2]);

        let refs: Vec<TopicRef> = roadmap.planned_topics().iter().map(|p| p.topic).collect();
        assert_eq!(
            refs,
            vec![
                TopicRef { day_index: 1, position: 0 },
                TopicRef { day_index: 1, position: 1 },
                TopicRef { day_index: 2, position: 0 },
            ]
        );
        assert_eq!(
            roadmap
                .planned(TopicRef { day_index: 1, position: 1 })
                .map(|p| p.phrase.as_str()),
            Some("Linked Lists")
        );
        assert!(!roadmap.contains(TopicRef { day_index: 3, position: 0 }));
    }

    #[test]
    fn rejects_duplicate_days() {
        let err = Roadmap::new(vec![day(1, &["A"]), day(1, &["B"])]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRoadmap(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn rejects_blank_planned_topic() {
        let err = Roadmap::new(vec![day(1, &["Arrays", "   "])]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRoadmap(_)));
    }

    #[test]
    fn allows_days_without_topics() {
        let roadmap = Roadmap::new(vec![day(1, &[]), day(2, &["Review"])]).unwrap();
        assert_eq!(roadmap.entries().len(), 2);
        assert_eq!(roadmap.planned_count(), 1);
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: Roadmap = serde_json::from_str(
            r#"[{"day_index": 1, "week_label": "Week 1", "planned_topics": ["Recursion"]}]"#,
        )
        .unwrap();
        assert_eq!(ok.entries()[0].week_label.as_deref(), Some("Week 1"));

        let dup = serde_json::from_str::<Roadmap>(
            r#"[{"day_index": 1, "planned_topics": []}, {"day_index": 1, "planned_topics": []}]"#,
        );
        assert!(dup.is_err());
    }
}
