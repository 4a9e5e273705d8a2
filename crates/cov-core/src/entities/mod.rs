//! Domain entities for syllabus coverage.
//!
//! `Roadmap` and `LectureTopics` are the two inputs handed over by the
//! ingestion collaborators; `TopicMatch` is the relationship the engine keeps
//! between a planned topic and the lecture phrase that taught it.

mod lecture;
mod roadmap;
mod topic_match;

pub use lecture::{LectureTopics, TimestampInput};
pub use roadmap::{PlannedTopic, Roadmap, RoadmapEntry, TopicRef};
pub use topic_match::TopicMatch;
