//! Shared fixtures for cov-engine unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cov_core::{LectureTopics, Roadmap, RoadmapEntry};
use cov_embeddings::{Embedder, EmbeddingError};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Roadmap whose days are numbered from 1 in slice order.
pub fn roadmap(days: &[&[&str]]) -> Roadmap {
    Roadmap::new(
        days.iter()
            .zip(1..)
            .map(|(topics, day)| {
                RoadmapEntry::new(day, topics.iter().map(|t| (*t).to_string()).collect())
            })
            .collect(),
    )
    .unwrap()
}

pub fn lecture(id: &str, secs: i64, topics: &[&str]) -> LectureTopics {
    LectureTopics::new(id, at(secs), topics.iter().map(|t| (*t).to_string()).collect())
}

/// Fixed vectors keyed by normalized text. Unknown texts embed to zeros.
pub struct TableEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, &[f32])]) -> Self {
        let dimension = entries.first().map_or(2, |(_, v)| v.len());
        Self {
            vectors: entries
                .iter()
                .map(|(text, v)| ((*text).to_string(), v.to_vec()))
                .collect(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    fn id(&self) -> &str {
        "table"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dimension])
            })
            .collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn id(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::EmbedFailed("provider offline".to_string()))
    }
}
