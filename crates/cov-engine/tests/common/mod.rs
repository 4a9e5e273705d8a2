//! Fixtures shared by the cov-engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cov_config::MatchingConfig;
use cov_core::{LectureTopics, Roadmap, RoadmapEntry};
use cov_embeddings::{Embedder, EmbeddingError};
use cov_engine::{Matcher, Reconciler, RetryConfig};

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

pub fn lexical_reconciler() -> Reconciler {
    Reconciler::new(
        Matcher::lexical(MatchingConfig::default()),
        RetryConfig::default(),
    )
}

pub fn semantic_reconciler(embedder: Arc<dyn Embedder>) -> Reconciler {
    Reconciler::new(
        Matcher::new(MatchingConfig::default(), Some(embedder)),
        RetryConfig::default(),
    )
}

/// Fixed vectors keyed by normalized text; unknown texts embed to zeros.
///
/// While armed, any batch containing the trigger text waits; disarming
/// releases it.
pub struct TableEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    trigger: Option<String>,
    armed: AtomicBool,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, [f32; 2])]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, v)| ((*text).to_string(), v.to_vec()))
                .collect(),
            trigger: None,
            armed: AtomicBool::new(false),
        }
    }

    /// Cosine between `binary search trees` and `bsts` is 0.76.
    pub fn bst() -> Self {
        Self::new(&[
            ("binary search trees", [1.0, 0.0]),
            ("bsts", [0.76, 0.649_923]),
        ])
    }

    #[must_use]
    pub fn hang_on(mut self, text: &str) -> Self {
        self.trigger = Some(text.to_string());
        self
    }

    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    fn id(&self) -> &str {
        "table"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let triggered = self
            .trigger
            .as_ref()
            .is_some_and(|trigger| texts.contains(trigger));
        while triggered && self.armed.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(texts
            .iter()
            .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![0.0; 2]))
            .collect())
    }
}
