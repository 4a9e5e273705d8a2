//! In-memory embedding cache.
//!
//! Planned topics are re-embedded every time a lecture leaves one of them
//! unmatched, so a small FIFO cache in front of the provider removes most
//! inference calls. The lock is never held across an `.await`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::{Embedder, EmbeddingError};

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

#[derive(Debug, Default)]
struct CacheInner {
    vectors: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl CacheInner {
    fn insert(&mut self, key: String, vector: Vec<f32>, capacity: usize) {
        if capacity == 0 || self.vectors.contains_key(&key) {
            return;
        }
        while self.vectors.len() >= capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.vectors.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.vectors.insert(key, vector);
    }
}

/// Wraps an [`Embedder`] with a bounded FIFO cache keyed by exact text.
pub struct CachedEmbedder<E> {
    inner: E,
    capacity: usize,
    id: String,
    cache: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// A `capacity` of zero disables caching but keeps the counters.
    #[must_use]
    pub fn new(inner: E, capacity: usize) -> Self {
        let id = format!("cached:{}", inner.id());
        Self {
            inner,
            capacity,
            id,
            cache: Mutex::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.cache.lock().map_or(0, |c| c.vectors.len());
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
            capacity: self.capacity,
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.vectors.clear();
            cache.order.clear();
        }
    }

    #[must_use]
    pub const fn inner(&self) -> &E {
        &self.inner
    }

    fn lookup(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        // A poisoned cache only costs recomputation.
        let Ok(cache) = self.cache.lock() else {
            return vec![None; texts.len()];
        };
        texts
            .iter()
            .map(|text| cache.vectors.get(text).cloned())
            .collect()
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut slots = self.lookup(texts);

        let mut seen = HashSet::new();
        let missing: Vec<String> = texts
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .filter_map(|(text, _)| seen.insert(text.as_str()).then(|| text.clone()))
            .collect();

        let hit_count = slots.iter().filter(|s| s.is_some()).count() as u64;
        self.hits.fetch_add(hit_count, Ordering::Relaxed);
        self.misses
            .fetch_add(missing.len() as u64, Ordering::Relaxed);

        if missing.is_empty() {
            return Ok(slots.into_iter().flatten().collect());
        }

        debug!(
            embedder = self.inner.id(),
            hits = hit_count,
            misses = missing.len(),
            "embedding cache misses"
        );

        let computed = self.inner.embed_batch(&missing).await?;
        if computed.len() != missing.len() {
            return Err(EmbeddingError::EmptyResult);
        }

        let fresh: HashMap<&str, &Vec<f32>> = missing
            .iter()
            .map(String::as_str)
            .zip(computed.iter())
            .collect();

        for (text, slot) in texts.iter().zip(slots.iter_mut()) {
            if slot.is_none() {
                *slot = fresh.get(text.as_str()).map(|v| (*v).clone());
            }
        }

        if let Ok(mut cache) = self.cache.lock() {
            for (text, vector) in missing.into_iter().zip(computed) {
                cache.insert(text, vector, self.capacity);
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.ok_or(EmbeddingError::EmptyResult))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbedder;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    /// Counts how many texts reach the wrapped provider.
    struct Counting {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for Counting {
        fn id(&self) -> &str {
            "counting"
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }
    }

    fn counting() -> Counting {
        Counting {
            inner: HashEmbedder::new(16),
            calls: AtomicUsize::new(0),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cached = CachedEmbedder::new(counting(), 8);
        let texts = strings(&["heaps", "tries"]);

        let first = cached.embed_batch(&texts).await.unwrap();
        let second = cached.embed_batch(&texts).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        let stats = cached.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
    }

    #[tokio::test]
    async fn duplicates_in_one_batch_are_embedded_once() {
        let cached = CachedEmbedder::new(counting(), 8);
        let texts = strings(&["graphs", "graphs", "heaps"]);

        let out = cached.embed_batch(&texts).await.unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], out[1]);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn oldest_entry_is_evicted_first() {
        let cached = CachedEmbedder::new(counting(), 2);
        cached.embed_batch(&strings(&["a1", "b2"])).await.unwrap();
        cached.embed_batch(&strings(&["c3"])).await.unwrap();
        assert_eq!(cached.stats().entries, 2);

        cached.embed_batch(&strings(&["a1"])).await.unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_capacity_never_stores() {
        let cached = CachedEmbedder::new(counting(), 0);
        cached.embed_batch(&strings(&["x1"])).await.unwrap();
        cached.embed_batch(&strings(&["x1"])).await.unwrap();
        assert_eq!(cached.stats().entries, 0);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.id(), "cached:counting");
    }
}
