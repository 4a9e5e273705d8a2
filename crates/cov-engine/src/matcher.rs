//! Tiered topic matching.
//!
//! A planned topic is compared against a set of extracted lecture phrases in
//! three tiers, strongest first:
//!
//! 1. **Exact**: canonical keys are equal. Confidence `1.0`.
//! 2. **Fuzzy**: the better of token-set Dice and normalized Levenshtein over
//!    canonical keys, at least `fuzzy_threshold`. Confidence = similarity.
//! 3. **Semantic**: embedding cosine of the unstemmed text, at least
//!    `semantic_threshold`. Confidence = similarity.
//!
//! Numbered siblings (`Lab 1` and `Lab 3`, `Part II` and `Part 3`) are distinct
//! topics: when both phrases carry numbers and the numbers differ, neither the
//! fuzzy nor the semantic tier may match them.
//!
//! Within one candidate set the first tier with any hit decides; a weaker tier
//! is never consulted once a stronger one matched. The semantic tier is the
//! only one that awaits, and only when it is enabled and a provider is present.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cov_config::MatchingConfig;
use cov_core::entities::PlannedTopic;
use cov_core::{LectureTopics, MatchTier, NormalizedTopic, Roadmap, TopicMatch, TopicRef, normalize};
use cov_embeddings::{Embedder, cosine_similarity};
use tracing::{debug, warn};

/// One normalized extracted phrase, with the provenance a match records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub lecture_id: String,
    pub timestamp: DateTime<Utc>,
    /// Position of the phrase in the lecture's topic list.
    pub position: u32,
    pub topic: NormalizedTopic,
}

impl MatchCandidate {
    fn to_match(&self, planned: &PlannedTopic, confidence: f64, tier: MatchTier) -> TopicMatch {
        TopicMatch {
            topic: planned.topic,
            planned_topic: planned.phrase.clone(),
            lecture_id: self.lecture_id.clone(),
            extracted_topic: self.topic.original.clone(),
            extracted_position: self.position,
            timestamp: self.timestamp,
            confidence,
            tier,
        }
    }
}

/// Everything one lecture can offer the roadmap it was evaluated against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LectureEvaluation {
    /// This lecture's best candidate for every planned topic it satisfies.
    pub best: BTreeMap<TopicRef, TopicMatch>,
    /// Extracted phrases that satisfy no planned topic at any tier, in lecture order.
    pub unplanned: Vec<String>,
    /// Extracted phrases skipped because they failed normalization.
    pub skipped: usize,
}

type Vectors = HashMap<String, Vec<f32>>;

/// Decides which extracted phrases satisfy which planned topics.
pub struct Matcher {
    config: MatchingConfig,
    embedder: Option<Arc<dyn Embedder>>,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("config", &self.config)
            .field("embedder", &self.embedder.as_ref().map(|e| e.id().to_string()))
            .finish()
    }
}

impl Matcher {
    #[must_use]
    pub fn new(config: MatchingConfig, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { config, embedder }
    }

    /// Exact and fuzzy tiers only. Fully offline and deterministic.
    #[must_use]
    pub fn lexical(config: MatchingConfig) -> Self {
        Self::new(config, None)
    }

    #[must_use]
    pub const fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Whether the semantic tier can run: enabled in config and a provider is present.
    #[must_use]
    pub fn semantic_enabled(&self) -> bool {
        self.config.enable_semantic_tier && self.embedder.is_some()
    }

    /// Best exact or fuzzy match for `planned` among `candidates`.
    #[must_use]
    pub fn lexical_match(
        &self,
        planned: &PlannedTopic,
        candidates: &[MatchCandidate],
    ) -> Option<TopicMatch> {
        strongest_tier(
            candidates
                .iter()
                .filter_map(|c| self.lexical_hit(planned, c))
                .collect(),
        )
    }

    /// Best match for `planned` among `candidates`, consulting the semantic
    /// tier only when neither lexical tier hit.
    ///
    /// An embedding failure is logged and treated as "no semantic evidence".
    pub async fn match_topic(
        &self,
        planned: &PlannedTopic,
        candidates: &[MatchCandidate],
    ) -> Option<TopicMatch> {
        if let Some(hit) = self.lexical_match(planned, candidates) {
            return Some(hit);
        }
        if !self.semantic_enabled() || candidates.is_empty() {
            return None;
        }

        let texts = std::iter::once(&planned.normalized.text)
            .chain(candidates.iter().map(|c| &c.topic.text));
        let vectors = self.embed(texts).await?;
        self.semantic_match(planned, candidates, &vectors)
    }

    /// Evaluate one lecture against a roadmap.
    ///
    /// All embeddings the lecture needs are requested in a single batch.
    pub async fn evaluate(&self, roadmap: &Roadmap, lecture: &LectureTopics) -> LectureEvaluation {
        let (candidates, skipped) = candidates_for(lecture);
        let mut evaluation = LectureEvaluation {
            skipped,
            ..LectureEvaluation::default()
        };
        if candidates.is_empty() {
            return evaluation;
        }

        let mut planned_hit = vec![false; candidates.len()];
        let mut unresolved = Vec::new();

        for planned in roadmap.planned_topics() {
            let hits: Vec<TopicMatch> = candidates
                .iter()
                .enumerate()
                .filter_map(|(i, c)| {
                    let hit = self.lexical_hit(planned, c)?;
                    planned_hit[i] = true;
                    Some(hit)
                })
                .collect();
            match strongest_tier(hits) {
                Some(best) => {
                    evaluation.best.insert(planned.topic, best);
                }
                None => unresolved.push(planned),
            }
        }

        let has_orphans = planned_hit.iter().any(|hit| !hit);
        if self.semantic_enabled() && (has_orphans || !unresolved.is_empty()) {
            // Orphan phrases are checked against every planned topic, not only
            // the unresolved ones, before being reported as unplanned.
            let planned_texts: Vec<&String> = if has_orphans {
                roadmap
                    .planned_topics()
                    .iter()
                    .map(|p| &p.normalized.text)
                    .collect()
            } else {
                unresolved.iter().map(|p| &p.normalized.text).collect()
            };
            let texts = planned_texts
                .into_iter()
                .chain(candidates.iter().map(|c| &c.topic.text));

            if let Some(vectors) = self.embed(texts).await {
                for planned in &unresolved {
                    if let Some(best) = self.semantic_match(planned, &candidates, &vectors) {
                        evaluation.best.insert(planned.topic, best);
                    }
                }
                for (i, candidate) in candidates.iter().enumerate() {
                    if !planned_hit[i] {
                        planned_hit[i] = roadmap.planned_topics().iter().any(|p| {
                            self.semantic_score(&p.normalized, &candidate.topic, &vectors)
                                .is_some()
                        });
                    }
                }
            }
        }

        evaluation.unplanned = candidates
            .iter()
            .zip(&planned_hit)
            .filter(|(_, hit)| !**hit)
            .map(|(c, _)| c.topic.original.clone())
            .collect();

        debug!(
            lecture_id = %lecture.lecture_id,
            candidates = candidates.len(),
            matched = evaluation.best.len(),
            unplanned = evaluation.unplanned.len(),
            skipped,
            "lecture evaluated"
        );
        evaluation
    }

    fn lexical_hit(&self, planned: &PlannedTopic, candidate: &MatchCandidate) -> Option<TopicMatch> {
        if planned.normalized.canonical_key == candidate.topic.canonical_key {
            return Some(candidate.to_match(planned, 1.0, MatchTier::Exact));
        }
        let similarity = fuzzy_similarity(&planned.normalized, &candidate.topic);
        (similarity >= self.config.fuzzy_threshold)
            .then(|| candidate.to_match(planned, similarity, MatchTier::Fuzzy))
    }

    fn semantic_match(
        &self,
        planned: &PlannedTopic,
        candidates: &[MatchCandidate],
        vectors: &Vectors,
    ) -> Option<TopicMatch> {
        best_of(candidates.iter().filter_map(|c| {
            let score = self.semantic_score(&planned.normalized, &c.topic, vectors)?;
            Some(c.to_match(planned, score, MatchTier::Semantic))
        }))
    }

    fn semantic_score(
        &self,
        planned: &NormalizedTopic,
        candidate: &NormalizedTopic,
        vectors: &Vectors,
    ) -> Option<f64> {
        if numbered_differently(planned, candidate) {
            return None;
        }
        let a = vectors.get(&planned.text)?;
        let b = vectors.get(&candidate.text)?;
        let score = f64::from(cosine_similarity(a, b).ok()?).clamp(0.0, 1.0);
        (score >= self.config.semantic_threshold).then_some(score)
    }

    /// Embed the distinct texts in one provider call.
    async fn embed<'a>(&self, texts: impl Iterator<Item = &'a String>) -> Option<Vectors> {
        let embedder = self.embedder.as_ref()?;

        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for text in texts {
            if seen.insert(text) {
                unique.push(text.clone());
            }
        }

        match embedder.embed_batch(&unique).await {
            Ok(vectors) if vectors.len() == unique.len() => {
                Some(unique.into_iter().zip(vectors).collect())
            }
            Ok(vectors) => {
                warn!(
                    embedder = embedder.id(),
                    expected = unique.len(),
                    actual = vectors.len(),
                    "embedding provider returned the wrong number of vectors; semantic tier skipped"
                );
                None
            }
            Err(error) => {
                warn!(embedder = embedder.id(), %error, "embedding failed; semantic tier skipped");
                None
            }
        }
    }
}

/// Similarity used by the fuzzy tier, in `[0, 1]`.
///
/// The better of Sørensen–Dice over the stemmed token sets and normalized
/// Levenshtein over the canonical keys. Dice catches reordering and extra
/// words; Levenshtein catches spelling variants and joined words.
///
/// Phrases numbered differently score `0.0`.
#[must_use]
pub fn fuzzy_similarity(a: &NormalizedTopic, b: &NormalizedTopic) -> f64 {
    if numbered_differently(a, b) {
        return 0.0;
    }
    token_dice(&a.tokens, &b.tokens).max(strsim::normalized_levenshtein(
        &a.canonical_key,
        &b.canonical_key,
    ))
}

fn token_dice(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count();
    #[allow(clippy::cast_precision_loss)]
    let dice = (2 * shared) as f64 / (a.len() + b.len()) as f64;
    dice
}

const ROMAN_NUMERALS: [(&str, &str); 12] = [
    ("i", "1"),
    ("ii", "2"),
    ("iii", "3"),
    ("iv", "4"),
    ("v", "5"),
    ("vi", "6"),
    ("vii", "7"),
    ("viii", "8"),
    ("ix", "9"),
    ("x", "10"),
    ("xi", "11"),
    ("xii", "12"),
];

/// Numbers a topic carries: every digit run, plus standalone roman numerals
/// up to XII. Leading zeros are ignored.
fn numerals(topic: &NormalizedTopic) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for token in &topic.tokens {
        if let Some((_, value)) = ROMAN_NUMERALS
            .iter()
            .find(|(roman, _)| *roman == token.as_str())
        {
            found.insert((*value).to_string());
            continue;
        }
        for run in token.split(|c: char| !c.is_ascii_digit()).filter(|run| !run.is_empty()) {
            let trimmed = run.trim_start_matches('0');
            let value = if trimmed.is_empty() { "0" } else { trimmed };
            found.insert(value.to_string());
        }
    }
    found
}

/// Both phrases are numbered and their numbers disagree.
fn numbered_differently(a: &NormalizedTopic, b: &NormalizedTopic) -> bool {
    let a = numerals(a);
    let b = numerals(b);
    !a.is_empty() && !b.is_empty() && a != b
}

fn candidates_for(lecture: &LectureTopics) -> (Vec<MatchCandidate>, usize) {
    let mut candidates = Vec::with_capacity(lecture.extracted_topics.len());
    let mut skipped = 0;
    for (position, phrase) in lecture.extracted_topics.iter().enumerate() {
        match normalize(phrase) {
            Ok(topic) => candidates.push(MatchCandidate {
                lecture_id: lecture.lecture_id.clone(),
                timestamp: lecture.timestamp,
                position: u32::try_from(position).unwrap_or(u32::MAX),
                topic,
            }),
            Err(error) => {
                warn!(
                    lecture_id = %lecture.lecture_id,
                    position,
                    %error,
                    "skipping unusable extracted topic"
                );
                skipped += 1;
            }
        }
    }
    (candidates, skipped)
}

/// Keep only the hits of the strongest tier present, then pick the best.
fn strongest_tier(hits: Vec<TopicMatch>) -> Option<TopicMatch> {
    let rank = hits.iter().map(|h| h.tier.rank()).max()?;
    best_of(hits.into_iter().filter(|h| h.tier.rank() == rank))
}

fn best_of(hits: impl Iterator<Item = TopicMatch>) -> Option<TopicMatch> {
    hits.max_by(TopicMatch::preference)
}
