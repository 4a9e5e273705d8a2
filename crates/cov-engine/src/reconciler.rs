//! Reconciler: the mutation entry points of the engine.
//!
//! Every mutation of a course is serialized by that course's lock. Matching,
//! which may await the embedding provider, happens outside the lock against a
//! snapshot of the roadmap; the result is applied under the lock only if the
//! roadmap is still the one it was evaluated against.

use std::sync::Arc;

use cov_config::CoverageConfig;
use cov_core::{CoreError, LectureTopics, Roadmap, SyllabusCoverageReport};
use tracing::{debug, info, instrument};

use crate::embedder::embedder_from_config;
use crate::error::EngineError;
use crate::matcher::Matcher;
use crate::report::build_report;
use crate::retry::RetryConfig;
use crate::state::{CoverageStore, StagedEvaluations};

/// Outcome of [`Reconciler::merge_lecture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub lecture_id: String,
    /// An earlier contribution with the same id was retracted first.
    pub replaced: bool,
    /// Planned topics this lecture offered a candidate for.
    pub candidates: usize,
    /// Candidates that became the accepted match.
    pub accepted: usize,
    /// Extracted phrases that matched nothing planned.
    pub unplanned: usize,
    /// Evaluations needed (more than one if the roadmap changed mid-merge).
    pub attempts: u32,
}

/// Outcome of [`Reconciler::retract_lecture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetractOutcome {
    /// `false` if the course had no contribution from that lecture.
    pub removed: bool,
    pub vacated: usize,
    pub reassigned: usize,
}

/// Outcome of [`Reconciler::recompute_all`] and [`Reconciler::set_roadmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecomputeSummary {
    /// Roadmap generation the replay ran against.
    pub generation: u64,
    pub replayed: usize,
    /// Evaluations discarded because the lecture changed while being re-evaluated.
    pub skipped: usize,
    /// A newer roadmap arrived and took over the recompute.
    pub superseded: bool,
}

/// Orchestrates the matcher over the coverage store.
#[derive(Debug)]
pub struct Reconciler {
    store: Arc<CoverageStore>,
    matcher: Matcher,
    retry: RetryConfig,
}

impl Reconciler {
    #[must_use]
    pub fn new(matcher: Matcher, retry: RetryConfig) -> Self {
        Self::with_store(Arc::new(CoverageStore::new()), matcher, retry)
    }

    #[must_use]
    pub const fn with_store(store: Arc<CoverageStore>, matcher: Matcher, retry: RetryConfig) -> Self {
        Self {
            store,
            matcher,
            retry,
        }
    }

    /// Build from loaded configuration, including the embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Embedding`] if the configured provider cannot be built.
    pub fn from_config(config: &CoverageConfig) -> Result<Self, EngineError> {
        let embedder = embedder_from_config(&config.embeddings)?;
        Ok(Self::new(
            Matcher::new(config.matching.clone(), embedder),
            RetryConfig::from(&config.locking),
        ))
    }

    #[must_use]
    pub fn store(&self) -> &CoverageStore {
        &self.store
    }

    #[must_use]
    pub const fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Install or replace a course's roadmap and recompute its coverage.
    ///
    /// Creates the course if it does not exist. On replacement every stored
    /// lecture is evaluated against the new roadmap outside the lock; the
    /// roadmap and those evaluations are then installed in one locked step.
    /// Readers see either the old roadmap with its matches or the new one
    /// with all of its matches, and dropping the future leaves the old state
    /// in place. Lectures merged or retracted during the evaluation are
    /// re-evaluated, within the retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a blank course id, or a conflict
    /// if the course stays locked or keeps changing for the whole retry budget.
    #[instrument(skip(self, roadmap), fields(days = roadmap.entries().len(), planned = roadmap.planned_count()))]
    pub async fn set_roadmap(
        &self,
        course_id: &str,
        roadmap: Roadmap,
    ) -> Result<RecomputeSummary, EngineError> {
        if course_id.trim().is_empty() {
            return Err(CoreError::Validation("course_id must not be blank".to_string()).into());
        }

        let Some(roadmap) = self.store.try_create(course_id, roadmap).await else {
            info!("course created");
            return Ok(RecomputeSummary {
                generation: 1,
                ..RecomputeSummary::default()
            });
        };
        let roadmap = Arc::new(roadmap);
        let mut staged = StagedEvaluations::new();
        let mut summary = RecomputeSummary::default();

        for attempt in 1..=self.retry.max_attempts {
            let queue = self.store.lock(course_id, &self.retry).await?.replay_queue();

            for replay in queue {
                let current = staged
                    .get(&replay.lecture.lecture_id)
                    .is_some_and(|(revision, _)| *revision == replay.revision);
                if current {
                    continue;
                }
                let evaluation = self.matcher.evaluate(&roadmap, &replay.lecture).await;
                let lecture_id = replay.lecture.lecture_id;
                if staged.insert(lecture_id, (replay.revision, evaluation)).is_some() {
                    summary.skipped += 1;
                }
            }

            let mut state = self.store.lock(course_id, &self.retry).await?;
            if state.install_roadmap(Arc::clone(&roadmap), &mut staged) {
                summary.generation = state.generation();
                summary.replayed = state.lecture_count();
                info!(
                    generation = summary.generation,
                    lectures = summary.replayed,
                    attempt,
                    "roadmap replaced"
                );
                return Ok(summary);
            }
            debug!(attempt, "lectures changed during re-evaluation; re-evaluating");
        }

        Err(EngineError::Conflict {
            course_id: course_id.to_string(),
            attempts: self.retry.max_attempts,
        })
    }

    /// Merge one lecture's topics into a course.
    ///
    /// Merging a lecture id that already contributed replaces that
    /// contribution, so merging the same input twice equals merging it once.
    /// An empty topic list is stored and contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown course, `Validation` for a blank
    /// lecture id, and [`EngineError::Conflict`] once the retry budget is spent.
    #[instrument(skip(self, lecture), fields(lecture_id = %lecture.lecture_id, topics = lecture.extracted_topics.len()))]
    pub async fn merge_lecture(
        &self,
        course_id: &str,
        lecture: LectureTopics,
    ) -> Result<MergeOutcome, EngineError> {
        lecture.validate()?;

        for attempt in 1..=self.retry.max_attempts {
            let (roadmap, generation) = {
                let state = self.store.lock(course_id, &self.retry).await?;
                (state.roadmap_handle(), state.generation())
            };

            let evaluation = self.matcher.evaluate(&roadmap, &lecture).await;

            let mut state = self.store.lock(course_id, &self.retry).await?;
            if state.generation() != generation {
                debug!(attempt, "roadmap replaced during evaluation; re-evaluating");
                continue;
            }

            let candidates = evaluation.best.len();
            let unplanned = evaluation.unplanned.len();
            let lecture_id = lecture.lecture_id.clone();
            let applied = state.apply(lecture, evaluation);
            info!(
                replaced = applied.replaced,
                candidates,
                accepted = applied.accepted,
                unplanned,
                covered = state.covered_count(),
                "lecture merged"
            );
            return Ok(MergeOutcome {
                lecture_id,
                replaced: applied.replaced,
                candidates,
                accepted: applied.accepted,
                unplanned,
                attempts: attempt,
            });
        }

        Err(EngineError::Conflict {
            course_id: course_id.to_string(),
            attempts: self.retry.max_attempts,
        })
    }

    /// Remove a lecture's contribution. Topics it covered fall back to the
    /// best remaining lecture or become missing; coverage never increases.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown course, or a conflict if the course
    /// stays locked for the whole retry budget.
    #[instrument(skip(self))]
    pub async fn retract_lecture(
        &self,
        course_id: &str,
        lecture_id: &str,
    ) -> Result<RetractOutcome, EngineError> {
        let mut state = self.store.lock(course_id, &self.retry).await?;
        let outcome = match state.retract(lecture_id) {
            Some(retracted) => RetractOutcome {
                removed: true,
                vacated: retracted.vacated,
                reassigned: retracted.reassigned,
            },
            None => RetractOutcome {
                removed: false,
                vacated: 0,
                reassigned: 0,
            },
        };
        info!(
            removed = outcome.removed,
            vacated = outcome.vacated,
            reassigned = outcome.reassigned,
            "lecture retracted"
        );
        Ok(outcome)
    }

    /// Discard all matches and replay every stored lecture in
    /// `(timestamp, lecture_id)` order.
    ///
    /// Each replay is applied atomically. Dropping the returned future stops
    /// between replays: lectures already replayed keep their matches, the rest
    /// stay pending until the next recompute.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown course, or a conflict if the course
    /// stays locked for the whole retry budget.
    #[instrument(skip(self))]
    pub async fn recompute_all(&self, course_id: &str) -> Result<RecomputeSummary, EngineError> {
        let (roadmap, generation, queue) = {
            let mut state = self.store.lock(course_id, &self.retry).await?;
            let queue = state.mark_all_pending();
            (state.roadmap_handle(), state.generation(), queue)
        };
        let mut summary = RecomputeSummary {
            generation,
            ..RecomputeSummary::default()
        };
        debug!(generation, queued = queue.len(), "recompute started");

        for replay in queue {
            let evaluation = self.matcher.evaluate(&roadmap, &replay.lecture).await;

            let mut state = self.store.lock(course_id, &self.retry).await?;
            if state.generation() != generation {
                info!(
                    generation,
                    current = state.generation(),
                    "roadmap replaced; recompute superseded"
                );
                summary.superseded = true;
                return Ok(summary);
            }
            if state.complete_replay(&replay.lecture.lecture_id, replay.revision, evaluation) {
                summary.replayed += 1;
            } else {
                summary.skipped += 1;
            }
        }

        info!(
            replayed = summary.replayed,
            skipped = summary.skipped,
            "recompute finished"
        );
        Ok(summary)
    }

    /// Current coverage report of a course.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no roadmap has been set for `course_id`.
    pub async fn report(&self, course_id: &str) -> Result<SyllabusCoverageReport, EngineError> {
        let state = self.store.get_state(course_id).await?;
        Ok(build_report(&state))
    }

    /// Forget a course entirely.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the course does not exist.
    #[instrument(skip(self))]
    pub async fn remove_course(&self, course_id: &str) -> Result<(), EngineError> {
        if self.store.remove(course_id).await {
            info!("course removed");
            Ok(())
        } else {
            Err(CoreError::course_not_found(course_id).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{lecture, roadmap};
    use cov_config::MatchingConfig;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn reconciler() -> Reconciler {
        Reconciler::new(
            Matcher::lexical(MatchingConfig::default()),
            RetryConfig::default(),
        )
    }

    #[tokio::test]
    async fn merge_into_unknown_course_is_not_found() {
        let err = reconciler()
            .merge_lecture("ghost", lecture("a", 1, &["Heaps"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn blank_lecture_id_is_rejected_before_locking() {
        let r = reconciler();
        r.set_roadmap("c1", roadmap(&[&["Heaps"]])).await.unwrap();
        let err = r.merge_lecture("c1", lecture(" ", 1, &["Heaps"])).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn remerge_reports_replacement() {
        let r = reconciler();
        r.set_roadmap("c1", roadmap(&[&["Heaps"]])).await.unwrap();
        let first = r.merge_lecture("c1", lecture("a", 1, &["Heaps"])).await.unwrap();
        let second = r.merge_lecture("c1", lecture("a", 1, &["Heaps"])).await.unwrap();
        assert!(!first.replaced);
        assert!(second.replaced);
        assert_eq!(second.accepted, 1);
        assert_eq!(second.attempts, 1);
    }

    #[tokio::test]
    async fn empty_lecture_retracts_previous_contribution() {
        let r = reconciler();
        r.set_roadmap("c1", roadmap(&[&["Heaps"]])).await.unwrap();
        r.merge_lecture("c1", lecture("a", 1, &["Heaps"])).await.unwrap();

        let outcome = r.merge_lecture("c1", lecture("a", 1, &[])).await.unwrap();
        assert!(outcome.replaced);
        assert_eq!(outcome.candidates, 0);

        let report = r.report("c1").await.unwrap();
        assert_eq!(report.missing_topics, vec!["Heaps"]);
        assert_eq!(report.lectures_merged, 1);
    }

    #[tokio::test]
    async fn retracting_unknown_lecture_is_a_noop() {
        let r = reconciler();
        r.set_roadmap("c1", roadmap(&[&["Heaps"]])).await.unwrap();
        let outcome = r.retract_lecture("c1", "never-merged").await.unwrap();
        assert!(!outcome.removed);
        assert!(r.retract_lecture("c2", "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn merge_conflicts_while_course_is_locked() {
        let retry = RetryConfig {
            max_attempts: 3,
            lock_timeout: Duration::from_millis(5),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let r = Reconciler::new(Matcher::lexical(MatchingConfig::default()), retry.clone());
        r.set_roadmap("c1", roadmap(&[&["Heaps"]])).await.unwrap();

        let _held = r.store().lock("c1", &retry).await.unwrap();
        let err = r
            .merge_lecture("c1", lecture("a", 1, &["Heaps"]))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn blank_course_id_is_rejected() {
        let err = reconciler()
            .set_roadmap("  ", Roadmap::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn removed_course_is_gone() {
        let r = reconciler();
        r.set_roadmap("c1", Roadmap::empty()).await.unwrap();
        r.set_roadmap("c2", Roadmap::empty()).await.unwrap();
        assert_eq!(r.store().course_ids().await, vec!["c1", "c2"]);

        r.remove_course("c1").await.unwrap();
        assert!(r.report("c1").await.unwrap_err().is_not_found());
        assert!(r.remove_course("c1").await.unwrap_err().is_not_found());
        assert_eq!(r.store().course_ids().await, vec!["c2"]);
    }
}
