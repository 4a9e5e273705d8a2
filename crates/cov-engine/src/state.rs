//! Coverage state and the keyed per-course store.
//!
//! A [`CoverageState`] owns one course's roadmap, every lecture contribution
//! merged so far, and the accepted match of each planned topic. The accepted
//! set is always the best candidate, under [`TopicMatch::preference`], among
//! the evaluated contributions. It therefore depends only on which
//! contributions are present, never on the order they arrived in.
//!
//! [`CoverageStore`] maps course ids to states. Each course sits behind its
//! own async mutex, so courses never contend with one another.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cov_core::{CoreError, LectureTopics, Roadmap, TopicMatch, TopicRef};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::matcher::LectureEvaluation;
use crate::retry::RetryConfig;

/// One lecture's stored input and, once evaluated, what it offers the roadmap.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    lecture: LectureTopics,
    evaluation: Option<LectureEvaluation>,
    revision: u64,
}

impl Contribution {
    #[must_use]
    pub const fn lecture(&self) -> &LectureTopics {
        &self.lecture
    }

    /// `None` while the contribution waits for a replay against the current roadmap.
    #[must_use]
    pub const fn evaluation(&self) -> Option<&LectureEvaluation> {
        self.evaluation.as_ref()
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.evaluation.is_none()
    }
}

/// A contribution queued for re-evaluation by a recompute.
#[derive(Debug, Clone)]
pub(crate) struct PendingReplay {
    pub lecture: LectureTopics,
    pub revision: u64,
}

/// Result of applying one evaluated lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Applied {
    pub replaced: bool,
    pub accepted: usize,
}

/// Result of removing one lecture's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Retracted {
    /// Planned topics whose accepted match came from the removed lecture.
    pub vacated: usize,
    /// Vacated topics that another lecture still covers.
    pub reassigned: usize,
}

/// Evaluations of stored lectures against a roadmap that is not installed
/// yet, keyed by lecture id and tagged with the revision they were made from.
pub(crate) type StagedEvaluations = HashMap<String, (u64, LectureEvaluation)>;

/// Everything known about one course.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageState {
    course_id: String,
    roadmap: Arc<Roadmap>,
    generation: u64,
    next_revision: u64,
    contributions: BTreeMap<String, Contribution>,
    accepted: BTreeMap<TopicRef, TopicMatch>,
}

impl CoverageState {
    pub(crate) fn new(course_id: impl Into<String>, roadmap: Roadmap) -> Self {
        Self {
            course_id: course_id.into(),
            roadmap: Arc::new(roadmap),
            generation: 1,
            next_revision: 0,
            contributions: BTreeMap::new(),
            accepted: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    #[must_use]
    pub fn roadmap(&self) -> &Roadmap {
        &self.roadmap
    }

    pub(crate) fn roadmap_handle(&self) -> Arc<Roadmap> {
        Arc::clone(&self.roadmap)
    }

    /// Incremented every time the roadmap is replaced.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Accepted matches in roadmap order.
    pub fn matches(&self) -> impl Iterator<Item = &TopicMatch> {
        self.accepted.values()
    }

    #[must_use]
    pub fn accepted(&self, topic: TopicRef) -> Option<&TopicMatch> {
        self.accepted.get(&topic)
    }

    #[must_use]
    pub fn covered_count(&self) -> usize {
        self.accepted.len()
    }

    /// Contributions ordered by lecture id.
    pub fn contributions(&self) -> impl Iterator<Item = &Contribution> {
        self.contributions.values()
    }

    #[must_use]
    pub fn contribution(&self, lecture_id: &str) -> Option<&Contribution> {
        self.contributions.get(lecture_id)
    }

    #[must_use]
    pub fn lecture_count(&self) -> usize {
        self.contributions.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.contributions.values().filter(|c| c.is_pending()).count()
    }

    /// Store an evaluated lecture, replacing any earlier contribution with the
    /// same id, and accept every candidate that beats the current match.
    ///
    /// Re-merging a lecture identical to the stored one keeps its revision, so
    /// the resulting state equals the one the first merge produced.
    pub(crate) fn apply(&mut self, lecture: LectureTopics, evaluation: LectureEvaluation) -> Applied {
        let revision = match self.contributions.get(&lecture.lecture_id) {
            Some(existing) if existing.lecture == lecture => existing.revision,
            _ => {
                self.next_revision += 1;
                self.next_revision
            }
        };
        let replaced = self.retract(&lecture.lecture_id).is_some();
        let accepted = self.accept(&evaluation);

        self.contributions.insert(
            lecture.lecture_id.clone(),
            Contribution {
                lecture,
                evaluation: Some(evaluation),
                revision,
            },
        );
        Applied { replaced, accepted }
    }

    /// Remove a lecture's contribution and re-select every planned topic it
    /// held from the remaining contributions. `None` if the lecture is unknown.
    pub(crate) fn retract(&mut self, lecture_id: &str) -> Option<Retracted> {
        self.contributions.remove(lecture_id)?;

        let vacated: Vec<TopicRef> = self
            .accepted
            .iter()
            .filter(|(_, m)| m.lecture_id == lecture_id)
            .map(|(topic, _)| *topic)
            .collect();

        let mut reassigned = 0;
        for topic in &vacated {
            self.accepted.remove(topic);
            let successor = self
                .contributions
                .values()
                .filter_map(|c| c.evaluation.as_ref()?.best.get(topic))
                .max_by(|a, b| a.preference(b))
                .cloned();
            if let Some(successor) = successor {
                self.accepted.insert(*topic, successor);
                reassigned += 1;
            }
        }

        Some(Retracted {
            vacated: vacated.len(),
            reassigned,
        })
    }

    /// Every stored lecture at its current revision, in `(timestamp, lecture_id)` order.
    pub(crate) fn replay_queue(&self) -> Vec<PendingReplay> {
        let mut queue: Vec<PendingReplay> = self
            .contributions
            .values()
            .map(|c| PendingReplay {
                lecture: c.lecture.clone(),
                revision: c.revision,
            })
            .collect();
        queue.sort_by(|a, b| {
            a.lecture
                .timestamp
                .cmp(&b.lecture.timestamp)
                .then_with(|| a.lecture.lecture_id.cmp(&b.lecture.lecture_id))
        });
        queue
    }

    /// Swap in a new roadmap together with every stored lecture's evaluation
    /// against it, and re-select all accepted matches from those evaluations.
    ///
    /// Returns `false` without touching anything unless `staged` holds an
    /// evaluation at the current revision for every stored lecture.
    pub(crate) fn install_roadmap(
        &mut self,
        roadmap: Arc<Roadmap>,
        staged: &mut StagedEvaluations,
    ) -> bool {
        let complete = self.contributions.iter().all(|(id, c)| {
            staged
                .get(id)
                .is_some_and(|(revision, _)| *revision == c.revision)
        });
        if !complete {
            return false;
        }

        self.roadmap = roadmap;
        self.generation += 1;
        for (id, contribution) in &mut self.contributions {
            contribution.evaluation = staged.remove(id).map(|(_, evaluation)| evaluation);
        }
        self.reselect();
        true
    }

    /// Drop all matches, mark every contribution pending, and return the
    /// replay queue in `(timestamp, lecture_id)` order.
    pub(crate) fn mark_all_pending(&mut self) -> Vec<PendingReplay> {
        self.accepted.clear();
        for contribution in self.contributions.values_mut() {
            contribution.evaluation = None;
        }
        self.replay_queue()
    }

    /// Attach a replayed evaluation to a pending contribution.
    ///
    /// Returns `false` without touching anything if the contribution was
    /// replaced, retracted, or already evaluated since the replay was queued.
    pub(crate) fn complete_replay(
        &mut self,
        lecture_id: &str,
        revision: u64,
        evaluation: LectureEvaluation,
    ) -> bool {
        match self.contributions.get(lecture_id) {
            Some(c) if c.revision == revision && c.is_pending() => {}
            _ => return false,
        }
        self.accept(&evaluation);
        if let Some(contribution) = self.contributions.get_mut(lecture_id) {
            contribution.evaluation = Some(evaluation);
        }
        true
    }

    /// Rebuild the accepted set from every evaluated contribution.
    fn reselect(&mut self) {
        let mut accepted: BTreeMap<TopicRef, TopicMatch> = BTreeMap::new();
        for evaluation in self.contributions.values().filter_map(|c| c.evaluation.as_ref()) {
            for (topic, candidate) in &evaluation.best {
                if accepted
                    .get(topic)
                    .is_none_or(|current| candidate.beats(current))
                {
                    accepted.insert(*topic, candidate.clone());
                }
            }
        }
        self.accepted = accepted;
    }

    fn accept(&mut self, evaluation: &LectureEvaluation) -> usize {
        let mut accepted = 0;
        for (topic, candidate) in &evaluation.best {
            let better = self
                .accepted
                .get(topic)
                .is_none_or(|current| candidate.beats(current));
            if better {
                self.accepted.insert(*topic, candidate.clone());
                accepted += 1;
            }
        }
        accepted
    }
}

type CourseSlot = Arc<Mutex<CoverageState>>;

/// Keyed store of per-course coverage state.
#[derive(Debug, Default)]
pub struct CoverageStore {
    courses: RwLock<HashMap<String, CourseSlot>>,
}

impl CoverageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a course's state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no roadmap has been set for `course_id`.
    pub async fn get_state(&self, course_id: &str) -> Result<CoverageState, EngineError> {
        let slot = self.slot(course_id).await?;
        let state = slot.lock().await;
        Ok(state.clone())
    }

    pub async fn contains(&self, course_id: &str) -> bool {
        self.courses.read().await.contains_key(course_id)
    }

    /// Known course ids, sorted.
    pub async fn course_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.courses.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn slot(&self, course_id: &str) -> Result<CourseSlot, EngineError> {
        self.courses
            .read()
            .await
            .get(course_id)
            .cloned()
            .ok_or_else(|| CoreError::course_not_found(course_id).into())
    }

    /// Register a new course. Hands the roadmap back if the course already exists.
    pub(crate) async fn try_create(&self, course_id: &str, roadmap: Roadmap) -> Option<Roadmap> {
        let mut courses = self.courses.write().await;
        if courses.contains_key(course_id) {
            return Some(roadmap);
        }
        courses.insert(
            course_id.to_string(),
            Arc::new(Mutex::new(CoverageState::new(course_id, roadmap))),
        );
        None
    }

    pub(crate) async fn remove(&self, course_id: &str) -> bool {
        self.courses.write().await.remove(course_id).is_some()
    }

    /// Take a course's lock, waiting at most `lock_timeout` per attempt and
    /// backing off between attempts.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the course is unknown or is removed while waiting,
    /// and [`EngineError::Conflict`] once `max_attempts` waits have timed out.
    pub(crate) async fn lock(
        &self,
        course_id: &str,
        retry: &RetryConfig,
    ) -> Result<OwnedMutexGuard<CoverageState>, EngineError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let slot = self.slot(course_id).await?;

            if let Ok(guard) =
                tokio::time::timeout(retry.lock_timeout, Arc::clone(&slot).lock_owned()).await
            {
                if !self.is_current(course_id, &slot).await {
                    return Err(CoreError::course_not_found(course_id).into());
                }
                return Ok(guard);
            }

            if attempt >= retry.max_attempts {
                warn!(course_id, attempts = attempt, "course lock contention; giving up");
                return Err(EngineError::Conflict {
                    course_id: course_id.to_string(),
                    attempts: attempt,
                });
            }
            let delay = retry.delay_for(attempt);
            debug!(course_id, attempt, ?delay, "course lock busy; backing off");
            tokio::time::sleep(delay).await;
        }
    }

    async fn is_current(&self, course_id: &str, slot: &CourseSlot) -> bool {
        self.courses
            .read()
            .await
            .get(course_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use crate::test_support::{lecture, roadmap};
    use cov_config::MatchingConfig;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    async fn evaluated(state: &CoverageState, l: &LectureTopics) -> LectureEvaluation {
        Matcher::lexical(MatchingConfig::default())
            .evaluate(state.roadmap(), l)
            .await
    }

    fn owners(state: &CoverageState) -> Vec<(TopicRef, String)> {
        state
            .matches()
            .map(|m| (m.topic, m.lecture_id.clone()))
            .collect()
    }

    #[tokio::test]
    async fn earlier_lecture_keeps_tied_topic() {
        let mut state = CoverageState::new("c1", roadmap(&[&["Heaps", "Tries"]]));
        let late = lecture("late", 200, &["Heaps", "Tries"]);
        let early = lecture("early", 100, &["Heaps"]);

        let e = evaluated(&state, &late).await;
        state.apply(late, e);
        let e = evaluated(&state, &early).await;
        let applied = state.apply(early, e);

        assert_eq!(applied.accepted, 1);
        assert_eq!(
            owners(&state),
            vec![
                (TopicRef { day_index: 1, position: 0 }, "early".to_string()),
                (TopicRef { day_index: 1, position: 1 }, "late".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn retraction_hands_topic_to_next_best() {
        let mut state = CoverageState::new("c1", roadmap(&[&["Heaps"]]));
        for l in [lecture("a", 100, &["Heaps"]), lecture("b", 200, &["heap"])] {
            let e = evaluated(&state, &l).await;
            state.apply(l, e);
        }

        let retracted = state.retract("a").unwrap();
        assert_eq!(retracted, Retracted { vacated: 1, reassigned: 1 });
        assert_eq!(owners(&state)[0].1, "b");

        let retracted = state.retract("b").unwrap();
        assert_eq!(retracted, Retracted { vacated: 1, reassigned: 0 });
        assert_eq!(state.covered_count(), 0);
        assert!(state.retract("b").is_none());
    }

    async fn staged_for(state: &CoverageState, next: &Roadmap) -> StagedEvaluations {
        let matcher = Matcher::lexical(MatchingConfig::default());
        let mut staged = StagedEvaluations::new();
        for replay in state.replay_queue() {
            let evaluation = matcher.evaluate(next, &replay.lecture).await;
            staged.insert(replay.lecture.lecture_id, (replay.revision, evaluation));
        }
        staged
    }

    #[tokio::test]
    async fn installing_roadmap_swaps_plan_and_matches_together() {
        let mut state = CoverageState::new("c1", roadmap(&[&["Heaps"]]));
        let l = lecture("a", 100, &["Heaps", "Graphs"]);
        let e = evaluated(&state, &l).await;
        state.apply(l, e);

        let next = roadmap(&[&["Graphs"], &["Heaps", "Tries"]]);
        let mut staged = staged_for(&state, &next).await;
        assert!(state.install_roadmap(Arc::new(next), &mut staged));

        assert_eq!(state.generation(), 2);
        assert_eq!(state.pending_count(), 0);
        assert_eq!(
            owners(&state),
            vec![
                (TopicRef { day_index: 1, position: 0 }, "a".to_string()),
                (TopicRef { day_index: 2, position: 0 }, "a".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn install_refuses_evaluations_of_changed_lectures() {
        let mut state = CoverageState::new("c1", roadmap(&[&["Heaps"]]));
        let l = lecture("a", 100, &["Heaps"]);
        let e = evaluated(&state, &l).await;
        state.apply(l, e);

        let next = roadmap(&[&["Heaps", "Tries"]]);
        let mut staged = staged_for(&state, &next).await;

        let changed = lecture("a", 100, &["Tries"]);
        let e = evaluated(&state, &changed).await;
        state.apply(changed, e);
        let before = state.clone();

        assert!(!state.install_roadmap(Arc::new(next.clone()), &mut staged));
        assert_eq!(state, before);

        let mut staged = staged_for(&state, &next).await;
        assert!(state.install_roadmap(Arc::new(next), &mut staged));
        assert_eq!(owners(&state)[0].0, TopicRef { day_index: 1, position: 1 });
    }

    #[tokio::test]
    async fn identical_remerge_leaves_state_unchanged() {
        let mut state = CoverageState::new("c1", roadmap(&[&["Heaps", "Tries"]]));
        let l = lecture("a", 100, &["Heaps", "Q&A"]);
        let e = evaluated(&state, &l).await;
        state.apply(l.clone(), e.clone());
        let once = state.clone();

        let applied = state.apply(l, e);
        assert!(applied.replaced);
        assert_eq!(state, once);
    }

    #[tokio::test]
    async fn stale_replay_is_ignored() {
        let mut state = CoverageState::new("c1", roadmap(&[&["Heaps"]]));
        let l = lecture("a", 100, &["Heaps"]);
        let e = evaluated(&state, &l).await;
        state.apply(l.clone(), e.clone());

        let queue = state.mark_all_pending();
        assert_eq!(queue.len(), 1);

        // A fresh merge lands before the replay completes.
        state.apply(l, e.clone());
        assert!(!state.complete_replay("a", queue[0].revision, e));
        assert_eq!(state.pending_count(), 0);
    }

    #[tokio::test]
    async fn replay_queue_is_time_ordered() {
        let mut state = CoverageState::new("c1", roadmap(&[&["Heaps"]]));
        for l in [
            lecture("b", 100, &[]),
            lecture("c", 50, &[]),
            lecture("a", 100, &[]),
        ] {
            state.apply(l, LectureEvaluation::default());
        }
        let order: Vec<String> = state
            .mark_all_pending()
            .into_iter()
            .map(|p| p.lecture.lecture_id)
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn store_reports_unknown_course() {
        let store = CoverageStore::new();
        let err = store.get_state("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn held_lock_times_out_into_conflict() {
        let store = CoverageStore::new();
        assert!(store.try_create("c1", roadmap(&[&["Heaps"]])).await.is_none());
        assert!(store.try_create("c1", Roadmap::empty()).await.is_some());

        let retry = RetryConfig {
            max_attempts: 2,
            lock_timeout: Duration::from_millis(10),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let _held = store.lock("c1", &retry).await.unwrap();
        let err = store.lock("c1", &retry).await.unwrap_err();
        assert!(
            matches!(err, EngineError::Conflict { ref course_id, attempts: 2 } if course_id == "c1")
        );
    }

    #[tokio::test]
    async fn removed_course_is_not_handed_out() {
        let store = Arc::new(CoverageStore::new());
        store.try_create("c1", Roadmap::empty()).await;
        let retry = RetryConfig::default();

        let held = store.lock("c1", &retry).await.unwrap();
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.lock("c1", &RetryConfig::default()).await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        assert!(store.remove("c1").await);
        drop(held);

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_not_found());
        assert!(store.course_ids().await.is_empty());
    }
}
