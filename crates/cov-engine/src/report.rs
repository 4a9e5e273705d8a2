//! Report builder: a pure projection of [`CoverageState`].

use cov_core::{DayCoverage, DayStatus, SyllabusCoverageReport, UnplannedTopic};

use crate::state::CoverageState;

/// Render a course's coverage. Never mutates `state`.
///
/// `percent_covered` is covered over planned topics; a roadmap with no planned
/// topics is trivially fully covered (`1.0`).
#[must_use]
pub fn build_report(state: &CoverageState) -> SyllabusCoverageReport {
    let roadmap = state.roadmap();

    let mut covered_topics = Vec::new();
    let mut missing_topics = Vec::new();
    for planned in roadmap.planned_topics() {
        if state.accepted(planned.topic).is_some() {
            covered_topics.push(planned.phrase.clone());
        } else {
            missing_topics.push(planned.phrase.clone());
        }
    }

    let per_day_breakdown = roadmap
        .entries()
        .iter()
        .map(|entry| {
            let total_count = count(entry.planned_topics.len());
            let covered_count = count(
                state
                    .matches()
                    .filter(|m| m.topic.day_index == entry.day_index)
                    .count(),
            );
            DayCoverage {
                day_index: entry.day_index,
                week_label: entry.week_label.clone(),
                covered_count,
                total_count,
                status: DayStatus::from_counts(covered_count, total_count),
            }
        })
        .collect();

    let total = count(roadmap.planned_count());
    let percent_covered = if total == 0 {
        1.0
    } else {
        f64::from(count(covered_topics.len())) / f64::from(total)
    };

    let mut lectures: Vec<_> = state.contributions().collect();
    lectures.sort_by(|a, b| {
        a.lecture()
            .timestamp
            .cmp(&b.lecture().timestamp)
            .then_with(|| a.lecture().lecture_id.cmp(&b.lecture().lecture_id))
    });
    let unplanned_topics = lectures
        .iter()
        .filter_map(|c| Some((c.lecture(), c.evaluation()?)))
        .flat_map(|(lecture, evaluation)| {
            evaluation.unplanned.iter().map(|topic| UnplannedTopic {
                lecture_id: lecture.lecture_id.clone(),
                topic: topic.clone(),
            })
        })
        .collect();

    SyllabusCoverageReport {
        course_id: state.course_id().to_string(),
        percent_covered,
        covered_topics,
        missing_topics,
        per_day_breakdown,
        matches: state.matches().cloned().collect(),
        unplanned_topics,
        lectures_merged: count(state.lecture_count()),
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
