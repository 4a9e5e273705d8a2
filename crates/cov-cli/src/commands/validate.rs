use std::path::Path;

use anyhow::Context;
use cov_core::{Roadmap, RoadmapEntry, ingest};

use crate::cli::{GlobalFlags, ValidateRoadmapArgs};
use crate::output::output;

/// Handle `covr validate-roadmap`.
pub fn handle(args: &ValidateRoadmapArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    let roadmap = load_roadmap(&args.path)?;
    tracing::info!(
        days = roadmap.entries().len(),
        planned = roadmap.planned_count(),
        "roadmap is valid"
    );
    let entries: Vec<RoadmapEntry> = roadmap.into();
    output(&entries, flags.format)
}

/// Read a roadmap file, accepting raw model output around the JSON.
pub fn load_roadmap(path: &Path) -> anyhow::Result<Roadmap> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roadmap {}", path.display()))?;
    ingest::parse_roadmap(&text).with_context(|| format!("invalid roadmap {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn loads_fenced_planner_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.txt");
        std::fs::write(
            &path,
            "Here is the plan:\n```json\n[{\"day\": 1, \"main_topic\": \"Sorting\", \"subtopics\": [\"Merge sort\"]}]\n```\n",
        )
        .unwrap();

        let roadmap = load_roadmap(&path).unwrap();
        assert_eq!(
            roadmap.entries()[0].planned_topics,
            vec!["Sorting", "Merge sort"]
        );
    }

    #[test]
    fn duplicate_days_are_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.json");
        std::fs::write(
            &path,
            r#"[{"day_index": 1, "planned_topics": ["A"]}, {"day_index": 1, "planned_topics": ["B"]}]"#,
        )
        .unwrap();

        let err = load_roadmap(&path).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("dup.json"), "{message}");
        assert!(message.contains("duplicate"), "{message}");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_roadmap(&dir.path().join("absent.json")).is_err());
    }
}
