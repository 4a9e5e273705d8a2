use std::path::Path;

use anyhow::Context;
use chrono::{TimeZone, Utc};
use cov_config::CoverageConfig;
use cov_core::{LectureTopics, SyllabusCoverageReport, ingest};
use cov_engine::Reconciler;

use crate::bootstrap::load_config;
use crate::cli::{GlobalFlags, ReportArgs};
use crate::commands::validate::load_roadmap;
use crate::output::output;

/// Handle `covr report`.
pub async fn handle(args: &ReportArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    let config = load_config(flags)?;
    let report = run_report(args, &config).await?;
    output(&report, flags.format)
}

/// Build the engine from `config`, merge every lecture file, and report.
pub async fn run_report(
    args: &ReportArgs,
    config: &CoverageConfig,
) -> anyhow::Result<SyllabusCoverageReport> {
    let reconciler =
        Reconciler::from_config(config).context("failed to initialize the coverage engine")?;

    let roadmap = load_roadmap(&args.roadmap)?;
    reconciler
        .set_roadmap(&args.course, roadmap)
        .await
        .context("failed to install roadmap")?;

    for (position, path) in args.lectures.iter().enumerate() {
        let lecture = load_lecture(path, position)?;
        let outcome = reconciler
            .merge_lecture(&args.course, lecture)
            .await
            .with_context(|| format!("failed to merge {}", path.display()))?;
        tracing::info!(
            lecture_id = %outcome.lecture_id,
            accepted = outcome.accepted,
            unplanned = outcome.unplanned,
            "merged lecture file"
        );
    }

    Ok(reconciler.report(&args.course).await?)
}

/// Read one lecture file.
///
/// A file carrying both `lecture_id` and `timestamp` is taken as is.
/// Otherwise the id is the file stem and the timestamp is the file's position
/// on the command line, so files given earlier count as taught earlier.
fn load_lecture(path: &Path, position: usize) -> anyhow::Result<LectureTopics> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read lecture {}", path.display()))?;
    let value = ingest::extract_json_payload(&text)
        .with_context(|| format!("no JSON in lecture {}", path.display()))?;

    if value.get("lecture_id").is_some() && value.get("timestamp").is_some() {
        let lecture: LectureTopics = serde_json::from_value(value)
            .with_context(|| format!("invalid lecture {}", path.display()))?;
        lecture.validate()?;
        return Ok(lecture);
    }

    let lecture_id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("cannot derive a lecture id from {}", path.display()))?;
    let timestamp = Utc
        .timestamp_opt(i64::try_from(position)?, 0)
        .single()
        .context("lecture position out of range")?;

    ingest::lecture_from_value(lecture_id, timestamp, value)
        .with_context(|| format!("invalid lecture {}", path.display()))
}
