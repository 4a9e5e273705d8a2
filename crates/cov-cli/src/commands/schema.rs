use cov_core::{LectureTopics, RoadmapEntry, SyllabusCoverageReport};
use schemars::schema_for;

use crate::cli::{GlobalFlags, SchemaArgs, SchemaKind};
use crate::output::output;

/// Handle `covr schema`.
pub fn handle(args: &SchemaArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&schema(args.kind), flags.format)
}

fn schema(kind: SchemaKind) -> schemars::Schema {
    match kind {
        SchemaKind::Roadmap => schema_for!(Vec<RoadmapEntry>),
        SchemaKind::Lecture => schema_for!(LectureTopics),
        SchemaKind::Report => schema_for!(SyllabusCoverageReport),
    }
}
