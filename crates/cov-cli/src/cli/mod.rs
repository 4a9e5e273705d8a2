use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output mode shared by all commands.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Raw,
}

/// Global flags available before or after subcommands.
#[derive(Clone, Debug)]
pub struct GlobalFlags {
    pub format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_semantic: bool,
}

/// Top-level CLI parser for the `covr` binary.
#[derive(Debug, Parser)]
#[command(name = "covr", version, about = "Syllabus coverage reconciliation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Exact and fuzzy matching only; never call an embedding provider
    #[arg(long, global = true)]
    pub no_semantic: bool,
}

impl Cli {
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
            no_semantic: self.no_semantic,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge lecture files into a roadmap and print the coverage report
    Report(ReportArgs),

    /// Validate a roadmap file and print it in canonical form
    ValidateRoadmap(ValidateRoadmapArgs),

    /// Print the JSON Schema of an external contract
    Schema(SchemaArgs),
}

#[derive(Debug, clap::Args)]
pub struct ReportArgs {
    /// Course identifier
    #[arg(short, long, default_value = "course")]
    pub course: String,

    /// Roadmap file (canonical JSON or raw model output)
    #[arg(short, long)]
    pub roadmap: PathBuf,

    /// Lecture topic files, merged in the order given
    #[arg(short, long = "lecture")]
    pub lectures: Vec<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct ValidateRoadmapArgs {
    /// Roadmap file (canonical JSON or raw model output)
    pub path: PathBuf,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SchemaKind {
    Roadmap,
    Lecture,
    Report,
}

#[derive(Debug, clap::Args)]
pub struct SchemaArgs {
    /// Contract to describe
    #[arg(value_enum)]
    pub kind: SchemaKind,
}
