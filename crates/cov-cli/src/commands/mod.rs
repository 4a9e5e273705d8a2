pub mod report;
pub mod schema;
pub mod validate;

use crate::cli::{Commands, GlobalFlags};

/// Route a parsed command to its handler.
pub async fn dispatch(command: Commands, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Report(args) => report::handle(&args, flags).await,
        Commands::ValidateRoadmap(args) => validate::handle(&args, flags),
        Commands::Schema(args) => schema::handle(&args, flags),
    }
}
