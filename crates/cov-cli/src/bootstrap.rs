use anyhow::Context;
use cov_config::CoverageConfig;

use crate::cli::GlobalFlags;

/// Load layered configuration and apply command-line overrides.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<CoverageConfig> {
    let mut config =
        CoverageConfig::load_with_dotenv().context("failed to load coverage configuration")?;
    if flags.no_semantic {
        config.matching.enable_semantic_tier = false;
    }
    tracing::debug!(
        semantic = config.matching.enable_semantic_tier,
        provider = ?config.embeddings.provider,
        "configuration loaded"
    );
    Ok(config)
}
