//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for safe, sandboxed file and env var manipulation.

use cov_config::{ConfigError, CoverageConfig, EmbeddingProvider};
use figment::{
    Figment, Jail,
    providers::{Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;

#[test]
fn loads_matching_config_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[matching]
fuzzy_threshold = 0.9
semantic_threshold = 0.7
enable_semantic_tier = false
"#,
        )?;

        let config: CoverageConfig = Figment::from(Serialized::defaults(CoverageConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert!((config.matching.fuzzy_threshold - 0.9).abs() < f64::EPSILON);
        assert!((config.matching.semantic_threshold - 0.7).abs() < f64::EPSILON);
        assert!(!config.matching.enable_semantic_tier);
        Ok(())
    });
}

#[test]
fn partial_sections_keep_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[locking]
max_attempts = 7

[embeddings]
provider = "none"
"#,
        )?;

        let config: CoverageConfig = Figment::from(Serialized::defaults(CoverageConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.locking.max_attempts, 7);
        assert_eq!(config.locking.lock_timeout_ms, 250);
        assert_eq!(config.embeddings.provider, EmbeddingProvider::Disabled);
        assert_eq!(config.embeddings.cache_capacity, 1024);
        assert!((config.matching.fuzzy_threshold - 0.8).abs() < f64::EPSILON);
        Ok(())
    });
}

#[test]
fn project_config_is_picked_up_by_load() {
    Jail::expect_with(|jail| {
        jail.create_dir(".coverage")?;
        jail.create_file(
            ".coverage/config.toml",
            r#"
[embeddings]
provider = "fastembed"
cache_dir = "/tmp/models"
"#,
        )?;

        let config = CoverageConfig::load().expect("config loads");
        assert_eq!(config.embeddings.provider, EmbeddingProvider::Fastembed);
        assert_eq!(config.embeddings.cache_dir, "/tmp/models");
        Ok(())
    });
}

#[test]
fn invalid_threshold_fails_load() {
    Jail::expect_with(|jail| {
        jail.create_dir(".coverage")?;
        jail.create_file(
            ".coverage/config.toml",
            r#"
[matching]
fuzzy_threshold = 1.5
"#,
        )?;

        let err = CoverageConfig::load().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "matching.fuzzy_threshold"),
            "got {err:?}"
        );
        Ok(())
    });
}
