//! Matcher thresholds and tier switches.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const fn default_fuzzy_threshold() -> f64 {
    0.8
}

const fn default_semantic_threshold() -> f64 {
    0.75
}

const fn default_enable_semantic_tier() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Minimum token-overlap / edit similarity for a fuzzy match.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Minimum embedding cosine similarity for a semantic match.
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,

    /// Whether the semantic tier may run at all. Off means fully offline and deterministic.
    #[serde(default = "default_enable_semantic_tier")]
    pub enable_semantic_tier: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            semantic_threshold: default_semantic_threshold(),
            enable_semantic_tier: default_enable_semantic_tier(),
        }
    }
}

impl MatchingConfig {
    /// Check that both thresholds lie in `(0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("matching.fuzzy_threshold", self.fuzzy_threshold)?;
        check_threshold("matching.semantic_threshold", self.semantic_threshold)
    }
}

fn check_threshold(field: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("{value} is outside (0, 1]"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = MatchingConfig::default();
        assert!((config.fuzzy_threshold - 0.8).abs() < f64::EPSILON);
        assert!((config.semantic_threshold - 0.75).abs() < f64::EPSILON);
        assert!(config.enable_semantic_tier);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let zero = MatchingConfig {
            fuzzy_threshold: 0.0,
            ..MatchingConfig::default()
        };
        assert!(zero.validate().is_err());

        let above_one = MatchingConfig {
            semantic_threshold: 1.2,
            ..MatchingConfig::default()
        };
        assert!(
            matches!(above_one.validate(), Err(ConfigError::InvalidValue { ref field, .. }) if field == "matching.semantic_threshold")
        );

        let nan = MatchingConfig {
            fuzzy_threshold: f64::NAN,
            ..MatchingConfig::default()
        };
        assert!(nan.validate().is_err());
    }
}
