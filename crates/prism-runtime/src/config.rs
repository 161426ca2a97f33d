//! Configuration for the error handler.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::RuntimeError;

/// Error handler configuration.
///
/// Missing keys in a config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Count at which a kind is reported as frequent
    pub frequent_threshold: u32,

    /// Count at which a kind blocks recovery
    pub critical_threshold: u32,

    /// Longest rendered context written to the log
    pub max_context_chars: usize,

    /// Size of the recent-event journal
    pub max_recent_events: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            frequent_threshold: 5,
            critical_threshold: 10,
            max_context_chars: 200,
            max_recent_events: 100,
        }
    }
}

impl ResilienceConfig {
    /// Parse and validate a config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuntimeError> {
        let config: ResilienceConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    fn validate(&self) -> Result<(), RuntimeError> {
        if self.frequent_threshold == 0 {
            return Err(RuntimeError::InvalidConfig(
                "frequent_threshold must be at least 1".to_string(),
            ));
        }
        if self.critical_threshold < self.frequent_threshold {
            return Err(RuntimeError::InvalidConfig(format!(
                "critical_threshold ({}) must not be below frequent_threshold ({})",
                self.critical_threshold, self.frequent_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ResilienceConfig::default();
        assert_eq!(config.frequent_threshold, 5);
        assert_eq!(config.critical_threshold, 10);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = ResilienceConfig::from_yaml("max_context_chars: 80\n").unwrap();
        assert_eq!(config.max_context_chars, 80);
        assert_eq!(config.max_recent_events, 100);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let yaml = "frequent_threshold: 8\ncritical_threshold: 3\n";
        assert!(matches!(
            ResilienceConfig::from_yaml(yaml),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(ResilienceConfig::from_yaml("frequent_threshold: 0\n").is_err());
    }
}
