//! YAML configuration of the collection sets.
//!
//! The document is a top-level sequence of sets:
//!
//! ```yaml
//! - name: svc-a
//!   frequency: 5
//!   endpoints:
//!     - name: temp
//!       description: Temperature in celsius
//!       url: http://sensor/temp
//!       type: number
//!   dest:
//!     url: http://sink/x
//!     method: POST
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::set::CollectionSet;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Validated list of collection sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    /// Sets in declaration order.
    pub sets: Vec<CollectionSet>,
}

impl Config {
    /// Read, parse and validate the YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading collection sets");
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Parse and validate a YAML document.
    ///
    /// An empty document yields an empty configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }

        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every set and the uniqueness of set names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sets(&self.sets)
    }
}

/// Validate a list of sets: each set on its own, then uniqueness of names.
pub fn validate_sets(sets: &[CollectionSet]) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for set in sets {
        set.validate().map_err(ConfigError::Validation)?;

        if !seen_names.insert(set.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate set name: '{}'",
                set.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::{Destination, EndpointType};

    const SAMPLE: &str = r#"
- name: svc-a
  frequency: 5
  endpoints:
    - name: temp
      description: Temperature in celsius
      url: http://sensor/temp
      type: number
    - name: status
      url: http://sensor/status
      type: text
  dest:
    url: http://sink/x
    method: POST
- name: svc-b
  endpoints:
    - name: temp
      url: http://other/temp
      type: number
"#;

    #[test]
    fn parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(2, config.sets.len());

        let a = &config.sets[0];
        assert_eq!("svc-a", a.name);
        assert_eq!(5, a.frequency_seconds);
        assert_eq!(2, a.endpoints.len());
        assert_eq!(EndpointType::Number, a.endpoints[0].kind);
        assert_eq!("Temperature in celsius", a.endpoints[0].description);
        assert_eq!(EndpointType::Text, a.endpoints[1].kind);
        assert_eq!(Destination::new("POST", "http://sink/x"), a.destination);

        let b = &config.sets[1];
        assert_eq!(0, b.frequency_seconds);
        assert!(!b.destination.is_configured());
    }

    #[test]
    fn empty_document() {
        assert!(Config::from_yaml("").unwrap().sets.is_empty());
        assert!(Config::from_yaml("  \n").unwrap().sets.is_empty());
    }

    #[test]
    fn reject_duplicate_set_names() {
        let yaml = "- name: a\n- name: a\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("duplicate set name")));
    }

    #[test]
    fn reject_unknown_endpoint_type() {
        let yaml = "- name: a\n  endpoints:\n    - name: x\n      url: http://x\n      type: blob\n";
        assert!(matches!(
            Config::from_yaml(yaml).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn reject_negative_frequency() {
        let yaml = "- name: a\n  frequency: -1\n";
        assert!(matches!(
            Config::from_yaml(yaml).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/xn2.yaml").unwrap_err(),
            ConfigError::Io(_)
        ));
    }
}
