// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! The region name and capacity are configuration values handed to the writer
//! and reader constructors. Any invalid field results in a HardValidationError.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HardValidationError, ShmexError, ShmexResult};
use crate::types::{Capacity, RegionName};

/// Upper bound for `reader.wait_timeout_ms`.
const MAX_WAIT_TIMEOUT_MS: u64 = 60_000;

/// Upper bound for `reader.poll_interval_ms`.
const MAX_POLL_INTERVAL_MS: u64 = 1_000;

/// Raw region section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRegionConfig {
    #[serde(default = "default_region_name")]
    name: String,
    #[serde(default = "default_capacity")]
    capacity_bytes: u64,
}

fn default_region_name() -> String {
    "example".to_string()
}

fn default_capacity() -> u64 {
    1000
}

impl Default for RawRegionConfig {
    fn default() -> Self {
        Self {
            name: default_region_name(),
            capacity_bytes: default_capacity(),
        }
    }
}

/// Raw reader section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReaderConfig {
    #[serde(default)]
    wait_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for RawReaderConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 0,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    region: RawRegionConfig,
    #[serde(default)]
    reader: RawReaderConfig,
}

/// Validated region configuration shared by writer and reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    pub name: RegionName,
    pub capacity: Capacity,
}

/// Validated reader configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// How long a reader waits for a complete frame. Zero fails immediately.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

/// Complete validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub region: RegionConfig,
    pub reader: ReaderConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> ShmexResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ShmexError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ShmexError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Built-in configuration: region `example` of 1000 bytes, no waiting.
    pub fn defaults() -> ShmexResult<Config> {
        Self::validate(RawConfig::default())
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> ShmexResult<Config> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Self::defaults();
        }

        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ShmexError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> ShmexResult<Config> {
        let region = Self::validate_region(raw.region)?;
        let reader = Self::validate_reader(raw.reader)?;

        Ok(Config { region, reader })
    }

    fn validate_region(raw: RawRegionConfig) -> ShmexResult<RegionConfig> {
        let name = RegionName::new(raw.name)?;
        let capacity = Capacity::new(raw.capacity_bytes)?;

        Ok(RegionConfig { name, capacity })
    }

    fn validate_reader(raw: RawReaderConfig) -> ShmexResult<ReaderConfig> {
        if raw.wait_timeout_ms > MAX_WAIT_TIMEOUT_MS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "wait_timeout_ms",
                value: raw.wait_timeout_ms.to_string(),
                reason: format!("Must not exceed {}ms", MAX_WAIT_TIMEOUT_MS),
            }
            .into());
        }

        if raw.poll_interval_ms == 0 || raw.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "poll_interval_ms",
                value: raw.poll_interval_ms.to_string(),
                reason: format!("Must be between 1 and {}ms", MAX_POLL_INTERVAL_MS),
            }
            .into());
        }

        Ok(ReaderConfig {
            wait_timeout: Duration::from_millis(raw.wait_timeout_ms),
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let yaml = r#"
region:
  name: auth-token
  capacity_bytes: 4096
reader:
  wait_timeout_ms: 500
  poll_interval_ms: 20
"#;
        let config = ConfigLoader::load_string(yaml).unwrap();
        assert_eq!(config.region.name.as_str(), "auth-token");
        assert_eq!(config.region.capacity.bytes(), 4096);
        assert_eq!(config.reader.wait_timeout, Duration::from_millis(500));
        assert_eq!(config.reader.poll_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_defaults_applied() {
        let config = ConfigLoader::load_string("region:\n  name: other\n").unwrap();
        assert_eq!(config.region.capacity.bytes(), 1000);
        assert_eq!(config.reader.wait_timeout, Duration::ZERO);
        assert_eq!(config.reader.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = ConfigLoader::load_string("").unwrap();
        assert_eq!(config, ConfigLoader::defaults().unwrap());
        assert_eq!(config.region.name.as_str(), "example");
        assert_eq!(config.region.capacity.bytes(), 1000);
    }

    #[test]
    fn test_zero_capacity() {
        let yaml = r#"
region:
  capacity_bytes: 0
"#;
        let result = ConfigLoader::load_string(yaml);
        assert!(matches!(
            result,
            Err(ShmexError::HardValidation(HardValidationError::InvalidFieldValue {
                field: "capacity_bytes",
                ..
            }))
        ));
    }

    #[test]
    fn test_invalid_region_name() {
        let yaml = r#"
region:
  name: "bad/name"
"#;
        assert!(matches!(
            ConfigLoader::load_string(yaml),
            Err(ShmexError::HardValidation(HardValidationError::InvalidFieldValue {
                field: "region_name",
                ..
            }))
        ));
    }

    #[test]
    fn test_wait_timeout_too_high() {
        let yaml = r#"
reader:
  wait_timeout_ms: 600000
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_poll_interval_zero() {
        let yaml = r#"
reader:
  poll_interval_ms: 0
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
region:
  name: example
  size: 10
"#;
        assert!(matches!(
            ConfigLoader::load_string(yaml),
            Err(ShmexError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::load_file("/nonexistent/shmex.yaml");
        assert!(matches!(result, Err(ShmexError::ConfigNotFound { .. })));
    }
}
