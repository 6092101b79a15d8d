//! Configuration for the auction house.
//!
//! The wire layer is the file format; [`HouseConfig::parse`] reads a config
//! file, accepting JSON first and falling back to YAML, and validates the
//! result. Components take the values they need from here instead of
//! hard-coding them.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

pub mod wire;

pub use wire::{
    DEFAULT_PROMOTION_BASE_DELAY_MS, DEFAULT_PROMOTION_INTERVAL_MS, DEFAULT_PROMOTION_MAX_RETRIES,
    DEFAULT_ROOT_PATH, HouseConfig, PromotionSettings,
};

impl HouseConfig {
    /// Attempts to decode the config first as JSON, then YAML, finally
    /// erroring if neither works.
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to find config at {}", &path.display()))?;
        Self::parse_str(contents)
    }

    /// Decode config file contents from a string.
    pub fn parse_str<S: AsRef<str>>(s: S) -> Result<Self> {
        let s = s.as_ref();
        let config: Self = match serde_json::from_str(s) {
            Ok(config) => config,
            Err(json_err) => serde_yaml::from_str(s).map_err(|yaml_err| {
                anyhow::anyhow!("config is neither JSON ({json_err}) nor YAML ({yaml_err})")
            })?,
        };
        config.validate()?;
        debug!(?config);
        Ok(config)
    }

    /// Reject values no component could run with.
    pub fn validate(&self) -> Result<()> {
        if self.root_path.trim().is_empty() {
            bail!("root_path is empty");
        }
        if !self.root_path.starts_with('/') {
            bail!("root_path must be absolute: '{}'", self.root_path);
        }
        if self.promotion.max_retries == 0 {
            bail!("promotion.max_retries must be at least 1");
        }
        if self.promotion.interval_ms == 0 {
            bail!("promotion.interval_ms must be positive");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HouseConfig::default();
        assert_eq!(config.root_path, "/auctions");
        assert_eq!(config.promotion.max_retries, 5);
        assert_eq!(config.promotion.base_delay_ms, 25);
        assert_eq!(config.promotion.interval_ms, 250);
        assert_eq!(config.barrier_wait_secs, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_object_uses_defaults() {
        let config = HouseConfig::parse_str("{}").unwrap();
        assert_eq!(config, HouseConfig::default());
    }

    #[test]
    fn test_parse_yaml_overrides() {
        let config = HouseConfig::parse_str(
            r#"
root_path: /myorg/house
promotion:
  max_retries: 3
barrier_wait_secs: 30
"#,
        )
        .unwrap();
        assert_eq!(config.root_path, "/myorg/house");
        assert_eq!(config.promotion.max_retries, 3);
        // Unset promotion fields still default.
        assert_eq!(config.promotion.base_delay_ms, 25);
        assert_eq!(config.barrier_wait_secs, Some(30));
    }

    #[test]
    fn test_parse_json() {
        let config =
            HouseConfig::parse_str(r#"{"root_path": "/json/house"}"#).unwrap();
        assert_eq!(config.root_path, "/json/house");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(HouseConfig::parse_str(": not : valid : [").is_err());
    }

    #[test]
    fn test_validate_rejects_relative_root() {
        let config = HouseConfig {
            root_path: "auctions".into(),
            ..HouseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut config = HouseConfig::default();
        config.promotion.max_retries = 0;
        assert!(config.validate().is_err());
    }
}
