//! Wire representation of the auction-house configuration file.
//!
//! Everything here is optional in the file; defaults keep a bare config (or
//! no config at all) runnable. Durations are carried as integer milliseconds
//! or seconds on the wire and converted by the typed layer.

use serde::{Deserialize, Serialize};

/// Default store namespace the auction tree lives under.
pub const DEFAULT_ROOT_PATH: &str = "/auctions";

/// Default maximum attempts for a contended promotion.
pub const DEFAULT_PROMOTION_MAX_RETRIES: u32 = 5;

/// Default base delay between promotion attempts, in milliseconds.
pub const DEFAULT_PROMOTION_BASE_DELAY_MS: u64 = 25;

/// Default interval between promotion sweeps, in milliseconds.
pub const DEFAULT_PROMOTION_INTERVAL_MS: u64 = 250;

/// Top-level config file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseConfig {
    /// Store namespace the auction tree lives under.
    #[serde(default = "default_root_path")]
    pub root_path: String,
    /// Promotion retry tuning.
    #[serde(default)]
    pub promotion: PromotionSettings,
    /// Upper bound on a bidder's barrier wait, in seconds. Absent means
    /// wait indefinitely.
    #[serde(default)]
    pub barrier_wait_secs: Option<u64>,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            promotion: PromotionSettings::default(),
            barrier_wait_secs: None,
        }
    }
}

/// Promotion retry and sweep tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionSettings {
    /// Maximum attempts before a contended promotion is aborted.
    #[serde(default = "default_promotion_max_retries")]
    pub max_retries: u32,
    /// Base delay between attempts (exponential backoff), in milliseconds.
    #[serde(default = "default_promotion_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Interval between promotion sweeps, in milliseconds.
    #[serde(default = "default_promotion_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PromotionSettings {
    fn default() -> Self {
        Self {
            max_retries: default_promotion_max_retries(),
            base_delay_ms: default_promotion_base_delay_ms(),
            interval_ms: default_promotion_interval_ms(),
        }
    }
}

pub fn default_root_path() -> String {
    DEFAULT_ROOT_PATH.to_owned()
}

pub const fn default_promotion_max_retries() -> u32 {
    DEFAULT_PROMOTION_MAX_RETRIES
}

pub const fn default_promotion_base_delay_ms() -> u64 {
    DEFAULT_PROMOTION_BASE_DELAY_MS
}

pub const fn default_promotion_interval_ms() -> u64 {
    DEFAULT_PROMOTION_INTERVAL_MS
}
