//! # Configuration
//!
//! Split settings and process configuration, loaded from the environment
//! (after `.env`) with an optional YAML settings file.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Bounded the delivery interval
//! - 1.0.0: Initial release

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Default maximum characters per segment
pub const DEFAULT_MAX_CHARS: usize = 100;
/// Default seconds between consecutive deliveries
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
/// Longest accepted spacing between deliveries (one week)
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;
/// Default prefix for delivery titles
pub const DEFAULT_TITLE_PREFIX: &str = "Part";

/// Read-only settings consumed by the splitter and the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfiguration {
    /// Maximum characters per segment
    pub max_chars: usize,

    /// Seconds between consecutive deliveries
    pub interval_secs: u64,

    /// Prefix used to build each item's title
    pub title_prefix: String,
}

impl Default for SplitConfiguration {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
        }
    }
}

impl SplitConfiguration {
    /// Load settings from a YAML file; missing keys fall back to defaults
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {path}"))?;
        let config: SplitConfiguration = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(anyhow::anyhow!("max_chars must be greater than zero"));
        }
        if self.title_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("title_prefix must not be blank"));
        }
        if self.interval_secs > MAX_INTERVAL_SECS {
            return Err(anyhow::anyhow!(
                "interval_secs must be at most {MAX_INTERVAL_SECS}, got {}",
                self.interval_secs
            ));
        }
        Ok(())
    }

    /// Spacing between consecutive target times
    ///
    /// `None` when `interval_secs` does not fit a [`chrono::TimeDelta`].
    pub fn interval(&self) -> Option<chrono::TimeDelta> {
        i64::try_from(self.interval_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
    }
}

/// Process-level configuration for the binary
#[derive(Debug, Clone)]
pub struct Config {
    pub split: SplitConfiguration,
    pub log_level: String,
}

impl Config {
    /// Build configuration from `BANDSPLIT_*` variables
    ///
    /// `BANDSPLIT_CONFIG` names an optional YAML file read first; individual
    /// variables override its values.
    pub fn from_env() -> Result<Self> {
        let mut split = match env::var("BANDSPLIT_CONFIG") {
            Ok(path) => SplitConfiguration::load(&path)?,
            Err(_) => SplitConfiguration::default(),
        };

        if let Ok(value) = env::var("BANDSPLIT_MAX_CHARS") {
            split.max_chars = value
                .parse()
                .context("BANDSPLIT_MAX_CHARS must be a positive integer")?;
        }
        if let Ok(value) = env::var("BANDSPLIT_INTERVAL_SECS") {
            split.interval_secs = value
                .parse()
                .context("BANDSPLIT_INTERVAL_SECS must be a whole number of seconds")?;
        }
        if let Ok(value) = env::var("BANDSPLIT_TITLE_PREFIX") {
            split.title_prefix = value;
        }
        split.validate()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Config { split, log_level })
    }
}
