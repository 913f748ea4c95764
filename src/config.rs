//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document yields the
//! standard behavior:
//!
//! ```toml
//! mode = "fixed_template"
//!
//! [generator]
//! batch_size = 20
//! batch_delay_ms = 100
//! first_week = 1
//! last_week = 52
//!
//! [retry]
//! max_attempts = 3
//! backoff_ms = 150
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::models::WEEKS_PER_YEAR;

/// How a schedule's weekly grid is maintained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// Lessons are placed from the recurring template; the synchronizer is active.
    #[default]
    FixedTemplate,
    /// Lessons are placed by hand; the synchronizer does nothing.
    Flexible,
}

/// Batch generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Creates issued per batch.
    pub batch_size: usize,
    /// Pause between batches (ms).
    pub batch_delay_ms: u64,
    /// First calendar week to generate.
    pub first_week: u32,
    /// Last calendar week to generate (inclusive).
    pub last_week: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            batch_delay_ms: 100,
            first_week: 1,
            last_week: WEEKS_PER_YEAR,
        }
    }
}

/// Retry policy for writes that race against superseding requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts (ms).
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 150,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: ScheduleMode,
    pub generator: GeneratorConfig,
    pub retry: RetryPolicy,
}

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl EngineConfig {
    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generator;
        if g.batch_size == 0 {
            return Err(ConfigError::Invalid("generator.batch_size must be > 0".into()));
        }
        if g.first_week == 0 || g.last_week > WEEKS_PER_YEAR || g.first_week > g.last_week {
            return Err(ConfigError::Invalid(format!(
                "generator week range {}..={} must lie within 1..={}",
                g.first_week, g.last_week, WEEKS_PER_YEAR
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        Ok(())
    }
}
