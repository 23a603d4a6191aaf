//! Configuration management
//!
//! Driver-wide settings loaded from a TOML file. Per-device options are not
//! part of this file; they arrive as [`crate::options::OptionMap`] when a
//! device is opened.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod types;

pub use types::{LoggingConfig, ScrollConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Wheel scroll configuration
    #[serde(default)]
    pub scroll: ScrollConfig,
}

impl DriverConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: DriverConfig =
            toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        for (axis, distance) in [
            ("horizontal", self.scroll.horizontal_distance),
            ("vertical", self.scroll.vertical_distance),
        ] {
            if !(distance.is_finite() && distance > 0.0) {
                anyhow::bail!("Invalid {} scroll distance: {}", axis, distance);
            }
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, log_format: Option<String>, log_file: Option<&Path>) -> Self {
        if let Some(format) = log_format {
            self.logging.format = format;
        }
        if let Some(file) = log_file {
            self.logging.file = Some(file.to_path_buf());
        }
        self
    }
}
