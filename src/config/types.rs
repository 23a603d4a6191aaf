//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::input::DEFAULT_SCROLL_DISTANCE;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    pub format: String,

    /// Log file in addition to stderr (None = console only)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Wheel scroll configuration applied to every device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Horizontal distance per wheel step
    pub horizontal_distance: f64,

    /// Vertical distance per wheel step
    pub vertical_distance: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            horizontal_distance: DEFAULT_SCROLL_DISTANCE,
            vertical_distance: DEFAULT_SCROLL_DISTANCE,
        }
    }
}
