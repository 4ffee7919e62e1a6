//! Application configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use cutlist_media::{ExportSettings, RenderConfig};
use serde::{Deserialize, Serialize};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// How FFmpeg is located and launched.
    pub render: RenderConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Preset used by `export` when none is given.
    pub default_preset: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "cutlist_media=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            logging: LoggingConfig::default(),
            default_preset: "youtube_1080p".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from `path`, or the standard location. A missing file
    /// yields the defaults; an unreadable or unparsable one is an error the
    /// caller reports once logging is up.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config at {}", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", config_path.display()))
    }

    /// The configured default preset, or YouTube 1080p if the name is unknown.
    pub fn default_settings(&self) -> ExportSettings {
        ExportSettings::preset(&self.default_preset).unwrap_or_else(|| {
            tracing::warn!(preset = %self.default_preset, "Unknown default preset");
            ExportSettings::youtube_1080p()
        })
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("cutlist")
        .join("config.json")
}
