//! Module settings and configuration.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Environment variable naming an optional TOML settings file.
pub const SETTINGS_PATH_ENV: &str = "TRELLIS_MODULE_CONFIG";

/// Environment variable overriding the log filter.
pub const LOG_FILTER_ENV: &str = "TRELLIS_MODULE_LOG";

/// Environment variable forcing debug logging.
pub const DEBUG_ENV: &str = "TRELLIS_MODULE_DEBUG";

/// Module settings
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSettings {
    /// Log filter directive (env_logger syntax)
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            debug: false,
        }
    }
}

/// Settings loading errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ModuleSettings {
    /// Load settings from the file named by `TRELLIS_MODULE_CONFIG`, then
    /// apply environment overrides. A missing variable or file means
    /// defaults.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match std::env::var_os(SETTINGS_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Parse settings from one TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
            if !filter.is_empty() {
                self.log_filter = filter;
            }
        }
        if let Ok(value) = std::env::var(DEBUG_ENV) {
            self.debug = matches!(value.as_str(), "1" | "true" | "yes");
        }
    }

    /// Effective filter handed to the logger.
    pub fn effective_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_filter
        }
    }
}
