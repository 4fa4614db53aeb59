//! Configuration management for prefixlog

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::logging::{ColourMode, DEFAULT_DATE_FORMAT};

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV_VAR: &str = "PREFIXLOG_CONFIG";

/// Console mirror settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Mirror records to stdout
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lowest severity shown on the console (default: "debug")
    #[serde(default = "default_console_level")]
    pub level: String,

    /// What gets coloured: "none", "level", "line" or "logger-name"
    #[serde(default = "default_colour_mode")]
    pub colour_mode: ColourMode,

    /// Escape sequence for the logger name, e.g. "\u001b[36m"
    #[serde(default)]
    pub logger_colour: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_console_level(),
            colour_mode: default_colour_mode(),
            logger_colour: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the dated log files; `~` is expanded
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    /// Log types to open, one file stream each. Each must name a severity.
    #[serde(default = "default_log_types")]
    pub log_types: Vec<String>,

    /// File extension of every stream (default: "log")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Files kept per log type, 0 keeps everything (default: 30)
    #[serde(default = "default_retention_count")]
    pub retention_count: usize,

    /// Nominal rotation cadence, e.g. "midnight", "D", "6H" (informational)
    #[serde(default = "default_rotation_interval")]
    pub rotation_interval: String,

    /// Encoding of the log files: "utf-8" or "ascii"
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Line template, see `SeverityFormatter`
    #[serde(default = "default_format")]
    pub format: String,

    /// strftime format for `{asctime}`
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Insert `[{name}]` after the first " | " of the format
    #[serde(default = "default_true")]
    pub show_logger_name: bool,

    /// Name files `{logger}_{logType}.{ext}` instead of `{logType}.{ext}`
    #[serde(default)]
    pub prefix_logger_name: bool,

    /// Severity colour table; when set it must define every key
    #[serde(default)]
    pub colours: Option<HashMap<String, String>>,

    #[serde(default)]
    pub console: ConsoleConfig,
}

fn default_true() -> bool {
    true
}

fn default_console_level() -> String {
    "debug".to_string()
}

fn default_colour_mode() -> ColourMode {
    ColourMode::Level
}

fn default_logs_dir() -> String {
    config_dir().join("logs").to_string_lossy().into_owned()
}

fn default_log_types() -> Vec<String> {
    ["debug", "info", "warning", "error", "critical"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_extension() -> String {
    "log".to_string()
}

fn default_retention_count() -> usize {
    30
}

fn default_rotation_interval() -> String {
    "midnight".to_string()
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_format() -> String {
    "{asctime} | [{levelname:>8}][{module}:{line}] | {message}".to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            log_types: default_log_types(),
            extension: default_extension(),
            retention_count: default_retention_count(),
            rotation_interval: default_rotation_interval(),
            encoding: default_encoding(),
            format: default_format(),
            date_format: default_date_format(),
            show_logger_name: true,
            prefix_logger_name: false,
            colours: None,
            console: ConsoleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, or return default if not found
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Logs directory with `~` and environment variables expanded
    pub fn logs_dir(&self) -> PathBuf {
        match shellexpand::full(&self.logs_dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                tracing::warn!("Could not expand logs_dir '{}': {}", self.logs_dir, e);
                PathBuf::from(shellexpand::tilde(&self.logs_dir).as_ref())
            }
        }
    }
}

/// Get the base configuration directory (~/.prefixlog)
/// Falls back to ./.prefixlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| PathBuf::from(".prefixlog"))
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".prefixlog"))
}

/// Path of the config file, honouring `PREFIXLOG_CONFIG`
pub fn config_file_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir().join("config.toml"))
}

/// Ensure the config and logs directories exist
pub fn ensure_directories(config: &Config) -> Result<()> {
    std::fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    std::fs::create_dir_all(config.logs_dir()).context("Failed to create logs directory")?;
    Ok(())
}
