//! Severity levels and the record handed to sinks and formatters

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};

use super::error::LogError;

/// Severity of a log record, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Every severity, least severe first
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Level name as it appears in rendered lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Lowercase tag used in log file names (e.g. `error.log`)
    pub fn tag(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Find the first known severity tag contained in `name`
    ///
    /// Most severe tags are tried first, so `critical_error` resolves to critical.
    pub fn detect(name: &str) -> Option<Severity> {
        let lowered = name.to_ascii_lowercase();
        Severity::ALL
            .iter()
            .rev()
            .copied()
            .find(|s| lowered.contains(s.tag()))
    }

    /// Check if this level is a warning or worse (for alerts)
    pub fn is_alert(&self) -> bool {
        *self >= Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            other => Err(LogError::config(format!("Unknown severity '{}'", other))),
        }
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

/// A single structured record before rendering
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Wall-clock time the record was emitted; also drives rollover checks
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    /// Name of the logger that produced the record
    pub logger: String,
    pub message: String,
    /// Module path of the call site
    pub module: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl LogRecord {
    /// Create a record stamped with the current local time
    pub fn new(severity: Severity, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            logger: logger.into(),
            message: message.into(),
            module: None,
            file: None,
            line: None,
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a source location
    pub fn with_location(
        mut self,
        module: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        self.module = Some(module.into());
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}
