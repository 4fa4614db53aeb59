//! Date-prefixed rotating file sink
//!
//! Callers name a stable logical file (`data/logs/error.log`); the sink
//! physically writes to `data/logs/{YYYY-MM-DD}.error.log` and moves to a new
//! file the first time it is asked to roll over on a new local calendar date.
//! There is no timer: the owner checks [`RotatingLogSink::should_rollover`]
//! before writing.

use std::borrow::Cow;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};

use super::error::{LogError, Result};
use super::record::Severity;
use super::retention::{self, SweepReport, DATE_PREFIX_FORMAT};

/// Extension used when the base file name has none
const DEFAULT_EXTENSION: &str = "log";

/// Unit of the nominal rotation cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Midnight,
    /// Weekday rollover, 0 = Monday
    Weekday(u8),
}

/// Nominal rotation cadence
///
/// Informational only: rollover is triggered by the date prefix changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationInterval {
    pub unit: IntervalUnit,
    pub every: u32,
}

impl Default for RotationInterval {
    fn default() -> Self {
        Self {
            unit: IntervalUnit::Midnight,
            every: 1,
        }
    }
}

impl FromStr for RotationInterval {
    type Err = LogError;

    /// Accepts an optional count followed by `S`, `M`, `H`, `D`, `midnight` or `W0`-`W6`
    fn from_str(s: &str) -> Result<Self> {
        let spec = s.trim();
        let digits = spec.chars().take_while(|c| c.is_ascii_digit()).count();
        let (count, unit) = spec.split_at(digits);

        let every = if count.is_empty() {
            1
        } else {
            count
                .parse::<u32>()
                .map_err(|_| LogError::config(format!("Invalid interval count in '{}'", s)))?
        };
        if every == 0 {
            return Err(LogError::config(format!("Interval '{}' must be at least 1", s)));
        }

        let unit = match unit.to_ascii_lowercase().as_str() {
            "s" => IntervalUnit::Seconds,
            "m" => IntervalUnit::Minutes,
            "h" => IntervalUnit::Hours,
            "d" => IntervalUnit::Days,
            "midnight" => IntervalUnit::Midnight,
            w if w.len() == 2 && w.starts_with('w') => match w.as_bytes()[1] {
                day @ b'0'..=b'6' => IntervalUnit::Weekday(day - b'0'),
                _ => return Err(LogError::config(format!("Invalid weekday interval '{}'", s))),
            },
            _ => return Err(LogError::config(format!("Unknown rotation interval '{}'", s))),
        };

        Ok(Self { unit, every })
    }
}

impl fmt::Display for RotationInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            IntervalUnit::Seconds => "S".to_string(),
            IntervalUnit::Minutes => "M".to_string(),
            IntervalUnit::Hours => "H".to_string(),
            IntervalUnit::Days => "D".to_string(),
            IntervalUnit::Midnight => "midnight".to_string(),
            IntervalUnit::Weekday(day) => format!("W{}", day),
        };
        if self.every == 1 {
            f.write_str(&unit)
        } else {
            write!(f, "{}{}", self.every, unit)
        }
    }
}

/// Text encoding applied to lines before they hit the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// Non-ASCII characters are replaced with `?`
    Ascii,
}

impl Encoding {
    fn encode<'a>(&self, line: &'a str) -> Cow<'a, str> {
        match self {
            Encoding::Utf8 => Cow::Borrowed(line),
            Encoding::Ascii if line.is_ascii() => Cow::Borrowed(line),
            Encoding::Ascii => Cow::Owned(
                line.chars()
                    .map(|c| if c.is_ascii() { c } else { '?' })
                    .collect(),
            ),
        }
    }
}

impl FromStr for Encoding {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            other => Err(LogError::config(format!("Unsupported encoding '{}'", other))),
        }
    }
}

/// Everything needed to open a sink
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// `{directory}/{logType}.{extension}` as supplied by the caller
    pub base_path: PathBuf,
    pub interval: RotationInterval,
    /// Files kept per log type; 0 keeps everything
    pub retention_count: usize,
    /// Overrides log-type detection from the file name
    pub log_type: Option<String>,
    pub encoding: Encoding,
}

impl SinkOptions {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            interval: RotationInterval::default(),
            retention_count: 0,
            log_type: None,
            encoding: Encoding::default(),
        }
    }

    pub fn retention(mut self, count: usize) -> Self {
        self.retention_count = count;
        self
    }

    pub fn log_type(mut self, log_type: impl Into<String>) -> Self {
        self.log_type = Some(log_type.into());
        self
    }

    pub fn interval(mut self, interval: RotationInterval) -> Self {
        self.interval = interval;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// What a rollover did
#[derive(Debug)]
pub struct RolloverOutcome {
    /// Active file before the rollover
    pub previous_path: PathBuf,
    /// Active file after the rollover
    pub active_path: PathBuf,
    pub sweep: SweepReport,
}

/// One log stream writing to a date-prefixed file
pub struct RotatingLogSink {
    base_path: PathBuf,
    directory: PathBuf,
    log_type: String,
    extension: String,
    severity: Option<Severity>,
    /// Date prefix of the active file; only rollover writes it
    current_date: String,
    active_path: PathBuf,
    retention_count: usize,
    interval: RotationInterval,
    encoding: Encoding,
    stream: Option<BufWriter<File>>,
}

impl RotatingLogSink {
    /// Open a sink for today's date
    pub fn open(
        base_path: impl Into<PathBuf>,
        interval: RotationInterval,
        retention_count: usize,
        log_type: Option<&str>,
    ) -> Result<Self> {
        let mut options = SinkOptions::new(base_path)
            .interval(interval)
            .retention(retention_count);
        options.log_type = log_type.map(str::to_string);
        Self::from_options(options, Local::now())
    }

    /// Open a sink as if the current time were `now`
    pub fn open_at(
        base_path: impl Into<PathBuf>,
        retention_count: usize,
        log_type: Option<&str>,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let mut options = SinkOptions::new(base_path).retention(retention_count);
        options.log_type = log_type.map(str::to_string);
        Self::from_options(options, now)
    }

    /// Open the first stream and run the initial retention sweep
    pub fn from_options(options: SinkOptions, now: DateTime<Local>) -> Result<Self> {
        let file_name = options
            .base_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                LogError::config(format!(
                    "Log path '{}' has no usable file name",
                    options.base_path.display()
                ))
            })?;
        let (stem, extension) = split_base_name(file_name);

        let log_type = match options.log_type {
            Some(hint) => validate_log_type(hint)?,
            None => {
                if Severity::detect(&stem).is_none() {
                    return Err(LogError::config(format!(
                        "Cannot infer log type from '{}'; name it after a severity (debug, info, warning, error, critical) or pass a log type",
                        file_name
                    )));
                }
                stem
            }
        };

        // A bare `error.log` lives in the working directory; `read_dir` needs "."
        let directory = match options.base_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&directory).map_err(|e| LogError::rotation(&directory, e))?;

        let current_date = date_prefix(&now);
        let active_path = directory.join(retention::dated_file_name(
            &current_date,
            &log_type,
            &extension,
        ));
        let stream = open_append(&active_path)?;

        let sink = Self {
            severity: Severity::detect(&log_type),
            base_path: options.base_path,
            directory,
            log_type,
            extension,
            current_date,
            active_path,
            retention_count: options.retention_count,
            interval: options.interval,
            encoding: options.encoding,
            stream: Some(stream),
        };

        tracing::debug!(
            "Opened log stream '{}' at {} (rotation {}, keep {})",
            sink.log_type,
            sink.active_path.display(),
            sink.interval,
            sink.retention_count
        );

        if sink.retention_count > 0 {
            sink.sweep_retention();
        }

        Ok(sink)
    }

    /// True when `now` falls on a different local date than the active file
    pub fn should_rollover(&self, now: &DateTime<Local>) -> bool {
        date_prefix(now) != self.current_date
    }

    /// Switch to the file for `now`'s date and enforce retention
    ///
    /// The new file is opened before the old stream is released; if that
    /// fails the sink keeps writing to the previous file.
    pub fn rollover(&mut self, now: &DateTime<Local>) -> Result<RolloverOutcome> {
        let current_date = date_prefix(now);
        let active_path = self.directory.join(retention::dated_file_name(
            &current_date,
            &self.log_type,
            &self.extension,
        ));

        let stream = open_append(&active_path)?;

        if let Some(mut old) = self.stream.take() {
            if let Err(e) = old.flush() {
                tracing::warn!(
                    "Failed to flush {} before rollover: {}",
                    self.active_path.display(),
                    e
                );
            }
        }
        self.stream = Some(stream);

        let previous_path = std::mem::replace(&mut self.active_path, active_path);
        self.current_date = current_date;

        tracing::debug!(
            "Rolled over '{}' from {} to {}",
            self.log_type,
            previous_path.display(),
            self.active_path.display()
        );

        let sweep = if self.retention_count > 0 {
            self.sweep_retention()
        } else {
            SweepReport::default()
        };

        Ok(RolloverOutcome {
            previous_path,
            active_path: self.active_path.clone(),
            sweep,
        })
    }

    /// Append `line` and a newline to the active file
    ///
    /// Reopens the active file if the stream was closed.
    pub fn write(&mut self, line: &str) -> Result<()> {
        if self.stream.is_none() {
            self.stream = Some(open_append(&self.active_path)?);
        }

        let encoded = self.encoding.encode(line);
        if let Some(stream) = self.stream.as_mut() {
            writeln!(stream, "{}", encoded)
                .and_then(|_| stream.flush())
                .map_err(|e| LogError::rotation(self.active_path.clone(), e))?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            stream
                .flush()
                .map_err(|e| LogError::rotation(self.active_path.clone(), e))?;
        }
        Ok(())
    }

    /// Flush and release the file handle; the next write reopens it
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.stream = None;
        Ok(())
    }

    /// Files that the next sweep would delete, oldest first
    pub fn list_retention_candidates(&self) -> Result<Vec<PathBuf>> {
        retention::retention_candidates(
            &self.directory,
            &self.log_type,
            &self.extension,
            self.retention_count,
            &self.active_path,
        )
    }

    fn sweep_retention(&self) -> SweepReport {
        match self.list_retention_candidates() {
            Ok(candidates) => retention::sweep(candidates),
            Err(e) => {
                tracing::warn!(
                    "Could not scan {} for stale '{}' logs: {}",
                    self.directory.display(),
                    self.log_type,
                    e
                );
                SweepReport {
                    deleted: Vec::new(),
                    failed: vec![e],
                }
            }
        }
    }

    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn log_type(&self) -> &str {
        &self.log_type
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Date of the active file, `YYYY-MM-DD`
    pub fn current_date(&self) -> &str {
        &self.current_date
    }

    pub fn retention_count(&self) -> usize {
        self.retention_count
    }

    pub fn interval(&self) -> RotationInterval {
        self.interval
    }

    /// Severity tag found in the log type, if any
    pub fn severity(&self) -> Option<Severity> {
        self.severity
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for RotatingLogSink {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let _ = stream.flush();
        }
    }
}

impl fmt::Debug for RotatingLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingLogSink")
            .field("log_type", &self.log_type)
            .field("active_path", &self.active_path)
            .field("current_date", &self.current_date)
            .field("retention_count", &self.retention_count)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

/// Format the local date of `now` as the file prefix
pub fn date_prefix(now: &DateTime<Local>) -> String {
    now.format(DATE_PREFIX_FORMAT).to_string()
}

/// Keep only the last two dot-separated segments: `a.b.error.log` -> (`error`, `log`)
fn split_base_name(file_name: &str) -> (String, String) {
    let mut segments = file_name.rsplitn(3, '.');
    let last = segments.next().unwrap_or_default();
    match segments.next() {
        Some(stem) => (stem.to_string(), last.to_string()),
        None => (last.to_string(), DEFAULT_EXTENSION.to_string()),
    }
}

fn validate_log_type(hint: String) -> Result<String> {
    let hint = hint.trim().to_string();
    if hint.is_empty() || hint.contains('.') || hint.contains('/') || hint.contains('\\') {
        return Err(LogError::config(format!(
            "Log type '{}' must be a non-empty name without dots or path separators",
            hint
        )));
    }
    Ok(hint)
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| LogError::rotation(path, e))
}
