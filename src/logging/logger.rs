//! Named logger owning one rotating sink per log type plus a console mirror
//!
//! The logger is an ordinary value handed to whoever needs it; there is no
//! process-wide registry. Rollover is lazy: each record's timestamp is checked
//! against the sink's date before the line is written.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};

use crate::config::Config;

use super::buffer::{LogBuffer, LogEntry};
use super::error::{LogError, Result};
use super::formatter::{self, ColourMode, ColourTable, SeverityFormatter};
use super::record::{LogRecord, Severity};
use super::sink::{date_prefix, Encoding, RotatingLogSink, RotationInterval, SinkOptions};

/// Terminal (or any writer) copy of every admitted record, with colour
pub struct ConsoleMirror {
    threshold: Severity,
    formatter: SeverityFormatter,
    mode: ColourMode,
    target: Mutex<Box<dyn Write + Send>>,
    buffer: Option<Arc<LogBuffer>>,
}

impl ConsoleMirror {
    pub fn new(
        target: Box<dyn Write + Send>,
        formatter: SeverityFormatter,
        mode: ColourMode,
    ) -> Self {
        Self {
            threshold: Severity::Debug,
            formatter,
            mode,
            target: Mutex::new(target),
            buffer: None,
        }
    }

    pub fn stdout(formatter: SeverityFormatter, mode: ColourMode) -> Self {
        Self::new(Box::new(std::io::stdout()), formatter, mode)
    }

    /// Drop records below `threshold`
    pub fn threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }

    /// Also push every rendered line to `buffer` for live viewers
    pub fn with_buffer(mut self, buffer: Arc<LogBuffer>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    fn emit(&self, record: &LogRecord) -> Result<()> {
        let line = self.formatter.format(record, self.mode);

        {
            let mut target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
            writeln!(target, "{}", line)?;
            target.flush()?;
        }

        if let Some(buffer) = &self.buffer {
            buffer.push(LogEntry::from_record(record, line));
        }
        Ok(())
    }
}

struct FileHandler {
    threshold: Severity,
    sink: Mutex<RotatingLogSink>,
}

/// A named logger writing to date-prefixed files
pub struct Logger {
    name: String,
    formatter: SeverityFormatter,
    handlers: Vec<FileHandler>,
    console: Option<ConsoleMirror>,
}

impl Logger {
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder {
            name: name.into(),
            formatter: None,
            streams: Vec::new(),
            console: None,
        }
    }

    /// Build a logger with one file stream per configured log type
    ///
    /// With `prefix_logger_name` set, files are named `{name}_{logType}.{ext}`.
    pub fn from_config(
        name: &str,
        config: &Config,
        buffer: Option<Arc<LogBuffer>>,
    ) -> Result<Self> {
        let interval: RotationInterval = config.rotation_interval.parse()?;
        let encoding: Encoding = config.encoding.parse()?;
        let colours = match &config.colours {
            Some(map) => ColourTable::from_map(map)?,
            None => ColourTable::default(),
        };

        let template = if config.show_logger_name {
            formatter::with_logger_name(&config.format)
        } else {
            config.format.clone()
        };
        let file_formatter = SeverityFormatter::new(&template)?
            .with_date_format(&config.date_format)?
            .with_colours(colours);

        let logs_dir = config.logs_dir();
        let mut builder = Logger::builder(name).formatter(file_formatter.clone());

        for log_type in &config.log_types {
            let file_name = if config.prefix_logger_name {
                format!("{}_{}.{}", name, log_type, config.extension)
            } else {
                format!("{}.{}", log_type, config.extension)
            };
            let options = SinkOptions::new(logs_dir.join(file_name))
                .interval(interval)
                .retention(config.retention_count)
                .encoding(encoding);
            builder = builder.file_stream(options, None);
        }

        if config.console.enabled {
            let mut console_formatter = file_formatter;
            if let Some(colour) = &config.console.logger_colour {
                console_formatter = console_formatter.with_logger_colour(colour.clone());
            }
            let mut mirror = ConsoleMirror::stdout(console_formatter, config.console.colour_mode)
                .threshold(config.console.level.parse()?);
            if let Some(buffer) = buffer {
                mirror = mirror.with_buffer(buffer);
            }
            builder = builder.console(mirror);
        }

        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route a record to every stream whose threshold admits it
    ///
    /// Only a record dated after the active file moves the stream forward.
    /// A failed rollover does not drop the line: it is written to the
    /// previous file and the failure is returned alongside any write errors.
    pub fn log(&self, record: &LogRecord) -> std::result::Result<(), Vec<LogError>> {
        let mut errors = Vec::new();
        let mut line: Option<String> = None;

        for handler in &self.handlers {
            if record.severity < handler.threshold {
                continue;
            }
            let rendered =
                line.get_or_insert_with(|| self.formatter.format(record, ColourMode::None));

            let mut sink = handler.sink.lock().unwrap_or_else(PoisonError::into_inner);
            // A record stamped before the active date (a thread that lost the
            // race across midnight) goes to the current file.
            if sink.should_rollover(&record.timestamp)
                && date_prefix(&record.timestamp).as_str() > sink.current_date()
            {
                if let Err(e) = sink.rollover(&record.timestamp) {
                    errors.push(e);
                }
            }
            if let Err(e) = sink.write(rendered) {
                errors.push(e);
            }
        }

        if let Some(console) = &self.console {
            if record.severity >= console.threshold {
                if let Err(e) = console.emit(record) {
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Convenience wrapper building the record from parts
    pub fn emit(
        &self,
        severity: Severity,
        message: impl Into<String>,
    ) -> std::result::Result<(), Vec<LogError>> {
        self.log(&LogRecord::new(severity, self.name.clone(), message))
    }

    pub fn flush(&self) -> Result<()> {
        for handler in &self.handlers {
            handler
                .sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .flush()?;
        }
        Ok(())
    }

    /// Active file of every stream, in registration order
    pub fn streams(&self) -> Vec<PathBuf> {
        self.handlers
            .iter()
            .map(|h| {
                h.sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .active_path()
                    .to_path_buf()
            })
            .collect()
    }
}

/// Collects streams before opening them all at once
pub struct LoggerBuilder {
    name: String,
    formatter: Option<SeverityFormatter>,
    streams: Vec<(SinkOptions, Option<Severity>)>,
    console: Option<ConsoleMirror>,
}

impl LoggerBuilder {
    /// Formatter for file output (always uncoloured)
    pub fn formatter(mut self, formatter: SeverityFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Add a file stream; without a threshold the severity in its log type is used
    pub fn file_stream(mut self, options: SinkOptions, threshold: Option<Severity>) -> Self {
        self.streams.push((options, threshold));
        self
    }

    pub fn console(mut self, console: ConsoleMirror) -> Self {
        self.console = Some(console);
        self
    }

    pub fn build(self) -> Result<Logger> {
        self.build_at(Local::now())
    }

    /// Open every stream as if the current time were `now`
    ///
    /// The first stream that fails to open aborts the build.
    pub fn build_at(self, now: DateTime<Local>) -> Result<Logger> {
        let formatter = match self.formatter {
            Some(formatter) => formatter,
            None => SeverityFormatter::new(formatter::DEFAULT_TEMPLATE)?,
        };

        let mut handlers = Vec::with_capacity(self.streams.len());
        for (options, threshold) in self.streams {
            let sink = RotatingLogSink::from_options(options, now)?;
            let threshold = threshold
                .or_else(|| sink.severity())
                .unwrap_or(Severity::Debug);
            handlers.push(FileHandler {
                threshold,
                sink: Mutex::new(sink),
            });
        }

        Ok(Logger {
            name: self.name,
            formatter,
            handlers,
            console: self.console,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn day(d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, d, 12, 0, 0).single().unwrap()
    }

    fn plain() -> SeverityFormatter {
        SeverityFormatter::new("{levelname} {message}").unwrap()
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_three_days_with_retention_two() {
        let temp_dir = TempDir::new().unwrap();
        let logs = temp_dir.path().join("data").join("logs");

        let logger = Logger::builder("app")
            .formatter(plain())
            .file_stream(SinkOptions::new(logs.join("error.log")).retention(2), None)
            .build_at(day(1))
            .unwrap();

        for d in 1..=3 {
            let record = LogRecord::new(Severity::Error, "app", format!("day {}", d)).at(day(d));
            logger.log(&record).unwrap();
        }

        assert_eq!(
            files_in(&logs),
            vec!["2026-03-02.error.log", "2026-03-03.error.log"]
        );
        assert_eq!(
            fs::read_to_string(logs.join("2026-03-03.error.log")).unwrap(),
            "ERROR day 3\n"
        );
    }

    #[test]
    fn test_late_record_does_not_roll_back() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::builder("app")
            .formatter(plain())
            .file_stream(SinkOptions::new(temp_dir.path().join("error.log")).retention(5), None)
            .build_at(day(1))
            .unwrap();

        let after_midnight = Local.with_ymd_and_hms(2026, 3, 2, 0, 59, 59).single().unwrap();
        let before_midnight = Local.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).single().unwrap();
        logger
            .log(&LogRecord::new(Severity::Error, "app", "new day").at(after_midnight))
            .unwrap();
        logger
            .log(&LogRecord::new(Severity::Error, "app", "late").at(before_midnight))
            .unwrap();

        let today = temp_dir.path().join("2026-03-02.error.log");
        assert_eq!(logger.streams(), vec![today.clone()]);
        assert_eq!(fs::read_to_string(&today).unwrap(), "ERROR new day\nERROR late\n");
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("2026-03-01.error.log")).unwrap(),
            ""
        );
    }

    #[test]
    fn test_threshold_from_log_type() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::builder("app")
            .formatter(plain())
            .file_stream(SinkOptions::new(temp_dir.path().join("debug.log")), None)
            .file_stream(SinkOptions::new(temp_dir.path().join("error.log")), None)
            .build_at(day(5))
            .unwrap();

        logger
            .log(&LogRecord::new(Severity::Info, "app", "hello").at(day(5)))
            .unwrap();
        logger
            .log(&LogRecord::new(Severity::Critical, "app", "down").at(day(5)))
            .unwrap();

        assert_eq!(
            fs::read_to_string(temp_dir.path().join("2026-03-05.debug.log")).unwrap(),
            "INFO hello\nCRITICAL down\n"
        );
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("2026-03-05.error.log")).unwrap(),
            "CRITICAL down\n"
        );
    }

    #[test]
    fn test_explicit_threshold_wins() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::builder("app")
            .formatter(plain())
            .file_stream(
                SinkOptions::new(temp_dir.path().join("audit.log")).log_type("audit"),
                Some(Severity::Warning),
            )
            .build_at(day(5))
            .unwrap();

        logger
            .log(&LogRecord::new(Severity::Info, "app", "skipped").at(day(5)))
            .unwrap();
        logger
            .log(&LogRecord::new(Severity::Warning, "app", "kept").at(day(5)))
            .unwrap();

        assert_eq!(
            fs::read_to_string(temp_dir.path().join("2026-03-05.audit.log")).unwrap(),
            "WARNING kept\n"
        );
    }

    #[test]
    fn test_console_mirror_colours_and_buffers() {
        let temp_dir = TempDir::new().unwrap();
        let out = SharedBuf::default();
        let buffer = Arc::new(LogBuffer::new(10, 10));

        let console = ConsoleMirror::new(Box::new(out.clone()), plain(), ColourMode::Level)
            .threshold(Severity::Warning)
            .with_buffer(Arc::clone(&buffer));
        let logger = Logger::builder("app")
            .formatter(plain())
            .file_stream(SinkOptions::new(temp_dir.path().join("info.log")), None)
            .console(console)
            .build_at(day(7))
            .unwrap();

        logger
            .log(&LogRecord::new(Severity::Info, "app", "quiet").at(day(7)))
            .unwrap();
        logger
            .log(&LogRecord::new(Severity::Error, "app", "loud").at(day(7)))
            .unwrap();

        let colours = ColourTable::default();
        assert_eq!(
            out.contents(),
            format!("{}ERROR{} loud\n", colours.error, colours.reset)
        );
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.alert_count(), 1);

        // File output stays uncoloured
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("2026-03-07.info.log")).unwrap(),
            "INFO quiet\nERROR loud\n"
        );
    }

    #[test]
    fn test_build_fails_on_ambiguous_stream() {
        let temp_dir = TempDir::new().unwrap();
        let result = Logger::builder("app")
            .file_stream(SinkOptions::new(temp_dir.path().join("app.log")), None)
            .build_at(day(1));
        assert!(matches!(result, Err(LogError::Configuration(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_rollover_still_writes_line() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::builder("app")
            .formatter(plain())
            .file_stream(SinkOptions::new(temp_dir.path().join("error.log")), None)
            .build_at(day(1))
            .unwrap();

        fs::create_dir(temp_dir.path().join("2026-03-02.error.log")).unwrap();

        let errors = logger
            .log(&LogRecord::new(Severity::Error, "app", "late").at(day(2)))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LogError::Rotation { .. }));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("2026-03-01.error.log")).unwrap(),
            "ERROR late\n"
        );
    }

    #[test]
    fn test_from_config_prefixes_logger_name() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.logs_dir = temp_dir.path().to_string_lossy().into_owned();
        config.prefix_logger_name = true;
        config.show_logger_name = true;
        config.log_types = vec!["debug".to_string(), "error".to_string()];
        config.console.enabled = false;

        let logger = Logger::from_config("customLogger", &config, None).unwrap();
        logger.emit(Severity::Error, "boom").unwrap();

        let streams = logger.streams();
        assert_eq!(streams.len(), 2);
        let names: Vec<String> = streams
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names[0].ends_with(".customLogger_debug.log"));
        assert!(names[1].ends_with(".customLogger_error.log"));

        let content = fs::read_to_string(&streams[1]).unwrap();
        assert!(content.contains("[customLogger]"));
        assert!(content.trim_end().ends_with("boom"));
    }

    #[test]
    fn test_from_config_rejects_bad_colours() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.logs_dir = temp_dir.path().to_string_lossy().into_owned();
        config.colours = Some([("error".to_string(), "\x1b[31m".to_string())].into());

        assert!(matches!(
            Logger::from_config("app", &config, None),
            Err(LogError::Configuration(_))
        ));
    }
}
