//! Date-prefixed log rotation for prefixlog
//!
//! Provides rotating file sinks with count-based retention, a severity-colouring
//! line formatter, a named logger tying them together, and `tracing` integration.

mod buffer;
mod error;
mod file_writer;
mod formatter;
mod logger;
mod record;
mod retention;
mod sink;

pub use buffer::{LogBuffer, LogEntry};
pub use error::{LogError, Result};
pub use file_writer::{init_file_logging, install_panic_hook, LoggingGuard, LoggingInfo, SinkLayer};
pub use formatter::{
    with_logger_name, ColourMode, ColourTable, SeverityFormatter, DEFAULT_DATE_FORMAT,
    DEFAULT_TEMPLATE,
};
pub use logger::{ConsoleMirror, Logger, LoggerBuilder};
pub use record::{LogRecord, Severity};
pub use retention::{dated_file_name, find_log_file, SweepReport, DATE_PREFIX_FORMAT};
pub use sink::{
    date_prefix, Encoding, IntervalUnit, RolloverOutcome, RotatingLogSink, RotationInterval,
    SinkOptions,
};
