//! tracing integration
//!
//! Turns `tracing` events into [`LogRecord`]s and hands them to a [`Logger`],
//! so application code keeps using the usual macros while output lands in
//! date-prefixed files and the console mirror.

use std::cell::Cell;
use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::Config;

use super::buffer::LogBuffer;
use super::logger::Logger;
use super::record::{LogRecord, Severity};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "prefixlog=info";

thread_local! {
    /// Set while this thread is inside `Logger::log` via the layer
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Collects the message and the `critical` flag from an event
#[derive(Default)]
struct RecordVisitor {
    message: String,
    extra: String,
    critical: bool,
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.extra, " {}={}", field.name(), value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "critical" {
            self.critical = value;
        } else {
            let _ = write!(self.extra, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.extra, " {}={:?}", field.name(), value);
        }
    }
}

/// Layer forwarding every event to a [`Logger`]
pub struct SinkLayer {
    logger: Arc<Logger>,
}

impl SinkLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let severity = if visitor.critical {
            Severity::Critical
        } else {
            Severity::from(*meta.level())
        };
        let mut record = LogRecord::new(
            severity,
            self.logger.name(),
            visitor.message + &visitor.extra,
        );
        record.module = meta.module_path().map(str::to_string);
        record.file = meta.file().map(str::to_string);
        record.line = meta.line();

        // The sink logs its own rollover and retention work; those events
        // must not re-enter the logger that is emitting them.
        if DISPATCHING.with(|flag| flag.replace(true)) {
            eprintln!("[{}] {}: {}", record.severity, meta.target(), record.message);
            return;
        }

        let _dispatching = DispatchGuard;
        if let Err(errors) = self.logger.log(&record) {
            for e in errors {
                eprintln!("prefixlog: {}", e);
            }
        }
    }
}

/// Clears `DISPATCHING` on drop, including when `Logger::log` unwinds
struct DispatchGuard;

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(false));
    }
}

/// Where the installed logger writes
#[derive(Debug, Clone)]
pub struct LoggingInfo {
    /// Active file of every stream at startup
    pub streams: Vec<PathBuf>,
}

/// Guard that keeps the logging system alive and flushes it on drop
pub struct LoggingGuard {
    logger: Arc<Logger>,
}

impl LoggingGuard {
    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        if let Err(e) = self.logger.flush() {
            eprintln!("prefixlog: {}", e);
        }
    }
}

/// Build a logger from `config` and install it as the global subscriber
///
/// Returns the stream paths and a guard that must be kept alive for the
/// duration of logging.
pub fn init_file_logging(
    name: &str,
    config: &Config,
    buffer: Option<Arc<LogBuffer>>,
) -> Result<(LoggingInfo, LoggingGuard)> {
    std::fs::create_dir_all(config.logs_dir()).context("Failed to create logs directory")?;

    let logger = Arc::new(
        Logger::from_config(name, config, buffer).context("Failed to set up log streams")?,
    );

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(SinkLayer::new(Arc::clone(&logger)))
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    let info = LoggingInfo {
        streams: logger.streams(),
    };

    Ok((info, LoggingGuard { logger }))
}

/// Log panics as critical records before the default hook runs
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(critical = true, "[Uncaught panic]: {}", info);
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{SeverityFormatter, SinkOptions};
    use chrono::{Duration, Local};
    use std::fs;
    use tempfile::TempDir;

    fn test_logger(dir: &std::path::Path, retention: usize) -> Arc<Logger> {
        let logger = Logger::builder("svc")
            .formatter(SeverityFormatter::new("{levelname} [{name}] {message}").unwrap())
            .file_stream(SinkOptions::new(dir.join("debug.log")).retention(retention), None)
            .build_at(Local::now() - Duration::days(1))
            .unwrap();
        Arc::new(logger)
    }

    #[test]
    fn test_layer_writes_events() {
        let temp_dir = TempDir::new().unwrap();
        let logger = test_logger(temp_dir.path(), 0);
        let subscriber = tracing_subscriber::registry().with(SinkLayer::new(Arc::clone(&logger)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Starting application");
            tracing::warn!(port = 8080, "Port busy");
            tracing::error!(critical = true, "Disk gone");
        });

        let today = logger.streams().remove(0);
        let content = fs::read_to_string(today).unwrap();
        assert_eq!(
            content,
            "INFO [svc] Starting application\nWARNING [svc] Port busy port=8080\nCRITICAL [svc] Disk gone\n"
        );
    }

    #[test]
    fn test_dispatch_flag_cleared_after_panic() {
        let _ = std::panic::catch_unwind(|| {
            DISPATCHING.with(|flag| flag.set(true));
            let _dispatching = DispatchGuard;
            panic!("sink failure");
        });
        assert!(!DISPATCHING.with(Cell::get));

        let temp_dir = TempDir::new().unwrap();
        let logger = test_logger(temp_dir.path(), 0);
        let subscriber = tracing_subscriber::registry().with(SinkLayer::new(Arc::clone(&logger)));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("after panic");
        });

        let today = logger.streams().remove(0);
        assert_eq!(fs::read_to_string(today).unwrap(), "INFO [svc] after panic\n");
    }

    #[test]
    fn test_default_filter_is_crate_info() {
        let filter: tracing_subscriber::EnvFilter = DEFAULT_FILTER.into();
        assert_eq!(filter.to_string(), "prefixlog=info");
    }

    #[test]
    fn test_layer_survives_retention_logging() {
        let temp_dir = TempDir::new().unwrap();
        let logger = test_logger(temp_dir.path(), 1);
        let yesterday = logger.streams().remove(0);
        assert!(yesterday.exists());

        let subscriber = tracing_subscriber::registry().with(SinkLayer::new(Arc::clone(&logger)));
        tracing::subscriber::with_default(subscriber, || {
            // Rolls over to today and deletes yesterday's file, which itself logs
            tracing::info!("new day");
            tracing::info!("still fine");
        });

        assert!(!yesterday.exists());
        let today = logger.streams().remove(0);
        assert_eq!(
            fs::read_to_string(today).unwrap(),
            "INFO [svc] new day\nINFO [svc] still fine\n"
        );
    }
}
