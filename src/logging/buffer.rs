//! In-memory mirror of rendered log lines
//!
//! Keeps a bounded history for viewers that attach late and pushes every new
//! entry to live subscribers over a broadcast channel.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Local};
use tokio::sync::broadcast;

use super::record::{LogRecord, Severity};

/// Capacity of the live subscriber channel; slow receivers see `Lagged`
const SUBSCRIBER_CAPACITY: usize = 256;

/// A rendered line as delivered to the console mirror
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    /// Logger that produced the record
    pub logger: String,
    /// Formatted line, possibly carrying ANSI colour escapes
    pub line: String,
}

impl LogEntry {
    /// Build an entry from a record and its rendered text
    pub fn from_record(record: &LogRecord, line: impl Into<String>) -> Self {
        Self {
            timestamp: record.timestamp,
            severity: record.severity,
            logger: record.logger.clone(),
            line: line.into(),
        }
    }
}

/// Thread-safe ring buffer for rendered log lines
pub struct LogBuffer {
    /// All entries (capped at max_entries)
    entries: RwLock<VecDeque<LogEntry>>,
    /// Warnings and worse
    alerts: RwLock<VecDeque<LogEntry>>,
    max_entries: usize,
    max_alerts: usize,
    live: broadcast::Sender<LogEntry>,
}

impl LogBuffer {
    /// Create a new log buffer with specified capacities
    pub fn new(max_entries: usize, max_alerts: usize) -> Self {
        let (live, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_entries)),
            alerts: RwLock::new(VecDeque::with_capacity(max_alerts)),
            max_entries,
            max_alerts,
            live,
        }
    }

    /// Push a new entry and forward it to live subscribers
    pub fn push(&self, entry: LogEntry) {
        if entry.severity.is_alert() {
            if let Ok(mut alerts) = self.alerts.write() {
                if alerts.len() >= self.max_alerts {
                    alerts.pop_front();
                }
                alerts.push_back(entry.clone());
            }
        }

        // No receivers is not an error for a presentation-only channel
        let _ = self.live.send(entry.clone());

        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= self.max_entries {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Attach a live subscriber; it only sees entries pushed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live.subscribe()
    }

    /// Get all entries as a vector
    pub fn all_entries(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get pending alerts (warnings and worse)
    pub fn pending_alerts(&self) -> Vec<LogEntry> {
        self.alerts
            .read()
            .map(|a| a.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.read().map(|a| a.len()).unwrap_or(0)
    }

    /// Clear all alerts (after they've been acknowledged)
    pub fn clear_alerts(&self) {
        if let Ok(mut alerts) = self.alerts.write() {
            alerts.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(severity: Severity, line: &str) -> LogEntry {
        LogEntry::from_record(&LogRecord::new(severity, "test", line), line)
    }

    #[test]
    fn test_log_buffer_push_and_retrieve() {
        let buffer = LogBuffer::new(100, 10);

        buffer.push(entry(Severity::Info, "message 1"));
        buffer.push(entry(Severity::Warning, "warning 1"));
        buffer.push(entry(Severity::Critical, "critical 1"));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.alert_count(), 2);

        let entries = buffer.all_entries();
        assert_eq!(entries[0].line, "message 1");
        assert_eq!(entries[2].line, "critical 1");

        let alerts = buffer.pending_alerts();
        assert_eq!(alerts[0].line, "warning 1");
        assert_eq!(alerts[1].line, "critical 1");

        buffer.clear_alerts();
        assert_eq!(buffer.alert_count(), 0);
    }

    #[test]
    fn test_log_buffer_capacity() {
        let buffer = LogBuffer::new(3, 2);

        for i in 0..5 {
            buffer.push(entry(Severity::Info, &format!("msg {}", i)));
        }

        assert_eq!(buffer.len(), 3);
        let entries = buffer.all_entries();
        assert_eq!(entries[0].line, "msg 2");
        assert_eq!(entries[2].line, "msg 4");
    }

    #[tokio::test]
    async fn test_live_subscriber_receives_new_entries() {
        let buffer = LogBuffer::new(10, 10);
        buffer.push(entry(Severity::Info, "before"));

        let mut rx = buffer.subscribe();
        buffer.push(entry(Severity::Error, "after"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.line, "after");
        assert_eq!(received.severity, Severity::Error);
    }

    #[test]
    fn test_push_without_subscribers() {
        let buffer = LogBuffer::new(10, 10);
        buffer.push(entry(Severity::Debug, "nobody listening"));
        assert!(!buffer.is_empty());
    }
}
