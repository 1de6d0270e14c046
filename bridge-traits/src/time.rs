//! Time and Logging Abstractions
//!
//! Provides the device uptime clock and a logging sink for platform
//! integration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Wrapping millisecond uptime clock.
///
/// Mirrors the tick counter found on microcontrollers: it starts near zero at
/// boot and wraps to zero after `u32::MAX` milliseconds (about 49.7 days).
/// Consumers must compare readings with wraparound-aware arithmetic.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::MonotonicClock;
///
/// fn elapsed_since(clock: &dyn MonotonicClock, start: u32) -> u32 {
///     clock.millis().wrapping_sub(start)
/// }
/// ```
pub trait MonotonicClock: Send + Sync {
    /// Current reading in milliseconds.
    fn millis(&self) -> u32;
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Target module/component
    pub target: String,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: HashMap<String, String>,
    /// Name of the span the event was recorded in
    pub span_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }
}

/// Logger sink trait
///
/// Forwards structured logs from the core to host logging pipelines, e.g. a
/// serial console on the device or a remote syslog collector.
///
/// # Security
///
/// Implementations should ensure signed URLs and credentials are not logged.
/// The core redacts locator query strings before logging them.
#[async_trait]
pub trait LoggerSink: Send + Sync {
    /// Forward a log entry to the host logging system
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Minimum level this sink is interested in.
    ///
    /// Logs below this level can be filtered out at the source for performance.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Sink that prints one line per entry, the way the device mirrors logs to
/// its serial console.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    /// `W core_catalog::queue: Download failed status=404`
    pub fn format_line(entry: &LogEntry) -> String {
        let level = match entry.level {
            LogLevel::Trace => 'T',
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
        };

        let mut fields: Vec<_> = entry.fields.iter().collect();
        fields.sort();

        let mut line = format!("{} {}: {}", level, entry.target, entry.message);
        for (key, value) in fields {
            line.push_str(&format!(" {}={}", key, value));
        }
        line
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

#[async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            eprintln!("{}", Self::format_line(&entry));
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(u32);

    impl MonotonicClock for FixedClock {
        fn millis(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_clock_readings_wrap() {
        let before_wrap = FixedClock(u32::MAX - 4);
        let after_wrap = FixedClock(5);

        assert_eq!(after_wrap.millis().wrapping_sub(before_wrap.millis()), 10);
    }

    #[test]
    fn test_log_entry_builder() {
        let entry = LogEntry::new(LogLevel::Info, "catalog", "Registry loaded")
            .with_field("entries", "12")
            .with_span_id("refresh");

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.target, "catalog");
        assert_eq!(entry.message, "Registry loaded");
        assert_eq!(entry.fields.get("entries"), Some(&"12".to_string()));
        assert_eq!(entry.span_id, Some("refresh".to_string()));
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Debug < LogLevel::Info);
    }

    #[test]
    fn test_console_line_format() {
        let entry = LogEntry::new(LogLevel::Warn, "core_catalog::queue", "Download failed")
            .with_field("status", "404")
            .with_field("attempt", "1");

        assert_eq!(
            ConsoleLogger::format_line(&entry),
            "W core_catalog::queue: Download failed attempt=1 status=404"
        );
    }

    #[tokio::test]
    async fn test_console_logger_level() {
        let logger = ConsoleLogger::new(LogLevel::Warn);
        assert_eq!(logger.min_level(), LogLevel::Warn);
        logger
            .log(LogEntry::new(LogLevel::Debug, "test", "filtered"))
            .await
            .unwrap();
    }
}
