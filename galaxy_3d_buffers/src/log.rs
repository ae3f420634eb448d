//! Logging system for the Galaxy3D buffer system
//!
//! This module provides a flexible logging system with:
//! - Customizable logger via Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - File and line information for detailed ERROR logs
//!
//! Loggers are passed explicitly (usually as `Arc<dyn Logger>` owned by the
//! `BufferManager`), there is no process-wide logger.

use colored::*;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// Implement this trait to create custom loggers (file logging, network logging, etc.)
///
/// # Example
///
/// ```no_run
/// use galaxy_3d_buffers::galaxy3d::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    ///
    /// # Arguments
    ///
    /// * `entry` - The log entry to process
    fn log(&self, entry: &LogEntry);

    /// Whether entries of this severity are wanted at all
    ///
    /// Checked by the logging macros before the message is formatted.
    fn enabled(&self, _severity: LogSeverity) -> bool {
        true
    }
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level (Trace, Debug, Info, Warn, Error)
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "galaxy3d::BufferManager", "galaxy3d::BufferStore")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    /// Very verbose debug information (no-op requests, per-descriptor events)
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Warning messages (potential issues)
    Warn,

    /// Error messages (contract faults, with file:line details)
    Error,
}

/// Console logger with colored severities and local timestamps
///
/// Trace to Info go to stdout, Warn and Error to stderr. Error entries
/// carrying a location are suffixed with `(file:line)`:
///
/// `2025-01-01 12:00:00.000 ERROR galaxy3d::BufferManager | Store not found: 4 (src/buffer/manager.rs:312)`
pub struct DefaultLogger;

impl DefaultLogger {
    fn format_line(entry: &LogEntry) -> String {
        let local: DateTime<Local> = entry.timestamp.into();
        let severity = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let mut line = format!(
            "{} {} {} | {}",
            local.format("%Y-%m-%d %H:%M:%S%.3f"),
            severity,
            entry.source.bright_blue(),
            entry.message
        );
        if let (Some(file), Some(number)) = (entry.file, entry.line) {
            line.push_str(&format!(" ({}:{})", file, number));
        }
        line
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let line = Self::format_line(entry);
        if entry.severity >= LogSeverity::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

/// Logger that discards everything
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _entry: &LogEntry) {}

    fn enabled(&self, _severity: LogSeverity) -> bool {
        false
    }
}

/// Wraps another logger and drops entries below a minimum severity
pub struct SeverityFilter<L> {
    inner: L,
    min_severity: LogSeverity,
}

impl<L: Logger> SeverityFilter<L> {
    pub fn new(inner: L, min_severity: LogSeverity) -> Self {
        Self { inner, min_severity }
    }

    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }
}

impl<L: Logger> Logger for SeverityFilter<L> {
    fn log(&self, entry: &LogEntry) {
        if entry.severity >= self.min_severity {
            self.inner.log(entry);
        }
    }

    fn enabled(&self, severity: LogSeverity) -> bool {
        severity >= self.min_severity && self.inner.enabled(severity)
    }
}

impl<L: Logger + ?Sized> Logger for std::sync::Arc<L> {
    fn log(&self, entry: &LogEntry) {
        (**self).log(entry)
    }

    fn enabled(&self, severity: LogSeverity) -> bool {
        (**self).enabled(severity)
    }
}

/// Logger that keeps every entry in memory
///
/// Useful for tools that display the buffer activity after the fact, and for tests.
#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of captured entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of captured entries with the given severity
    pub fn count(&self, severity: LogSeverity) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.severity == severity)
            .count()
    }

    /// Whether any captured message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|entry| entry.message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}

// ===== EMIT HELPERS (used by macros) =====

/// Send a simple entry (no file:line) to a logger
pub fn emit(logger: &dyn Logger, severity: LogSeverity, source: &str, message: String) {
    logger.log(&LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: None,
        line: None,
    });
}

/// Send an entry carrying its source location to a logger
pub fn emit_detailed(
    logger: &dyn Logger,
    severity: LogSeverity,
    source: &str,
    message: String,
    file: &'static str,
    line: u32,
) {
    logger.log(&LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: Some(file),
        line: Some(line),
    });
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically filtered out)
///
/// # Example
///
/// ```ignore
/// engine_trace!(logger, "galaxy3d::BufferStore", "Remove of unknown descriptor ignored");
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($logger:expr, $source:expr, $($arg:tt)*) => {{
        let logger: &dyn $crate::log::Logger = &*$logger;
        if logger.enabled($crate::log::LogSeverity::Trace) {
            $crate::log::emit(logger, $crate::log::LogSeverity::Trace, $source, format!($($arg)*));
        }
    }};
}

/// Log a DEBUG message (development information)
///
/// # Example
///
/// ```ignore
/// engine_debug!(logger, "galaxy3d::BufferManager", "Created store {}", index);
/// ```
#[macro_export]
macro_rules! engine_debug {
    ($logger:expr, $source:expr, $($arg:tt)*) => {{
        let logger: &dyn $crate::log::Logger = &*$logger;
        if logger.enabled($crate::log::LogSeverity::Debug) {
            $crate::log::emit(logger, $crate::log::LogSeverity::Debug, $source, format!($($arg)*));
        }
    }};
}

/// Log an INFO message (important events)
///
/// # Example
///
/// ```ignore
/// engine_info!(logger, "galaxy3d::BufferManager", "Rebuilt {} buffers", count);
/// ```
#[macro_export]
macro_rules! engine_info {
    ($logger:expr, $source:expr, $($arg:tt)*) => {{
        let logger: &dyn $crate::log::Logger = &*$logger;
        if logger.enabled($crate::log::LogSeverity::Info) {
            $crate::log::emit(logger, $crate::log::LogSeverity::Info, $source, format!($($arg)*));
        }
    }};
}

/// Log a WARN message (potential issues)
///
/// # Example
///
/// ```ignore
/// engine_warn!(logger, "galaxy3d::BufferManager", "Store {} exceeds {} bytes", index, cap);
/// ```
#[macro_export]
macro_rules! engine_warn {
    ($logger:expr, $source:expr, $($arg:tt)*) => {{
        let logger: &dyn $crate::log::Logger = &*$logger;
        if logger.enabled($crate::log::LogSeverity::Warn) {
            $crate::log::emit(logger, $crate::log::LogSeverity::Warn, $source, format!($($arg)*));
        }
    }};
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```ignore
/// engine_error!(logger, "galaxy3d::AddRequest", "Failed to add '{}': {}", id, error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($logger:expr, $source:expr, $($arg:tt)*) => {{
        let logger: &dyn $crate::log::Logger = &*$logger;
        if logger.enabled($crate::log::LogSeverity::Error) {
            $crate::log::emit_detailed(
                logger,
                $crate::log::LogSeverity::Error,
                $source,
                format!($($arg)*),
                file!(),
                line!(),
            );
        }
    }};
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
