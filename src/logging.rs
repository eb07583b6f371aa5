//! Observability sink for the sync engine.
//!
//! This module provides a logger that outputs to multiple backends:
//! - CLI/stderr/file via tracing
//! - An optional in-process channel, so a presentation layer (or a test) can
//!   observe subscription and write failures that are never returned to a caller

use serde::Serialize;
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};
use tokio::sync::mpsc;
use tracing::Level;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl LogLevel {
    fn from_u8(val: u8) -> Self {
        match val {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }
}

/// Convert LogLevel to tracing Level.
pub fn log_level_to_tracing(level: LogLevel) -> Level {
    match level {
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warning => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// Atomic level filter that can be adjusted at runtime.
pub struct LogLevelFilter(AtomicU8);

impl LogLevelFilter {
    /// Create a new filter with the given minimum level.
    pub fn new(level: LogLevel) -> Self {
        Self(AtomicU8::new(level as u8))
    }

    /// Get the current minimum level.
    pub fn get(&self) -> LogLevel {
        LogLevel::from_u8(self.0.load(Ordering::Relaxed))
    }

    /// Set the minimum level.
    pub fn set(&self, level: LogLevel) {
        self.0.store(level as u8, Ordering::Relaxed);
    }

    /// Check if a message at the given level should be logged.
    pub fn should_log(&self, level: LogLevel) -> bool {
        level as u8 >= self.0.load(Ordering::Relaxed)
    }
}

impl Default for LogLevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

/// One entry forwarded to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: i64,
}

/// Logger writing to tracing and, when configured, to a record channel.
#[derive(Clone)]
pub struct Logger {
    sink: Option<mpsc::UnboundedSender<LogRecord>>,
    level_filter: Arc<LogLevelFilter>,
    name: Option<String>,
}

impl Logger {
    /// Create a new logger with default settings.
    pub fn new() -> Self {
        Self {
            sink: None,
            level_filter: Arc::new(LogLevelFilter::default()),
            name: None,
        }
    }

    /// Forward records to a channel in addition to tracing.
    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<LogRecord>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the level filter.
    pub fn with_level_filter(mut self, filter: Arc<LogLevelFilter>) -> Self {
        self.level_filter = filter;
        self
    }

    /// Set the logger name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Same sink and filter under a different name.
    pub fn named(&self, name: impl Into<String>) -> Self {
        self.clone().with_name(name)
    }

    /// Log a message to all configured endpoints.
    pub fn log(&self, level: LogLevel, message: &str, data: Option<Value>) {
        if !self.level_filter.should_log(level) {
            return;
        }

        let name = self.name.as_deref().unwrap_or("task_sync");
        match log_level_to_tracing(level) {
            Level::ERROR => tracing::error!(logger = %name, "{}", message),
            Level::WARN => tracing::warn!(logger = %name, "{}", message),
            Level::INFO => tracing::info!(logger = %name, "{}", message),
            _ => tracing::debug!(logger = %name, "{}", message),
        }

        if let Some(ref sink) = self.sink {
            // A closed sink only means nobody is watching anymore.
            let _ = sink.send(LogRecord {
                level,
                logger: self.name.clone(),
                message: message.to_string(),
                data,
                timestamp: chrono::Utc::now().timestamp_millis(),
            });
        }
    }

    /// Log a message with structured data.
    pub fn log_with_data(&self, level: LogLevel, message: &str, data: Value) {
        self.log(level, message, Some(data));
    }

    /// Log a debug message.
    pub fn debug(&self, msg: &str) {
        self.log(LogLevel::Debug, msg, None);
    }

    /// Log an info message.
    pub fn info(&self, msg: &str) {
        self.log(LogLevel::Info, msg, None);
    }

    /// Log a warning message.
    pub fn warning(&self, msg: &str) {
        self.log(LogLevel::Warning, msg, None);
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        self.log(LogLevel::Error, msg, None);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
