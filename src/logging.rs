//! Structured logging for the flood monitoring demo service.
//!
//! Provides context-rich logging with subsystem tags, timestamps, and
//! severity levels. Supports both console output and file-based logging
//! for long-running operation.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Subsystem tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Generator,
    Lifecycle,
    Alert,
    Sms,
    Advisory,
    Fanout,
    Store,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Generator => write!(f, "GEN"),
            Component::Lifecycle => write!(f, "SCN"),
            Component::Alert => write!(f, "ALERT"),
            Component::Sms => write!(f, "SMS"),
            Component::Advisory => write!(f, "ADV"),
            Component::Fanout => write!(f, "WS"),
            Component::Store => write!(f, "DB"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - provider throttling, an unverified trial number,
    /// a recipient opt-out. Normal in demo operation.
    Expected,
    /// Unexpected failure - indicates misconfiguration or service degradation.
    Unexpected,
    /// Unknown - cannot determine if this is expected or not.
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
}

impl Logger {
    fn log(&self, level: LogLevel, component: Component, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, component, context_part, message
        );

        match level {
            LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
            LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>) {
    let logger = Logger {
        min_level,
        log_file: log_file.map(String::from),
    };
    *LOGGER.lock().unwrap() = Some(logger);
}

/// Log a general informational message
pub fn info(component: Component, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Info, component, context, message);
    }
}

/// Log a warning message
pub fn warn(component: Component, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Warning, component, context, message);
    }
}

/// Log an error message
pub fn error(component: Component, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Error, component, context, message);
    }
}

/// Log a debug message
pub fn debug(component: Component, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Debug, component, context, message);
    }
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an SMS provider failure based on the error text.
pub fn classify_sms_failure(error_message: &str) -> FailureType {
    // Throttling and trial-account rejections are routine on demo accounts
    if error_message.contains("429")
        || error_message.contains("rate limit")
        || error_message.contains("unverified")
    {
        FailureType::Expected
    }
    // Auth and bad-request errors suggest misconfiguration
    else if error_message.contains("401")
        || error_message.contains("403")
        || error_message.contains("400")
    {
        FailureType::Unexpected
    }
    // Timeouts and connection resets could be either
    else if error_message.contains("timed out") || error_message.contains("timeout") {
        FailureType::Unknown
    } else {
        FailureType::Unknown
    }
}

/// Classify a store failure based on the error text.
pub fn classify_store_failure(error_message: &str) -> FailureType {
    if error_message.contains("already registered") {
        FailureType::Expected
    } else if error_message.contains("connection") || error_message.contains("refused") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an SMS dispatch failure with automatic classification.
pub fn log_sms_failure(phone: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_sms_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(Component::Sms, Some(phone), &message),
        FailureType::Unexpected => error(Component::Sms, Some(phone), &message),
        FailureType::Unknown => warn(Component::Sms, Some(phone), &message),
    }
}

/// Log a store failure with automatic classification.
pub fn log_store_failure(context: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_store_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(Component::Store, Some(context), &message),
        FailureType::Unexpected => error(Component::Store, Some(context), &message),
        FailureType::Unknown => warn(Component::Store, Some(context), &message),
    }
}

// ---------------------------------------------------------------------------
// Dispatch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of an alert dispatch pass.
pub fn log_dispatch_summary(considered: usize, sent: usize, failed: usize) {
    let message = format!(
        "Dispatch pass complete: {} sent, {} failed, {} considered",
        sent, failed, considered
    );

    if failed == 0 {
        info(Component::Alert, None, &message);
    } else if sent == 0 && failed > 0 {
        error(Component::Alert, None, &message);
    } else {
        warn(Component::Alert, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_sms_failure_classification() {
        let throttled = "provider returned 429 rate limit exceeded";
        assert_eq!(classify_sms_failure(throttled), FailureType::Expected);

        let auth = "provider returned 401 Unauthorized";
        assert_eq!(classify_sms_failure(auth), FailureType::Unexpected);

        let timeout = "request timed out after 10s";
        assert_eq!(classify_sms_failure(timeout), FailureType::Unknown);
    }

    #[test]
    fn test_store_failure_classification() {
        let dup = "phone number already registered: +911234567890";
        assert_eq!(classify_store_failure(dup), FailureType::Expected);

        let conn = "connection refused";
        assert_eq!(classify_store_failure(conn), FailureType::Unexpected);
    }
}
