/// Structured logging for the rain alerter
///
/// Provides context-rich logging with area/hour identifiers, timestamps,
/// and severity levels on top of the `log` facade. Supports console output
/// and an optional append-only log file for scheduled runs.

use chrono::Utc;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::analysis::severity::Classification;
use crate::model::{AlerterError, RunFailure};

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

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }

    fn level(self) -> Level {
        match self {
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warning => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }
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
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Nomads,
    Decoder,
    Engine,
    Notify,
    Config,
    System,
}

impl DataSource {
    /// `log` target used for this source.
    pub fn target(&self) -> &'static str {
        match self {
            DataSource::Nomads => "NOMADS",
            DataSource::Decoder => "GRIB",
            DataSource::Engine => "ENGINE",
            DataSource::Notify => "NOTIFY",
            DataSource::Config => "CONFIG",
            DataSource::System => "SYS",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target())
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. the model cycle has not been published yet
    Expected,
    /// Unexpected failure - indicates provider degradation, bad data or a configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
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
// Logger
// ---------------------------------------------------------------------------

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<Mutex<std::fs::File>>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    pub fn new(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) -> std::io::Result<Self> {
        let log_file = match log_file {
            Some(path) => Some(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => None,
        };

        Ok(Self { min_level, log_file, console_timestamps })
    }

    fn format_entry(record: &Record<'_>) -> String {
        format!(
            "{} {} {}: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.min_level.level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = Self::format_entry(record);

        if self.console_timestamps {
            match record.level() {
                Level::Error | Level::Warn => eprintln!("{}", entry),
                _ => println!("{}", entry),
            }
        } else {
            match record.level() {
                Level::Error => eprintln!("   ✗ {}: {}", record.target(), record.args()),
                Level::Warn => eprintln!("   ⚠ {}: {}", record.target(), record.args()),
                Level::Info => println!("   {}", record.args()),
                Level::Debug | Level::Trace => println!("   [DEBUG] {}", record.args()),
            }
        }

        if let Some(file) = &self.log_file {
            if let Ok(mut file) = file.lock() {
                if let Err(e) = writeln!(file, "{}", entry) {
                    eprintln!("Failed to write to log file: {}", e);
                }
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.log_file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Install the global logger. Returns an error if the log file cannot be
/// opened or a logger is already installed.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let logger = Logger::new(min_level, log_file, console_timestamps)?;
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(min_level.filter());
    Ok(())
}

fn emit(level: LogLevel, source: DataSource, context: Option<&str>, message: &str) {
    match context {
        Some(ctx) => log::log!(target: source.target(), level.level(), "[{}] {}", ctx, message),
        None => log::log!(target: source.target(), level.level(), "{}", message),
    }
}

/// Log a general informational message
pub fn info(source: DataSource, context: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, context, message);
}

/// Log a warning message
pub fn warn(source: DataSource, context: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, context, message);
}

/// Log an error message
pub fn error(source: DataSource, context: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, context, message);
}

/// Log a debug message
pub fn debug(source: DataSource, context: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, context, message);
}

/// Context string for one forecast hour of one area, e.g. `Peoria@f07`.
pub fn hour_context(area: &str, hour: u32) -> String {
    format!("{}@f{:02}", area, hour)
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a run failure based on the error type and its message
pub fn classify_failure(err: &AlerterError) -> FailureType {
    match err {
        // NOMADS answers 404 until a cycle's files are published
        AlerterError::Acquisition { reason, .. } if reason.contains("404") => FailureType::Expected,
        AlerterError::Acquisition { reason, .. }
            if reason.contains("timed out") || reason.contains("HTTP") =>
        {
            FailureType::Unexpected
        }
        AlerterError::Acquisition { .. } => FailureType::Unknown,
        AlerterError::Decode(_) | AlerterError::Conversion(_) => FailureType::Unexpected,
        AlerterError::Configuration(_) | AlerterError::OutOfDomain { .. } => FailureType::Unexpected,
        AlerterError::Notification(_) => FailureType::Unknown,
    }
}

fn source_for(err: &AlerterError) -> DataSource {
    match err {
        AlerterError::Acquisition { .. } => DataSource::Nomads,
        AlerterError::Decode(_) => DataSource::Decoder,
        AlerterError::Conversion(_) | AlerterError::OutOfDomain { .. } => DataSource::Engine,
        AlerterError::Configuration(_) => DataSource::Config,
        AlerterError::Notification(_) => DataSource::Notify,
    }
}

// ---------------------------------------------------------------------------
// Structured Run Logging
// ---------------------------------------------------------------------------

/// Log an aborted run with area, failing hour, error kind and classification
pub fn log_run_failure(failure: &RunFailure) {
    let failure_type = classify_failure(&failure.error);
    let context = match failure.hour {
        Some(hour) => hour_context(&failure.area, hour),
        None => failure.area.clone(),
    };
    let message = format!(
        "run aborted [{}] kind={}: {}",
        failure_type,
        failure.error.kind(),
        failure.error
    );
    let source = source_for(&failure.error);

    match failure_type {
        FailureType::Expected => warn(source, Some(&context), &message),
        FailureType::Unexpected => error(source, Some(&context), &message),
        FailureType::Unknown => warn(source, Some(&context), &message),
    }
}

/// Log the outcome of a completed run
pub fn log_run_summary(area: &str, classification: &Classification, notified: usize) {
    let message = format!(
        "{:?}: light={} moderate={} heavy={} total={:.2} in, {} message(s) handed off",
        classification.category,
        classification.light,
        classification.moderate,
        classification.heavy,
        classification.total,
        notified
    );
    info(DataSource::System, Some(area), &message);
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
    fn test_level_filter_mapping() {
        assert_eq!(LogLevel::Warning.filter(), LevelFilter::Warn);
        assert_eq!(LogLevel::Debug.level(), Level::Debug);
    }

    #[test]
    fn test_failure_classification() {
        let unpublished = AlerterError::Acquisition {
            hour: 3,
            reason: "HTTP status 404 Not Found".to_string(),
        };
        assert_eq!(classify_failure(&unpublished), FailureType::Expected);

        let outage = AlerterError::Acquisition {
            hour: 3,
            reason: "HTTP status 503 Service Unavailable".to_string(),
        };
        assert_eq!(classify_failure(&outage), FailureType::Unexpected);

        let garbage = AlerterError::Decode("truncated".to_string());
        assert_eq!(classify_failure(&garbage), FailureType::Unexpected);
    }

    #[test]
    fn test_hour_context_is_zero_padded() {
        assert_eq!(hour_context("Peoria", 7), "Peoria@f07");
        assert_eq!(hour_context("Peoria", 36), "Peoria@f36");
    }

    #[test]
    fn test_logger_filters_below_min_level() {
        let logger = Logger::new(LogLevel::Warning, None, false).expect("no file to open");
        let info = Metadata::builder().level(Level::Info).target("SYS").build();
        let err = Metadata::builder().level(Level::Error).target("SYS").build();
        assert!(!logger.enabled(&info));
        assert!(logger.enabled(&err));
    }

    #[test]
    fn test_logger_appends_to_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("alerter.log");
        let logger = Logger::new(LogLevel::Info, path.to_str(), false).expect("log file should open");

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("NOMADS")
                .args(format_args!("[Peoria@f03] slow response"))
                .build(),
        );
        logger.flush();

        let contents = std::fs::read_to_string(&path).expect("log file should exist");
        assert!(contents.contains("WARN NOMADS: [Peoria@f03] slow response"), "got {}", contents);
    }
}
