//! Forwards `log` records to a logger supplied by the host application.

use std::sync::{Arc, OnceLock};

/// Receives log messages from credman.
///
/// Implemented by the host application and registered once with
/// [`set_logger`]. Secrets never appear in messages.
///
/// ```rust
/// use credman::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Records `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Store calls and buffer releases.
    Debug,
    /// Informational messages.
    Info,
    /// Ignored configuration and clamped timestamps.
    Warn,
    /// Failures.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

static FOREIGN_LOGGER: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// `log::Log` implementation handing records to [`FOREIGN_LOGGER`].
struct ForeignLogger;

static LOG_BRIDGE: ForeignLogger = ForeignLogger;

impl ForeignLogger {
    /// Debug and trace output is only forwarded from credman's own modules.
    fn forwards(metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info || metadata.target().starts_with("credman")
    }
}

impl log::Log for ForeignLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        Self::forwards(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !Self::forwards(record.metadata()) {
            return;
        }
        match FOREIGN_LOGGER.get() {
            Some(logger) => logger.log(record.level().into(), record.args().to_string()),
            None => eprintln!("credman logger not set: {}", record.args()),
        }
    }

    fn flush(&self) {}
}

/// Registers the host application's logger. Only the first call takes
/// effect.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if FOREIGN_LOGGER.set(logger).is_err() {
        eprintln!("credman logger already set");
        return;
    }
    if let Err(err) = log::set_logger(&LOG_BRIDGE) {
        eprintln!("failed to install credman logger: {err}");
        return;
    }
    log::set_max_level(log::LevelFilter::Trace);
}
