/// Hearth Engine - process-wide log sink
///
/// The render context itself is never a global: applications own it and pass
/// it around. Only the log sink is process-wide, so that every module (and
/// the Vulkan validation callback) can report through the same logger.

use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

type SharedLogger = RwLock<Box<dyn Logger>>;

static SINK: OnceLock<SharedLogger> = OnceLock::new();

fn sink() -> &'static SharedLogger {
    SINK.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn install(replacement: Box<dyn Logger>) {
    // A poisoned sink still accepts a new logger
    let mut current = sink().write().unwrap_or_else(|e| e.into_inner());
    *current = replacement;
}

fn emit(entry: LogEntry) {
    let current = sink().read().unwrap_or_else(|e| e.into_inner());
    current.log(&entry);
}

/// Entry point for engine-wide services
///
/// # Example
///
/// ```no_run
/// use hearth_engine::hearth::{Engine, log::{Logger, LogEntry}};
///
/// struct Capture;
/// impl Logger for Capture {
///     fn log(&self, entry: &LogEntry) {
///         // forward to the application console
///     }
/// }
///
/// Engine::set_logger(Capture);
/// ```
pub struct Engine;

impl Engine {
    /// Route every subsequent entry to `logger`
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        install(Box::new(logger));
    }

    /// Go back to the colored console logger
    pub fn reset_logger() {
        install(Box::new(DefaultLogger));
    }

    /// Emit an entry without a call site (engine_trace! to engine_warn!)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        emit(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_owned(),
            message,
            file: None,
            line: None,
        });
    }

    /// Emit an entry carrying `file:line` (engine_error! and the error macros)
    pub fn log_detailed(severity: LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        emit(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_owned(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
