//! Logging for the Hearth rendering backend
//!
//! Every module logs through the global sink held by [`crate::hearth::Engine`].
//! The sink is any [`Logger`]; the default one writes colored lines to the
//! console. ERROR entries carry the file and line of the call site.

use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use std::time::SystemTime;

/// Sink for engine log entries
///
/// # Example
///
/// ```no_run
/// use hearth_engine::hearth::log::{Logger, LogEntry};
///
/// struct Silent;
///
/// impl Logger for Silent {
///     fn log(&self, _entry: &LogEntry) {}
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,

    pub timestamp: SystemTime,

    /// Emitting module (e.g. "hearth::RenderContext", "hearth::vulkan")
    pub source: String,

    pub message: String,

    /// Call site, set for ERROR entries only
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

impl LogEntry {
    /// `file:line` of the call site, when both are known
    pub fn location(&self) -> Option<String> {
        match (self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            _ => None,
        }
    }
}

/// Log severity levels, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-command tracing (command recording, descriptor writes)
    Trace,
    Debug,
    /// Lifecycle events (context created, chain recreated)
    Info,
    /// Tolerated conditions (unsupported fill mode, missing vertex inputs)
    Warn,
    Error,
}

impl LogSeverity {
    /// Fixed-width label used by the console logger
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }

    fn painted(self) -> ColoredString {
        let label = self.label();
        match self {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        }
    }
}

/// Console logger
///
/// Lines look like `[timestamp] [SEVERITY] [source] message`, followed by
/// ` (file:line)` when the entry has a call site. WARN and ERROR go to
/// stderr.
pub struct DefaultLogger;

impl DefaultLogger {
    /// Render an entry as a single line (without trailing newline)
    pub fn format_entry(entry: &LogEntry) -> String {
        let local: DateTime<Local> = entry.timestamp.into();
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            local.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.severity.painted(),
            entry.source.bright_blue(),
            entry.message
        );
        if let Some(location) = entry.location() {
            line.push_str(&format!(" ({})", location));
        }
        line
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let line = Self::format_entry(entry);
        match entry.severity {
            LogSeverity::Warn | LogSeverity::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

// ===== LOGGING MACROS =====

#[doc(hidden)]
#[macro_export]
macro_rules! __engine_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        $crate::hearth::Engine::log(
            $crate::hearth::log::LogSeverity::$severity,
            $source,
            format!($($arg)*),
        )
    };
}

/// Log a TRACE message
///
/// ```no_run
/// # use hearth_engine::engine_trace;
/// engine_trace!("hearth::vulkan", "cmd_draw({} vertices)", 3);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Trace, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Debug, $source, $($arg)*) };
}

/// Log an INFO message
///
/// ```no_run
/// # use hearth_engine::engine_info;
/// engine_info!("hearth::vulkan", "Presentation chain: {} images", 3);
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Info, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Warn, $source, $($arg)*) };
}

/// Log an ERROR message tagged with the caller's file and line
///
/// ```no_run
/// # use hearth_engine::engine_error;
/// engine_error!("hearth::vulkan", "vkQueueSubmit failed: {}", -4);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::hearth::Engine::log_detailed(
            $crate::hearth::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
