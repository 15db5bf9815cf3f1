/// Vulkan debug messenger - forwards validation layer messages to the engine log
///
/// Messages below the configured `DebugSeverity` are dropped. Identical
/// messages are counted and tagged with their repeat count, and per-severity
/// statistics can be printed as a report at shutdown.

use ash::vk;
use colored::Colorize;
use hearth_engine::hearth::{Engine, Result};
use hearth_engine::hearth::log::LogSeverity;
use hearth_engine::hearth::render::DebugSeverity;
use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_context::init_failed;

const SOURCE: &str = "hearth::vulkan::validation";

/// Messenger state shared with the callback
static VALIDATION: Mutex<ValidationState> = Mutex::new(ValidationState::disarmed());

/// Validation message counts per severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    fn record(&mut self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &mut self.errors,
            LogSeverity::Warn => &mut self.warnings,
            LogSeverity::Info => &mut self.info,
            LogSeverity::Debug | LogSeverity::Trace => &mut self.verbose,
        };
        *counter += 1;
    }
}

struct ValidationState {
    /// `None` while no messenger is alive
    threshold: Option<DebugSeverity>,
    stats: ValidationStats,
    /// Occurrences of each distinct message text
    occurrences: Option<HashMap<String, u32>>,
}

impl ValidationState {
    const fn disarmed() -> Self {
        Self {
            threshold: None,
            stats: ValidationStats { errors: 0, warnings: 0, info: 0, verbose: 0 },
            occurrences: None,
        }
    }

    fn occurrence(&mut self, message: &str) -> u32 {
        let count = self
            .occurrences
            .get_or_insert_with(HashMap::new)
            .entry(message.to_owned())
            .or_insert(0);
        *count += 1;
        *count
    }

    fn repeated_messages(&self) -> usize {
        self.occurrences
            .as_ref()
            .map_or(0, |occurrences| occurrences.values().filter(|&&count| count > 1).count())
    }
}

fn state() -> MutexGuard<'static, ValidationState> {
    VALIDATION.lock().unwrap_or_else(|e| e.into_inner())
}

/// Arm the callback with `severity` and reset statistics
pub fn init_debug_config(severity: DebugSeverity) {
    *state() = ValidationState {
        threshold: Some(severity),
        ..ValidationState::disarmed()
    };
}

/// Disarm the callback; statistics stay readable
pub fn cleanup_debug_config() {
    state().threshold = None;
}

/// Current validation statistics
pub fn validation_stats() -> ValidationStats {
    state().stats
}

/// Print the per-severity counts gathered since the messenger was armed
pub fn print_validation_stats_report() {
    let (stats, repeated) = {
        let state = state();
        (state.stats, state.repeated_messages())
    };

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    let banner = "=== Validation Statistics Report ===";
    println!("\n{}", banner.bright_blue().bold());
    let rows = [
        ("Errors:".red().bold(), stats.errors),
        ("Warnings:".yellow().bold(), stats.warnings),
        ("Info:".cyan(), stats.info),
        ("Verbose:".bright_black(), stats.verbose),
    ];
    for (label, count) in rows.into_iter().filter(|(_, count)| *count > 0) {
        println!("  {} {}", label, count);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());
    if repeated > 0 {
        println!("\n  {} message(s) appeared multiple times", repeated);
    }
    println!("{}\n", "=".repeat(banner.len()).bright_blue().bold());
}

/// Message severities a messenger subscribes to for `severity`
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let errors = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    let warnings = errors | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    match severity {
        DebugSeverity::ErrorsOnly => errors,
        DebugSeverity::ErrorsAndWarnings => warnings,
        DebugSeverity::All => {
            warnings
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Engine log severity of a validation message
pub(crate) fn log_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Trace
    }
}

fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Create the debug messenger and arm the callback
///
/// # Errors
///
/// `InitializationFailed` when the messenger cannot be created
pub(crate) fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    severity: DebugSeverity,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    init_debug_config(severity);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_flags(severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback));

    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    let messenger = unsafe {
        debug_utils
            .create_debug_utils_messenger(&create_info, None)
            .map_err(|e| init_failed("Failed to create debug messenger", e))?
    };

    Ok((debug_utils, messenger))
}

/// Format a validation message and forward it to the engine log
///
/// Returns `false` when the message is below the armed threshold or no
/// messenger is armed.
pub(crate) fn forward_message(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    message_id_name: &str,
    message: &str,
) -> bool {
    let severity_level = log_severity(severity);
    let occurrence_count = {
        let mut state = state();
        match state.threshold {
            Some(threshold) if severity_flags(threshold).intersects(severity) => {}
            _ => return false,
        }
        state.stats.record(severity_level);
        state.occurrence(message)
    };
    let repeat_indicator = match occurrence_count {
        1 => String::new(),
        count => format!(" [×{}]", count),
    };

    Engine::log(
        severity_level,
        SOURCE,
        format!("[{}]{} {}: {}", message_type_name(message_type), repeat_indicator, message_id_name, message),
    );
    true
}

/// Vulkan debug messenger callback
///
/// Never aborts the Vulkan call that triggered the message.
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = *p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown".into()
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        "No message".into()
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    forward_message(message_severity, message_type, &message_id_name, &message);

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
