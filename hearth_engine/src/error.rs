//! Error types for the Hearth rendering backend
//!
//! Every fallible operation of the render context returns [`Result`].
//! Errors fall in four classes: fatal initialization, fatal resource
//! creation, precondition (contract) violations, and recoverable frame
//! conditions such as an out-of-date presentation chain or an expired wait.

use std::fmt;

/// Result type for Hearth engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Hearth engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific failure (native call rejected), message names the operation
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource or input data (bytecode, vertex data, stride...)
    InvalidResource(String),

    /// Initialization failed (device, surface, presentation chain)
    InitializationFailed(String),

    /// A caller broke an ordering or binding precondition
    ContractViolation(String),

    /// Presentation chain no longer matches the surface, call `resize`
    OutOfDate,

    /// A bounded wait expired before the GPU signaled
    Timeout(String),
}

impl Error {
    /// Whether the frame loop can continue after this error
    ///
    /// Only `OutOfDate` (rebuild the chain) and `Timeout` (retry the wait)
    /// are recoverable. Everything else terminates the frame loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::OutOfDate | Error::Timeout(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ContractViolation(msg) => write!(f, "Contract violation: {}", msg),
            Error::OutOfDate => write!(f, "Presentation chain out of date"),
            Error::Timeout(msg) => write!(f, "Timed out: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR (with file:line) and build an `Error::BackendError`
///
/// # Example
///
/// ```no_run
/// # use hearth_engine::engine_err;
/// let err = engine_err!("hearth::vulkan", "Failed to create fence: {}", -1);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::hearth::Error::BackendError(message)
    }};
}

/// Log an ERROR (with file:line) and return `Err(Error::BackendError)`
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a WARN and build an `Error::BackendError`
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::hearth::Error::BackendError(message)
    }};
}

/// Log a WARN and return `Err(Error::BackendError)`
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}

/// Log an ERROR (with file:line) and return `Err(Error::ContractViolation)`
///
/// Used for programmer errors: drawing outside a render pass, presenting
/// before submitting, binding a handle from another backend.
#[macro_export]
macro_rules! engine_contract {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "Contract violation: {}", message);
        return Err($crate::hearth::Error::ContractViolation(message));
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
