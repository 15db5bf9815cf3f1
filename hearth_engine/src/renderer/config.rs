/// Render context configuration

use std::time::Duration;
use crate::renderer::{AttachmentPoint, ClearValue, Color, PresentMode};

/// Which validation messages are forwarded to the log sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugSeverity {
    /// Errors only
    ErrorsOnly,
    /// Errors and warnings
    #[default]
    ErrorsAndWarnings,
    /// Everything including verbose driver info
    All,
}

/// Render context configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,
    /// Minimum severity of forwarded validation messages
    pub debug_severity: DebugSeverity,
    /// Preferred present mode, FIFO when unsupported
    pub present_mode: PresentMode,
    /// Requested presentation image count, driver minimum when `None`
    pub image_count: Option<u32>,
    /// Bound on fence waits, `None` waits forever
    pub fence_timeout: Option<Duration>,
    /// Clear color of the back buffer
    pub clear_color: Color,
    /// Clear depth of the depth/stencil buffer
    pub clear_depth: f32,
    /// Clear stencil of the depth/stencil buffer
    pub clear_stencil: u32,
    /// Shader programs per descriptor pool before another pool is added
    pub max_shader_programs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Hearth Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::default(),
            present_mode: PresentMode::Mailbox,
            image_count: None,
            fence_timeout: None,
            clear_color: Color::BLACK,
            clear_depth: 1.0,
            clear_stencil: 0,
            max_shader_programs: 64,
        }
    }
}

impl Config {
    /// Fence timeout in nanoseconds as native wait calls expect it
    pub fn fence_timeout_ns(&self) -> u64 {
        match self.fence_timeout {
            Some(timeout) => u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX),
            None => u64::MAX,
        }
    }

    /// Value a render pass clears an attachment at `point` to when it begins
    pub fn clear_value(&self, point: AttachmentPoint) -> ClearValue {
        match point {
            AttachmentPoint::Color => ClearValue::Color(self.clear_color),
            _ => ClearValue::DepthStencil {
                depth: self.clear_depth,
                stencil: self.clear_stencil,
            },
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
