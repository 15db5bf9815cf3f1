/// Presentation chain negotiation.
///
/// Pure functions choosing the extent, image count and present mode of a
/// presentation chain from what the surface reports and what the window
/// and configuration ask for. Backends query the native surface, convert
/// the answer into [`SurfaceCapabilities`] and apply the result.

use crate::error::{Error, Result};
use crate::renderer::Config;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamp each dimension to `[min, max]`
    pub fn clamp(self, min: Extent2D, max: Extent2D) -> Self {
        Self {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }
}

/// Presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// No vsync, may tear
    Immediate,
    /// Low-latency triple buffering, newest image replaces the queued one
    Mailbox,
    /// Vsync queue, always supported
    Fifo,
    /// Vsync, tears when late
    FifoRelaxed,
}

/// What the surface supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    /// `None` when the surface size is driven by the swapchain extent
    pub current_extent: Option<Extent2D>,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
    pub present_modes: Vec<PresentMode>,
}

/// Outcome of the negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSettings {
    pub extent: Extent2D,
    pub image_count: u32,
    pub present_mode: PresentMode,
}

/// Surface extent if the surface defines one, else the window size clamped
pub fn choose_extent(capabilities: &SurfaceCapabilities, window: Extent2D) -> Extent2D {
    match capabilities.current_extent {
        Some(extent) => extent,
        None => window.clamp(capabilities.min_extent, capabilities.max_extent),
    }
}

/// Requested image count clamped to the surface limits (driver minimum by default)
pub fn choose_image_count(capabilities: &SurfaceCapabilities, requested: Option<u32>) -> u32 {
    let mut count = requested
        .unwrap_or(capabilities.min_image_count)
        .max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count = count.min(capabilities.max_image_count);
    }
    count.max(1)
}

/// The preferred mode when available, FIFO otherwise
pub fn choose_present_mode(available: &[PresentMode], preferred: PresentMode) -> PresentMode {
    if available.contains(&preferred) {
        preferred
    } else {
        PresentMode::Fifo
    }
}

/// Run the whole negotiation
///
/// # Errors
///
/// `InitializationFailed` if the resulting extent has a zero dimension.
pub fn negotiate(
    capabilities: &SurfaceCapabilities,
    window: Extent2D,
    config: &Config,
) -> Result<ChainSettings> {
    // A minimized window has no area even when the surface minimum would clamp it up
    if window.is_empty() {
        return Err(Error::InitializationFailed(format!(
            "window client area {}x{} has no area",
            window.width, window.height
        )));
    }

    let extent = choose_extent(capabilities, window);
    if extent.is_empty() {
        return Err(Error::InitializationFailed(format!(
            "presentation chain extent {}x{} has no area",
            extent.width, extent.height
        )));
    }

    Ok(ChainSettings {
        extent,
        image_count: choose_image_count(capabilities, config.image_count),
        present_mode: choose_present_mode(&capabilities.present_modes, config.present_mode),
    })
}

#[cfg(test)]
#[path = "presentation_tests.rs"]
mod tests;
