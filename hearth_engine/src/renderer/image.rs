/// Image trait and image formats
///
/// Images here are the attachments a render pass writes: the presentation
/// chain's color images and the shared depth/stencil buffer.

use std::any::Any;
use crate::renderer::{AttachmentPoint, Extent2D};

/// Pixel format of an attachment image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ImageFormat {
    // Color formats (presentation chain)
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,

    // Depth/stencil formats
    D16_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

impl ImageFormat {
    /// Whether the format has a depth aspect
    pub fn has_depth(&self) -> bool {
        matches!(
            self,
            ImageFormat::D16_UNORM
                | ImageFormat::D32_SFLOAT
                | ImageFormat::D24_UNORM_S8_UINT
                | ImageFormat::D32_SFLOAT_S8_UINT
        )
    }

    /// Whether the format has a stencil aspect
    pub fn has_stencil(&self) -> bool {
        matches!(self, ImageFormat::D24_UNORM_S8_UINT | ImageFormat::D32_SFLOAT_S8_UINT)
    }

    /// Attachment point an image of this format binds to
    pub fn attachment_point(&self) -> AttachmentPoint {
        match (self.has_depth(), self.has_stencil()) {
            (true, true) => AttachmentPoint::DepthStencil,
            (true, false) => AttachmentPoint::Depth,
            (false, true) => AttachmentPoint::Stencil,
            (false, false) => AttachmentPoint::Color,
        }
    }
}

/// Depth buffer formats, most preferred first
pub const DEPTH_FORMAT_CANDIDATES: [ImageFormat; 3] = [
    ImageFormat::D32_SFLOAT_S8_UINT,
    ImageFormat::D24_UNORM_S8_UINT,
    ImageFormat::D32_SFLOAT,
];

/// First candidate the device can use as a depth/stencil attachment
pub fn choose_depth_format(is_supported: impl Fn(ImageFormat) -> bool) -> Option<ImageFormat> {
    DEPTH_FORMAT_CANDIDATES
        .iter()
        .copied()
        .find(|format| is_supported(*format))
}

/// Attachment image owned by the render context
///
/// Implemented by backend image types (presentation images, depth buffer).
pub trait Image: Send + Sync {
    /// Render pass slot this image binds to
    fn attachment_point(&self) -> AttachmentPoint;

    /// Pixel format
    fn format(&self) -> ImageFormat;

    /// Size in pixels
    fn extent(&self) -> Extent2D;

    /// Backend downcast
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
