/// RenderPass trait and attachment descriptors
///
/// A render pass lists its attachments in the fixed order
/// color, depth, stencil, depth-stencil and says how each one is loaded,
/// stored and transitioned. Framebuffers and pipelines reference a render
/// pass; they never own it.

use std::any::Any;
use crate::error::{Error, Result};
use crate::renderer::ImageFormat;

/// Attachment slot of a render pass, in binding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttachmentPoint {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

impl AttachmentPoint {
    /// Depth, stencil and depth-stencil attachments
    pub fn is_depth_or_stencil(&self) -> bool {
        !matches!(self, AttachmentPoint::Color)
    }
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Load existing content
    Load,
    /// Clear the content
    Clear,
    /// Don't care about existing content
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Store the rendered content
    Store,
    /// Don't care about storing the content
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    /// Undefined layout (initial state)
    Undefined,
    /// Layout for color attachment
    ColorAttachment,
    /// Layout for depth/stencil attachment
    DepthStencilAttachment,
    /// Layout for presenting to the presentation chain
    PresentSrc,
}

/// One attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    /// Slot the attachment binds to
    pub point: AttachmentPoint,
    /// Pixel format
    pub format: ImageFormat,
    /// Load operation for color/depth
    pub load_op: LoadOp,
    /// Store operation for color/depth
    pub store_op: StoreOp,
    /// Load operation for stencil
    pub stencil_load_op: LoadOp,
    /// Store operation for stencil
    pub stencil_store_op: StoreOp,
    /// Layout the attachment starts in
    pub initial_layout: ImageLayout,
    /// Layout the attachment ends in
    pub final_layout: ImageLayout,
}

impl AttachmentDesc {
    /// Policy applied to an attachment of the given slot and format
    ///
    /// Color: clear then store, ends ready for presentation.
    /// Depth and stencil: clear, contents discarded, ends as depth-stencil attachment.
    pub fn for_point(point: AttachmentPoint, format: ImageFormat) -> Self {
        match point {
            AttachmentPoint::Color => Self {
                point,
                format,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::PresentSrc,
            },
            _ => Self {
                point,
                format,
                load_op: LoadOp::Clear,
                store_op: StoreOp::DontCare,
                stencil_load_op: if format.has_stencil() { LoadOp::Clear } else { LoadOp::DontCare },
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::DepthStencilAttachment,
            },
        }
    }
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassDesc {
    attachments: Vec<AttachmentDesc>,
}

impl RenderPassDesc {
    /// Build the attachment list from (slot, format) pairs, sorted by slot
    ///
    /// # Errors
    ///
    /// - `InvalidResource` if the list is empty
    /// - `InvalidResource` if more than one depth or stencil attachment is given
    pub fn new(attachments: impl IntoIterator<Item = (AttachmentPoint, ImageFormat)>) -> Result<Self> {
        let mut attachments: Vec<AttachmentDesc> = attachments
            .into_iter()
            .map(|(point, format)| AttachmentDesc::for_point(point, format))
            .collect();

        if attachments.is_empty() {
            return Err(Error::InvalidResource("render pass needs at least one attachment".to_string()));
        }

        let depth_count = attachments.iter().filter(|a| a.point.is_depth_or_stencil()).count();
        if depth_count > 1 {
            return Err(Error::InvalidResource(format!(
                "render pass has {} depth/stencil attachments, at most one is allowed",
                depth_count
            )));
        }

        // Stable: color attachments keep their relative order
        attachments.sort_by_key(|a| a.point);
        Ok(Self { attachments })
    }

    /// Attachments in binding order
    pub fn attachments(&self) -> &[AttachmentDesc] {
        &self.attachments
    }

    /// Color attachments
    pub fn color_attachments(&self) -> impl Iterator<Item = &AttachmentDesc> {
        self.attachments.iter().filter(|a| a.point == AttachmentPoint::Color)
    }

    /// Number of color attachments
    pub fn color_attachment_count(&self) -> usize {
        self.color_attachments().count()
    }

    /// The depth, stencil or depth-stencil attachment, if any
    pub fn depth_attachment(&self) -> Option<&AttachmentDesc> {
        self.attachments.iter().find(|a| a.point.is_depth_or_stencil())
    }
}

/// Render pass resource trait
///
/// Implemented by backend-specific render pass types (e.g., VulkanRenderPass).
pub trait RenderPass: Send + Sync {
    /// Attachments this render pass was created with
    fn desc(&self) -> &RenderPassDesc;

    /// Backend downcast
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
