/// VulkanFramebuffer - presentation image and depth buffer bound to a render pass
///
/// Attachments follow the render pass description: its color slot gets the
/// presentation image, its depth/stencil slot the shared depth buffer.

use ash::vk;
use hearth_engine::hearth::{Error, Result};
use hearth_engine::hearth::render::{
    downcast_handle, AttachmentPoint, Extent2D, Framebuffer, Image, RenderPass,
};
use hearth_engine::{engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::DeviceContext;
use crate::vulkan_image::VulkanImage;
use crate::vulkan_render_pass::VulkanRenderPass;

const SOURCE: &str = "hearth::vulkan";

fn invalid(message: String) -> Error {
    engine_error!(SOURCE, "{}", message);
    Error::InvalidResource(message)
}

/// Pick the attachment of each render pass slot, in description order
///
/// # Errors
///
/// `InvalidResource` when the pass declares more than one color attachment,
/// when an image format differs from the declared one, or when `extent`
/// exceeds an attachment
pub(crate) fn select_attachments(
    render_pass: &dyn RenderPass,
    color: &Arc<VulkanImage>,
    depth: &Arc<VulkanImage>,
    extent: Extent2D,
) -> Result<Vec<Arc<VulkanImage>>> {
    let desc = render_pass.desc();
    if desc.color_attachment_count() > 1 {
        return Err(invalid(format!(
            "render pass declares {} color attachments, the presentation chain provides one",
            desc.color_attachment_count()
        )));
    }

    let mut attachments = Vec::with_capacity(desc.attachments().len());
    for attachment in desc.attachments() {
        let image = match attachment.point {
            AttachmentPoint::Color => color,
            _ => depth,
        };
        if image.format() != attachment.format {
            return Err(invalid(format!(
                "{:?} attachment expects {:?}, the context image is {:?}",
                attachment.point, attachment.format, image.format()
            )));
        }
        let image_extent = image.extent();
        if extent.width > image_extent.width || extent.height > image_extent.height {
            return Err(invalid(format!(
                "framebuffer {}x{} exceeds the {}x{} {:?} attachment",
                extent.width, extent.height, image_extent.width, image_extent.height, attachment.point
            )));
        }
        attachments.push(Arc::clone(image));
    }
    Ok(attachments)
}

/// Vulkan framebuffer
///
/// Holds its render pass and attachment images so neither is destroyed
/// while the framebuffer exists.
pub struct VulkanFramebuffer {
    ctx: Arc<DeviceContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    extent: Extent2D,
    render_pass: Arc<dyn RenderPass>,
    /// Image behind the color attachment, when the pass declares one
    color_image: Option<vk::Image>,
    _attachments: Vec<Arc<VulkanImage>>,
}

impl VulkanFramebuffer {
    /// Create a framebuffer of `extent` for `render_pass`
    ///
    /// # Errors
    ///
    /// - `ContractViolation` when `render_pass` belongs to another backend
    /// - `InvalidResource` when the images do not fit the pass (see [`select_attachments`])
    pub fn new(
        ctx: Arc<DeviceContext>,
        render_pass: &Arc<dyn RenderPass>,
        color: &Arc<VulkanImage>,
        depth: &Arc<VulkanImage>,
        extent: Extent2D,
    ) -> Result<Self> {
        let vk_render_pass = downcast_handle::<VulkanRenderPass>(render_pass.as_any(), "render pass", SOURCE)?;
        if extent.is_empty() {
            return Err(invalid(format!("framebuffer size {}x{} has no area", extent.width, extent.height)));
        }
        let attachments = select_attachments(render_pass.as_ref(), color, depth, extent)?;
        let color_image = (render_pass.desc().color_attachment_count() > 0).then_some(color.image);
        let views: Vec<vk::ImageView> = attachments.iter().map(|image| image.view).collect();

        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .attachments(&views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            ctx.device
                .create_framebuffer(&framebuffer_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create framebuffer: {:?}", e))?
        };

        Ok(Self {
            ctx,
            framebuffer,
            extent,
            render_pass: Arc::clone(render_pass),
            color_image,
            _attachments: attachments,
        })
    }

    pub(crate) fn color_image(&self) -> Option<vk::Image> {
        self.color_image
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
