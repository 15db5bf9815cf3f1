/// VulkanRenderPass - single-subpass render pass built from a `RenderPassDesc`

use ash::vk;
use hearth_engine::hearth::Result;
use hearth_engine::hearth::render::{RenderPass, RenderPassDesc};
use hearth_engine::engine_err;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::DeviceContext;
use crate::vulkan_format::{image_format_to_vk, image_layout_to_vk, load_op_to_vk, store_op_to_vk};

const SOURCE: &str = "hearth::vulkan";

/// Vulkan render pass
pub struct VulkanRenderPass {
    ctx: Arc<DeviceContext>,
    pub(crate) render_pass: vk::RenderPass,
    desc: RenderPassDesc,
}

impl VulkanRenderPass {
    /// Create a render pass with one attachment per `desc` entry, in order
    pub fn new(ctx: Arc<DeviceContext>, desc: RenderPassDesc) -> Result<Self> {
        let mut attachments = Vec::with_capacity(desc.attachments().len());
        let mut color_attachment_refs = Vec::new();
        let mut depth_attachment_ref = None;

        for (index, attachment) in desc.attachments().iter().enumerate() {
            attachments.push(vk::AttachmentDescription::default()
                .format(image_format_to_vk(attachment.format))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op_to_vk(attachment.load_op))
                .store_op(store_op_to_vk(attachment.store_op))
                .stencil_load_op(load_op_to_vk(attachment.stencil_load_op))
                .stencil_store_op(store_op_to_vk(attachment.stencil_store_op))
                .initial_layout(image_layout_to_vk(attachment.initial_layout))
                .final_layout(image_layout_to_vk(attachment.final_layout)));

            if attachment.point.is_depth_or_stencil() {
                depth_attachment_ref = Some(vk::AttachmentReference::default()
                    .attachment(index as u32)
                    .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL));
            } else {
                color_attachment_refs.push(vk::AttachmentReference::default()
                    .attachment(index as u32)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
            }
        }

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs);
        if let Some(ref depth_ref) = depth_attachment_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        // Include depth stages when a depth attachment is present
        let (stage_mask, access_mask) = if depth_attachment_ref.is_some() {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        } else {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
        };

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stage_mask)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stage_mask)
            .dst_access_mask(access_mask);

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = unsafe {
            ctx.device
                .create_render_pass(&render_pass_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create render pass: {:?}", e))?
        };

        Ok(Self { ctx, render_pass, desc })
    }
}

impl RenderPass for VulkanRenderPass {
    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
