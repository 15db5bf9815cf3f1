/// VulkanImage - presentation images and the depth buffer

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use hearth_engine::hearth::{Error, Result};
use hearth_engine::hearth::render::{AttachmentPoint, Extent2D, Image, ImageFormat};
use hearth_engine::{engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::DeviceContext;
use crate::vulkan_format::{image_aspect_flags, image_format_to_vk};

const SOURCE: &str = "hearth::vulkan";

/// Attachment image with its view
///
/// Presentation images belong to the swapchain; only their view is
/// destroyed here. The depth buffer owns its image and memory.
pub struct VulkanImage {
    ctx: Arc<DeviceContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    owns_image: bool,
    format: ImageFormat,
    extent: Extent2D,
}

fn create_view(ctx: &DeviceContext, image: vk::Image, format: ImageFormat) -> Result<vk::ImageView> {
    let view_create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(image_format_to_vk(format))
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: image_aspect_flags(format),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe {
        ctx.device
            .create_image_view(&view_create_info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create image view: {:?}", e))
    }
}

impl VulkanImage {
    /// Wrap a swapchain image, creating its view
    pub fn from_chain_image(
        ctx: Arc<DeviceContext>,
        image: vk::Image,
        format: ImageFormat,
        extent: Extent2D,
    ) -> Result<Self> {
        let view = create_view(&ctx, image, format)?;
        Ok(Self {
            ctx,
            image,
            view,
            allocation: None,
            owns_image: false,
            format,
            extent,
        })
    }

    /// Create a device-local depth/stencil image of `extent`
    ///
    /// # Errors
    ///
    /// - `OutOfMemory` when the allocation fails
    /// - `BackendError` when image or view creation fails
    pub fn new_depth_buffer(ctx: Arc<DeviceContext>, format: ImageFormat, extent: Extent2D) -> Result<Self> {
        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(image_format_to_vk(format))
            .extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            ctx.device
                .create_image(&image_create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create depth image: {:?}", e))?
        };

        // From here on Drop releases whatever was created
        let mut depth = Self {
            ctx,
            image,
            view: vk::ImageView::null(),
            allocation: None,
            owns_image: true,
            format,
            extent,
        };

        let requirements = unsafe { depth.ctx.device.get_image_memory_requirements(image) };
        let allocation = depth
            .ctx
            .allocator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .allocate(&AllocationCreateDesc {
                name: "depth_buffer",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(SOURCE, "Out of GPU memory for depth buffer ({}x{}, {:.2} MB)",
                    extent.width, extent.height, size_mb);
                Error::OutOfMemory
            })?;

        unsafe {
            depth
                .ctx
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!(SOURCE, "Failed to bind depth image memory: {:?}", e))?;
        }
        depth.allocation = Some(allocation);
        depth.view = create_view(&depth.ctx, image, format)?;

        Ok(depth)
    }
}

impl Image for VulkanImage {
    fn attachment_point(&self) -> AttachmentPoint {
        self.format.attachment_point()
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanImage {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }

            if !self.owns_image {
                return;
            }

            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the image
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
