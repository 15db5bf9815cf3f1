/// Swapchain - presentation chain of the render context
///
/// Negotiation (extent, image count, present mode) is the backend-independent
/// `negotiate`; this type turns its outcome into a `VkSwapchainKHR` and
/// wraps each image in a `VulkanImage`.

use ash::vk;
use hearth_engine::hearth::{Error, Result};
use hearth_engine::hearth::render::{
    negotiate, ChainSettings, Config, Extent2D, ImageFormat, PresentMode, SurfaceCapabilities,
};
use hearth_engine::hearth::utils::ResizableSequence;
use hearth_engine::{engine_debug, engine_err, engine_info, engine_warn};
use std::sync::Arc;

use crate::vulkan_context::{init_failed, DeviceContext};
use crate::vulkan_format::{
    extent_to_vk, present_mode_to_vk, surface_capabilities_from_vk, vk_format_to_image_format,
};
use crate::vulkan_image::VulkanImage;

const SOURCE: &str = "hearth::vulkan";

/// Surface formats in order of preference
const PREFERRED_FORMATS: [vk::Format; 2] = [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB];

/// Presentation chain
pub struct Swapchain {
    ctx: Arc<DeviceContext>,
    swapchain: vk::SwapchainKHR,
    images: ResizableSequence<Arc<VulkanImage>>,
    surface_format: vk::SurfaceFormatKHR,
    format: ImageFormat,
    extent: Extent2D,
    present_mode: PresentMode,
}

/// Surface capabilities and present modes in engine terms
pub(crate) fn query_capabilities(ctx: &DeviceContext) -> Result<SurfaceCapabilities> {
    unsafe {
        let capabilities = ctx
            .surface_loader
            .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
            .map_err(|e| init_failed("Failed to get surface capabilities", e))?;
        let present_modes = ctx
            .surface_loader
            .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
            .map_err(|e| init_failed("Failed to get surface present modes", e))?;
        Ok(surface_capabilities_from_vk(&capabilities, &present_modes))
    }
}

/// First preferred sRGB format, else the first format the engine models
fn choose_surface_format(ctx: &DeviceContext) -> Result<(vk::SurfaceFormatKHR, ImageFormat)> {
    let surface_formats = unsafe {
        ctx.surface_loader
            .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
            .map_err(|e| init_failed("Failed to get surface formats", e))?
    };

    let preferred = PREFERRED_FORMATS
        .iter()
        .find_map(|wanted| surface_formats.iter().find(|f| f.format == *wanted));
    let chosen = preferred.or_else(|| {
        surface_formats
            .iter()
            .find(|f| vk_format_to_image_format(f.format).is_some())
    });

    match chosen.and_then(|f| vk_format_to_image_format(f.format).map(|format| (*f, format))) {
        Some(found) => Ok(found),
        None => Err(init_failed("No supported surface format", &surface_formats)),
    }
}

impl Swapchain {
    /// Create the chain for a window of `window_extent`
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when the surface cannot be queried, the
    /// negotiated extent has no area, or creation fails
    pub fn new(ctx: Arc<DeviceContext>, window_extent: Extent2D, config: &Config) -> Result<Self> {
        let (surface_format, format) = choose_surface_format(&ctx)?;
        let mut chain = Self {
            ctx,
            swapchain: vk::SwapchainKHR::null(),
            images: ResizableSequence::new(),
            surface_format,
            format,
            extent: Extent2D::default(),
            present_mode: PresentMode::Fifo,
        };
        chain.recreate(window_extent, config)?;
        Ok(chain)
    }

    /// Rebuild the chain for a new window size
    ///
    /// The previous swapchain is handed to the driver as `old_swapchain`
    /// and destroyed once the new one exists. The device must be idle.
    pub fn recreate(&mut self, window_extent: Extent2D, config: &Config) -> Result<()> {
        let capabilities = query_capabilities(&self.ctx)?;
        let settings = negotiate(&capabilities, window_extent, config).map_err(|e| {
            engine_warn!(SOURCE, "Presentation chain negotiation failed: {}", e);
            e
        })?;
        if settings.present_mode != config.present_mode {
            engine_info!(SOURCE, "Present mode {:?} unsupported, using {:?}",
                config.present_mode, settings.present_mode);
        }

        let transform = unsafe {
            self.ctx
                .surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.ctx.surface)
                .map_err(|e| init_failed("Failed to get surface capabilities", e))?
                .current_transform
        };

        let old_swapchain = self.swapchain;
        let swapchain = self.create_swapchain(&settings, transform, old_swapchain)?;

        // Views of the old images go before the old swapchain
        self.images.clear();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.ctx.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
        }
        self.swapchain = swapchain;
        self.extent = settings.extent;
        self.present_mode = settings.present_mode;

        let raw_images = unsafe {
            self.ctx
                .swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| init_failed("Failed to get swapchain images", e))?
        };
        for image in raw_images {
            let image = VulkanImage::from_chain_image(Arc::clone(&self.ctx), image, self.format, self.extent)?;
            self.images.add(Arc::new(image));
        }

        engine_debug!(SOURCE, "Presentation chain {}x{}, {} images, {:?}",
            self.extent.width, self.extent.height, self.images.size(), self.present_mode);
        Ok(())
    }

    fn create_swapchain(
        &self,
        settings: &ChainSettings,
        transform: vk::SurfaceTransformFlagsKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<vk::SwapchainKHR> {
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.ctx.surface)
            .min_image_count(settings.image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent_to_vk(settings.extent))
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode_to_vk(settings.present_mode))
            .clipped(true)
            .old_swapchain(old_swapchain);

        unsafe {
            self.ctx
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| init_failed("Failed to create swapchain", e))
        }
    }

    /// Acquire the next image, signaling `semaphore`
    ///
    /// A suboptimal chain still yields its image.
    ///
    /// # Errors
    ///
    /// - `OutOfDate` when the chain must be recreated
    /// - `Timeout` when no image became available within `timeout_ns`
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout_ns: u64) -> Result<u32> {
        let acquired = unsafe {
            self.ctx
                .swapchain_loader
                .acquire_next_image(self.swapchain, timeout_ns, semaphore, vk::Fence::null())
        };
        match acquired {
            Ok((image_index, _suboptimal)) => Ok(image_index),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!(SOURCE, "Presentation chain out of date during acquire");
                Err(Error::OutOfDate)
            }
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                engine_warn!(SOURCE, "No presentation image available after {} ns", timeout_ns);
                Err(Error::Timeout(format!("image acquire not completed after {} ns", timeout_ns)))
            }
            Err(e) => Err(engine_err!(SOURCE, "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    /// Queue `image_index` for presentation once `wait` is signaled
    ///
    /// # Errors
    ///
    /// `OutOfDate` when the chain is suboptimal or out of date
    pub fn present(&self, image_index: u32, wait: vk::Semaphore) -> Result<()> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe { self.ctx.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) };
        match presented {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!(SOURCE, "Presentation chain out of date during present");
                Err(Error::OutOfDate)
            }
            Err(e) => Err(engine_err!(SOURCE, "Failed to present swapchain image: {:?}", e)),
        }
    }

    pub fn image(&self, index: u32) -> Option<&Arc<VulkanImage>> {
        self.images.get(index as usize)
    }

    pub fn images(&self) -> &[Arc<VulkanImage>] {
        &self.images
    }

    pub fn image_count(&self) -> u32 {
        self.images.size() as u32
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.images.clear();
        unsafe {
            self.ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
