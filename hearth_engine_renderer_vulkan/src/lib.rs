/*!
# Hearth Engine - Vulkan Render Context

Vulkan implementation of the `hearth_engine` render-context protocol.

This crate provides `VulkanRenderContext`, built on the Ash bindings with
gpu-allocator for memory management and spirq for vertex-input reflection.
The backend is registered by name in a `RenderContextRegistry` and selected
at startup.

## Features

- `vulkan-validation`: compiles in the Khronos validation layer, the debug
  messenger and validation statistics. Without it none of that code is
  present in the binary.
*/

#[cfg(feature = "vulkan-validation")]
mod debug;

mod vulkan_context;
mod vulkan_format;
mod vulkan_sync;
mod vulkan_image;
mod vulkan_swapchain;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_shader;
mod vulkan_buffer;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_render_context;

pub use vulkan_context::{DeviceContext, DeviceFeatures};
pub use vulkan_render_context::VulkanRenderContext;
pub use vulkan_image::VulkanImage;
pub use vulkan_render_pass::VulkanRenderPass;
pub use vulkan_frame_buffer::VulkanFramebuffer;
pub use vulkan_shader::VulkanShaderModule;
pub use vulkan_buffer::VulkanVertexBuffer;
pub use vulkan_pipeline::VulkanShaderProgram;
pub use vulkan_command_list::VulkanCommandBuffer;

// Re-export debug utilities
#[cfg(feature = "vulkan-validation")]
pub use debug::{print_validation_stats_report, validation_stats, ValidationStats};

use hearth_engine::hearth::RenderContext;
use hearth_engine::hearth::render::RenderContextRegistry;

/// Name the backend is registered under
pub const BACKEND_NAME: &str = "vulkan";

/// Register the Vulkan backend in `registry`
///
/// # Example
///
/// ```no_run
/// use hearth_engine::hearth::render::{Config, RenderContextRegistry};
/// # fn run(window: &winit::window::Window) -> hearth_engine::hearth::Result<()> {
///
/// let mut registry = RenderContextRegistry::new();
/// hearth_engine_renderer_vulkan::register(&mut registry);
/// let context = registry.create_context("vulkan", window, Config::default())?;
/// # Ok(())
/// # }
/// ```
pub fn register(registry: &mut RenderContextRegistry) {
    registry.register_backend(BACKEND_NAME, |window: &winit::window::Window, config| {
        let context = VulkanRenderContext::new(window, config)?;
        Ok(Box::new(context) as Box<dyn RenderContext>)
    });
}
