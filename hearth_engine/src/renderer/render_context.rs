/// RenderContext trait - frame protocol, factories and recording operations

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use crate::camera::CameraSource;
use crate::error::{Error, Result};
use crate::engine_contract;
use crate::renderer::{
    Color, CommandBuffer, Config, CullingMode, Extent2D, FillMode, FragmentShader,
    Framebuffer, GeometryShader, Image, RenderPass, ShaderProgram, VertexBuffer,
    VertexInputLayout, VertexShader, Viewport,
};

// ============================================================================
// Teardown tags
// ============================================================================

/// Objects a render context registers in its teardown graph
///
/// Dependencies run from an object to what it needs alive: a framebuffer
/// depends on the render pass and the depth buffer, the depth buffer and
/// the render pass on the presentation chain, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextObject {
    /// Presentation chain (swapchain images and views)
    PresentationChain,
    /// Depth/stencil buffer shared by every presentation image
    DepthBuffer,
    /// Render pass of the presentation chain
    RenderPass,
    /// Framebuffer of one presentation image
    Framebuffer(usize),
    /// Graphics and presentation command pools
    CommandPools,
    /// Queue-family ownership transfer command buffers
    OwnershipCommands,
    /// Shared binding-set pool
    DescriptorPool,
    /// Semaphores
    SyncObjects,
    /// Pipeline cache
    PipelineCache,
}

// ============================================================================
// RenderContext trait
// ============================================================================

/// Render context: device, presentation chain, frame protocol and factories
///
/// One implementation per graphics API, chosen at startup (see
/// [`RenderContextRegistry`]). A frame is
///
/// ```text
/// let image = ctx.begin_frame()?;
/// // record into cmd with the recording operations
/// ctx.submit_command_buffer(&cmd)?;
/// ctx.present(&cmd)?;
/// ctx.end_frame()?;
/// ```
///
/// Recording operations only take effect once the command buffer is
/// submitted. Ordering mistakes return `Error::ContractViolation`.
pub trait RenderContext: Send {
    // ===== FRAME PROTOCOL =====

    /// Acquire the next presentation image
    ///
    /// Waits on the fence of the command buffer last submitted against the
    /// acquired image, so recording may reuse that image's resources.
    ///
    /// # Returns
    ///
    /// The acquired image index, in `[0, image_count())`
    ///
    /// # Errors
    ///
    /// - `OutOfDate` when the chain no longer matches the surface
    /// - `Timeout` when `Config::fence_timeout` expires; retrying resumes the wait
    fn begin_frame(&mut self) -> Result<u32>;

    /// End recording of `cmd` and submit it for the current image
    ///
    /// The submission waits on the image-available signal, signals
    /// rendering-finished and is gated by the command buffer's fence.
    fn submit_command_buffer(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    /// Present the current image once `cmd` (submitted this frame) finished
    ///
    /// # Errors
    ///
    /// `OutOfDate` when the chain must be resized. The frame still counts as
    /// presented and `end_frame` must follow.
    fn present(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    /// Close the frame begun by `begin_frame`
    fn end_frame(&mut self) -> Result<()>;

    // ===== FACTORIES =====

    /// Create a vertex buffer holding `vertex_count` vertices of `stride` bytes
    ///
    /// # Errors
    ///
    /// `InvalidResource` when the data does not match the layout
    fn create_vertex_buffer(
        &mut self,
        vertex_count: u32,
        data: &[f32],
        layout: &VertexInputLayout,
        stride: u32,
    ) -> Result<Arc<dyn VertexBuffer>>;

    /// Create a vertex stage from SPIR-V bytecode
    fn create_vertex_shader(&mut self, bytecode: &[u8], layout: VertexInputLayout) -> Result<VertexShader>;

    /// Create a geometry stage from SPIR-V bytecode
    fn create_geometry_shader(&mut self, bytecode: &[u8]) -> Result<GeometryShader>;

    /// Create a fragment stage from SPIR-V bytecode
    fn create_fragment_shader(&mut self, bytecode: &[u8]) -> Result<FragmentShader>;

    /// Compile a shader program against `render_pass`
    ///
    /// Stages are linked in order vertex, geometry, fragment. The program
    /// owns one constant buffer and binding set per presentation image.
    fn create_shader(
        &mut self,
        vertex: &VertexShader,
        geometry: Option<&GeometryShader>,
        fragment: Option<&FragmentShader>,
        render_pass: &Arc<dyn RenderPass>,
    ) -> Result<Arc<dyn ShaderProgram>>;

    /// Create a command buffer with its own fence
    fn create_command_buffer(&mut self) -> Result<Arc<dyn CommandBuffer>>;

    /// Create a render pass with one attachment per image
    fn create_render_pass(&mut self, images: &[Arc<dyn Image>]) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer of `size` for `render_pass`
    ///
    /// The framebuffer binds the current back buffer and the shared depth
    /// buffer, filtered by the attachments the render pass declares. It
    /// targets one presentation image, so create it per frame; use
    /// `back_framebuffer` to reuse one across frames.
    fn create_framebuffer(&mut self, size: Extent2D, render_pass: &Arc<dyn RenderPass>) -> Result<Arc<dyn Framebuffer>>;

    // ===== RECORDING =====

    /// Clear every color attachment of the active render pass
    fn clear_color_buffer(&mut self, color: Color, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    /// Clear the depth/stencil attachment of the active render pass
    fn clear_depth_stencil_buffer(&mut self, depth: f32, stencil: u32, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    /// Draw every vertex of `vertex_buffer`
    fn draw(&mut self, vertex_buffer: &Arc<dyn VertexBuffer>, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    /// Draw `instance_count` instances of every vertex of `vertex_buffer`
    fn draw_multiples(
        &mut self,
        vertex_buffer: &Arc<dyn VertexBuffer>,
        instance_count: u32,
        cmd: &Arc<dyn CommandBuffer>,
    ) -> Result<()>;

    fn bind_vertex_buffer(&mut self, vertex_buffer: &Arc<dyn VertexBuffer>, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    /// Bind a program and the binding set of the current frame slot
    fn bind_shader_program(&mut self, program: &Arc<dyn ShaderProgram>, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    /// Begin `render_pass` on `framebuffer`, clearing with the configured values
    ///
    /// Viewport and scissor start at the framebuffer extent.
    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        cmd: &Arc<dyn CommandBuffer>,
    ) -> Result<()>;

    fn end_render_pass(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    fn set_culling_mode(&mut self, mode: CullingMode, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    /// Select the solid or wireframe pipeline variant
    ///
    /// # Errors
    ///
    /// `BackendError` when the device lacks non-solid fill
    fn set_fill_mode(&mut self, mode: FillMode, cmd: &Arc<dyn CommandBuffer>) -> Result<()>;

    // ===== ACCESSORS =====

    /// Image acquired by the frame in progress
    fn back_buffer(&self) -> Result<Arc<dyn Image>>;

    /// Depth/stencil buffer shared by every presentation image
    fn depth_stencil_buffer(&self) -> Arc<dyn Image>;

    /// Context framebuffer of the image acquired by the frame in progress
    fn back_framebuffer(&self) -> Result<Arc<dyn Framebuffer>>;

    /// Render pass of the presentation chain
    fn render_pass(&self) -> Arc<dyn RenderPass>;

    /// Presentation chain extent
    fn extent(&self) -> Extent2D;

    /// Number of presentation images
    fn image_count(&self) -> u32;

    /// Image acquired by the frame in progress, `None` between frames
    fn current_image_index(&self) -> Option<u32>;

    /// Slot of the per-frame constant buffers used by the frame in progress
    ///
    /// Equal to the current image index; 0 between frames.
    fn frame_slot(&self) -> usize {
        self.current_image_index().map_or(0, |image| image as usize)
    }

    /// Write the camera's view-projection into `program`'s buffer for the current slot
    fn update_shader_constants(&mut self, program: &Arc<dyn ShaderProgram>, camera: &dyn CameraSource) -> Result<()> {
        program.update_constant_buffer(self.frame_slot(), camera)
    }

    // ===== LIFECYCLE =====

    /// Recreate the presentation chain, depth buffer and framebuffers
    ///
    /// Waits for the device to go idle first. A zero-area size (minimized
    /// window) leaves the chain untouched.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Block until the GPU finished all submitted work
    fn wait_idle(&self) -> Result<()>;
}

/// Recover a backend type from a trait object's `as_any`
///
/// # Errors
///
/// `ContractViolation` when the handle belongs to another backend
pub fn downcast_handle<'a, T: Any>(handle: &'a dyn Any, what: &str, source: &str) -> Result<&'a T> {
    match handle.downcast_ref::<T>() {
        Some(concrete) => Ok(concrete),
        None => engine_contract!(source, "{} was not created by this render context", what),
    }
}

// ============================================================================
// Backend registry
// ============================================================================

type RenderContextFactory<W> = Box<dyn Fn(&W, Config) -> Result<Box<dyn RenderContext>> + Send + Sync>;

/// Registry of render context backends, selected by name at startup
pub struct RenderContextRegistry<W: ?Sized = winit::window::Window> {
    backends: HashMap<&'static str, RenderContextFactory<W>>,
}

impl<W: ?Sized> RenderContextRegistry<W> {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend
    ///
    /// # Arguments
    ///
    /// * `name` - Backend name (e.g., "vulkan")
    /// * `factory` - Builds a context for a window and configuration
    pub fn register_backend<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn(&W, Config) -> Result<Box<dyn RenderContext>> + Send + Sync + 'static,
    {
        self.backends.insert(name, Box::new(factory));
    }

    pub fn has_backend(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered backend names, sorted
    pub fn backend_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.backends.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Create a render context with the backend registered as `name`
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when no such backend is registered, or
    /// whatever the backend's constructor returns
    pub fn create_context(&self, name: &str, window: &W, config: Config) -> Result<Box<dyn RenderContext>> {
        let factory = self.backends.get(name).ok_or_else(|| {
            Error::InitializationFailed(format!("Render backend '{}' not registered", name))
        })?;
        factory(window, config)
    }
}

impl<W: ?Sized> Default for RenderContextRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}
