/// Mock render context for unit tests (no GPU required)
///
/// Implements the whole frame protocol on simulated objects. Fences are a
/// `Mutex<bool>` + `Condvar` pair, signaled either on submit or by the test
/// itself, so the blocking behavior of `begin_frame` is observable. Every
/// command buffer records the names of the operations recorded into it.

use std::any::Any;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use glam::Mat4;

use crate::camera::CameraSource;
use crate::engine_bail_warn;
use crate::engine_contract;
use crate::error::{Error, Result};
use crate::platform::SurfaceWindow;
use crate::renderer::{
    camera_view_projection, choose_depth_format, collect_stages, command_buffer_id,
    downcast_handle, negotiate, validate_bytecode, validate_vertex_data, AttachmentPoint,
    Color, CommandBuffer, CommandBufferState, Config, ContextObject, CullingMode, Extent2D,
    FillMode, FragmentShader, FrameSlots, FrameState, Framebuffer, GeometryShader, Image,
    ImageFormat, PipelineDesc, RenderContext, RenderPass, RenderPassDesc, ShaderKind,
    ShaderModule, ShaderProgram, SurfaceCapabilities, VertexBuffer, VertexInputLayout,
    VertexShader, Viewport, PresentMode,
};
use crate::utils::{ResizableSequence, TeardownGraph, TeardownKey};

const SOURCE: &str = "hearth::RenderContext";

// ============================================================================
// Mock Fence
// ============================================================================

/// Simulated fence shared between the context and the test
#[derive(Debug, Clone)]
pub struct MockFence {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl MockFence {
    pub fn new(signaled: bool) -> Self {
        Self {
            state: Arc::new((Mutex::new(signaled), Condvar::new())),
        }
    }

    pub fn signal(&self) {
        let (lock, condvar) = &*self.state;
        *lock.lock().unwrap() = true;
        condvar.notify_all();
    }

    pub fn reset(&self) {
        *self.state.0.lock().unwrap() = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.state.0.lock().unwrap()
    }

    /// Block until signaled, or until `timeout` expires
    pub fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let (lock, condvar) = &*self.state;
        let guard = lock.lock().unwrap();
        match timeout {
            None => {
                let _signaled = condvar.wait_while(guard, |signaled| !*signaled).unwrap();
                Ok(())
            }
            Some(timeout) => {
                let (_signaled, result) = condvar
                    .wait_timeout_while(guard, timeout, |signaled| !*signaled)
                    .unwrap();
                if result.timed_out() {
                    Err(Error::Timeout(format!("fence not signaled after {:?}", timeout)))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Whether two handles share one fence
    pub fn same_as(&self, other: &MockFence) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// When submitted fences signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceSignaling {
    /// As soon as the submission is made
    Immediate,
    /// Only when the test signals them
    Manual,
}

// ============================================================================
// Mock Window
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct MockWindow {
    pub extent: Extent2D,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self { extent: Extent2D::new(width, height) }
    }
}

impl SurfaceWindow for MockWindow {
    fn client_extent(&self) -> Extent2D {
        self.extent
    }
}

/// Capabilities of a permissive surface sized by the window
pub fn mock_capabilities() -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: 2,
        max_image_count: 4,
        current_extent: None,
        min_extent: Extent2D::new(1, 1),
        max_extent: Extent2D::new(4096, 4096),
        present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
    }
}

// ============================================================================
// Mock Resources
// ============================================================================

#[derive(Debug)]
pub struct MockImage {
    pub point: AttachmentPoint,
    pub format: ImageFormat,
    pub extent: Extent2D,
    /// Presentation image index, `None` for the depth buffer
    pub index: Option<u32>,
}

impl Image for MockImage {
    fn attachment_point(&self) -> AttachmentPoint {
        self.point
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

#[derive(Debug)]
pub struct MockRenderPass {
    pub desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFramebuffer {
    pub extent: Extent2D,
    pub render_pass: Arc<dyn RenderPass>,
    /// Presentation image bound as color attachment
    pub image: Option<u32>,
}

impl Framebuffer for MockFramebuffer {
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

#[derive(Debug)]
pub struct MockShaderModule {
    pub kind: ShaderKind,
    pub bytecode: Vec<u8>,
}

impl ShaderModule for MockShaderModule {
    fn kind(&self) -> ShaderKind {
        self.kind
    }

    fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockVertexBuffer {
    pub vertex_count: u32,
    pub stride: u32,
    pub layout: VertexInputLayout,
    pub data: Vec<f32>,
}

impl VertexBuffer for MockVertexBuffer {
    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    fn stride(&self) -> u32 {
        self.stride
    }

    fn layout(&self) -> &VertexInputLayout {
        &self.layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockShaderProgram {
    pub desc: PipelineDesc,
    constants: Mutex<Vec<Option<Mat4>>>,
}

impl MockShaderProgram {
    pub fn new(desc: PipelineDesc, slot_count: usize) -> Self {
        Self {
            desc,
            constants: Mutex::new(vec![None; slot_count]),
        }
    }

    /// Matrix last written to `slot`
    pub fn constants(&self, slot: usize) -> Option<Mat4> {
        self.constants.lock().unwrap().get(slot).copied().flatten()
    }
}

impl ShaderProgram for MockShaderProgram {
    fn pipeline_desc(&self) -> &PipelineDesc {
        &self.desc
    }

    fn constant_buffer_count(&self) -> usize {
        self.constants.lock().unwrap().len()
    }

    fn update_constant_buffer(&self, slot: usize, camera: &dyn CameraSource) -> Result<()> {
        let mut constants = self.constants.lock().unwrap();
        if slot >= constants.len() {
            engine_contract!(SOURCE, "constant buffer slot {} out of range ({} slots)", slot, constants.len());
        }
        constants[slot] = Some(camera_view_projection(camera));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockCommandBuffer {
    state: Mutex<CommandBufferState>,
    fence: MockFence,
    commands: Mutex<Vec<String>>,
}

impl MockCommandBuffer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CommandBufferState::default()),
            fence: MockFence::new(true),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn fence(&self) -> &MockFence {
        &self.fence
    }

    /// Operations recorded since creation
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: impl Into<String>) {
        self.commands.lock().unwrap().push(command.into());
    }
}

impl CommandBuffer for MockCommandBuffer {
    fn state(&self) -> CommandBufferState {
        *self.state.lock().unwrap()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Render Context
// ============================================================================

pub struct MockRenderContext {
    config: Config,
    capabilities: SurfaceCapabilities,
    signaling: FenceSignaling,
    wireframe_supported: bool,
    extent: Extent2D,
    images: ResizableSequence<Arc<MockImage>>,
    depth_buffer: Arc<MockImage>,
    render_pass: Arc<dyn RenderPass>,
    framebuffers: ResizableSequence<Arc<dyn Framebuffer>>,
    frame: FrameState,
    slots: FrameSlots<MockFence>,
    pending_acquire: Option<u32>,
    next_image: u32,
    out_of_date: bool,
    reject_next_submit: bool,
    teardown: TeardownGraph<ContextObject>,
    chain_key: TeardownKey,
    render_pass_key: TeardownKey,
    depth_key: TeardownKey,
    framebuffer_keys: ResizableSequence<TeardownKey>,
    destroyed: Arc<Mutex<Vec<ContextObject>>>,
}

impl MockRenderContext {
    /// Initialize on `window` with a surface reporting `capabilities`
    pub fn new(window: &dyn SurfaceWindow, config: Config, capabilities: SurfaceCapabilities) -> Result<Self> {
        let settings = negotiate(&capabilities, window.client_extent(), &config)?;

        let depth_format = choose_depth_format(|_| true).ok_or_else(|| {
            Error::InitializationFailed("no supported depth format".to_string())
        })?;

        let mut teardown = TeardownGraph::new();
        let _ = teardown.insert(ContextObject::CommandPools, &[])?;
        let _ = teardown.insert(ContextObject::DescriptorPool, &[])?;
        let _ = teardown.insert(ContextObject::SyncObjects, &[])?;
        let _ = teardown.insert(ContextObject::PipelineCache, &[])?;
        let chain_key = teardown.insert(ContextObject::PresentationChain, &[])?;

        let images = Self::build_images(settings.extent, settings.image_count);
        let render_pass: Arc<dyn RenderPass> = Arc::new(MockRenderPass {
            desc: RenderPassDesc::new([
                (AttachmentPoint::Color, ImageFormat::B8G8R8A8_SRGB),
                (depth_format.attachment_point(), depth_format),
            ])?,
        });
        let render_pass_key = teardown.insert(ContextObject::RenderPass, &[chain_key])?;
        let depth_key = teardown.insert(ContextObject::DepthBuffer, &[chain_key])?;

        let mut context = Self {
            depth_buffer: Arc::new(MockImage {
                point: depth_format.attachment_point(),
                format: depth_format,
                extent: settings.extent,
                index: None,
            }),
            slots: FrameSlots::new(settings.image_count),
            extent: settings.extent,
            config,
            capabilities,
            signaling: FenceSignaling::Immediate,
            wireframe_supported: true,
            images,
            render_pass,
            framebuffers: ResizableSequence::new(),
            frame: FrameState::new(),
            pending_acquire: None,
            next_image: 0,
            out_of_date: false,
            reject_next_submit: false,
            teardown,
            chain_key,
            render_pass_key,
            depth_key,
            framebuffer_keys: ResizableSequence::new(),
            destroyed: Arc::new(Mutex::new(Vec::new())),
        };
        context.build_framebuffers()?;
        Ok(context)
    }

    fn build_images(extent: Extent2D, count: u32) -> ResizableSequence<Arc<MockImage>> {
        (0..count)
            .map(|index| {
                Arc::new(MockImage {
                    point: AttachmentPoint::Color,
                    format: ImageFormat::B8G8R8A8_SRGB,
                    extent,
                    index: Some(index),
                })
            })
            .collect()
    }

    fn build_framebuffers(&mut self) -> Result<()> {
        for image in self.images.iter() {
            let key = self.teardown.insert(
                ContextObject::Framebuffer(self.framebuffer_keys.size()),
                &[self.render_pass_key, self.depth_key],
            )?;
            self.framebuffer_keys.add(key);
            self.framebuffers.add(Arc::new(MockFramebuffer {
                extent: self.extent,
                render_pass: Arc::clone(&self.render_pass),
                image: image.index,
            }));
        }
        Ok(())
    }

    // ===== TEST CONTROLS =====

    pub fn set_fence_signaling(&mut self, signaling: FenceSignaling) {
        self.signaling = signaling;
    }

    pub fn set_wireframe_supported(&mut self, supported: bool) {
        self.wireframe_supported = supported;
    }

    /// Make the queue reject the next submission
    pub fn reject_next_submit(&mut self) {
        self.reject_next_submit = true;
    }

    /// Make the surface report out-of-date until the next resize
    pub fn invalidate_surface(&mut self) {
        self.out_of_date = true;
    }

    /// Teardown log, shared so it outlives the context
    pub fn destroyed_objects(&self) -> Arc<Mutex<Vec<ContextObject>>> {
        Arc::clone(&self.destroyed)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ===== HELPERS =====

    fn current_image(&self, operation: &str) -> Result<u32> {
        match self.frame.current_image() {
            Some(image) => Ok(image),
            None => engine_contract!(SOURCE, "{} outside of a frame", operation),
        }
    }

    /// Downcast `cmd`, starting a new recording when needed
    fn recording<'a>(&self, cmd: &'a Arc<dyn CommandBuffer>) -> Result<&'a MockCommandBuffer> {
        let mock = downcast_handle::<MockCommandBuffer>(cmd.as_any(), "command buffer", SOURCE)?;
        let mut state = mock.state.lock().unwrap();
        if !state.recording {
            if state.submitted {
                mock.fence.wait(self.config.fence_timeout)?;
            }
            state.begin_recording();
            drop(state);
            mock.record("begin");
        }
        Ok(mock)
    }

    fn destroy(&mut self, key: TeardownKey) -> Result<()> {
        let object = self.teardown.remove(key)?;
        self.destroyed.lock().unwrap().push(object);
        Ok(())
    }
}

impl RenderContext for MockRenderContext {
    fn begin_frame(&mut self) -> Result<u32> {
        self.frame.check_begin()?;
        if self.out_of_date {
            return Err(Error::OutOfDate);
        }

        let image = match self.pending_acquire {
            Some(image) => image,
            None => {
                if let Some(fence) = self.slots.slot_fence() {
                    fence.wait(self.config.fence_timeout)?;
                }
                self.pending_acquire = Some(self.next_image);
                self.next_image
            }
        };

        if let Some(fence) = self.slots.image_fence(image) {
            fence.wait(self.config.fence_timeout)?;
        }

        self.pending_acquire = None;
        self.frame.begin(image)?;
        Ok(image)
    }

    fn submit_command_buffer(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        self.frame.check_submit()?;
        let image = self.current_image("submit_command_buffer")?;
        // A buffer not recording is submitted as an empty recording
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().finish_for_submit()?;

        // The fence is only reset for a submission the queue accepts
        if std::mem::take(&mut self.reject_next_submit) {
            mock.state.lock().unwrap().submit_rejected();
            mock.record("submit rejected");
            return Err(Error::BackendError("queue rejected the submission".to_string()));
        }
        mock.record("submit");

        mock.fence.reset();
        self.slots.set_in_flight(image, mock.fence.clone());
        if self.signaling == FenceSignaling::Immediate {
            mock.fence.signal();
        }

        self.frame.submit(command_buffer_id(cmd))
    }

    fn present(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        self.frame.present(command_buffer_id(cmd))?;
        self.next_image = (self.next_image + 1) % self.images.size() as u32;
        if self.out_of_date {
            return Err(Error::OutOfDate);
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.frame.end()?;
        self.slots.advance();
        Ok(())
    }

    fn create_vertex_buffer(
        &mut self,
        vertex_count: u32,
        data: &[f32],
        layout: &VertexInputLayout,
        stride: u32,
    ) -> Result<Arc<dyn VertexBuffer>> {
        layout.validate()?;
        validate_vertex_data(vertex_count, data, layout, stride)?;
        Ok(Arc::new(MockVertexBuffer {
            vertex_count,
            stride,
            layout: layout.clone(),
            data: data.to_vec(),
        }))
    }

    fn create_vertex_shader(&mut self, bytecode: &[u8], layout: VertexInputLayout) -> Result<VertexShader> {
        validate_bytecode(bytecode)?;
        layout.validate()?;
        VertexShader::new(
            Arc::new(MockShaderModule { kind: ShaderKind::Vertex, bytecode: bytecode.to_vec() }),
            layout,
        )
    }

    fn create_geometry_shader(&mut self, bytecode: &[u8]) -> Result<GeometryShader> {
        validate_bytecode(bytecode)?;
        GeometryShader::new(Arc::new(MockShaderModule { kind: ShaderKind::Geometry, bytecode: bytecode.to_vec() }))
    }

    fn create_fragment_shader(&mut self, bytecode: &[u8]) -> Result<FragmentShader> {
        validate_bytecode(bytecode)?;
        FragmentShader::new(Arc::new(MockShaderModule { kind: ShaderKind::Fragment, bytecode: bytecode.to_vec() }))
    }

    fn create_shader(
        &mut self,
        vertex: &VertexShader,
        geometry: Option<&GeometryShader>,
        fragment: Option<&FragmentShader>,
        render_pass: &Arc<dyn RenderPass>,
    ) -> Result<Arc<dyn ShaderProgram>> {
        downcast_handle::<MockRenderPass>(render_pass.as_any(), "render pass", SOURCE)?;
        let stages = collect_stages(vertex, geometry, fragment);
        let desc = PipelineDesc::derive(&stages)?;
        Ok(Arc::new(MockShaderProgram::new(desc, self.images.size())))
    }

    fn create_command_buffer(&mut self) -> Result<Arc<dyn CommandBuffer>> {
        Ok(Arc::new(MockCommandBuffer::new()))
    }

    fn create_render_pass(&mut self, images: &[Arc<dyn Image>]) -> Result<Arc<dyn RenderPass>> {
        let desc = RenderPassDesc::new(images.iter().map(|image| (image.attachment_point(), image.format())))?;
        Ok(Arc::new(MockRenderPass { desc }))
    }

    fn create_framebuffer(&mut self, size: Extent2D, render_pass: &Arc<dyn RenderPass>) -> Result<Arc<dyn Framebuffer>> {
        downcast_handle::<MockRenderPass>(render_pass.as_any(), "render pass", SOURCE)?;
        if size.is_empty() {
            return Err(Error::InvalidResource(format!("framebuffer of size {:?}", size)));
        }
        Ok(Arc::new(MockFramebuffer {
            extent: size,
            render_pass: Arc::clone(render_pass),
            image: self.frame.current_image(),
        }))
    }

    fn clear_color_buffer(&mut self, color: Color, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().check_clear("clear_color_buffer")?;
        mock.record(format!("clear_color {:?}", color.to_array()));
        Ok(())
    }

    fn clear_depth_stencil_buffer(&mut self, depth: f32, stencil: u32, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().check_clear("clear_depth_stencil_buffer")?;
        mock.record(format!("clear_depth_stencil {} {}", depth, stencil));
        Ok(())
    }

    fn draw(&mut self, vertex_buffer: &Arc<dyn VertexBuffer>, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        self.draw_multiples(vertex_buffer, 1, cmd)
    }

    fn draw_multiples(
        &mut self,
        vertex_buffer: &Arc<dyn VertexBuffer>,
        instance_count: u32,
        cmd: &Arc<dyn CommandBuffer>,
    ) -> Result<()> {
        let mock = self.recording(cmd)?;
        let operation = if instance_count == 1 { "draw" } else { "draw_multiples" };
        mock.state.lock().unwrap().check_draw(operation)?;
        mock.record(format!("{} {}x{}", operation, vertex_buffer.vertex_count(), instance_count));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, vertex_buffer: &Arc<dyn VertexBuffer>, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        downcast_handle::<MockVertexBuffer>(vertex_buffer.as_any(), "vertex buffer", SOURCE)?;
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().bind_vertex_buffer()?;
        mock.record("bind_vertex_buffer");
        Ok(())
    }

    fn bind_shader_program(&mut self, program: &Arc<dyn ShaderProgram>, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        downcast_handle::<MockShaderProgram>(program.as_any(), "shader program", SOURCE)?;
        let slot = self.frame_slot();
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().bind_program()?;
        mock.record(format!("bind_shader_program slot {}", slot));
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        cmd: &Arc<dyn CommandBuffer>,
    ) -> Result<()> {
        downcast_handle::<MockRenderPass>(render_pass.as_any(), "render pass", SOURCE)?;
        downcast_handle::<MockFramebuffer>(framebuffer.as_any(), "framebuffer", SOURCE)?;
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().begin_render_pass()?;
        mock.record("begin_render_pass");
        Ok(())
    }

    fn end_render_pass(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().end_render_pass()?;
        mock.record("end_render_pass");
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let mock = self.recording(cmd)?;
        mock.record(format!("set_viewport {}x{}", viewport.width, viewport.height));
        Ok(())
    }

    fn set_culling_mode(&mut self, mode: CullingMode, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().culling_mode = mode;
        mock.record(format!("set_culling_mode {:?}", mode));
        Ok(())
    }

    fn set_fill_mode(&mut self, mode: FillMode, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        if mode == FillMode::Wireframe && !self.wireframe_supported {
            engine_bail_warn!(SOURCE, "wireframe fill mode is not supported by this device");
        }
        let mock = self.recording(cmd)?;
        mock.state.lock().unwrap().fill_mode = mode;
        mock.record(format!("set_fill_mode {:?}", mode));
        Ok(())
    }

    fn back_buffer(&self) -> Result<Arc<dyn Image>> {
        let image = self.current_image("back_buffer")?;
        Ok(self.images[image as usize].clone())
    }

    fn depth_stencil_buffer(&self) -> Arc<dyn Image> {
        self.depth_buffer.clone()
    }

    fn back_framebuffer(&self) -> Result<Arc<dyn Framebuffer>> {
        let image = self.current_image("back_framebuffer")?;
        Ok(Arc::clone(&self.framebuffers[image as usize]))
    }

    fn render_pass(&self) -> Arc<dyn RenderPass> {
        Arc::clone(&self.render_pass)
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn image_count(&self) -> u32 {
        self.images.size() as u32
    }

    fn current_image_index(&self) -> Option<u32> {
        self.frame.current_image()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.frame.check_begin()?;
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.wait_idle()?;

        let settings = negotiate(&self.capabilities, Extent2D::new(width, height), &self.config)?;

        let framebuffer_keys: Vec<TeardownKey> = self.framebuffer_keys.drain_all().collect();
        for key in framebuffer_keys.into_iter().rev() {
            self.destroy(key)?;
        }
        self.framebuffers.clear();
        self.destroy(self.depth_key)?;

        self.extent = settings.extent;
        self.images = Self::build_images(settings.extent, settings.image_count);
        self.depth_buffer = Arc::new(MockImage {
            point: self.depth_buffer.point,
            format: self.depth_buffer.format,
            extent: settings.extent,
            index: None,
        });
        self.depth_key = self.teardown.insert(ContextObject::DepthBuffer, &[self.chain_key])?;
        self.build_framebuffers()?;

        self.slots.resize(settings.image_count);
        self.pending_acquire = None;
        self.next_image = 0;
        self.out_of_date = false;
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        for image in 0..self.images.size() as u32 {
            if let Some(fence) = self.slots.image_fence(image) {
                fence.wait(self.config.fence_timeout)?;
            }
        }
        Ok(())
    }
}

impl Drop for MockRenderContext {
    fn drop(&mut self) {
        let mut destroyed = self.destroyed.lock().unwrap();
        destroyed.extend(self.teardown.teardown());
    }
}

#[cfg(test)]
#[path = "mock_render_context_tests.rs"]
mod tests;
