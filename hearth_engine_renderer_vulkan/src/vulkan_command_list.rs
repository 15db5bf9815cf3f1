/// Command pools, command buffers and queue-family ownership transfers

use ash::vk;
use hearth_engine::hearth::Result;
use hearth_engine::hearth::render::{
    AttachmentPoint, CommandBuffer, CommandBufferState, Extent2D, Framebuffer, RenderPass,
    ShaderProgram, VertexBuffer,
};
use hearth_engine::hearth::utils::ResizableSequence;
use hearth_engine::engine_err;
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::DeviceContext;
use crate::vulkan_image::VulkanImage;
use crate::vulkan_sync::Fence;

const SOURCE: &str = "hearth::vulkan";

// ============================================================================
// Command pools
// ============================================================================

/// Command pool of one queue family
pub struct CommandPool {
    ctx: Arc<DeviceContext>,
    pool: vk::CommandPool,
    family: u32,
}

impl CommandPool {
    pub fn new(ctx: Arc<DeviceContext>, family: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe {
            ctx.device
                .create_command_pool(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create command pool: {:?}", e))?
        };
        Ok(Self { ctx, pool, family })
    }

    pub fn family(&self) -> u32 {
        self.family
    }

    /// Allocate `count` primary command buffers
    fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.ctx
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to allocate command buffers: {:?}", e))
        }
    }

    fn free(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.ctx.device.free_command_buffers(self.pool, command_buffers);
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Graphics pool, plus a presentation pool when the families differ
pub struct CommandPools {
    pub(crate) graphics: Arc<CommandPool>,
    pub(crate) present: Option<Arc<CommandPool>>,
}

impl CommandPools {
    pub fn new(ctx: &Arc<DeviceContext>) -> Result<Self> {
        let graphics = Arc::new(CommandPool::new(Arc::clone(ctx), ctx.graphics_family)?);
        let present = if ctx.families_differ() {
            Some(Arc::new(CommandPool::new(Arc::clone(ctx), ctx.present_family)?))
        } else {
            None
        };
        Ok(Self { graphics, present })
    }
}

// ============================================================================
// Command buffer
// ============================================================================

/// Handle a recording keeps alive until its command buffer is re-recorded
#[allow(dead_code)]
enum Retained {
    Program(Arc<dyn ShaderProgram>),
    VertexBuffer(Arc<dyn VertexBuffer>),
    RenderPass(Arc<dyn RenderPass>),
    Framebuffer(Arc<dyn Framebuffer>),
}

/// Attachments of the render pass being recorded, for attachment clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePass {
    pub color_attachments: u32,
    pub depth_stencil: Option<AttachmentPoint>,
    pub extent: Extent2D,
}

#[derive(Default)]
struct RecordingResources {
    bound_program: Option<Arc<dyn ShaderProgram>>,
    active_pass: Option<ActivePass>,
    /// Color images render passes of this recording left in the present layout
    presented_images: Vec<vk::Image>,
    retained: Vec<Retained>,
}

/// Vulkan command buffer with its own fence
///
/// The fence is created signaled and reset at each submission. Handles
/// used by a recording are retained until the next recording begins, which
/// only happens after the fence signaled.
pub struct VulkanCommandBuffer {
    pool: Arc<CommandPool>,
    pub(crate) command_buffer: vk::CommandBuffer,
    pub(crate) fence: Arc<Fence>,
    state: Mutex<CommandBufferState>,
    resources: Mutex<RecordingResources>,
}

impl VulkanCommandBuffer {
    pub fn new(pool: &Arc<CommandPool>) -> Result<Self> {
        let command_buffers = pool.allocate(1)?;
        let fence = match Fence::new(Arc::clone(&pool.ctx)) {
            Ok(fence) => fence,
            Err(e) => {
                pool.free(&command_buffers);
                return Err(e);
            }
        };

        Ok(Self {
            pool: Arc::clone(pool),
            command_buffer: command_buffers[0],
            fence: Arc::new(fence),
            state: Mutex::new(CommandBufferState::default()),
            resources: Mutex::new(RecordingResources::default()),
        })
    }

    fn device(&self) -> &ash::Device {
        &self.pool.ctx.device
    }

    /// Begin a new recording unless one is in progress
    ///
    /// A submitted buffer first waits for its fence, bounded by `timeout_ns`.
    pub fn ensure_recording(&self, timeout_ns: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.recording {
            return Ok(());
        }
        if state.submitted {
            self.fence.wait(timeout_ns)?;
        }

        unsafe {
            self.device()
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!(SOURCE, "Failed to reset command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device()
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to begin command buffer: {:?}", e))?;
        }

        *self.resources.lock().unwrap_or_else(|e| e.into_inner()) = RecordingResources::default();
        state.begin_recording();
        Ok(())
    }

    /// Run `check` against the recording state
    pub fn with_state<R>(&self, check: impl FnOnce(&mut CommandBufferState) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        check(&mut state)
    }

    pub fn end_recording(&self) -> Result<()> {
        unsafe {
            self.device()
                .end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!(SOURCE, "Failed to end command buffer: {:?}", e))
        }
    }

    pub fn retain_program(&self, program: &Arc<dyn ShaderProgram>) {
        let mut resources = self.resources.lock().unwrap_or_else(|e| e.into_inner());
        resources.bound_program = Some(Arc::clone(program));
        resources.retained.push(Retained::Program(Arc::clone(program)));
    }

    pub fn retain_vertex_buffer(&self, vertex_buffer: &Arc<dyn VertexBuffer>) {
        let mut resources = self.resources.lock().unwrap_or_else(|e| e.into_inner());
        resources.retained.push(Retained::VertexBuffer(Arc::clone(vertex_buffer)));
    }

    /// Keep the pass and framebuffer alive and mark the pass active
    ///
    /// `color_image` is the presentation image the framebuffer writes, if any.
    pub fn retain_render_pass(
        &self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        color_image: Option<vk::Image>,
    ) {
        let desc = render_pass.desc();
        let mut resources = self.resources.lock().unwrap_or_else(|e| e.into_inner());
        resources.active_pass = Some(ActivePass {
            color_attachments: desc.color_attachment_count() as u32,
            depth_stencil: desc.depth_attachment().map(|attachment| attachment.point),
            extent: framebuffer.extent(),
        });
        resources.presented_images.extend(color_image);
        resources.retained.push(Retained::RenderPass(Arc::clone(render_pass)));
        resources.retained.push(Retained::Framebuffer(Arc::clone(framebuffer)));
    }

    pub fn end_active_pass(&self) {
        self.resources.lock().unwrap_or_else(|e| e.into_inner()).active_pass = None;
    }

    pub fn active_pass(&self) -> Option<ActivePass> {
        self.resources.lock().unwrap_or_else(|e| e.into_inner()).active_pass
    }

    /// Program bound last in the current recording
    pub fn bound_program(&self) -> Option<Arc<dyn ShaderProgram>> {
        self.resources.lock().unwrap_or_else(|e| e.into_inner()).bound_program.clone()
    }

    /// Whether a render pass of the current recording wrote `image`
    pub fn wrote_image(&self, image: vk::Image) -> bool {
        self.resources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .presented_images
            .contains(&image)
    }
}

impl CommandBuffer for VulkanCommandBuffer {
    fn state(&self) -> CommandBufferState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanCommandBuffer {
    fn drop(&mut self) {
        let submitted = self.state.get_mut().map(|state| state.submitted).unwrap_or(true);
        if submitted {
            // Ignore the result: the buffer is freed either way
            self.fence.wait(u64::MAX).ok();
        }
        self.pool.free(&[self.command_buffer]);
    }
}

// ============================================================================
// Layout and ownership barriers
// ============================================================================

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

/// Move a presentation image no render pass wrote to the present layout
pub(crate) fn record_present_transition(device: &ash::Device, command_buffer: vk::CommandBuffer, image: vk::Image) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_range());

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

fn ownership_barrier(image: vk::Image, graphics_family: u32, present_family: u32) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .src_queue_family_index(graphics_family)
        .dst_queue_family_index(present_family)
        .image(image)
        .subresource_range(color_range())
}

/// Release half of the graphics to presentation ownership transfer
pub(crate) fn record_ownership_release(
    ctx: &DeviceContext,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
) {
    let barrier = ownership_barrier(image, ctx.graphics_family, ctx.present_family)
        .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .dst_access_mask(vk::AccessFlags::empty());

    unsafe {
        ctx.device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

/// Acquire half of the ownership transfer, one pre-recorded buffer per image
///
/// Recorded with `SIMULTANEOUS_USE` on the presentation pool and submitted
/// on the presentation queue before each present.
pub struct OwnershipCommands {
    pool: Arc<CommandPool>,
    command_buffers: ResizableSequence<vk::CommandBuffer>,
}

impl OwnershipCommands {
    pub fn new(pool: &Arc<CommandPool>, images: &[Arc<VulkanImage>]) -> Result<Self> {
        let mut commands = Self {
            pool: Arc::clone(pool),
            command_buffers: ResizableSequence::new(),
        };
        commands.record(images)?;
        Ok(commands)
    }

    /// Free the current buffers and record one per image of `images`
    ///
    /// The presentation queue must be idle.
    pub fn record(&mut self, images: &[Arc<VulkanImage>]) -> Result<()> {
        let previous: Vec<vk::CommandBuffer> = self.command_buffers.drain_all().collect();
        self.pool.free(&previous);
        if images.is_empty() {
            return Ok(());
        }

        let command_buffers = self.pool.allocate(images.len() as u32)?;
        self.command_buffers = command_buffers.iter().copied().collect();

        let ctx = &self.pool.ctx;
        for (command_buffer, image) in command_buffers.iter().zip(images) {
            let barrier = ownership_barrier(image.image, ctx.graphics_family, ctx.present_family)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::empty());
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);

            unsafe {
                ctx.device
                    .begin_command_buffer(*command_buffer, &begin_info)
                    .map_err(|e| engine_err!(SOURCE, "Failed to begin ownership command buffer: {:?}", e))?;
                ctx.device.cmd_pipeline_barrier(
                    *command_buffer,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
                ctx.device
                    .end_command_buffer(*command_buffer)
                    .map_err(|e| engine_err!(SOURCE, "Failed to end ownership command buffer: {:?}", e))?;
            }
        }
        Ok(())
    }

    /// Submit the acquire barrier of `image` on the presentation queue
    ///
    /// Waits on `render_finished` and signals `ownership_finished`.
    pub fn submit(&self, image: u32, render_finished: vk::Semaphore, ownership_finished: vk::Semaphore) -> Result<()> {
        let command_buffer = match self.command_buffers.get(image as usize) {
            Some(command_buffer) => *command_buffer,
            None => return Err(engine_err!(SOURCE, "No ownership command buffer for image {}", image)),
        };

        let wait_semaphores = [render_finished];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let signal_semaphores = [ownership_finished];
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let ctx = &self.pool.ctx;
        unsafe {
            ctx.device
                .queue_submit(ctx.present_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| engine_err!(SOURCE, "Failed to submit ownership transfer: {:?}", e))
        }
    }
}

impl Drop for OwnershipCommands {
    fn drop(&mut self) {
        let command_buffers: Vec<vk::CommandBuffer> = self.command_buffers.drain_all().collect();
        self.pool.free(&command_buffers);
    }
}
