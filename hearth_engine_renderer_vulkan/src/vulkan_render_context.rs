/// VulkanRenderContext - Vulkan implementation of the RenderContext protocol
///
/// Owns the presentation chain and every context-level object (render pass,
/// depth buffer, framebuffers, pools, semaphores, pipeline cache). Those
/// objects are registered in a `TeardownGraph` and released dependents-first
/// when the context drops.

use ash::vk;
use hearth_engine::hearth::{Error, RenderContext, Result};
use hearth_engine::hearth::camera::CameraSource;
use hearth_engine::hearth::platform::SurfaceWindow;
use hearth_engine::hearth::render::{
    choose_depth_format, collect_stages, command_buffer_id, downcast_handle, validate_bytecode,
    validate_vertex_data, AttachmentPoint, ClearValue, Color, CommandBuffer, Config, ContextObject, CullingMode,
    Extent2D, FillMode, FragmentShader, FrameSlots, FrameState, Framebuffer, GeometryShader, Image,
    Rect2D, RenderPass, RenderPassDesc, ShaderKind, ShaderProgram, VertexBuffer, VertexInputLayout,
    VertexShader, Viewport,
};
use hearth_engine::hearth::utils::{ResizableSequence, TeardownGraph, TeardownKey};
use hearth_engine::{engine_bail_warn, engine_contract, engine_debug, engine_err, engine_info};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::mem::ManuallyDrop;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanVertexBuffer;
use crate::vulkan_command_list::{
    record_ownership_release, record_present_transition, CommandPools, OwnershipCommands,
    VulkanCommandBuffer,
};
use crate::vulkan_context::DeviceContext;
use crate::vulkan_format::{
    clear_value_to_vk, cull_mode_to_vk, rect_to_vk, viewport_to_vk,
};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_image::VulkanImage;
use crate::vulkan_pipeline::{DescriptorPools, PipelineCache, VulkanShaderProgram};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_shader::VulkanShaderModule;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_sync::{Fence, FrameSync};

const SOURCE: &str = "hearth::vulkan";

/// Vulkan render context
pub struct VulkanRenderContext {
    ctx: Arc<DeviceContext>,
    config: Config,

    frame: FrameState,
    slots: FrameSlots<Arc<Fence>>,
    /// Image acquired by a `begin_frame` whose fence wait timed out
    pending_acquire: Option<u32>,

    // Released in teardown-graph order by Drop
    swapchain: ManuallyDrop<Swapchain>,
    depth_buffer: ManuallyDrop<Arc<VulkanImage>>,
    render_pass: ManuallyDrop<Arc<dyn RenderPass>>,
    framebuffers: ResizableSequence<Option<Arc<VulkanFramebuffer>>>,
    command_pools: ManuallyDrop<CommandPools>,
    ownership: ManuallyDrop<Option<OwnershipCommands>>,
    descriptor_pools: ManuallyDrop<Arc<DescriptorPools>>,
    sync: ManuallyDrop<FrameSync>,
    pipeline_cache: ManuallyDrop<PipelineCache>,

    teardown: TeardownGraph<ContextObject>,
    chain_key: TeardownKey,
    render_pass_key: TeardownKey,
    depth_key: TeardownKey,
    framebuffer_keys: ResizableSequence<TeardownKey>,
}

impl VulkanRenderContext {
    /// Initialize Vulkan on `window`
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when the window has no area, no device can
    /// render and present to it, or any context object fails to build
    pub fn new<W>(window: &W, config: Config) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle + SurfaceWindow,
    {
        let window_extent = window.client_extent();
        if window_extent.is_empty() {
            return Err(Error::InitializationFailed(format!(
                "window client area {}x{} has no area",
                window_extent.width, window_extent.height
            )));
        }

        let ctx = Arc::new(DeviceContext::new(window, &config)?);

        let swapchain = Swapchain::new(Arc::clone(&ctx), window_extent, &config)?;
        let image_count = swapchain.image_count();
        let extent = swapchain.extent();

        let depth_format = choose_depth_format(|format| ctx.supports_depth_format(format))
            .ok_or_else(|| Error::InitializationFailed("No supported depth/stencil format".to_string()))?;
        let depth_buffer = Arc::new(VulkanImage::new_depth_buffer(Arc::clone(&ctx), depth_format, extent)?);

        let render_pass: Arc<dyn RenderPass> = Arc::new(VulkanRenderPass::new(
            Arc::clone(&ctx),
            RenderPassDesc::new([
                (AttachmentPoint::Color, swapchain.format()),
                (depth_format.attachment_point(), depth_format),
            ])?,
        )?);

        let command_pools = CommandPools::new(&ctx)?;
        let ownership = match &command_pools.present {
            Some(present_pool) => Some(OwnershipCommands::new(present_pool, swapchain.images())?),
            None => None,
        };
        let sets_per_pool = config.max_shader_programs.saturating_mul(image_count);
        let descriptor_pools = Arc::new(DescriptorPools::new(Arc::clone(&ctx), sets_per_pool)?);
        let sync = FrameSync::new(Arc::clone(&ctx), image_count)?;
        let pipeline_cache = PipelineCache::new(Arc::clone(&ctx))?;

        let mut teardown = TeardownGraph::new();
        let pools_key = teardown.insert(ContextObject::CommandPools, &[])?;
        let _ = teardown.insert(ContextObject::DescriptorPool, &[])?;
        let _ = teardown.insert(ContextObject::SyncObjects, &[])?;
        let _ = teardown.insert(ContextObject::PipelineCache, &[])?;
        let chain_key = teardown.insert(ContextObject::PresentationChain, &[])?;
        let render_pass_key = teardown.insert(ContextObject::RenderPass, &[chain_key])?;
        let depth_key = teardown.insert(ContextObject::DepthBuffer, &[chain_key])?;
        let _ = teardown.insert(ContextObject::OwnershipCommands, &[pools_key, chain_key])?;

        engine_info!(SOURCE, "Render context ready: {}x{}, {} images, depth {:?}",
            extent.width, extent.height, image_count, depth_format);

        let mut context = Self {
            ctx,
            config,
            frame: FrameState::new(),
            slots: FrameSlots::new(image_count),
            pending_acquire: None,
            swapchain: ManuallyDrop::new(swapchain),
            depth_buffer: ManuallyDrop::new(depth_buffer),
            render_pass: ManuallyDrop::new(render_pass),
            framebuffers: ResizableSequence::new(),
            command_pools: ManuallyDrop::new(command_pools),
            ownership: ManuallyDrop::new(ownership),
            descriptor_pools: ManuallyDrop::new(descriptor_pools),
            sync: ManuallyDrop::new(sync),
            pipeline_cache: ManuallyDrop::new(pipeline_cache),
            teardown,
            chain_key,
            render_pass_key,
            depth_key,
            framebuffer_keys: ResizableSequence::new(),
        };
        context.build_framebuffers()?;
        Ok(context)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One framebuffer per presentation image
    fn build_framebuffers(&mut self) -> Result<()> {
        let extent = self.swapchain.extent();
        for image in self.swapchain.images() {
            let framebuffer = VulkanFramebuffer::new(
                Arc::clone(&self.ctx),
                &self.render_pass,
                image,
                &self.depth_buffer,
                extent,
            )?;
            let key = self.teardown.insert(
                ContextObject::Framebuffer(self.framebuffer_keys.size()),
                &[self.render_pass_key, self.depth_key],
            )?;
            self.framebuffer_keys.add(key);
            self.framebuffers.add(Some(Arc::new(framebuffer)));
        }
        Ok(())
    }

    fn release_framebuffers(&mut self) -> Result<()> {
        let framebuffer_keys: Vec<TeardownKey> = self.framebuffer_keys.drain_all().collect();
        for key in framebuffer_keys.into_iter().rev() {
            self.teardown.remove(key)?;
        }
        self.framebuffers.clear();
        Ok(())
    }

    /// Recreate the chain and a depth buffer of its new extent
    fn rebuild_chain(&mut self, window_extent: Extent2D) -> Result<()> {
        self.swapchain.recreate(window_extent, &self.config)?;
        let format = self.depth_buffer.format();
        let depth_buffer = VulkanImage::new_depth_buffer(Arc::clone(&self.ctx), format, self.swapchain.extent())?;
        *self.depth_buffer = Arc::new(depth_buffer);
        Ok(())
    }

    fn current_image(&self, operation: &str) -> Result<u32> {
        match self.frame.current_image() {
            Some(image) => Ok(image),
            None => engine_contract!(SOURCE, "{} outside of a frame", operation),
        }
    }

    /// Downcast `cmd`, starting a new recording when needed
    fn recording<'a>(&self, cmd: &'a Arc<dyn CommandBuffer>) -> Result<&'a VulkanCommandBuffer> {
        let command_buffer = downcast_handle::<VulkanCommandBuffer>(cmd.as_any(), "command buffer", SOURCE)?;
        command_buffer.ensure_recording(self.config.fence_timeout_ns())?;
        Ok(command_buffer)
    }

    /// Close the recording of `command_buffer` and queue it for `image`
    fn queue_recording(&self, command_buffer: &VulkanCommandBuffer, image: u32) -> Result<()> {
        let chain_image = self.chain_image(image)?.image;
        if !command_buffer.wrote_image(chain_image) {
            record_present_transition(&self.ctx.device, command_buffer.command_buffer, chain_image);
        }
        if self.ctx.families_differ() {
            record_ownership_release(&self.ctx, command_buffer.command_buffer, chain_image);
        }
        command_buffer.end_recording()?;

        let wait_semaphores = [self.sync.image_available(self.slots.acquire_slot())?];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.render_finished(image)?];
        let command_buffers = [command_buffer.command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        command_buffer.fence.submit_with(|fence| unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], fence)
                .map_err(|e| engine_err!(SOURCE, "Failed to submit command buffer: {:?}", e))
        })
    }

    fn chain_image(&self, image: u32) -> Result<&Arc<VulkanImage>> {
        self.swapchain.image(image).ok_or_else(|| {
            Error::InvalidResource(format!("presentation image {} does not exist", image))
        })
    }
}

impl RenderContext for VulkanRenderContext {
    // ===== FRAME PROTOCOL =====

    fn begin_frame(&mut self) -> Result<u32> {
        self.frame.check_begin()?;
        let timeout_ns = self.config.fence_timeout_ns();

        let image = match self.pending_acquire {
            Some(image) => image,
            None => {
                // The slot's acquire semaphore must not be pending
                if let Some(fence) = self.slots.slot_fence() {
                    fence.wait(timeout_ns)?;
                }
                let image_available = self.sync.image_available(self.slots.acquire_slot())?;
                let image = self.swapchain.acquire_next_image(image_available, timeout_ns)?;
                self.pending_acquire = Some(image);
                image
            }
        };

        if let Some(fence) = self.slots.image_fence(image) {
            fence.wait(timeout_ns)?;
        }

        self.pending_acquire = None;
        self.frame.begin(image)?;
        Ok(image)
    }

    fn submit_command_buffer(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        self.frame.check_submit()?;
        let image = self.current_image("submit_command_buffer")?;
        // A buffer not recording is submitted as an empty recording
        let command_buffer = self.recording(cmd)?;
        command_buffer.with_state(|state| state.finish_for_submit())?;

        if let Err(e) = self.queue_recording(command_buffer, image) {
            // The recording is lost; the buffer must not wait for a signal that never comes
            command_buffer.with_state(|state| {
                state.submit_rejected();
                Ok(())
            })?;
            return Err(e);
        }
        self.slots.set_in_flight(image, Arc::clone(&command_buffer.fence));

        self.frame.submit(command_buffer_id(cmd))
    }

    fn present(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let id = command_buffer_id(cmd);
        self.frame.check_present(id)?;
        let image = self.current_image("present")?;

        let render_finished = self.sync.render_finished(image)?;
        let wait = match (*self.ownership).as_ref() {
            Some(ownership) => {
                let ownership_finished = self.sync.ownership_finished(image)?;
                ownership.submit(image, render_finished, ownership_finished)?;
                ownership_finished
            }
            None => render_finished,
        };

        // Out-of-date still counts as presented
        self.frame.present(id)?;
        self.swapchain.present(image, wait)
    }

    fn end_frame(&mut self) -> Result<()> {
        self.frame.end()?;
        self.slots.advance();
        Ok(())
    }

    // ===== FACTORIES =====

    fn create_vertex_buffer(
        &mut self,
        vertex_count: u32,
        data: &[f32],
        layout: &VertexInputLayout,
        stride: u32,
    ) -> Result<Arc<dyn VertexBuffer>> {
        layout.validate()?;
        validate_vertex_data(vertex_count, data, layout, stride)?;
        let vertex_buffer = VulkanVertexBuffer::new(Arc::clone(&self.ctx), vertex_count, data, layout, stride)?;
        Ok(Arc::new(vertex_buffer))
    }

    fn create_vertex_shader(&mut self, bytecode: &[u8], layout: VertexInputLayout) -> Result<VertexShader> {
        validate_bytecode(bytecode)?;
        layout.validate()?;
        let module = VulkanShaderModule::new_vertex(Arc::clone(&self.ctx), bytecode, &layout)?;
        VertexShader::new(Arc::new(module), layout)
    }

    fn create_geometry_shader(&mut self, bytecode: &[u8]) -> Result<GeometryShader> {
        validate_bytecode(bytecode)?;
        let module = VulkanShaderModule::new(Arc::clone(&self.ctx), ShaderKind::Geometry, bytecode)?;
        GeometryShader::new(Arc::new(module))
    }

    fn create_fragment_shader(&mut self, bytecode: &[u8]) -> Result<FragmentShader> {
        validate_bytecode(bytecode)?;
        let module = VulkanShaderModule::new(Arc::clone(&self.ctx), ShaderKind::Fragment, bytecode)?;
        FragmentShader::new(Arc::new(module))
    }

    fn create_shader(
        &mut self,
        vertex: &VertexShader,
        geometry: Option<&GeometryShader>,
        fragment: Option<&FragmentShader>,
        render_pass: &Arc<dyn RenderPass>,
    ) -> Result<Arc<dyn ShaderProgram>> {
        let vk_render_pass = downcast_handle::<VulkanRenderPass>(render_pass.as_any(), "render pass", SOURCE)?;
        let stages = collect_stages(vertex, geometry, fragment);
        let program = VulkanShaderProgram::new(
            Arc::clone(&self.ctx),
            &stages,
            vk_render_pass,
            &self.descriptor_pools,
            self.pipeline_cache.cache,
            self.swapchain.image_count() as usize,
        )?;
        engine_debug!(SOURCE, "Shader program created with {} stages", stages.size());
        Ok(Arc::new(program))
    }

    fn create_command_buffer(&mut self) -> Result<Arc<dyn CommandBuffer>> {
        Ok(Arc::new(VulkanCommandBuffer::new(&self.command_pools.graphics)?))
    }

    fn create_render_pass(&mut self, images: &[Arc<dyn Image>]) -> Result<Arc<dyn RenderPass>> {
        let desc = RenderPassDesc::new(images.iter().map(|image| (image.attachment_point(), image.format())))?;
        Ok(Arc::new(VulkanRenderPass::new(Arc::clone(&self.ctx), desc)?))
    }

    /// The color attachment is the image acquired by the current frame, or
    /// image 0 outside a frame. Such a framebuffer is valid for that frame
    /// only; `back_framebuffer` covers every image of the chain.
    fn create_framebuffer(&mut self, size: Extent2D, render_pass: &Arc<dyn RenderPass>) -> Result<Arc<dyn Framebuffer>> {
        let image = self.frame.current_image().unwrap_or(0);
        let color = Arc::clone(self.chain_image(image)?);
        let framebuffer = VulkanFramebuffer::new(
            Arc::clone(&self.ctx),
            render_pass,
            &color,
            &self.depth_buffer,
            size,
        )?;
        Ok(Arc::new(framebuffer))
    }

    // ===== RECORDING =====

    fn clear_color_buffer(&mut self, color: Color, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let command_buffer = self.recording(cmd)?;
        command_buffer.with_state(|state| state.check_clear("clear_color_buffer"))?;
        let active = match command_buffer.active_pass() {
            Some(active) => active,
            None => engine_contract!(SOURCE, "clear_color_buffer without an active render pass"),
        };

        let attachments: Vec<vk::ClearAttachment> = (0..active.color_attachments)
            .map(|index| vk::ClearAttachment {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                color_attachment: index,
                clear_value: clear_value_to_vk(ClearValue::Color(color)),
            })
            .collect();
        let rects = [clear_rect(active.extent)];

        unsafe {
            self.ctx.device.cmd_clear_attachments(command_buffer.command_buffer, &attachments, &rects);
        }
        Ok(())
    }

    fn clear_depth_stencil_buffer(&mut self, depth: f32, stencil: u32, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let command_buffer = self.recording(cmd)?;
        command_buffer.with_state(|state| state.check_clear("clear_depth_stencil_buffer"))?;
        let active = match command_buffer.active_pass() {
            Some(active) => active,
            None => engine_contract!(SOURCE, "clear_depth_stencil_buffer without an active render pass"),
        };
        let aspect_mask = match active.depth_stencil {
            Some(AttachmentPoint::Depth) => vk::ImageAspectFlags::DEPTH,
            Some(AttachmentPoint::Stencil) => vk::ImageAspectFlags::STENCIL,
            Some(_) => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
            None => engine_contract!(SOURCE, "clear_depth_stencil_buffer on a render pass without depth/stencil attachment"),
        };

        let attachments = [vk::ClearAttachment {
            aspect_mask,
            color_attachment: 0,
            clear_value: clear_value_to_vk(ClearValue::DepthStencil { depth, stencil }),
        }];
        let rects = [clear_rect(active.extent)];

        unsafe {
            self.ctx.device.cmd_clear_attachments(command_buffer.command_buffer, &attachments, &rects);
        }
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
        let command_buffer = self.recording(cmd)?;
        let operation = if instance_count == 1 { "draw" } else { "draw_multiples" };
        command_buffer.with_state(|state| state.check_draw(operation))?;
        unsafe {
            self.ctx.device.cmd_draw(
                command_buffer.command_buffer,
                vertex_buffer.vertex_count(),
                instance_count,
                0,
                0,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, vertex_buffer: &Arc<dyn VertexBuffer>, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let vk_vertex_buffer = downcast_handle::<VulkanVertexBuffer>(vertex_buffer.as_any(), "vertex buffer", SOURCE)?;
        let command_buffer = self.recording(cmd)?;
        command_buffer.with_state(|state| state.bind_vertex_buffer())?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(
                command_buffer.command_buffer,
                0,
                &[vk_vertex_buffer.buffer.buffer],
                &[0],
            );
        }
        command_buffer.retain_vertex_buffer(vertex_buffer);
        Ok(())
    }

    fn bind_shader_program(&mut self, program: &Arc<dyn ShaderProgram>, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let vk_program = downcast_handle::<VulkanShaderProgram>(program.as_any(), "shader program", SOURCE)?;
        vk_program.ensure_slots(self.swapchain.image_count() as usize)?;
        let slot = self.frame_slot();
        let command_buffer = self.recording(cmd)?;

        let pipeline = vk_program.pipeline(command_buffer.state().fill_mode)?;
        let descriptor_set = vk_program.descriptor_set(slot)?;
        command_buffer.with_state(|state| state.bind_program())?;

        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                command_buffer.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
            self.ctx.device.cmd_bind_descriptor_sets(
                command_buffer.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_program.pipeline_layout,
                0,
                &[descriptor_set],
                &[],
            );
        }
        command_buffer.retain_program(program);
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        cmd: &Arc<dyn CommandBuffer>,
    ) -> Result<()> {
        let vk_render_pass = downcast_handle::<VulkanRenderPass>(render_pass.as_any(), "render pass", SOURCE)?;
        let vk_framebuffer = downcast_handle::<VulkanFramebuffer>(framebuffer.as_any(), "framebuffer", SOURCE)?;
        if framebuffer.render_pass().desc() != render_pass.desc() {
            engine_contract!(SOURCE, "framebuffer was created for an incompatible render pass");
        }
        let command_buffer = self.recording(cmd)?;
        command_buffer.with_state(|state| state.begin_render_pass())?;

        let clear_values: Vec<vk::ClearValue> = render_pass
            .desc()
            .attachments()
            .iter()
            .map(|attachment| clear_value_to_vk(self.config.clear_value(attachment.point)))
            .collect();

        let extent = framebuffer.extent();
        let render_area = clear_rect(extent).rect;
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);
        let culling_mode = command_buffer.state().culling_mode;

        unsafe {
            let device = &self.ctx.device;
            device.cmd_begin_render_pass(command_buffer.command_buffer, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(
                command_buffer.command_buffer,
                0,
                &[viewport_to_vk(Viewport::full(extent.width, extent.height))],
            );
            device.cmd_set_scissor(command_buffer.command_buffer, 0, &[render_area]);
            device.cmd_set_cull_mode(command_buffer.command_buffer, cull_mode_to_vk(culling_mode));
        }
        command_buffer.retain_render_pass(render_pass, framebuffer, vk_framebuffer.color_image());
        Ok(())
    }

    fn end_render_pass(&mut self, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let command_buffer = self.recording(cmd)?;
        command_buffer.with_state(|state| state.end_render_pass())?;
        unsafe {
            self.ctx.device.cmd_end_render_pass(command_buffer.command_buffer);
        }
        command_buffer.end_active_pass();
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let command_buffer = self.recording(cmd)?;
        unsafe {
            self.ctx
                .device
                .cmd_set_viewport(command_buffer.command_buffer, 0, &[viewport_to_vk(viewport)]);
        }
        Ok(())
    }

    fn set_culling_mode(&mut self, mode: CullingMode, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        let command_buffer = self.recording(cmd)?;
        command_buffer.with_state(|state| {
            state.culling_mode = mode;
            Ok(())
        })?;
        unsafe {
            self.ctx.device.cmd_set_cull_mode(command_buffer.command_buffer, cull_mode_to_vk(mode));
        }
        Ok(())
    }

    fn set_fill_mode(&mut self, mode: FillMode, cmd: &Arc<dyn CommandBuffer>) -> Result<()> {
        if mode == FillMode::Wireframe && !self.ctx.features.fill_mode_non_solid {
            engine_bail_warn!(SOURCE, "wireframe fill mode is not supported by this device");
        }
        let command_buffer = self.recording(cmd)?;
        command_buffer.with_state(|state| {
            state.fill_mode = mode;
            Ok(())
        })?;

        // The bound program switches to its matching pipeline variant
        if let Some(program) = command_buffer.bound_program() {
            let vk_program = downcast_handle::<VulkanShaderProgram>(program.as_any(), "shader program", SOURCE)?;
            let pipeline = vk_program.pipeline(mode)?;
            unsafe {
                self.ctx.device.cmd_bind_pipeline(
                    command_buffer.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline,
                );
            }
        }
        Ok(())
    }

    // ===== ACCESSORS =====

    fn back_buffer(&self) -> Result<Arc<dyn Image>> {
        let image = self.current_image("back_buffer")?;
        let back_buffer: Arc<dyn Image> = Arc::clone(self.chain_image(image)?) as Arc<dyn Image>;
        Ok(back_buffer)
    }

    fn depth_stencil_buffer(&self) -> Arc<dyn Image> {
        Arc::clone(&*self.depth_buffer) as Arc<dyn Image>
    }

    fn back_framebuffer(&self) -> Result<Arc<dyn Framebuffer>> {
        let image = self.current_image("back_framebuffer")?;
        match self.framebuffers.get(image as usize).cloned().flatten() {
            Some(framebuffer) => Ok(framebuffer as Arc<dyn Framebuffer>),
            None => Err(Error::InvalidResource(format!("no framebuffer for presentation image {}", image))),
        }
    }

    fn render_pass(&self) -> Arc<dyn RenderPass> {
        Arc::clone(&*self.render_pass)
    }

    fn extent(&self) -> Extent2D {
        self.swapchain.extent()
    }

    fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    fn current_image_index(&self) -> Option<u32> {
        self.frame.current_image()
    }

    fn update_shader_constants(&mut self, program: &Arc<dyn ShaderProgram>, camera: &dyn CameraSource) -> Result<()> {
        let vk_program = downcast_handle::<VulkanShaderProgram>(program.as_any(), "shader program", SOURCE)?;
        vk_program.ensure_slots(self.swapchain.image_count() as usize)?;
        let slot = self.frame_slot();
        // Inside a frame begin_frame already waited for this image; between
        // frames its last submission may still read the buffer
        if self.frame.current_image().is_none() {
            if let Some(fence) = self.slots.image_fence(slot as u32) {
                fence.wait(self.config.fence_timeout_ns())?;
            }
        }
        vk_program.update_constant_buffer(slot, camera)
    }

    // ===== LIFECYCLE =====

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.frame.check_begin()?;
        if width == 0 || height == 0 {
            engine_debug!(SOURCE, "Resize to {}x{} ignored", width, height);
            return Ok(());
        }
        self.wait_idle()?;

        self.release_framebuffers()?;
        self.teardown.remove(self.depth_key)?;
        let rebuilt = self.rebuild_chain(Extent2D::new(width, height));
        // The depth buffer stays registered whether or not the rebuild succeeded
        self.depth_key = self.teardown.insert(ContextObject::DepthBuffer, &[self.chain_key])?;
        rebuilt?;
        self.build_framebuffers()?;

        let image_count = self.swapchain.image_count();
        self.sync.recreate(image_count)?;
        if let Some(ownership) = (*self.ownership).as_mut() {
            ownership.record(self.swapchain.images())?;
        }
        self.slots.resize(image_count);
        self.pending_acquire = None;

        let extent = self.swapchain.extent();
        engine_info!(SOURCE, "Presentation chain resized to {}x{} ({} images)",
            extent.width, extent.height, image_count);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }
}

fn clear_rect(extent: Extent2D) -> vk::ClearRect {
    vk::ClearRect {
        rect: rect_to_vk(Rect2D::covering(extent)),
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl Drop for VulkanRenderContext {
    fn drop(&mut self) {
        // Ignore the result: teardown proceeds either way
        self.ctx.wait_idle().ok();

        for object in self.teardown.teardown() {
            engine_debug!(SOURCE, "Destroying {:?}", object);
            // Each tag is registered once, so each field is dropped at most once
            unsafe {
                match object {
                    ContextObject::Framebuffer(index) => {
                        if let Some(framebuffer) = self.framebuffers.get_mut(index) {
                            framebuffer.take();
                        }
                    }
                    ContextObject::DepthBuffer => ManuallyDrop::drop(&mut self.depth_buffer),
                    ContextObject::RenderPass => ManuallyDrop::drop(&mut self.render_pass),
                    ContextObject::PresentationChain => ManuallyDrop::drop(&mut self.swapchain),
                    ContextObject::OwnershipCommands => ManuallyDrop::drop(&mut self.ownership),
                    ContextObject::CommandPools => ManuallyDrop::drop(&mut self.command_pools),
                    ContextObject::DescriptorPool => ManuallyDrop::drop(&mut self.descriptor_pools),
                    ContextObject::SyncObjects => ManuallyDrop::drop(&mut self.sync),
                    ContextObject::PipelineCache => ManuallyDrop::drop(&mut self.pipeline_cache),
                }
            }
        }
    }
}
