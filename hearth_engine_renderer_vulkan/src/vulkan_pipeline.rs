/// Shader programs - graphics pipelines with per-frame constant buffers
///
/// A program owns its pipelines, pipeline layout, binding-set layout, one
/// constant buffer per frame slot and one binding set per frame slot. Binding
/// sets come from the context-wide `DescriptorPools`, which grows a new pool
/// whenever the current one is exhausted. Each set is written once, when its
/// slot is created, and points at that slot's buffer for the program's whole
/// life; per-frame updates only write buffer memory, so a set bound in a
/// recording command buffer is never modified.

use ash::vk;
use hearth_engine::glam::Mat4;
use hearth_engine::hearth::{Error, Result};
use hearth_engine::hearth::camera::CameraSource;
use hearth_engine::hearth::render::{
    camera_view_projection, constant_buffer_bytes, downcast_handle, BindingType, FillMode,
    PipelineDesc, RenderPass, ShaderKind, ShaderModule, ShaderProgram, ShaderStage,
    CONSTANT_BUFFER_SIZE,
};
use hearth_engine::hearth::utils::ResizableSequence;
use hearth_engine::{engine_bail, engine_bail_warn, engine_contract, engine_err, engine_info};
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::vulkan_buffer::GpuBuffer;
use crate::vulkan_context::DeviceContext;
use crate::vulkan_format::{
    binding_type_to_vk, blend_factor_to_vk, blend_op_to_vk, buffer_format_to_vk,
    color_write_mask_to_vk, compare_op_to_vk, cull_mode_to_vk, dynamic_state_to_vk,
    fill_mode_to_vk, front_face_to_vk, sample_count_to_vk, shader_kind_to_vk, stage_flags_to_vk,
    topology_to_vk, vertex_input_rate_to_vk,
};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_shader::{VulkanShaderModule, ENTRY_POINT};

const SOURCE: &str = "hearth::vulkan";

// ============================================================================
// Descriptor pools
// ============================================================================

/// Growable set of descriptor pools shared by every shader program
pub struct DescriptorPools {
    ctx: Arc<DeviceContext>,
    pools: Mutex<ResizableSequence<vk::DescriptorPool>>,
    sets_per_pool: u32,
}

impl DescriptorPools {
    /// Create the first pool, sized for `sets_per_pool` binding sets
    pub fn new(ctx: Arc<DeviceContext>, sets_per_pool: u32) -> Result<Self> {
        let sets_per_pool = sets_per_pool.max(1);
        let first = Self::create_pool(&ctx, sets_per_pool)?;
        let mut pools = ResizableSequence::new();
        pools.add(first);
        Ok(Self {
            ctx,
            pools: Mutex::new(pools),
            sets_per_pool,
        })
    }

    fn create_pool(ctx: &DeviceContext, sets_per_pool: u32) -> Result<vk::DescriptorPool> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: sets_per_pool,
        }];
        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(sets_per_pool);

        unsafe {
            ctx.device
                .create_descriptor_pool(&info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor pool: {:?}", e))
        }
    }

    /// Allocate one binding set of `layout`, adding a pool when exhausted
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<(vk::DescriptorPool, vk::DescriptorSet)> {
        let layouts = [layout];
        let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(&current_pool) = pools.last() {
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(current_pool)
                .set_layouts(&layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok((current_pool, sets[0])),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {}
                Err(e) => engine_bail!(SOURCE, "Failed to allocate descriptor set: {:?}", e),
            }
        }

        let new_pool = Self::create_pool(&self.ctx, self.sets_per_pool)?;
        pools.add(new_pool);
        engine_info!(SOURCE, "Descriptor pool exhausted, created new pool (total: {})", pools.size());

        let retry_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(new_pool)
            .set_layouts(&layouts);
        let sets = unsafe {
            self.ctx
                .device
                .allocate_descriptor_sets(&retry_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to allocate descriptor set after pool growth: {:?}", e))?
        };
        Ok((new_pool, sets[0]))
    }

    /// Return a binding set to the pool it came from
    pub fn free(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        let _pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            self.ctx.device.free_descriptor_sets(pool, &[set]).ok();
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pools.lock().unwrap_or_else(|e| e.into_inner()).size()
    }
}

impl Drop for DescriptorPools {
    fn drop(&mut self) {
        let pools = self.pools.get_mut().unwrap_or_else(|e| e.into_inner());
        for pool in pools.drain_all() {
            unsafe {
                self.ctx.device.destroy_descriptor_pool(pool, None);
            }
        }
    }
}

// ============================================================================
// Pipeline cache
// ============================================================================

/// Pipeline cache shared by every program of a context
pub struct PipelineCache {
    ctx: Arc<DeviceContext>,
    pub(crate) cache: vk::PipelineCache,
}

impl PipelineCache {
    pub fn new(ctx: Arc<DeviceContext>) -> Result<Self> {
        let info = vk::PipelineCacheCreateInfo::default();
        let cache = unsafe {
            ctx.device
                .create_pipeline_cache(&info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create pipeline cache: {:?}", e))?
        };
        Ok(Self { ctx, cache })
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_cache(self.cache, None);
        }
    }
}

// ============================================================================
// Shader program
// ============================================================================

/// Frame-slot resources: constant buffer and the binding set pointing at it
struct SlotBinding {
    buffer: GpuBuffer,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

/// Vulkan shader program
pub struct VulkanShaderProgram {
    ctx: Arc<DeviceContext>,
    desc: PipelineDesc,
    solid_pipeline: vk::Pipeline,
    /// Built only when the device supports non-solid fill
    wireframe_pipeline: Option<vk::Pipeline>,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    set_layout: vk::DescriptorSetLayout,
    pools: Arc<DescriptorPools>,
    /// Grows with the presentation chain, never shrinks
    slots: Mutex<ResizableSequence<SlotBinding>>,
    constant_binding: u32,
}

impl VulkanShaderProgram {
    /// Compile `stages` against `render_pass` with `slot_count` frame slots
    ///
    /// Objects created before a failure are released on return.
    ///
    /// # Errors
    ///
    /// - `InvalidResource` when the stage list is malformed
    /// - `ContractViolation` when a stage module belongs to another backend
    /// - `BackendError` when a native creation fails
    pub fn new(
        ctx: Arc<DeviceContext>,
        stages: &[ShaderStage],
        render_pass: &VulkanRenderPass,
        pools: &Arc<DescriptorPools>,
        cache: vk::PipelineCache,
        slot_count: usize,
    ) -> Result<Self> {
        let desc = PipelineDesc::derive(stages)?;
        if desc.stages.contains(&ShaderKind::Geometry) && !ctx.features.geometry_shader {
            engine_bail!(SOURCE, "Geometry stage requested but the device has no geometry shader support");
        }

        let constant_binding = desc
            .binding_layout
            .entries()
            .iter()
            .find(|entry| entry.binding_type == BindingType::UniformBuffer)
            .map(|entry| entry.binding)
            .ok_or_else(|| Error::InvalidResource("pipeline layout has no constant buffer binding".to_string()))?;

        // From here on Drop releases whatever was created
        let mut program = Self {
            ctx,
            desc,
            solid_pipeline: vk::Pipeline::null(),
            wireframe_pipeline: None,
            pipeline_layout: vk::PipelineLayout::null(),
            set_layout: vk::DescriptorSetLayout::null(),
            pools: Arc::clone(pools),
            slots: Mutex::new(ResizableSequence::with_capacity(slot_count)),
            constant_binding,
        };

        program.create_layouts()?;

        let modules = stages
            .iter()
            .map(|stage| downcast_handle::<VulkanShaderModule>(stage.module().as_any(), "shader module", SOURCE))
            .collect::<Result<Vec<_>>>()?;
        let stage_infos: Vec<vk::PipelineShaderStageCreateInfo> = modules
            .iter()
            .map(|module| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_kind_to_vk(module.kind()))
                    .module(module.module)
                    .name(ENTRY_POINT)
            })
            .collect();

        program.solid_pipeline = program.create_pipeline(&stage_infos, render_pass, cache, FillMode::Solid)?;
        if program.ctx.features.fill_mode_non_solid {
            program.wireframe_pipeline =
                Some(program.create_pipeline(&stage_infos, render_pass, cache, FillMode::Wireframe)?);
        }

        program.ensure_slots(slot_count)?;

        Ok(program)
    }

    fn create_layouts(&mut self) -> Result<()> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = self
            .desc
            .binding_layout
            .entries()
            .iter()
            .map(|entry| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(entry.binding)
                    .descriptor_type(binding_type_to_vk(entry.binding_type))
                    .descriptor_count(entry.count)
                    .stage_flags(stage_flags_to_vk(entry.stages))
            })
            .collect();

        let layout_create = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        self.set_layout = unsafe {
            self.ctx
                .device
                .create_descriptor_set_layout(&layout_create, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor set layout: {:?}", e))?
        };

        let set_layouts = [self.set_layout];
        let layout_create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        self.pipeline_layout = unsafe {
            self.ctx
                .device
                .create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create pipeline layout: {:?}", e))?
        };
        Ok(())
    }

    fn create_pipeline(
        &self,
        stage_infos: &[vk::PipelineShaderStageCreateInfo],
        render_pass: &VulkanRenderPass,
        cache: vk::PipelineCache,
        fill_mode: FillMode,
    ) -> Result<vk::Pipeline> {
        let desc = &self.desc;

        let vertex_bindings = [vk::VertexInputBindingDescription::default()
            .binding(desc.vertex_binding.binding)
            .stride(desc.vertex_binding.stride)
            .input_rate(vertex_input_rate_to_vk(desc.vertex_binding.input_rate))];
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_attributes
            .iter()
            .map(|attribute| {
                vk::VertexInputAttributeDescription::default()
                    .location(attribute.location)
                    .binding(attribute.binding)
                    .format(buffer_format_to_vk(attribute.format))
                    .offset(attribute.offset)
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(fill_mode_to_vk(fill_mode))
            .line_width(desc.raster.line_width)
            .cull_mode(cull_mode_to_vk(desc.raster.cull))
            .front_face(front_face_to_vk(desc.raster.front_face))
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth.test)
            .depth_write_enable(desc.depth.write)
            .depth_compare_op(compare_op_to_vk(desc.depth.compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(desc.depth.stencil_test);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(sample_count_to_vk(desc.samples));

        let blend = &desc.blend;
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(color_write_mask_to_vk(blend.write_mask))
            .blend_enable(blend.enabled)
            .src_color_blend_factor(blend_factor_to_vk(blend.color.src))
            .dst_color_blend_factor(blend_factor_to_vk(blend.color.dst))
            .color_blend_op(blend_op_to_vk(blend.color.op))
            .src_alpha_blend_factor(blend_factor_to_vk(blend.alpha.src))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.alpha.dst))
            .alpha_blend_op(blend_op_to_vk(blend.alpha.op));
        // One blend state per color attachment of the render pass
        let color_blend_attachments =
            vec![color_blend_attachment; render_pass.desc().color_attachment_count()];

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states: Vec<vk::DynamicState> =
            desc.dynamic_states.iter().map(|state| dynamic_state_to_vk(*state)).collect();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(stage_infos)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(self.pipeline_layout)
            .render_pass(render_pass.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.ctx
                .device
                .create_graphics_pipelines(cache, &[pipeline_create_info], None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create {:?} graphics pipeline: {:?}", fill_mode, e.1))?
        };
        Ok(pipelines[0])
    }

    fn slots(&self) -> MutexGuard<'_, ResizableSequence<SlotBinding>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create frame slots until there are at least `count`
    ///
    /// The presentation chain may come back from a resize with more images
    /// than the program was built for.
    pub fn ensure_slots(&self, count: usize) -> Result<()> {
        let mut slots = self.slots();
        while slots.size() < count {
            let slot = self.create_slot()?;
            slots.add(slot);
        }
        Ok(())
    }

    fn create_slot(&self) -> Result<SlotBinding> {
        let buffer = GpuBuffer::new(
            Arc::clone(&self.ctx),
            CONSTANT_BUFFER_SIZE,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            "constant_buffer",
        )?;
        buffer.write(0, constant_buffer_bytes(&Mat4::IDENTITY))?;

        let (pool, set) = self.pools.allocate(self.set_layout)?;
        let slot = SlotBinding { buffer, pool, set };
        self.write_descriptor(&slot);
        Ok(slot)
    }

    /// Point the slot's set at its buffer; only done before the set is ever bound
    fn write_descriptor(&self, slot: &SlotBinding) {
        let buffer_info = vk::DescriptorBufferInfo::default()
            .buffer(slot.buffer.buffer)
            .offset(0)
            .range(CONSTANT_BUFFER_SIZE);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(slot.set)
            .dst_binding(self.constant_binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(std::slice::from_ref(&buffer_info));
        unsafe {
            self.ctx.device.update_descriptor_sets(&[write], &[]);
        }
    }

    /// Pipeline variant for `fill_mode`
    ///
    /// # Errors
    ///
    /// `BackendError` (logged at WARN) when the device lacks non-solid fill
    pub fn pipeline(&self, fill_mode: FillMode) -> Result<vk::Pipeline> {
        match fill_mode {
            FillMode::Solid => Ok(self.solid_pipeline),
            FillMode::Wireframe => match self.wireframe_pipeline {
                Some(pipeline) => Ok(pipeline),
                None => engine_bail_warn!(SOURCE, "wireframe fill mode is not supported by this device"),
            },
        }
    }

    /// Binding set of `slot`
    pub fn descriptor_set(&self, slot: usize) -> Result<vk::DescriptorSet> {
        let slots = self.slots();
        match slots.get(slot) {
            Some(binding) => Ok(binding.set),
            None => engine_contract!(SOURCE, "binding set slot {} out of range ({} slots)", slot, slots.size()),
        }
    }
}

impl ShaderProgram for VulkanShaderProgram {
    fn pipeline_desc(&self) -> &PipelineDesc {
        &self.desc
    }

    fn constant_buffer_count(&self) -> usize {
        self.slots().size()
    }

    fn update_constant_buffer(&self, slot: usize, camera: &dyn CameraSource) -> Result<()> {
        let slots = self.slots();
        let binding = match slots.get(slot) {
            Some(binding) => binding,
            None => engine_contract!(SOURCE, "constant buffer slot {} out of range ({} slots)", slot, slots.size()),
        };
        let matrix = camera_view_projection(camera);
        binding.buffer.write(0, constant_buffer_bytes(&matrix))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShaderProgram {
    fn drop(&mut self) {
        unsafe {
            if let Some(wireframe) = self.wireframe_pipeline.take() {
                self.ctx.device.destroy_pipeline(wireframe, None);
            }
            if self.solid_pipeline != vk::Pipeline::null() {
                self.ctx.device.destroy_pipeline(self.solid_pipeline, None);
            }
            if self.pipeline_layout != vk::PipelineLayout::null() {
                self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            }
            if self.set_layout != vk::DescriptorSetLayout::null() {
                self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
            }
        }
        let slots = self.slots.get_mut().unwrap_or_else(|e| e.into_inner());
        for slot in slots.drain_all() {
            self.pools.free(slot.pool, slot.set);
        }
    }
}
