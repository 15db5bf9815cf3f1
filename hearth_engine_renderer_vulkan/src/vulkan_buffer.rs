/// GPU buffers - host-visible memory for vertices and constants

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use hearth_engine::hearth::{Error, Result};
use hearth_engine::hearth::render::{VertexBuffer, VertexInputLayout};
use hearth_engine::{engine_bail, engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::DeviceContext;

const SOURCE: &str = "hearth::vulkan";

/// Host-visible buffer, persistently mapped
pub struct GpuBuffer {
    ctx: Arc<DeviceContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl GpuBuffer {
    /// Create a `CpuToGpu` buffer of `size` bytes
    ///
    /// # Errors
    ///
    /// - `OutOfMemory` when the allocation fails
    /// - `BackendError` when buffer creation or binding fails
    pub fn new(ctx: Arc<DeviceContext>, size: u64, usage: vk::BufferUsageFlags, name: &str) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            ctx.device
                .create_buffer(&buffer_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create {}: {:?}", name, e))?
        };

        // From here on Drop releases whatever was created
        let mut gpu_buffer = Self { ctx, buffer, allocation: None, size };

        let requirements = unsafe { gpu_buffer.ctx.device.get_buffer_memory_requirements(buffer) };
        let allocation = gpu_buffer
            .ctx
            .allocator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_e| {
                engine_error!(SOURCE, "Out of GPU memory for {} ({} bytes)", name, size);
                Error::OutOfMemory
            })?;

        unsafe {
            gpu_buffer
                .ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!(SOURCE, "Failed to bind {} memory: {:?}", name, e))?;
        }
        gpu_buffer.allocation = Some(allocation);

        Ok(gpu_buffer)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copy `data` into the mapped memory at `offset`
    ///
    /// # Errors
    ///
    /// `BackendError` when the write exceeds the buffer or the memory is not mapped
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_bail!(SOURCE, "Buffer write of {} bytes at offset {} exceeds size {}",
                data.len(), offset, self.size);
        }

        let allocation = match &self.allocation {
            Some(allocation) => allocation,
            None => engine_bail!(SOURCE, "Buffer write failed: no GPU allocation"),
        };
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!(SOURCE, "Buffer is not CPU-accessible"))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

/// Vertex buffer filled once at creation
pub struct VulkanVertexBuffer {
    pub(crate) buffer: GpuBuffer,
    vertex_count: u32,
    stride: u32,
    layout: VertexInputLayout,
}

impl VulkanVertexBuffer {
    /// Upload `data` (already validated against `layout`)
    pub fn new(
        ctx: Arc<DeviceContext>,
        vertex_count: u32,
        data: &[f32],
        layout: &VertexInputLayout,
        stride: u32,
    ) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = GpuBuffer::new(ctx, bytes.len() as u64, vk::BufferUsageFlags::VERTEX_BUFFER, "vertex_buffer")?;
        buffer.write(0, bytes)?;
        Ok(Self {
            buffer,
            vertex_count,
            stride,
            layout: layout.clone(),
        })
    }
}

impl VertexBuffer for VulkanVertexBuffer {
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
