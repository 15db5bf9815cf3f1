/// VertexBuffer trait and vertex element formats

use std::any::Any;
use crate::error::{Error, Result};
use crate::renderer::VertexInputLayout;

/// Data format of one vertex attribute
///
/// Vertex data is uploaded as 32-bit words, so every format is made of
/// 4-byte components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    // Float formats
    R32_SFLOAT,          // float (4 bytes)
    R32G32_SFLOAT,       // vec2 (8 bytes)
    R32G32B32_SFLOAT,    // vec3 (12 bytes)
    R32G32B32A32_SFLOAT, // vec4 / color (16 bytes)

    // Integer formats (signed)
    R32_SINT,
    R32G32_SINT,
    R32G32B32_SINT,
    R32G32B32A32_SINT,

    // Integer formats (unsigned)
    R32_UINT,
    R32G32_UINT,
    R32G32B32_UINT,
    R32G32B32A32_UINT,
}

impl BufferFormat {
    /// Number of components
    pub fn component_count(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_SINT | BufferFormat::R32_UINT => 1,
            BufferFormat::R32G32_SFLOAT | BufferFormat::R32G32_SINT | BufferFormat::R32G32_UINT => 2,
            BufferFormat::R32G32B32_SFLOAT | BufferFormat::R32G32B32_SINT | BufferFormat::R32G32B32_UINT => 3,
            BufferFormat::R32G32B32A32_SFLOAT | BufferFormat::R32G32B32A32_SINT | BufferFormat::R32G32B32A32_UINT => 4,
        }
    }

    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        self.component_count() * 4
    }
}

/// Check vertex data against its layout before upload
///
/// # Errors
///
/// `InvalidResource` when:
/// - the vertex count is zero
/// - `stride` differs from the layout's derived stride
/// - `data` does not hold exactly `vertex_count * stride` bytes
pub fn validate_vertex_data(
    vertex_count: u32,
    data: &[f32],
    layout: &VertexInputLayout,
    stride: u32,
) -> Result<()> {
    if vertex_count == 0 {
        return Err(Error::InvalidResource("vertex buffer with zero vertices".to_string()));
    }

    if stride != layout.stride() {
        return Err(Error::InvalidResource(format!(
            "vertex stride {} does not match layout stride {}",
            stride,
            layout.stride()
        )));
    }

    let expected_bytes = vertex_count as u64 * stride as u64;
    let actual_bytes = std::mem::size_of_val(data) as u64;
    if expected_bytes != actual_bytes {
        return Err(Error::InvalidResource(format!(
            "vertex data holds {} bytes, {} vertices of stride {} need {}",
            actual_bytes, vertex_count, stride, expected_bytes
        )));
    }

    Ok(())
}

/// Vertex buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanVertexBuffer).
/// The GPU memory is released when the last handle is dropped.
pub trait VertexBuffer: Send + Sync {
    /// Number of vertices (draw count)
    fn vertex_count(&self) -> u32;

    /// Bytes between consecutive vertices
    fn stride(&self) -> u32;

    /// Layout the data was validated against
    fn layout(&self) -> &VertexInputLayout;

    /// Backend downcast
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
