/// VulkanShaderModule - SPIR-V module of one pipeline stage

use ash::vk;
use hearth_engine::hearth::{Error, Result};
use hearth_engine::hearth::render::{
    check_spirv_header, spirv_words, ShaderKind, ShaderModule, VertexInputLayout,
};
use hearth_engine::{engine_err, engine_error, engine_warn};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::DeviceContext;

const SOURCE: &str = "hearth::Shader";

/// Entry point every stage is compiled with
pub(crate) const ENTRY_POINT: &std::ffi::CStr = c"main";

/// Vulkan shader module
pub struct VulkanShaderModule {
    ctx: Arc<DeviceContext>,
    pub(crate) module: vk::ShaderModule,
    kind: ShaderKind,
    bytecode: Vec<u8>,
}

/// Input locations the `main` entry point of `words` reads
///
/// # Errors
///
/// `InvalidResource` when the bytecode is not parseable SPIR-V
pub(crate) fn reflect_input_locations(words: &[u32]) -> Result<Vec<u32>> {
    // spirq trusts the header length and magic
    check_spirv_header(words)?;
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| {
            engine_error!(SOURCE, "SPIR-V reflection failed: {:?}", e);
            Error::InvalidResource(format!("SPIR-V reflection failed: {:?}", e))
        })?;

    let mut locations: Vec<u32> = entry_points
        .iter()
        .filter(|entry_point| entry_point.name == "main")
        .flat_map(|entry_point| entry_point.vars.iter())
        .filter_map(|var| match var {
            spirq::var::Variable::Input { location, .. } => Some(location.loc()),
            _ => None,
        })
        .collect();
    locations.sort_unstable();
    locations.dedup();
    Ok(locations)
}

/// Declared input locations the layout does not provide
pub(crate) fn missing_inputs(declared: &[u32], layout: &VertexInputLayout) -> Vec<u32> {
    declared
        .iter()
        .copied()
        .filter(|location| !layout.inputs().iter().any(|input| input.location == *location))
        .collect()
}

impl VulkanShaderModule {
    /// Create a module for `kind` from SPIR-V bytecode
    ///
    /// # Errors
    ///
    /// - `InvalidResource` when the bytecode is empty, not a multiple of 4
    ///   bytes, or lacks a SPIR-V header; the driver never sees it
    /// - `BackendError` when the driver rejects the module
    pub fn new(ctx: Arc<DeviceContext>, kind: ShaderKind, bytecode: &[u8]) -> Result<Self> {
        let words = spirv_words(bytecode).map_err(|e| {
            engine_error!(SOURCE, "{:?} shader rejected: {}", kind, e);
            e
        })?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe {
            ctx.device
                .create_shader_module(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create {:?} shader module: {:?}", kind, e))?
        };

        Ok(Self {
            ctx,
            module,
            kind,
            bytecode: bytecode.to_vec(),
        })
    }

    /// Create a vertex module and check its inputs against `layout`
    ///
    /// Inputs the shader reads that the layout lacks are logged as warnings.
    pub fn new_vertex(ctx: Arc<DeviceContext>, bytecode: &[u8], layout: &VertexInputLayout) -> Result<Self> {
        let module = Self::new(ctx, ShaderKind::Vertex, bytecode)?;
        let declared = reflect_input_locations(&spirv_words(bytecode)?)?;
        let missing = missing_inputs(&declared, layout);
        if !missing.is_empty() {
            engine_warn!(SOURCE, "Vertex shader reads input locations {:?} the vertex layout does not provide", missing);
        }
        Ok(module)
    }
}

impl ShaderModule for VulkanShaderModule {
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

impl Drop for VulkanShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
