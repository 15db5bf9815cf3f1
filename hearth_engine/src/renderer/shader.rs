/// Shader stages
///
/// A stage wraps pre-compiled SPIR-V bytecode and the backend module built
/// from it. Vertex stages also carry the vertex input layout the pipeline
/// derives its binding and attribute tables from. Pipelines receive their
/// stages as a [`ShaderStage`] list, assembled in the fixed order vertex,
/// geometry, fragment.

use std::any::Any;
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::engine_contract;
use crate::renderer::VertexInputLayout;
use crate::utils::ResizableSequence;

/// Stage kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Geometry,
    Fragment,
}

/// SPIR-V magic number (first word of every module)
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Check that `bytecode` can be handed to the backend as SPIR-V words
///
/// # Errors
///
/// `InvalidResource` if the bytecode is empty or its size is not a
/// multiple of 4.
pub fn validate_bytecode(bytecode: &[u8]) -> Result<()> {
    if bytecode.is_empty() {
        return Err(Error::InvalidResource("shader bytecode is empty".to_string()));
    }
    if bytecode.len() % 4 != 0 {
        return Err(Error::InvalidResource(format!(
            "shader bytecode size {} is not a multiple of 4",
            bytecode.len()
        )));
    }
    Ok(())
}

/// Reassemble validated bytecode into little-endian 32-bit words
pub fn bytecode_words(bytecode: &[u8]) -> Result<Vec<u32>> {
    validate_bytecode(bytecode)?;
    Ok(bytecode
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

/// Words in a SPIR-V module header (magic, version, generator, bound, schema)
pub const SPIRV_HEADER_WORDS: usize = 5;

/// Check the SPIR-V header of `words`
///
/// # Errors
///
/// `InvalidResource` if the module is shorter than its header or does not
/// start with [`SPIRV_MAGIC`].
pub fn check_spirv_header(words: &[u32]) -> Result<()> {
    if words.len() < SPIRV_HEADER_WORDS {
        return Err(Error::InvalidResource(format!(
            "SPIR-V module of {} words is shorter than its header",
            words.len()
        )));
    }
    if words[0] != SPIRV_MAGIC {
        return Err(Error::InvalidResource(format!(
            "bytecode starts with {:#010x}, not the SPIR-V magic number",
            words[0]
        )));
    }
    Ok(())
}

/// [`bytecode_words`] of a module whose header is checked
pub fn spirv_words(bytecode: &[u8]) -> Result<Vec<u32>> {
    let words = bytecode_words(bytecode)?;
    check_spirv_header(&words)?;
    Ok(words)
}

/// Backend shader module
///
/// Implemented by backend-specific module types (e.g., VulkanShaderModule).
/// The native module is destroyed when the last handle is dropped.
pub trait ShaderModule: Send + Sync {
    /// Stage this module was compiled for
    fn kind(&self) -> ShaderKind;

    /// Bytecode the module was created from
    fn bytecode(&self) -> &[u8];

    /// Backend downcast
    fn as_any(&self) -> &dyn Any;
}

fn expect_kind(module: &Arc<dyn ShaderModule>, kind: ShaderKind) -> Result<()> {
    if module.kind() != kind {
        engine_contract!(
            "hearth::Shader",
            "{:?} module used as a {:?} stage",
            module.kind(),
            kind
        );
    }
    Ok(())
}

/// Vertex stage: module plus its input layout
#[derive(Clone)]
pub struct VertexShader {
    module: Arc<dyn ShaderModule>,
    layout: VertexInputLayout,
}

impl VertexShader {
    pub fn new(module: Arc<dyn ShaderModule>, layout: VertexInputLayout) -> Result<Self> {
        expect_kind(&module, ShaderKind::Vertex)?;
        Ok(Self { module, layout })
    }

    pub fn module(&self) -> &Arc<dyn ShaderModule> {
        &self.module
    }

    pub fn layout(&self) -> &VertexInputLayout {
        &self.layout
    }
}

/// Geometry stage
#[derive(Clone)]
pub struct GeometryShader {
    module: Arc<dyn ShaderModule>,
}

impl GeometryShader {
    pub fn new(module: Arc<dyn ShaderModule>) -> Result<Self> {
        expect_kind(&module, ShaderKind::Geometry)?;
        Ok(Self { module })
    }

    pub fn module(&self) -> &Arc<dyn ShaderModule> {
        &self.module
    }
}

/// Fragment stage
#[derive(Clone)]
pub struct FragmentShader {
    module: Arc<dyn ShaderModule>,
}

impl FragmentShader {
    pub fn new(module: Arc<dyn ShaderModule>) -> Result<Self> {
        expect_kind(&module, ShaderKind::Fragment)?;
        Ok(Self { module })
    }

    pub fn module(&self) -> &Arc<dyn ShaderModule> {
        &self.module
    }
}

/// One stage of a pipeline
#[derive(Clone)]
pub enum ShaderStage {
    Vertex(VertexShader),
    Geometry(GeometryShader),
    Fragment(FragmentShader),
}

impl ShaderStage {
    pub fn kind(&self) -> ShaderKind {
        match self {
            ShaderStage::Vertex(_) => ShaderKind::Vertex,
            ShaderStage::Geometry(_) => ShaderKind::Geometry,
            ShaderStage::Fragment(_) => ShaderKind::Fragment,
        }
    }

    pub fn module(&self) -> &Arc<dyn ShaderModule> {
        match self {
            ShaderStage::Vertex(stage) => stage.module(),
            ShaderStage::Geometry(stage) => stage.module(),
            ShaderStage::Fragment(stage) => stage.module(),
        }
    }

    /// Vertex input layout (vertex stages only)
    pub fn vertex_layout(&self) -> Option<&VertexInputLayout> {
        match self {
            ShaderStage::Vertex(stage) => Some(stage.layout()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderStage")
            .field("kind", &self.kind())
            .field("bytecode_len", &self.module().bytecode().len())
            .finish()
    }
}

/// Collect the present stages in order vertex, geometry, fragment
pub fn collect_stages(
    vertex: &VertexShader,
    geometry: Option<&GeometryShader>,
    fragment: Option<&FragmentShader>,
) -> ResizableSequence<ShaderStage> {
    let mut stages = ResizableSequence::with_capacity(3);
    stages.add(ShaderStage::Vertex(vertex.clone()));
    if let Some(geometry) = geometry {
        stages.add(ShaderStage::Geometry(geometry.clone()));
    }
    if let Some(fragment) = fragment {
        stages.add(ShaderStage::Fragment(fragment.clone()));
    }
    stages
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
