/// Pipeline (shader program) trait and pipeline derivation
///
/// `PipelineDesc::derive` turns a stage list into everything a backend
/// needs to compile a pipeline: stage kinds, the vertex binding and
/// attribute tables, the fixed-function defaults, the resource-binding
/// layout and the dynamic states. It is a pure function of its input.

use std::any::Any;
use bitflags::bitflags;
use crate::camera::CameraSource;
use crate::error::{Error, Result};
use crate::renderer::{
    CullingMode, FillMode, ShaderKind, ShaderStage, VertexAttribute, VertexBinding,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

// ===== RASTERIZATION =====

/// Winding that marks a front-facing triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    /// Starting value only, culling is dynamic state
    pub cull: CullingMode,
    pub front_face: FrontFace,
    /// Solid unless the program is switched with `set_fill_mode`
    pub fill: FillMode,
    pub line_width: f32,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull: CullingMode::None,
            front_face: FrontFace::CounterClockwise,
            fill: FillMode::Solid,
            line_width: 1.0,
        }
    }
}

// ===== DEPTH =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Depth test configuration; stencil testing is never enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
    pub compare: CompareOp,
    pub stencil_test: bool,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test: true,
            write: true,
            compare: CompareOp::Less,
            stencil_test: false,
        }
    }
}

// ===== BLENDING =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
}

/// `result = src * src_factor (op) dst * dst_factor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendEquation {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
}

impl BlendEquation {
    /// Source replaces destination
    pub const REPLACE: Self = Self {
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
        op: BlendOp::Add,
    };
}

bitflags! {
    /// Color channels written by the pipeline
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

/// Blending applied to every color attachment of the render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub enabled: bool,
    pub color: BlendEquation,
    pub alpha: BlendEquation,
    pub write_mask: ColorWriteMask,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            color: BlendEquation::REPLACE,
            alpha: BlendEquation::REPLACE,
            write_mask: ColorWriteMask::all(),
        }
    }
}

/// Samples per pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleCount {
    #[default]
    S1,
    S4,
}

// ===== RESOURCE BINDING LAYOUT =====

bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const GEOMETRY = 1 << 1;
        const FRAGMENT = 1 << 2;
    }
}

impl From<ShaderKind> for ShaderStageFlags {
    fn from(kind: ShaderKind) -> Self {
        match kind {
            ShaderKind::Vertex => ShaderStageFlags::VERTEX,
            ShaderKind::Geometry => ShaderStageFlags::GEOMETRY,
            ShaderKind::Fragment => ShaderStageFlags::FRAGMENT,
        }
    }
}

/// Kind of shader-visible resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    /// Uniform constant buffer
    UniformBuffer,
}

/// One slot of a resource-binding layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingLayoutEntry {
    /// Binding index in the set
    pub binding: u32,
    /// Resource type
    pub binding_type: BindingType,
    /// Descriptor count, always 1 per binding
    pub count: u32,
    /// Stages reading the binding
    pub stages: ShaderStageFlags,
}

/// Resource-binding layout of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingLayoutDesc {
    entries: Vec<BindingLayoutEntry>,
}

impl BindingLayoutDesc {
    /// Layout holding the per-frame constant buffer at binding 0, vertex visible
    pub fn per_frame_constants() -> Self {
        let mut layout = Self::default();
        layout.add_binding(BindingType::UniformBuffer, ShaderStageFlags::VERTEX);
        layout
    }

    /// Append a binding at the next free index
    pub fn add_binding(&mut self, binding_type: BindingType, stages: ShaderStageFlags) -> u32 {
        let binding = self.entries.len() as u32;
        self.entries.push(BindingLayoutEntry {
            binding,
            binding_type,
            count: 1,
            stages,
        });
        binding
    }

    /// Bindings in index order
    pub fn entries(&self) -> &[BindingLayoutEntry] {
        &self.entries
    }
}

// ===== DYNAMIC STATE =====

/// Pipeline state set at record time instead of compile time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicState {
    Viewport,
    Scissor,
    CullMode,
}

// ===== PIPELINE DESCRIPTOR =====

/// Everything a backend needs to compile a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    /// Stage kinds in pipeline order
    pub stages: Vec<ShaderKind>,
    /// The single per-vertex binding
    pub vertex_binding: VertexBinding,
    /// Attributes in declaration order
    pub vertex_attributes: Vec<VertexAttribute>,
    pub topology: PrimitiveTopology,
    pub raster: RasterState,
    pub depth: DepthState,
    pub blend: BlendState,
    pub samples: SampleCount,
    /// Resource-binding layout
    pub binding_layout: BindingLayoutDesc,
    /// States recorded per command buffer
    pub dynamic_states: Vec<DynamicState>,
}

impl PipelineDesc {
    /// Derive the pipeline description of a stage list
    ///
    /// # Errors
    ///
    /// `InvalidResource` unless the list starts with the only vertex stage
    /// and holds each kind at most once, in order vertex, geometry, fragment.
    pub fn derive(stages: &[ShaderStage]) -> Result<Self> {
        let kinds: Vec<ShaderKind> = stages.iter().map(|stage| stage.kind()).collect();

        let layout = match stages.first() {
            Some(ShaderStage::Vertex(vertex)) => vertex.layout(),
            _ => {
                return Err(Error::InvalidResource(
                    "pipeline stage list must start with a vertex stage".to_string(),
                ))
            }
        };

        let rank = |kind: &ShaderKind| match kind {
            ShaderKind::Vertex => 0,
            ShaderKind::Geometry => 1,
            ShaderKind::Fragment => 2,
        };
        if kinds.windows(2).any(|pair| rank(&pair[0]) >= rank(&pair[1])) {
            return Err(Error::InvalidResource(format!(
                "pipeline stages {:?} are not in vertex, geometry, fragment order",
                kinds
            )));
        }

        Ok(Self {
            stages: kinds,
            vertex_binding: layout.binding(),
            vertex_attributes: layout.attributes(),
            topology: PrimitiveTopology::TriangleList,
            raster: RasterState::default(),
            depth: DepthState::default(),
            blend: BlendState::default(),
            samples: SampleCount::S1,
            binding_layout: BindingLayoutDesc::per_frame_constants(),
            dynamic_states: vec![DynamicState::Viewport, DynamicState::Scissor, DynamicState::CullMode],
        })
    }

    /// Number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Union of the stage flags
    pub fn stage_flags(&self) -> ShaderStageFlags {
        self.stages
            .iter()
            .fold(ShaderStageFlags::empty(), |flags, kind| flags | ShaderStageFlags::from(*kind))
    }
}

// ===== SHADER PROGRAM =====

/// Compiled pipeline with its per-frame constant buffers
///
/// Implemented by backend-specific pipeline types (e.g., VulkanShaderProgram).
/// Holds one constant buffer and one binding set per frame slot; the slot
/// is the presentation image index of the frame being recorded.
pub trait ShaderProgram: Send + Sync {
    /// Description the pipeline was compiled from
    fn pipeline_desc(&self) -> &PipelineDesc;

    /// Number of stages
    fn stage_count(&self) -> usize {
        self.pipeline_desc().stage_count()
    }

    /// Number of per-frame constant buffers (one per frame slot)
    fn constant_buffer_count(&self) -> usize;

    /// Write the camera's view-projection into the constant buffer of `slot`
    ///
    /// The slot's binding set already references that buffer; it is not
    /// rewritten, so the call is safe after the program was bound.
    ///
    /// # Errors
    ///
    /// `ContractViolation` if `slot` is out of range.
    fn update_constant_buffer(&self, slot: usize, camera: &dyn CameraSource) -> Result<()>;

    /// Backend downcast
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
