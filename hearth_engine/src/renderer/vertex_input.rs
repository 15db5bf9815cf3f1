/// Vertex input layout and the binding/attribute tables derived from it
///
/// A layout lists the inputs of a vertex shader in declaration order. All
/// inputs live in one interleaved buffer (binding 0, per-vertex rate): each
/// attribute's offset is the running sum of the sizes before it, and the
/// stride is the sum of all sizes.

use crate::error::{Error, Result};
use crate::renderer::BufferFormat;
use crate::utils::ResizableSequence;

/// One vertex shader input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexInput {
    /// Element format (component count and byte size)
    pub format: BufferFormat,
    /// Shader input location
    pub location: u32,
}

impl VertexInput {
    pub fn new(format: BufferFormat, location: u32) -> Self {
        Self { format, location }
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Data is per-vertex
    Vertex,
    /// Data is per-instance
    Instance,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Binding index
    pub binding: u32,
    /// Format of the attribute (data type and component count)
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    /// Binding index
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    /// Input rate (per-vertex or per-instance)
    pub input_rate: VertexInputRate,
}

/// Ordered vertex inputs of a vertex shader
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexInputLayout {
    inputs: ResizableSequence<VertexInput>,
}

impl VertexInputLayout {
    /// Binding index every attribute reads from
    pub const BINDING: u32 = 0;

    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layout from inputs in declaration order
    pub fn from_inputs(inputs: impl IntoIterator<Item = VertexInput>) -> Self {
        Self { inputs: inputs.into_iter().collect() }
    }

    /// Append an input
    pub fn add(&mut self, input: VertexInput) {
        self.inputs.add(input);
    }

    /// Inputs in declaration order
    pub fn inputs(&self) -> &[VertexInput] {
        &self.inputs
    }

    /// Number of inputs
    pub fn len(&self) -> usize {
        self.inputs.size()
    }

    /// Whether the layout declares no input
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Sum of all element sizes
    pub fn stride(&self) -> u32 {
        self.inputs.iter().map(|input| input.format.size_bytes()).sum()
    }

    /// The single per-vertex binding
    pub fn binding(&self) -> VertexBinding {
        VertexBinding {
            binding: Self::BINDING,
            stride: self.stride(),
            input_rate: VertexInputRate::Vertex,
        }
    }

    /// One attribute per input, offsets accumulated in declaration order
    pub fn attributes(&self) -> Vec<VertexAttribute> {
        let mut offset = 0;
        self.inputs
            .iter()
            .map(|input| {
                let attribute = VertexAttribute {
                    location: input.location,
                    binding: Self::BINDING,
                    format: input.format,
                    offset,
                };
                offset += input.format.size_bytes();
                attribute
            })
            .collect()
    }

    /// Reject layouts a pipeline cannot consume
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the layout is empty or two inputs share a location.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidResource("vertex input layout is empty".to_string()));
        }

        let inputs = self.inputs();
        for (i, input) in inputs.iter().enumerate() {
            if inputs[..i].iter().any(|other| other.location == input.location) {
                return Err(Error::InvalidResource(format!(
                    "vertex input location {} declared twice",
                    input.location
                )));
            }
        }

        Ok(())
    }
}

impl FromIterator<VertexInput> for VertexInputLayout {
    fn from_iter<I: IntoIterator<Item = VertexInput>>(iter: I) -> Self {
        Self::from_inputs(iter)
    }
}

#[cfg(test)]
#[path = "vertex_input_tests.rs"]
mod tests;
