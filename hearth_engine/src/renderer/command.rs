/// Command buffer trait, recording state machine and recording value types

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::engine_contract;
use crate::renderer::Extent2D;

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering `width` x `height` with depth range [0, 1]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    /// Rectangle anchored at the origin covering `extent`
    pub fn covering(extent: Extent2D) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }
}

/// RGBA color, components in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Opaque black
    pub const BLACK: Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value
    Color(Color),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullingMode {
    /// No culling
    #[default]
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
    /// Cull every triangle
    FrontAndBack,
}

/// Polygon fill mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Filled triangles
    #[default]
    Solid,
    /// Triangle edges only
    Wireframe,
}

// ===== RECORDING STATE =====

/// Recording state of a command buffer
///
/// Shared by every backend: recording operations go through these checks
/// before touching the native command buffer, so ordering mistakes surface
/// as `ContractViolation` identically on every API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandBufferState {
    /// Between begin and end of recording
    pub recording: bool,
    /// Inside a render pass
    pub in_render_pass: bool,
    /// A shader program is bound
    pub program_bound: bool,
    /// A vertex buffer is bound
    pub vertex_buffer_bound: bool,
    /// Submitted since the last recording began
    pub submitted: bool,
    /// Culling mode recorded last
    pub culling_mode: CullingMode,
    /// Fill mode recorded last
    pub fill_mode: FillMode,
    /// Draws recorded in the current recording
    pub draw_count: u32,
}

const SOURCE: &str = "hearth::CommandBuffer";

impl CommandBufferState {
    /// Start a new recording, discarding the previous one
    pub fn begin_recording(&mut self) {
        *self = Self {
            recording: true,
            ..Self::default()
        };
    }

    /// Enter a render pass
    pub fn begin_render_pass(&mut self) -> Result<()> {
        if !self.recording {
            engine_contract!(SOURCE, "begin_render_pass on a command buffer that is not recording");
        }
        if self.in_render_pass {
            engine_contract!(SOURCE, "begin_render_pass while a render pass is already active");
        }
        self.in_render_pass = true;
        Ok(())
    }

    /// Leave the active render pass
    pub fn end_render_pass(&mut self) -> Result<()> {
        if !self.in_render_pass {
            engine_contract!(SOURCE, "end_render_pass without an active render pass");
        }
        self.in_render_pass = false;
        Ok(())
    }

    pub fn bind_program(&mut self) -> Result<()> {
        if !self.recording {
            engine_contract!(SOURCE, "bind_shader_program on a command buffer that is not recording");
        }
        self.program_bound = true;
        Ok(())
    }

    pub fn bind_vertex_buffer(&mut self) -> Result<()> {
        if !self.recording {
            engine_contract!(SOURCE, "bind_vertex_buffer on a command buffer that is not recording");
        }
        self.vertex_buffer_bound = true;
        Ok(())
    }

    /// Check draw preconditions and count the draw
    pub fn check_draw(&mut self, operation: &str) -> Result<()> {
        if !self.in_render_pass {
            engine_contract!(SOURCE, "{} without an active render pass", operation);
        }
        if !self.program_bound {
            engine_contract!(SOURCE, "{} without a bound shader program", operation);
        }
        if !self.vertex_buffer_bound {
            engine_contract!(SOURCE, "{} without a bound vertex buffer", operation);
        }
        self.draw_count += 1;
        Ok(())
    }

    /// Check attachment clear preconditions
    pub fn check_clear(&self, operation: &str) -> Result<()> {
        if !self.in_render_pass {
            engine_contract!(SOURCE, "{} without an active render pass", operation);
        }
        Ok(())
    }

    /// End recording and mark the buffer submitted
    pub fn finish_for_submit(&mut self) -> Result<()> {
        if self.in_render_pass {
            engine_contract!(SOURCE, "submit with a render pass still active");
        }
        if self.submitted {
            engine_contract!(SOURCE, "command buffer submitted twice without re-recording");
        }
        self.recording = false;
        self.submitted = true;
        Ok(())
    }

    /// Undo `finish_for_submit` after the queue rejected the recording
    ///
    /// The recording is lost; the next recording operation starts a new one
    /// without waiting for the buffer's fence.
    pub fn submit_rejected(&mut self) {
        self.submitted = false;
    }
}

/// Command buffer handle
///
/// Created by `RenderContext::create_command_buffer`. Recording happens
/// through the render context; the buffer only exposes its state.
pub trait CommandBuffer: Send + Sync {
    /// Snapshot of the recording state
    fn state(&self) -> CommandBufferState;

    /// Backend downcast
    fn as_any(&self) -> &dyn Any;
}

/// Identity of a command buffer handle, stable for the handle's lifetime
pub fn command_buffer_id(cmd: &Arc<dyn CommandBuffer>) -> usize {
    Arc::as_ptr(cmd) as *const () as usize
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
