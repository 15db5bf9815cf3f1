/*!
# Hearth Engine

Backend-agnostic core of the Hearth real-time rendering backend.

This crate defines the render-context protocol that every graphics backend
implements, together with the pieces of that protocol that do not depend on a
native API: frame ordering, presentation negotiation, vertex layout and
pipeline derivation, constant-buffer math, and the teardown dependency graph.
Backends (see `hearth_engine_renderer_vulkan`) plug in by implementing
[`hearth::RenderContext`].

## Architecture

- **RenderContext**: frame lifecycle, submission, factories, recording ops
- **ShaderProgram**: compiled pipeline with per-frame constant buffers
- **VertexBuffer / CommandBuffer / RenderPass / Framebuffer / Image**: backend handles
- **FrameState / FrameSlots**: backend-independent frame protocol bookkeeping
- **PipelineDesc**: pure derivation of vertex input and fixed-function state
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod utils;
pub mod platform;
pub mod camera;
pub mod renderer;

// Main hearth namespace module
pub mod hearth {
    // Error types
    pub use crate::error::{Error, Result};

    // Log sink
    pub use crate::engine::Engine;

    // Render context trait
    pub use crate::renderer::RenderContext;

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with all rendering types
    pub mod render {
        pub use crate::renderer::*;
    }

    // Camera collaborator
    pub mod camera {
        pub use crate::camera::*;
    }

    // Window and shader-source collaborators
    pub mod platform {
        pub use crate::platform::*;
    }

    // Containers and teardown graph
    pub mod utils {
        pub use crate::utils::*;
    }
}

// Re-export math library at crate root
pub use glam;
