//! Platform collaborators: the window the presentation chain is sized from
//! and the source shader bytecode is loaded from.

mod window;
mod shader_source;

pub use window::SurfaceWindow;
pub use shader_source::{ShaderSource, FileShaderSource};
