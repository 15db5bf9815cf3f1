/// Renderer module - render context protocol and backend-independent types

// Module declarations
mod buffer;
mod command;
mod config;
mod constant_buffer;
mod frame;
mod framebuffer;
mod image;
mod pipeline;
mod presentation;
mod render_context;
mod render_pass;
mod shader;
mod vertex_input;

#[cfg(test)]
pub mod mock_render_context;

// Re-export everything
pub use buffer::*;
pub use command::*;
pub use config::*;
pub use constant_buffer::*;
pub use frame::*;
pub use framebuffer::*;
pub use image::*;
pub use pipeline::*;
pub use presentation::*;
pub use render_context::*;
pub use render_pass::*;
pub use shader::*;
pub use vertex_input::*;
