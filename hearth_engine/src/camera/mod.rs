//! Camera collaborator for per-frame constant-buffer updates.
//!
//! The render context never looks a camera up by itself: callers pass a
//! [`CameraSource`] to `update_shader_constants` each frame. [`Camera`] is a
//! passive implementation that stores what the caller computed.

mod camera;

pub use camera::{Camera, CameraSource};
