/// Per-frame constant buffer contents.
///
/// The constant buffer holds one column-major 4x4 view-projection matrix:
/// the camera projection with its vertical scale negated (clip space Y
/// points down), times a view looking from the camera owner toward the
/// fixed point `(eye.x, eye.y, -1)` with +Y up.

use glam::{Mat4, Vec3};
use crate::camera::CameraSource;

/// Size in bytes of the constant buffer (one `Mat4`)
pub const CONSTANT_BUFFER_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;

/// Negate the vertical scale term of a projection
pub fn flip_projection_y(projection: Mat4) -> Mat4 {
    let mut flipped = projection;
    flipped.y_axis.y = -flipped.y_axis.y;
    flipped
}

/// View matrix looking from `eye` toward `(eye.x, eye.y, -1)`
///
/// When the eye already sits on the plane z = -1 the target coincides with
/// it; the view then looks down -Z from the eye.
pub fn view_matrix(eye: Vec3) -> Mat4 {
    let target = Vec3::new(eye.x, eye.y, -1.0);
    if (target - eye).length_squared() <= f32::EPSILON {
        Mat4::look_to_rh(eye, Vec3::NEG_Z, Vec3::Y)
    } else {
        Mat4::look_at_rh(eye, target, Vec3::Y)
    }
}

/// `flip_projection_y(projection) * view_matrix(eye)`
pub fn view_projection(projection: Mat4, eye: Vec3) -> Mat4 {
    flip_projection_y(projection) * view_matrix(eye)
}

/// View-projection of a camera
pub fn camera_view_projection(camera: &dyn CameraSource) -> Mat4 {
    view_projection(camera.projection_matrix(), camera.owner_world_position())
}

/// Bytes written into GPU memory (64 bytes, column-major)
pub fn constant_buffer_bytes(matrix: &Mat4) -> &[u8] {
    bytemuck::bytes_of(matrix)
}

#[cfg(test)]
#[path = "constant_buffer_tests.rs"]
mod tests;
