/// Camera - passive source of projection and eye position.
///
/// The render context only needs two values per frame: the projection
/// matrix and the world position of the camera's owner. Gameplay code keeps
/// them up to date; nothing here derives one from the other.

use glam::{Mat4, Vec3};

/// What the constant-buffer update reads from a camera
pub trait CameraSource {
    /// Projection matrix (perspective or orthographic, right-handed)
    fn projection_matrix(&self) -> Mat4;

    /// World position of the entity owning the camera (the eye)
    fn owner_world_position(&self) -> Vec3;
}

/// Low-level camera. A passive data container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    projection: Mat4,
    position: Vec3,
}

impl Camera {
    /// Create a camera from an explicit projection and eye position
    pub fn new(projection: Mat4, position: Vec3) -> Self {
        Self { projection, position }
    }

    /// Right-handed perspective camera (depth range [0, 1])
    ///
    /// # Arguments
    ///
    /// * `fov_y` - Vertical field of view in radians
    /// * `aspect` - Width / height of the target
    /// * `near` / `far` - Clip plane distances
    /// * `position` - Eye position in world space
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32, position: Vec3) -> Self {
        Self::new(Mat4::perspective_rh(fov_y, aspect, near, far), position)
    }

    // ===== GETTERS =====

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Eye position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    // ===== SETTERS =====

    /// Replace the projection (e.g. after a resize changed the aspect ratio)
    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Move the eye
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }
}

impl CameraSource for Camera {
    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    fn owner_world_position(&self) -> Vec3 {
        self.position
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
