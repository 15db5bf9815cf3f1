use glam::{Mat4, Vec3};
use super::*;

fn test_projection() -> Mat4 {
    Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 800.0 / 600.0, 0.1, 100.0)
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_camera_new() {
    let camera = Camera::new(test_projection(), Vec3::new(0.0, 2.0, 5.0));

    assert_eq!(*camera.projection(), test_projection());
    assert_eq!(camera.position(), Vec3::new(0.0, 2.0, 5.0));
}

#[test]
fn test_camera_perspective_matches_glam() {
    let camera = Camera::perspective(
        std::f32::consts::FRAC_PI_4,
        800.0 / 600.0,
        0.1,
        100.0,
        Vec3::ZERO,
    );
    assert_eq!(*camera.projection(), test_projection());
}

// ============================================================================
// Setters
// ============================================================================

#[test]
fn test_set_projection_and_position() {
    let mut camera = Camera::new(Mat4::IDENTITY, Vec3::ZERO);

    camera.set_projection(test_projection());
    camera.set_position(Vec3::new(1.0, 1.0, 1.0));

    assert_eq!(*camera.projection(), test_projection());
    assert_eq!(camera.position(), Vec3::ONE);
}

// ============================================================================
// CameraSource
// ============================================================================

#[test]
fn test_camera_source_reads_stored_values() {
    let camera = Camera::new(test_projection(), Vec3::new(3.0, -1.0, 4.0));
    let source: &dyn CameraSource = &camera;

    assert_eq!(source.projection_matrix(), test_projection());
    assert_eq!(source.owner_world_position(), Vec3::new(3.0, -1.0, 4.0));
}
