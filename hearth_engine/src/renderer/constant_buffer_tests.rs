use super::*;
use crate::camera::Camera;

fn projection() -> Mat4 {
    Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 800.0 / 600.0, 0.1, 100.0)
}

// ============================================================================
// Projection flip
// ============================================================================

#[test]
fn test_flip_negates_only_vertical_scale() {
    let p = projection();
    let flipped = flip_projection_y(p);

    assert_eq!(flipped.y_axis.y, -p.y_axis.y);
    assert_eq!(flipped.x_axis, p.x_axis);
    assert_eq!(flipped.z_axis, p.z_axis);
    assert_eq!(flipped.w_axis, p.w_axis);
    assert_eq!(flipped.y_axis.x, p.y_axis.x);
    assert_eq!(flipped.y_axis.z, p.y_axis.z);
}

#[test]
fn test_flip_is_involution() {
    assert_eq!(flip_projection_y(flip_projection_y(projection())), projection());
}

// ============================================================================
// View matrix
// ============================================================================

#[test]
fn test_view_matches_look_at() {
    let eye = Vec3::new(1.0, 2.0, 5.0);
    let expected = Mat4::look_at_rh(eye, Vec3::new(1.0, 2.0, -1.0), Vec3::Y);
    assert_eq!(view_matrix(eye), expected);
}

#[test]
fn test_view_degenerate_eye_looks_down_negative_z() {
    let eye = Vec3::new(0.5, 0.5, -1.0);
    let view = view_matrix(eye);

    assert!(!view.is_nan());
    // A point in front of the eye along -Z lands on the view axis
    let in_front = view.transform_point3(Vec3::new(0.5, 0.5, -3.0));
    assert!(in_front.x.abs() < 1e-5);
    assert!(in_front.y.abs() < 1e-5);
    assert!((in_front.z + 2.0).abs() < 1e-5);
}

#[test]
fn test_view_behind_target_looks_toward_positive_z() {
    // Eye below the target plane: target is at +Z relative to the eye
    let eye = Vec3::new(0.0, 0.0, -5.0);
    let view = view_matrix(eye);
    let target_in_view = view.transform_point3(Vec3::new(0.0, 0.0, -1.0));
    assert!(target_in_view.z < 0.0);
}

// ============================================================================
// View-projection
// ============================================================================

#[test]
fn test_view_projection_is_pure_function() {
    let eye = Vec3::new(0.0, 1.0, 4.0);
    let expected = flip_projection_y(projection())
        * Mat4::look_at_rh(eye, Vec3::new(0.0, 1.0, -1.0), Vec3::Y);

    assert_eq!(view_projection(projection(), eye), expected);
    assert_eq!(view_projection(projection(), eye), view_projection(projection(), eye));
}

#[test]
fn test_camera_view_projection_reads_camera() {
    let camera = Camera::new(projection(), Vec3::new(-2.0, 0.0, 3.0));
    assert_eq!(
        camera_view_projection(&camera),
        view_projection(projection(), Vec3::new(-2.0, 0.0, 3.0))
    );
}

// ============================================================================
// Byte layout
// ============================================================================

#[test]
fn test_constant_buffer_is_64_bytes_column_major() {
    assert_eq!(CONSTANT_BUFFER_SIZE, 64);

    let matrix = Mat4::from_cols_array(&[
        1.0, 2.0, 3.0, 4.0,
        5.0, 6.0, 7.0, 8.0,
        9.0, 10.0, 11.0, 12.0,
        13.0, 14.0, 15.0, 16.0,
    ]);
    let bytes = constant_buffer_bytes(&matrix);
    assert_eq!(bytes.len(), 64);

    let floats: &[f32] = bytemuck::cast_slice(bytes);
    assert_eq!(floats[0], 1.0);
    assert_eq!(floats[4], 5.0);
    assert_eq!(floats[15], 16.0);
}
