use super::*;
use hearth_engine::hearth::render::{BufferFormat, VertexInput};

// ============================================================================
// Vertex input checks
// ============================================================================

#[test]
fn test_missing_inputs_reports_unprovided_locations() {
    let layout = VertexInputLayout::from_inputs([
        VertexInput::new(BufferFormat::R32G32B32_SFLOAT, 0),
        VertexInput::new(BufferFormat::R32G32B32A32_SFLOAT, 1),
    ]);

    assert!(missing_inputs(&[0, 1], &layout).is_empty());
    assert_eq!(missing_inputs(&[0, 1, 3], &layout), vec![3]);
}

#[test]
fn test_missing_inputs_empty_layout() {
    let layout = VertexInputLayout::new();
    assert_eq!(missing_inputs(&[0], &layout), vec![0]);
    assert!(missing_inputs(&[], &layout).is_empty());
}

// ============================================================================
// Reflection
// ============================================================================

#[test]
fn test_reflection_rejects_non_spirv() {
    let words = [0x1234_5678, 0, 0, 0, 0];
    assert!(matches!(reflect_input_locations(&words), Err(Error::InvalidResource(_))));
}

#[test]
fn test_reflection_rejects_module_shorter_than_header() {
    assert!(matches!(reflect_input_locations(&[0xdead_beef; 3]), Err(Error::InvalidResource(_))));
    assert!(matches!(reflect_input_locations(&[]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_reflection_of_vertex_fixture() {
    let words = spirv_words(include_bytes!("../tests/shaders/position.vert.spv")).unwrap();
    assert_eq!(reflect_input_locations(&words).unwrap(), vec![0]);
}
