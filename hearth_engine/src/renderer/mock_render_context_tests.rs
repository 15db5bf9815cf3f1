//! Unit tests for the render context protocol, run on the mock backend
//!
//! Covers initialization, the frame protocol, fence gating, recording
//! preconditions, factories, resize and teardown order.

use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use glam::{Mat4, Vec3};

use super::*;
use crate::camera::Camera;
use crate::renderer::{
    BufferFormat, RenderContextRegistry, VertexInput, CONSTANT_BUFFER_SIZE,
};

const BYTECODE: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];

fn two_image_config() -> Config {
    Config {
        image_count: Some(2),
        ..Config::default()
    }
}

fn create_context(config: Config) -> MockRenderContext {
    MockRenderContext::new(&MockWindow::new(800, 600), config, mock_capabilities()).unwrap()
}

fn position_layout() -> VertexInputLayout {
    VertexInputLayout::from_inputs([
        VertexInput::new(BufferFormat::R32G32B32_SFLOAT, 0),
        VertexInput::new(BufferFormat::R32G32B32A32_SFLOAT, 1),
    ])
}

fn triangle(ctx: &mut MockRenderContext) -> Arc<dyn VertexBuffer> {
    let data = vec![0.0f32; 3 * 7];
    ctx.create_vertex_buffer(3, &data, &position_layout(), 28).unwrap()
}

fn program(ctx: &mut MockRenderContext) -> Arc<dyn ShaderProgram> {
    let vertex = ctx.create_vertex_shader(&BYTECODE, position_layout()).unwrap();
    let fragment = ctx.create_fragment_shader(&BYTECODE).unwrap();
    let render_pass = ctx.render_pass();
    ctx.create_shader(&vertex, None, Some(&fragment), &render_pass).unwrap()
}

fn fence_of(cmd: &Arc<dyn CommandBuffer>) -> MockFence {
    cmd.as_any()
        .downcast_ref::<MockCommandBuffer>()
        .unwrap()
        .fence()
        .clone()
}

fn commands_of(cmd: &Arc<dyn CommandBuffer>) -> Vec<String> {
    cmd.as_any().downcast_ref::<MockCommandBuffer>().unwrap().commands()
}

/// begin, submit, present, end with an empty command buffer
fn empty_frame(ctx: &mut MockRenderContext, cmd: &Arc<dyn CommandBuffer>) -> u32 {
    let image = ctx.begin_frame().unwrap();
    ctx.submit_command_buffer(cmd).unwrap();
    ctx.present(cmd).unwrap();
    ctx.end_frame().unwrap();
    image
}

struct ForeignCommandBuffer;

impl CommandBuffer for ForeignCommandBuffer {
    fn state(&self) -> CommandBufferState {
        CommandBufferState::default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Initialization
// ============================================================================

#[test]
fn test_initialize_800x600_two_images() {
    let ctx = create_context(two_image_config());

    assert_eq!(ctx.extent(), Extent2D::new(800, 600));
    assert_eq!(ctx.image_count(), 2);
    assert_eq!(ctx.current_image_index(), None);
    assert_eq!(ctx.frame_slot(), 0);
}

#[test]
fn test_initialize_render_pass_and_depth_buffer() {
    let ctx = create_context(two_image_config());

    let desc = ctx.render_pass().desc().clone();
    assert_eq!(desc.color_attachment_count(), 1);
    assert_eq!(desc.depth_attachment().unwrap().format, ImageFormat::D32_SFLOAT_S8_UINT);

    let depth = ctx.depth_stencil_buffer();
    assert_eq!(depth.format(), ImageFormat::D32_SFLOAT_S8_UINT);
    assert_eq!(depth.extent(), Extent2D::new(800, 600));
}

#[test]
fn test_initialize_zero_area_window_fails() {
    let result = MockRenderContext::new(&MockWindow::new(0, 600), Config::default(), mock_capabilities());
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_initialize_defaults_to_driver_minimum() {
    let ctx = create_context(Config::default());
    assert_eq!(ctx.image_count(), 2);
}

// ============================================================================
// Frame protocol
// ============================================================================

#[test]
fn test_five_empty_frames_cycle_images() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    let started = Instant::now();
    let images: Vec<u32> = (0..5).map(|_| empty_frame(&mut ctx, &cmd)).collect();

    assert_eq!(images, vec![0, 1, 0, 1, 0]);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(ctx.current_image_index(), None);
}

#[test]
fn test_image_index_stays_in_range() {
    let mut config = two_image_config();
    config.image_count = Some(3);
    let mut ctx = create_context(config);
    let cmd = ctx.create_command_buffer().unwrap();

    for _ in 0..10 {
        let image = empty_frame(&mut ctx, &cmd);
        assert!(image < ctx.image_count());
    }
}

#[test]
fn test_end_frame_without_begin_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    assert!(matches!(ctx.end_frame(), Err(Error::ContractViolation(_))));
}

#[test]
fn test_present_before_submit_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    ctx.begin_frame().unwrap();
    assert!(matches!(ctx.present(&cmd), Err(Error::ContractViolation(_))));
}

#[test]
fn test_present_with_unsubmitted_command_buffer_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let submitted = ctx.create_command_buffer().unwrap();
    let other = ctx.create_command_buffer().unwrap();

    ctx.begin_frame().unwrap();
    ctx.submit_command_buffer(&submitted).unwrap();
    assert!(matches!(ctx.present(&other), Err(Error::ContractViolation(_))));
    assert!(ctx.present(&submitted).is_ok());
}

#[test]
fn test_submit_outside_frame_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();
    assert!(matches!(ctx.submit_command_buffer(&cmd), Err(Error::ContractViolation(_))));
}

#[test]
fn test_submit_never_recorded_buffer_submits_empty() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    empty_frame(&mut ctx, &cmd);

    assert_eq!(commands_of(&cmd), vec!["begin", "submit"]);
    assert!(cmd.state().submitted);
}

#[test]
fn test_foreign_command_buffer_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let foreign: Arc<dyn CommandBuffer> = Arc::new(ForeignCommandBuffer);

    ctx.begin_frame().unwrap();
    assert!(matches!(ctx.submit_command_buffer(&foreign), Err(Error::ContractViolation(_))));
}

// ============================================================================
// Fence gating
// ============================================================================

#[test]
fn test_third_frame_waits_for_first_frame_fence() {
    let mut ctx = create_context(Config {
        fence_timeout: Some(Duration::from_millis(20)),
        ..two_image_config()
    });
    ctx.set_fence_signaling(FenceSignaling::Manual);
    let cmds = [ctx.create_command_buffer().unwrap(), ctx.create_command_buffer().unwrap()];

    assert_eq!(empty_frame(&mut ctx, &cmds[0]), 0);
    assert_eq!(empty_frame(&mut ctx, &cmds[1]), 1);

    // Image 0 is still in flight
    match ctx.begin_frame() {
        Err(err) => {
            assert!(matches!(err, Error::Timeout(_)));
            assert!(err.is_recoverable());
        }
        Ok(image) => panic!("begin_frame returned image {} while its fence is unsignaled", image),
    }

    fence_of(&cmds[0]).signal();
    assert_eq!(ctx.begin_frame().unwrap(), 0);
}

#[test]
fn test_begin_frame_blocks_until_fence_signals() {
    let mut ctx = create_context(two_image_config());
    ctx.set_fence_signaling(FenceSignaling::Manual);
    let cmds = [ctx.create_command_buffer().unwrap(), ctx.create_command_buffer().unwrap()];

    empty_frame(&mut ctx, &cmds[0]);
    empty_frame(&mut ctx, &cmds[1]);

    let fence = fence_of(&cmds[0]);
    let signaler = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        fence.signal();
    });

    let started = Instant::now();
    assert_eq!(ctx.begin_frame().unwrap(), 0);
    assert!(started.elapsed() >= Duration::from_millis(40));
    signaler.join().unwrap();
}

#[test]
fn test_second_frame_does_not_wait_on_other_image() {
    let mut ctx = create_context(Config {
        fence_timeout: Some(Duration::from_millis(20)),
        ..two_image_config()
    });
    ctx.set_fence_signaling(FenceSignaling::Manual);
    let cmds = [ctx.create_command_buffer().unwrap(), ctx.create_command_buffer().unwrap()];

    empty_frame(&mut ctx, &cmds[0]);
    assert!(!fence_of(&cmds[0]).is_signaled());
    assert_eq!(ctx.begin_frame().unwrap(), 1);
}

#[test]
fn test_rerecording_in_flight_buffer_waits_its_fence() {
    let mut ctx = create_context(Config {
        fence_timeout: Some(Duration::from_millis(20)),
        ..two_image_config()
    });
    ctx.set_fence_signaling(FenceSignaling::Manual);
    let cmd = ctx.create_command_buffer().unwrap();

    empty_frame(&mut ctx, &cmd);
    ctx.begin_frame().unwrap();

    let render_pass = ctx.render_pass();
    let framebuffer = ctx.back_framebuffer().unwrap();
    assert!(matches!(
        ctx.begin_render_pass(&render_pass, &framebuffer, &cmd),
        Err(Error::Timeout(_))
    ));

    fence_of(&cmd).signal();
    assert!(ctx.begin_render_pass(&render_pass, &framebuffer, &cmd).is_ok());
}

#[test]
fn test_rejected_submit_leaves_fence_usable() {
    let mut ctx = create_context(Config {
        fence_timeout: Some(Duration::from_millis(20)),
        ..two_image_config()
    });
    let cmd = ctx.create_command_buffer().unwrap();

    ctx.begin_frame().unwrap();
    ctx.reject_next_submit();
    assert!(matches!(ctx.submit_command_buffer(&cmd), Err(Error::BackendError(_))));
    assert!(!cmd.state().submitted);
    assert!(fence_of(&cmd).is_signaled());
    // Nothing was submitted, so nothing can be presented
    assert!(matches!(ctx.present(&cmd), Err(Error::ContractViolation(_))));

    // Same frame: a fresh recording goes through
    ctx.submit_command_buffer(&cmd).unwrap();
    ctx.present(&cmd).unwrap();
    ctx.end_frame().unwrap();
    assert_eq!(commands_of(&cmd), vec!["begin", "submit rejected", "begin", "submit"]);

    assert_eq!(empty_frame(&mut ctx, &cmd), 1);
    assert_eq!(empty_frame(&mut ctx, &cmd), 0);
}

// ============================================================================
// Recording
// ============================================================================

#[test]
fn test_record_and_draw_frame() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();
    let vertex_buffer = triangle(&mut ctx);
    let program = program(&mut ctx);

    ctx.begin_frame().unwrap();
    let render_pass = ctx.render_pass();
    let framebuffer = ctx.back_framebuffer().unwrap();
    ctx.begin_render_pass(&render_pass, &framebuffer, &cmd).unwrap();
    ctx.clear_color_buffer(Color::new(0.1, 0.2, 0.3, 1.0), &cmd).unwrap();
    ctx.clear_depth_stencil_buffer(1.0, 0, &cmd).unwrap();
    ctx.bind_shader_program(&program, &cmd).unwrap();
    ctx.bind_vertex_buffer(&vertex_buffer, &cmd).unwrap();
    ctx.draw(&vertex_buffer, &cmd).unwrap();
    ctx.draw_multiples(&vertex_buffer, 4, &cmd).unwrap();
    ctx.end_render_pass(&cmd).unwrap();
    ctx.submit_command_buffer(&cmd).unwrap();
    ctx.present(&cmd).unwrap();
    ctx.end_frame().unwrap();

    let commands = commands_of(&cmd);
    assert_eq!(commands.first().map(String::as_str), Some("begin"));
    assert!(commands.contains(&"draw 3x1".to_string()));
    assert!(commands.contains(&"draw_multiples 3x4".to_string()));
    assert!(commands.contains(&"bind_shader_program slot 0".to_string()));
    assert_eq!(commands.last().map(String::as_str), Some("submit"));
}

#[test]
fn test_draw_outside_render_pass_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();
    let vertex_buffer = triangle(&mut ctx);
    let program = program(&mut ctx);

    ctx.begin_frame().unwrap();
    ctx.bind_shader_program(&program, &cmd).unwrap();
    ctx.bind_vertex_buffer(&vertex_buffer, &cmd).unwrap();
    assert!(matches!(ctx.draw(&vertex_buffer, &cmd), Err(Error::ContractViolation(_))));
}

#[test]
fn test_draw_without_program_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();
    let vertex_buffer = triangle(&mut ctx);

    ctx.begin_frame().unwrap();
    let render_pass = ctx.render_pass();
    let framebuffer = ctx.back_framebuffer().unwrap();
    ctx.begin_render_pass(&render_pass, &framebuffer, &cmd).unwrap();
    ctx.bind_vertex_buffer(&vertex_buffer, &cmd).unwrap();
    assert!(matches!(ctx.draw(&vertex_buffer, &cmd), Err(Error::ContractViolation(_))));
}

#[test]
fn test_nested_render_pass_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    ctx.begin_frame().unwrap();
    let render_pass = ctx.render_pass();
    let framebuffer = ctx.back_framebuffer().unwrap();
    ctx.begin_render_pass(&render_pass, &framebuffer, &cmd).unwrap();
    assert!(matches!(
        ctx.begin_render_pass(&render_pass, &framebuffer, &cmd),
        Err(Error::ContractViolation(_))
    ));
}

#[test]
fn test_submit_with_open_render_pass_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    ctx.begin_frame().unwrap();
    let render_pass = ctx.render_pass();
    let framebuffer = ctx.back_framebuffer().unwrap();
    ctx.begin_render_pass(&render_pass, &framebuffer, &cmd).unwrap();
    assert!(matches!(ctx.submit_command_buffer(&cmd), Err(Error::ContractViolation(_))));
}

#[test]
fn test_culling_and_fill_mode_recorded() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    ctx.set_culling_mode(CullingMode::Back, &cmd).unwrap();
    ctx.set_fill_mode(FillMode::Wireframe, &cmd).unwrap();
    ctx.set_viewport(Viewport::full(400, 300), &cmd).unwrap();

    let state = cmd.state();
    assert_eq!(state.culling_mode, CullingMode::Back);
    assert_eq!(state.fill_mode, FillMode::Wireframe);
    assert!(commands_of(&cmd).contains(&"set_viewport 400x300".to_string()));
}

#[test]
fn test_wireframe_unsupported_is_backend_error() {
    let mut ctx = create_context(two_image_config());
    ctx.set_wireframe_supported(false);
    let cmd = ctx.create_command_buffer().unwrap();

    assert!(matches!(ctx.set_fill_mode(FillMode::Wireframe, &cmd), Err(Error::BackendError(_))));
    assert!(ctx.set_fill_mode(FillMode::Solid, &cmd).is_ok());
}

// ============================================================================
// Factories
// ============================================================================

#[test]
fn test_vertex_only_pipeline() {
    let mut ctx = create_context(two_image_config());
    let vertex = ctx.create_vertex_shader(&BYTECODE, position_layout()).unwrap();
    let render_pass = ctx.render_pass();

    let program = ctx.create_shader(&vertex, None, None, &render_pass).unwrap();

    assert_eq!(program.stage_count(), 1);
    assert!(program.pipeline_desc().depth.test);
    assert_eq!(program.constant_buffer_count(), 2);
}

#[test]
fn test_full_pipeline_stage_order() {
    let mut ctx = create_context(two_image_config());
    let vertex = ctx.create_vertex_shader(&BYTECODE, position_layout()).unwrap();
    let geometry = ctx.create_geometry_shader(&BYTECODE).unwrap();
    let fragment = ctx.create_fragment_shader(&BYTECODE).unwrap();
    let render_pass = ctx.render_pass();

    let program = ctx.create_shader(&vertex, Some(&geometry), Some(&fragment), &render_pass).unwrap();

    assert_eq!(
        program.pipeline_desc().stages,
        vec![ShaderKind::Vertex, ShaderKind::Geometry, ShaderKind::Fragment]
    );
    assert_eq!(program.pipeline_desc().vertex_binding.stride, 28);
}

#[test]
fn test_shader_bytecode_must_be_word_aligned() {
    let mut ctx = create_context(two_image_config());
    assert!(matches!(ctx.create_fragment_shader(&BYTECODE[..6]), Err(Error::InvalidResource(_))));
    assert!(matches!(ctx.create_geometry_shader(&[]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_vertex_buffer_data_mismatch() {
    let mut ctx = create_context(two_image_config());
    let data = vec![0.0f32; 20];
    assert!(matches!(
        ctx.create_vertex_buffer(3, &data, &position_layout(), 28),
        Err(Error::InvalidResource(_))
    ));
    assert!(matches!(
        ctx.create_vertex_buffer(3, &vec![0.0f32; 21], &position_layout(), 24),
        Err(Error::InvalidResource(_))
    ));
}

#[test]
fn test_create_render_pass_from_images() {
    let mut ctx = create_context(two_image_config());
    let images = vec![ctx.depth_stencil_buffer()];
    let color_and_depth = {
        ctx.begin_frame().unwrap();
        vec![ctx.depth_stencil_buffer(), ctx.back_buffer().unwrap()]
    };

    let depth_only = ctx.create_render_pass(&images).unwrap();
    assert_eq!(depth_only.desc().color_attachment_count(), 0);

    let pass = ctx.create_render_pass(&color_and_depth).unwrap();
    assert_eq!(pass.desc().attachments()[0].point, AttachmentPoint::Color);
    assert!(matches!(ctx.create_render_pass(&[]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_create_framebuffer() {
    let mut ctx = create_context(two_image_config());
    let render_pass = ctx.render_pass();

    let framebuffer = ctx.create_framebuffer(Extent2D::new(256, 128), &render_pass).unwrap();
    assert_eq!(framebuffer.extent(), Extent2D::new(256, 128));
    assert!(Arc::ptr_eq(framebuffer.render_pass(), &render_pass));

    assert!(matches!(
        ctx.create_framebuffer(Extent2D::new(0, 128), &render_pass),
        Err(Error::InvalidResource(_))
    ));
}

// ============================================================================
// Accessors and constants
// ============================================================================

#[test]
fn test_back_buffer_follows_current_image() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    assert!(matches!(ctx.back_buffer(), Err(Error::ContractViolation(_))));
    assert!(matches!(ctx.back_framebuffer(), Err(Error::ContractViolation(_))));

    empty_frame(&mut ctx, &cmd);
    let image = ctx.begin_frame().unwrap();
    let back = ctx.back_buffer().unwrap();
    let mock = back.as_any().downcast_ref::<MockImage>().unwrap();

    assert_eq!(image, 1);
    assert_eq!(mock.index, Some(1));
    assert_eq!(ctx.frame_slot(), 1);
}

#[test]
fn test_update_shader_constants_writes_current_slot() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();
    let program = program(&mut ctx);
    let camera = Camera::perspective(1.0, 800.0 / 600.0, 0.1, 100.0, Vec3::new(0.0, 2.0, 5.0));

    empty_frame(&mut ctx, &cmd);
    ctx.begin_frame().unwrap();
    ctx.update_shader_constants(&program, &camera).unwrap();

    let mock = program.as_any().downcast_ref::<MockShaderProgram>().unwrap();
    assert_eq!(mock.constants(0), None);
    assert_eq!(mock.constants(1), Some(camera_view_projection(&camera)));
    assert_eq!(std::mem::size_of::<Mat4>() as u64, CONSTANT_BUFFER_SIZE);
}

#[test]
fn test_constant_slot_out_of_range_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    let program = program(&mut ctx);
    let camera = Camera::new(Mat4::IDENTITY, Vec3::ZERO);

    assert!(matches!(
        program.update_constant_buffer(2, &camera),
        Err(Error::ContractViolation(_))
    ));
}

// ============================================================================
// Resize and out-of-date
// ============================================================================

#[test]
fn test_out_of_date_then_resize() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    ctx.invalidate_surface();
    let err = ctx.begin_frame().unwrap_err();
    assert_eq!(err, Error::OutOfDate);
    assert!(err.is_recoverable());

    ctx.resize(1024, 768).unwrap();
    assert_eq!(ctx.extent(), Extent2D::new(1024, 768));
    assert_eq!(ctx.depth_stencil_buffer().extent(), Extent2D::new(1024, 768));
    assert_eq!(empty_frame(&mut ctx, &cmd), 0);
}

#[test]
fn test_present_out_of_date_still_ends_frame() {
    let mut ctx = create_context(two_image_config());
    let cmd = ctx.create_command_buffer().unwrap();

    ctx.begin_frame().unwrap();
    ctx.submit_command_buffer(&cmd).unwrap();
    ctx.invalidate_surface();
    assert_eq!(ctx.present(&cmd), Err(Error::OutOfDate));
    assert!(ctx.end_frame().is_ok());
}

#[test]
fn test_resize_to_zero_is_noop() {
    let mut ctx = create_context(two_image_config());
    ctx.resize(0, 600).unwrap();
    assert_eq!(ctx.extent(), Extent2D::new(800, 600));
    assert!(ctx.destroyed_objects().lock().unwrap().is_empty());
}

#[test]
fn test_resize_during_frame_is_contract_violation() {
    let mut ctx = create_context(two_image_config());
    ctx.begin_frame().unwrap();
    assert!(matches!(ctx.resize(640, 480), Err(Error::ContractViolation(_))));
}

#[test]
fn test_resize_rebuilds_framebuffers_dependents_first() {
    let mut ctx = create_context(two_image_config());
    let destroyed = ctx.destroyed_objects();

    ctx.resize(640, 480).unwrap();

    assert_eq!(
        *destroyed.lock().unwrap(),
        vec![
            ContextObject::Framebuffer(1),
            ContextObject::Framebuffer(0),
            ContextObject::DepthBuffer,
        ]
    );
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_teardown_order_on_drop() {
    let ctx = create_context(two_image_config());
    let destroyed = ctx.destroyed_objects();
    drop(ctx);

    assert_eq!(
        *destroyed.lock().unwrap(),
        vec![
            ContextObject::Framebuffer(1),
            ContextObject::Framebuffer(0),
            ContextObject::DepthBuffer,
            ContextObject::RenderPass,
            ContextObject::PresentationChain,
            ContextObject::PipelineCache,
            ContextObject::SyncObjects,
            ContextObject::DescriptorPool,
            ContextObject::CommandPools,
        ]
    );
}

#[test]
fn test_teardown_after_resize_keeps_order() {
    let mut ctx = create_context(two_image_config());
    let destroyed = ctx.destroyed_objects();
    ctx.resize(640, 480).unwrap();
    drop(ctx);

    let log = destroyed.lock().unwrap();
    let tail = &log[3..];
    assert_eq!(tail[2], ContextObject::DepthBuffer);
    assert_eq!(tail[3], ContextObject::RenderPass);
    assert_eq!(tail.last(), Some(&ContextObject::CommandPools));
}

// ============================================================================
// Backend registry
// ============================================================================

#[test]
fn test_registry_creates_registered_backend() {
    let mut registry: RenderContextRegistry<MockWindow> = RenderContextRegistry::new();
    registry.register_backend("mock", |window: &MockWindow, config| {
        let ctx = MockRenderContext::new(window, config, mock_capabilities())?;
        Ok(Box::new(ctx) as Box<dyn RenderContext>)
    });

    assert!(registry.has_backend("mock"));
    assert_eq!(registry.backend_names(), vec!["mock"]);

    let ctx = registry
        .create_context("mock", &MockWindow::new(320, 240), two_image_config())
        .unwrap();
    assert_eq!(ctx.extent(), Extent2D::new(320, 240));
}

#[test]
fn test_registry_unknown_backend() {
    let registry: RenderContextRegistry<MockWindow> = RenderContextRegistry::default();
    let result = registry.create_context("vulkan", &MockWindow::new(320, 240), Config::default());
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}
