//! Render state and render target tests.
//!
//! The state cache must keep redundant work away from the backend: setting
//! the same state twice costs nothing, switching presets sends only the
//! differences, and effect pass-restore converges back to the saved state.

mod common;

use rstest::rstest;

use common::TestContext;
use redlilium_hal::{
    BlendState, ClearOptions, CubeMapFace, CullMode, DepthFormat, DepthStencilState,
    EffectStateChanges, GraphicsError, RasterizerState, RenderTargetBinding, SurfaceFormat,
    Vec4, Viewport,
};

const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

fn state_changes(ctx: &TestContext) -> u64 {
    ctx.stats.lock().state_changes
}

// ============================================================================
// Immutable state
// ============================================================================

#[rstest]
#[case::opaque(BlendState::OPAQUE)]
#[case::alpha_blend(BlendState::ALPHA_BLEND)]
#[case::additive(BlendState::ADDITIVE)]
fn test_blend_state_is_idempotent(#[case] state: BlendState) {
    let mut ctx = TestContext::new(1);
    ctx.device.set_blend_state(&state);
    let after_first = state_changes(&ctx);
    ctx.device.set_blend_state(&state);
    ctx.device.set_blend_state(&state);
    assert_eq!(state_changes(&ctx), after_first);
    assert_eq!(*ctx.device.blend_state(), state);
}

/// Switching presets sends only the fields that differ.
#[rstest]
#[case::opaque_to_alpha(BlendState::OPAQUE, BlendState::ALPHA_BLEND, 2)]
#[case::alpha_to_additive(BlendState::ALPHA_BLEND, BlendState::ADDITIVE, 1)]
#[case::additive_to_opaque(BlendState::ADDITIVE, BlendState::OPAQUE, 2)]
fn test_blend_switch_sends_differences(
    #[case] from: BlendState,
    #[case] to: BlendState,
    #[case] expected: u64,
) {
    let mut ctx = TestContext::new(1);
    ctx.device.set_blend_state(&from);
    let before = state_changes(&ctx);
    ctx.device.set_blend_state(&to);
    assert_eq!(state_changes(&ctx) - before, expected);
}

#[rstest]
#[case::default(DepthStencilState::default())]
#[case::none(DepthStencilState::none())]
#[case::stencil(DepthStencilState {
    stencil_enable: true,
    two_sided_stencil_mode: true,
    ..DepthStencilState::default()
})]
fn test_depth_stencil_state_is_idempotent(#[case] state: DepthStencilState) {
    let mut ctx = TestContext::new(1);
    ctx.device.set_depth_stencil_state(&state);
    let after_first = state_changes(&ctx);
    ctx.device.set_depth_stencil_state(&state);
    assert_eq!(state_changes(&ctx), after_first);
}

#[test]
fn test_depth_stencil_switch_sends_differences() {
    let mut ctx = TestContext::new(1);
    ctx.device.set_depth_stencil_state(&DepthStencilState::default());
    let before = state_changes(&ctx);
    ctx.device.set_depth_stencil_state(&DepthStencilState::none());
    // Depth test and depth write.
    assert_eq!(state_changes(&ctx) - before, 2);
}

#[rstest]
#[case::default(RasterizerState::default())]
#[case::no_cull(RasterizerState { cull_mode: CullMode::None, ..RasterizerState::default() })]
#[case::biased(RasterizerState { depth_bias: 0.5, slope_scale_depth_bias: 1.0, ..RasterizerState::default() })]
fn test_rasterizer_state_is_idempotent(#[case] state: RasterizerState) {
    let mut ctx = TestContext::new(1);
    ctx.device.apply_rasterizer_state(&state);
    let after_first = state_changes(&ctx);
    ctx.device.apply_rasterizer_state(&state);
    assert_eq!(state_changes(&ctx), after_first);
    assert_eq!(*ctx.device.rasterizer_state(), state);
}

// ============================================================================
// Mutable state
// ============================================================================

#[test]
fn test_mutable_state_reaches_backend_at_draw_time() {
    let mut ctx = TestContext::new(1);
    ctx.device.clear(ClearOptions::all(), Vec4::default(), 1.0, 0);
    let before = state_changes(&ctx);

    ctx.device.set_viewport(Viewport::new(0, 0, 32, 32));
    ctx.device.set_viewport(Viewport::new(0, 0, 64, 64));
    assert_eq!(state_changes(&ctx), before);
    assert_eq!(ctx.device.viewport(), Viewport::new(0, 0, 64, 64));

    ctx.device.clear(ClearOptions::all(), Vec4::default(), 1.0, 0);
    assert_eq!(state_changes(&ctx), before + 1);
}

/// The blend state carries blend factor and multisample mask into the
/// mutable layer.
#[test]
fn test_blend_state_updates_mutable_values() {
    let mut ctx = TestContext::new(1);
    let state = BlendState {
        multisample_mask: 0x0F,
        ..BlendState::ADDITIVE
    };
    ctx.device.set_blend_state(&state);
    assert_eq!(ctx.device.multisample_mask(), 0x0F);
    assert_eq!(ctx.device.blend_factor(), state.blend_factor);
}

// ============================================================================
// Effect pass restore
// ============================================================================

#[test]
fn test_pass_restore_returns_rasterizer_state() {
    let mut ctx = TestContext::new(1);
    ctx.device.apply_rasterizer_state(&RasterizerState::default());
    let effect = ctx
        .device
        .create_effect(b"technique Main\npass P0 cull=none\n")
        .unwrap();

    let mut changes = EffectStateChanges::new();
    ctx.device.begin_pass_restore(effect, &mut changes).unwrap();
    ctx.device.apply_effect(effect, 0, 0, &mut changes).unwrap();
    assert!(!changes.render_state_changes.is_empty());

    let before = state_changes(&ctx);
    ctx.device.end_pass_restore(effect).unwrap();
    assert!(state_changes(&ctx) > before);
    assert_eq!(*ctx.device.rasterizer_state(), RasterizerState::default());

    // The backend is back in sync, so re-applying the default is free.
    let synced = state_changes(&ctx);
    ctx.device.apply_rasterizer_state(&RasterizerState::default());
    assert_eq!(state_changes(&ctx), synced);
}

// ============================================================================
// Render targets
// ============================================================================

#[test]
fn test_too_many_render_targets() {
    let mut ctx = TestContext::new(1);
    let targets: Vec<_> = (0..5)
        .map(|_| {
            let texture = ctx
                .device
                .create_texture_2d(SurfaceFormat::Color, 16, 16, 1, true)
                .unwrap();
            RenderTargetBinding::texture_2d(texture)
        })
        .collect();

    assert!(matches!(
        ctx.device.set_render_targets(&targets, None, DepthFormat::None),
        Err(GraphicsError::OutOfRange(_))
    ));
    assert!(ctx.device.render_targets().is_backbuffer());

    ctx.device
        .set_render_targets(&targets[..4], None, DepthFormat::None)
        .unwrap();
    assert_eq!(ctx.device.render_targets().bindings.len(), 4);
}

#[test]
fn test_mismatched_render_target_sizes() {
    let mut ctx = TestContext::new(1);
    let a = ctx
        .device
        .create_texture_2d(SurfaceFormat::Color, 32, 32, 1, true)
        .unwrap();
    let b = ctx
        .device
        .create_texture_2d(SurfaceFormat::Color, 32, 16, 1, true)
        .unwrap();
    assert!(matches!(
        ctx.device.set_render_targets(
            &[RenderTargetBinding::texture_2d(a), RenderTargetBinding::texture_2d(b)],
            None,
            DepthFormat::None,
        ),
        Err(GraphicsError::InvalidDimensions(_))
    ));
}

#[test]
fn test_clear_cube_face_only() {
    let mut ctx = TestContext::new(1);
    let cube = ctx
        .device
        .create_texture_cube(SurfaceFormat::Color, 8, 1, true)
        .unwrap();
    ctx.device
        .set_render_targets(
            &[RenderTargetBinding::cube(cube, CubeMapFace::NegativeZ)],
            None,
            DepthFormat::None,
        )
        .unwrap();
    ctx.device.clear(ClearOptions::TARGET, RED, 1.0, 0);
    ctx.device.set_render_targets(&[], None, DepthFormat::None).unwrap();

    let mut texel = [0u8; 4];
    ctx.device
        .get_texture_data_cube(cube, 7, 7, 1, 1, CubeMapFace::NegativeZ, 0, &mut texel)
        .unwrap();
    assert_eq!(texel, [255, 0, 0, 255]);
    ctx.device
        .get_texture_data_cube(cube, 7, 7, 1, 1, CubeMapFace::PositiveX, 0, &mut texel)
        .unwrap();
    assert_eq!(texel, [0, 0, 0, 0]);
}

/// Rendering into a multisampled color buffer shows up in the texture only
/// after resolving.
#[test]
fn test_multisampled_target_resolves_into_texture() {
    let mut ctx = TestContext::new(1);
    let texture = ctx
        .device
        .create_texture_2d(SurfaceFormat::Color, 16, 16, 1, true)
        .unwrap();
    let msaa = ctx
        .device
        .gen_color_renderbuffer(16, 16, SurfaceFormat::Color, 4, texture)
        .unwrap();
    let binding = RenderTargetBinding::texture_2d(texture).with_color_buffer(msaa);
    ctx.device
        .set_render_targets(&[binding], None, DepthFormat::None)
        .unwrap();
    ctx.device.clear(ClearOptions::TARGET, RED, 1.0, 0);

    let mut texel = [0u8; 4];
    ctx.device
        .get_texture_data_2d(texture, 8, 8, 1, 1, 0, &mut texel)
        .unwrap();
    assert_eq!(texel, [0, 0, 0, 0]);

    ctx.device.resolve_target(&binding).unwrap();
    ctx.device
        .get_texture_data_2d(texture, 8, 8, 1, 1, 0, &mut texel)
        .unwrap();
    assert_eq!(texel, [255, 0, 0, 255]);
    assert_eq!(ctx.stats.lock().resolves, 1);
}

#[test]
fn test_depth_target_must_match_declared_format() {
    let mut ctx = TestContext::new(1);
    let texture = ctx
        .device
        .create_texture_2d(SurfaceFormat::Color, 16, 16, 1, true)
        .unwrap();
    let depth = ctx
        .device
        .gen_depth_stencil_renderbuffer(16, 16, DepthFormat::D24S8, 0)
        .unwrap();
    let targets = [RenderTargetBinding::texture_2d(texture)];
    assert!(matches!(
        ctx.device
            .set_render_targets(&targets, Some(depth), DepthFormat::D16),
        Err(GraphicsError::PreconditionViolation(_))
    ));
    ctx.device
        .set_render_targets(&targets, Some(depth), DepthFormat::D24S8)
        .unwrap();
    assert_eq!(ctx.device.render_targets().depth_stencil, Some(depth));
}
