//! Resource lifecycle tests: deferred disposal, handle identity, queries,
//! backbuffer reset and device teardown.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use rstest::rstest;

use common::TestContext;
use redlilium_hal::{
    BufferUsage, DepthFormat, GraphicsError, PresentationParameters, PrimitiveType, Rect,
    SamplerState, SetDataOptions, SurfaceFormat, TextureHandle, VertexDeclaration, VertexElement,
    VertexElementFormat, VertexElementUsage,
};

fn position_declaration() -> Arc<VertexDeclaration> {
    Arc::new(
        VertexDeclaration::packed(vec![VertexElement::new(
            0,
            VertexElementFormat::Vector3,
            VertexElementUsage::Position,
            0,
        )])
        .unwrap(),
    )
}

/// Two triangles of user vertices.
fn draw_quad(ctx: &mut TestContext) {
    let vertices: [f32; 18] = [
        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
        1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
    ];
    ctx.device.apply_vertex_declaration(position_declaration(), 0);
    ctx.device
        .draw_user_primitives(
            PrimitiveType::TriangleList,
            bytemuck::cast_slice(&vertices),
            0,
            2,
        )
        .unwrap();
}

fn sampled_texture(ctx: &mut TestContext) -> TextureHandle {
    let texture = ctx
        .device
        .create_texture_2d(SurfaceFormat::Color, 8, 8, 1, false)
        .unwrap();
    ctx.device
        .verify_sampler(0, texture, &SamplerState::default())
        .unwrap();
    texture
}

// ============================================================================
// Deferred disposal
// ============================================================================

/// A texture drawn with in frame 1 survives until that frame retires.
#[rstest]
#[case::immediate(0)]
#[case::one_frame(1)]
#[case::two_frames(2)]
#[case::three_frames(3)]
fn test_disposal_waits_for_in_flight_frames(#[case] frames_in_flight: u32) {
    let mut ctx = TestContext::new(frames_in_flight);
    let texture = sampled_texture(&mut ctx);
    draw_quad(&mut ctx);
    ctx.device.add_dispose_texture(texture);

    ctx.swap(frames_in_flight as usize);
    assert_eq!(ctx.destroyed_count(), 0);
    assert_eq!(ctx.device.resource_counts().disposing, 1);

    ctx.swap(1);
    assert_eq!(ctx.destroyed_count(), 1);
    assert_eq!(ctx.device.resource_counts().textures, 0);
}

#[test]
fn test_unreferenced_resource_reclaimed_at_next_boundary() {
    let mut ctx = TestContext::new(3);
    let buffer = ctx
        .device
        .gen_index_buffer(false, BufferUsage::None, 6, redlilium_hal::IndexElementSize::Bits16)
        .unwrap();
    ctx.device.add_dispose_index_buffer(buffer);
    assert_eq!(ctx.destroyed_count(), 0);
    ctx.device.begin_frame();
    assert_eq!(ctx.destroyed_count(), 1);
}

#[test]
fn test_use_after_dispose_is_rejected() {
    let mut ctx = TestContext::new(2);
    let texture = sampled_texture(&mut ctx);
    ctx.device.add_dispose_texture(texture);
    let mut out = vec![0u8; 4];
    assert!(matches!(
        ctx.device.get_texture_data_2d(texture, 0, 0, 1, 1, 0, &mut out),
        Err(GraphicsError::PreconditionViolation(_))
    ));
    assert!(matches!(
        ctx.device.verify_sampler(1, texture, &SamplerState::default()),
        Err(GraphicsError::PreconditionViolation(_))
    ));
}

#[test]
fn test_handles_are_never_reused() {
    let mut ctx = TestContext::new(0);
    let mut seen = HashSet::new();
    for _ in 0..64 {
        let texture = ctx
            .device
            .create_texture_2d(SurfaceFormat::Alpha8, 4, 4, 1, false)
            .unwrap();
        assert!(seen.insert(texture), "handle {texture:?} reissued");
        ctx.device.add_dispose_texture(texture);
        ctx.device.begin_frame();
    }
    assert_eq!(ctx.destroyed_count(), 64);
    for stale in &seen {
        assert!(ctx.device.texture_descriptor(*stale).is_err());
    }
}

#[test]
fn test_double_dispose_destroys_once() {
    let mut ctx = TestContext::new(1);
    let effect = ctx.device.create_effect(b"technique T\npass P\n").unwrap();
    ctx.device.add_dispose_effect(effect);
    ctx.device.add_dispose_effect(effect);
    ctx.swap(3);
    ctx.device.add_dispose_effect(effect);
    ctx.swap(1);
    let stats = ctx.stats.lock();
    assert_eq!(stats.destroyed.len(), 1);
    assert_eq!(stats.invalid_destroys, 0);
}

#[test]
fn test_disposal_from_many_threads() {
    let mut ctx = TestContext::new(1);
    let textures: Vec<_> = (0..16)
        .map(|_| {
            ctx.device
                .create_texture_2d(SurfaceFormat::Color, 4, 4, 1, false)
                .unwrap()
        })
        .collect();

    let workers: Vec<_> = textures
        .chunks(4)
        .map(|chunk| {
            let sender = ctx.device.dispose_sender();
            let chunk = chunk.to_vec();
            std::thread::spawn(move || {
                for texture in chunk {
                    sender.dispose_texture(texture);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(ctx.device.dispose_sender().pending(), 16);
    ctx.device.begin_frame();
    assert_eq!(ctx.destroyed_count(), 16);
    assert_eq!(ctx.device.resource_counts().textures, 0);
}

#[test]
fn test_destroy_reclaims_everything_exactly_once() {
    let mut ctx = TestContext::new(3);
    let texture = sampled_texture(&mut ctx);
    let vb = ctx
        .device
        .gen_vertex_buffer(true, BufferUsage::None, 4, 12)
        .unwrap();
    let effect = ctx.device.create_effect(b"technique T\npass P\n").unwrap();
    ctx.device.clone_effect(effect).unwrap();
    ctx.device.create_query().unwrap();
    draw_quad(&mut ctx);
    ctx.device.add_dispose_texture(texture);
    ctx.device.add_dispose_vertex_buffer(vb);

    let TestContext { device, stats } = ctx;
    device.destroy();
    let stats = stats.lock();
    // texture, buffer, one shared effect program, query
    assert_eq!(stats.destroyed.len(), 4);
    assert_eq!(stats.invalid_destroys, 0);
    let unique: HashSet<_> = stats.destroyed.iter().collect();
    assert_eq!(unique.len(), 4);
}

// ============================================================================
// Buffers
// ============================================================================

#[rstest]
#[case::none(true, SetDataOptions::None, 1)]
#[case::discard(true, SetDataOptions::Discard, 0)]
#[case::no_overwrite(true, SetDataOptions::NoOverwrite, 0)]
#[case::static_ignores_options(false, SetDataOptions::NoOverwrite, 1)]
fn test_buffer_write_stalls(
    #[case] dynamic: bool,
    #[case] options: SetDataOptions,
    #[case] stalls: u64,
) {
    let mut ctx = TestContext::new(2);
    let declaration = position_declaration();
    let vb = ctx
        .device
        .gen_vertex_buffer(dynamic, BufferUsage::None, 3, declaration.stride)
        .unwrap();
    ctx.device
        .apply_vertex_buffer_bindings(
            &[redlilium_hal::VertexBufferBinding::new(vb, declaration)],
            true,
            0,
        )
        .unwrap();
    ctx.device
        .draw_primitives(PrimitiveType::TriangleList, 0, 1)
        .unwrap();

    ctx.device
        .set_vertex_buffer_data(vb, 0, &[1u8; 12], options)
        .unwrap();
    assert_eq!(ctx.stats.lock().stalls, stalls);
}

#[test]
fn test_no_overwrite_downgraded_without_capability() {
    let caps = redlilium_hal::DeviceCapabilities {
        supports_no_overwrite: false,
        ..Default::default()
    };
    let mut ctx = TestContext::with_capabilities(caps, 2);
    let vb = ctx
        .device
        .gen_vertex_buffer(true, BufferUsage::None, 3, 12)
        .unwrap();
    ctx.device
        .apply_vertex_buffer_bindings(
            &[redlilium_hal::VertexBufferBinding::new(vb, position_declaration())],
            true,
            0,
        )
        .unwrap();
    ctx.device
        .draw_primitives(PrimitiveType::TriangleList, 0, 1)
        .unwrap();
    ctx.device
        .set_vertex_buffer_data(vb, 0, &[0u8; 12], SetDataOptions::NoOverwrite)
        .unwrap();
    assert_eq!(ctx.stats.lock().stalls, 1);
    assert!(!ctx.device.supports_no_overwrite());
}

#[test]
fn test_vertex_positions_read_back() {
    let mut ctx = TestContext::new(1);
    let vertices: [[f32; 3]; 3] = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
    let vb = ctx
        .device
        .gen_vertex_buffer(false, BufferUsage::None, 3, 12)
        .unwrap();
    ctx.device
        .set_vertex_buffer_data(vb, 0, bytemuck::cast_slice(&vertices), SetDataOptions::None)
        .unwrap();

    // Gather the y component of every vertex.
    let mut ys = [0f32; 3];
    ctx.device
        .get_vertex_buffer_data(vb, 4, bytemuck::cast_slice_mut(&mut ys), 4, 12)
        .unwrap();
    assert_eq!(ys, [2.0, 5.0, 8.0]);
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_query_counts_samples_between_begin_and_end() {
    let mut ctx = TestContext::new(1);
    let query = ctx.device.create_query().unwrap();
    draw_quad(&mut ctx);
    ctx.device.query_begin(query).unwrap();
    draw_quad(&mut ctx);
    assert!(!ctx.device.query_complete(query).unwrap());
    ctx.device.query_end(query).unwrap();
    draw_quad(&mut ctx);

    let mut polls = 0;
    while !ctx.device.query_complete(query).unwrap() {
        ctx.swap(1);
        polls += 1;
        assert!(polls < 8, "query never completed");
    }
    assert_eq!(ctx.device.query_pixel_count(query).unwrap(), 6);
}

#[test]
fn test_query_restart_from_ended() {
    let mut ctx = TestContext::new(2);
    let query = ctx.device.create_query().unwrap();
    ctx.device.query_begin(query).unwrap();
    ctx.device.query_end(query).unwrap();
    ctx.device.query_begin(query).unwrap();
    assert!(matches!(
        ctx.device.query_pixel_count(query),
        Err(GraphicsError::PreconditionViolation(_))
    ));
    ctx.device.query_end(query).unwrap();
    ctx.swap(4);
    assert!(ctx.device.query_complete(query).unwrap());
    assert_eq!(ctx.device.query_pixel_count(query).unwrap(), 0);
}

// ============================================================================
// Backbuffer
// ============================================================================

#[rstest]
#[case::zero_width(PresentationParameters::new(0, 64), "invalid dimensions")]
#[case::too_large(PresentationParameters::new(1 << 20, 64), "invalid dimensions")]
#[case::compressed(
    PresentationParameters::new(64, 64).with_format(SurfaceFormat::Dxt1),
    "unsupported format"
)]
fn test_failed_reset_keeps_backbuffer(
    #[case] params: PresentationParameters,
    #[case] message: &str,
) {
    let mut ctx = TestContext::new(1);
    let before = *ctx.device.backbuffer().parameters();
    let err = ctx.device.reset_backbuffer(&params).unwrap_err();
    assert!(err.to_string().starts_with(message), "{err}");
    assert_eq!(*ctx.device.backbuffer().parameters(), before);
    assert_eq!(ctx.stats.lock().backbuffer_resets, 1);
}

#[test]
fn test_reset_then_read_back() {
    let mut ctx = TestContext::new(1);
    ctx.device
        .reset_backbuffer(
            &PresentationParameters::new(32, 16)
                .with_depth_stencil_format(DepthFormat::D16)
                .with_multisample_count(64),
        )
        .unwrap();
    let backbuffer = ctx.device.backbuffer();
    assert_eq!((backbuffer.width(), backbuffer.height()), (32, 16));
    assert_eq!(backbuffer.depth_format(), DepthFormat::D16);
    assert_eq!(backbuffer.multisample_count(), ctx.device.max_multisample_count());

    ctx.device.clear(
        redlilium_hal::ClearOptions::TARGET,
        redlilium_hal::Vec4::new(0.0, 0.0, 1.0, 1.0),
        1.0,
        0,
    );
    let mut out = vec![0u8; 32 * 16 * 4];
    ctx.device
        .read_backbuffer(Rect::from_dimensions(32, 16), &mut out)
        .unwrap();
    assert!(out.chunks(4).all(|px| px == [0, 0, 255, 255]));
    assert!(matches!(
        ctx.device.read_backbuffer(Rect::new(0, 0, 33, 16), &mut out),
        Err(GraphicsError::OutOfRange(_))
    ));
}
