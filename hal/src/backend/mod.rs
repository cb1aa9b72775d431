//! GPU backend abstraction layer.
//!
//! The device talks to the native graphics API only through the
//! [`GpuBackend`] trait. Backend objects are identified by opaque
//! [`RawResource`] ids; the device owns the mapping from handles to ids and
//! decides when an id may be destroyed.
//!
//! # Available Backends
//!
//! - `dummy` (default): in-memory reference backend for tests and headless use
//!
//! # Submission model
//!
//! Commands are grouped into frames identified by a monotonically
//! increasing serial. The device calls [`GpuBackend::submit`] at every
//! present; [`GpuBackend::completed_serial`] reports the newest frame whose
//! commands have all retired.

#[cfg(feature = "dummy")]
pub mod dummy;
#[cfg(feature = "dummy")]
mod manifest;
mod error;

pub use error::{BackendError, BackendResult};

use std::sync::Arc;

use raw_window_handle::RawWindowHandle;

use crate::addressing::TextureRegion;
use crate::device::{DeviceCapabilities, DeviceParameters};
use crate::effect::EffectData;
use crate::state::{RenderStateChange, SamplerSlot};
use crate::types::{
    BufferDescriptor, ClearOptions, DepthFormat, IndexElementSize, PresentInterval,
    PresentationParameters, PrimitiveType, Rect, SamplerState, SetDataOptions, SurfaceFormat,
    TextureDescriptor, Vec4, VertexDeclaration,
};

/// Opaque id of a backend object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawResource(pub u64);

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Pick the best compiled-in backend.
    #[default]
    Auto,
    /// In-memory reference backend.
    Dummy,
}

/// A vertex buffer as the backend sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundVertexBuffer {
    pub buffer: RawResource,
    pub declaration: Arc<VertexDeclaration>,
    pub vertex_offset: u32,
    pub instance_frequency: u32,
}

/// A color attachment as the backend sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundRenderTarget {
    pub texture: RawResource,
    /// Array layer (cube face) rendered into.
    pub layer: u32,
    /// Multisampled renderbuffer rendered into instead of the texture.
    pub color_buffer: Option<RawResource>,
}

/// Parameters of an indexed draw from device-owned buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexedDraw {
    pub primitive_type: PrimitiveType,
    pub base_vertex: i32,
    pub min_vertex_index: u32,
    pub num_vertices: u32,
    pub start_index: u32,
    pub primitive_count: u32,
    /// 1 for non-instanced draws.
    pub instance_count: u32,
    pub index_buffer: RawResource,
    pub index_element_size: IndexElementSize,
}

/// GPU backend trait for abstracting different graphics APIs.
///
/// All methods are called from the device's submission thread.
pub trait GpuBackend: Send {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Features and limits of this backend.
    fn capabilities(&self) -> DeviceCapabilities;

    // ---- Backbuffer -------------------------------------------------------

    /// Recreate the backbuffer. On failure the previous backbuffer stays.
    fn reset_backbuffer(&mut self, params: &PresentationParameters) -> BackendResult<()>;

    /// Present the backbuffer, optionally blitting `source` into
    /// `destination` on `override_window`.
    fn present(
        &mut self,
        source: Option<Rect>,
        destination: Option<Rect>,
        override_window: Option<RawWindowHandle>,
    ) -> BackendResult<()>;

    fn set_present_interval(&mut self, interval: PresentInterval);

    /// Read a validated rectangle of the backbuffer, waiting for rendering
    /// to finish.
    fn read_backbuffer(&mut self, rect: Rect, out: &mut [u8]) -> BackendResult<()>;

    // ---- Textures ---------------------------------------------------------

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<RawResource>;

    fn destroy_texture(&mut self, texture: RawResource);

    /// Write tightly packed data into a validated region.
    fn write_texture(
        &mut self,
        texture: RawResource,
        region: &TextureRegion,
        data: &[u8],
    ) -> BackendResult<()>;

    /// Read a validated region into tightly packed `out`.
    fn read_texture(
        &mut self,
        texture: RawResource,
        region: &TextureRegion,
        out: &mut [u8],
    ) -> BackendResult<()>;

    /// Regenerate levels 1.. from level 0 of every layer.
    fn generate_mipmaps(&mut self, texture: RawResource) -> BackendResult<()>;

    // ---- Renderbuffers ----------------------------------------------------

    fn create_color_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: SurfaceFormat,
        multisample_count: u32,
        texture: RawResource,
    ) -> BackendResult<RawResource>;

    fn create_depth_stencil_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: DepthFormat,
        multisample_count: u32,
    ) -> BackendResult<RawResource>;

    fn destroy_renderbuffer(&mut self, renderbuffer: RawResource);

    /// Resolve a multisampled color renderbuffer into level 0 of `layer`.
    fn resolve_renderbuffer(
        &mut self,
        renderbuffer: RawResource,
        texture: RawResource,
        layer: u32,
    ) -> BackendResult<()>;

    // ---- Buffers ----------------------------------------------------------

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<RawResource>;

    fn destroy_buffer(&mut self, buffer: RawResource);

    /// Write `data` at byte `offset`. Any wait required by `options` has
    /// already been performed by the device.
    fn write_buffer(
        &mut self,
        buffer: RawResource,
        offset: u64,
        data: &[u8],
        options: SetDataOptions,
    ) -> BackendResult<()>;

    fn read_buffer(&mut self, buffer: RawResource, offset: u64, out: &mut [u8])
    -> BackendResult<()>;

    // ---- State ------------------------------------------------------------

    fn apply_render_state(&mut self, changes: &[RenderStateChange]);

    /// Bind `texture` (or nothing) with `state` to a sampler slot.
    fn set_sampler(&mut self, slot: SamplerSlot, texture: Option<RawResource>, state: &SamplerState);

    fn bind_vertex_buffers(&mut self, buffers: &[BoundVertexBuffer], base_vertex: i32);

    /// Bind color targets and depth buffer; an empty `targets` selects the
    /// backbuffer.
    fn set_render_targets(
        &mut self,
        targets: &[BoundRenderTarget],
        depth_stencil: Option<RawResource>,
        depth_format: DepthFormat,
    ) -> BackendResult<()>;

    // ---- Drawing ----------------------------------------------------------

    fn clear(&mut self, options: ClearOptions, color: Vec4, depth: f32, stencil: i32);

    fn draw_indexed_primitives(&mut self, draw: &IndexedDraw);

    fn draw_primitives(&mut self, primitive_type: PrimitiveType, vertex_start: u32, primitive_count: u32);

    fn draw_user_indexed_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        vertices: &[u8],
        declaration: &VertexDeclaration,
        num_vertices: u32,
        indices: &[u8],
        index_element_size: IndexElementSize,
        primitive_count: u32,
    );

    fn draw_user_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        vertices: &[u8],
        declaration: &VertexDeclaration,
        primitive_count: u32,
    );

    // ---- Effects ----------------------------------------------------------

    /// Compile effect bytecode, returning the program and its reflection.
    fn create_effect(&mut self, bytecode: &[u8]) -> BackendResult<(RawResource, EffectData)>;

    fn destroy_effect(&mut self, program: RawResource);

    /// Bind a validated technique pass with the given parameter values.
    fn apply_effect(
        &mut self,
        program: RawResource,
        technique: usize,
        pass: usize,
        data: &EffectData,
    ) -> BackendResult<()>;

    // ---- Queries ----------------------------------------------------------

    fn create_query(&mut self) -> BackendResult<RawResource>;

    fn destroy_query(&mut self, query: RawResource);

    fn query_begin(&mut self, query: RawResource);

    fn query_end(&mut self, query: RawResource);

    /// Non-blocking poll of an ended query's sample count.
    fn query_result(&mut self, query: RawResource) -> Option<u64>;

    // ---- Submission -------------------------------------------------------

    /// Close frame `serial` and hand it to the GPU.
    fn submit(&mut self, serial: u64);

    /// Newest serial whose commands have all retired.
    fn completed_serial(&mut self) -> u64;

    /// Block until every command up to and including `serial` has retired,
    /// flushing unsubmitted work if needed.
    fn wait_for_serial(&mut self, serial: u64);

    /// Block until the GPU is idle.
    fn wait_idle(&mut self);

    // ---- Debug ------------------------------------------------------------

    /// Insert a named marker into the command stream.
    fn set_string_marker(&mut self, text: &str);
}

/// Select and create a backend for `params`.
pub fn create_backend(params: &DeviceParameters) -> BackendResult<Box<dyn GpuBackend>> {
    #[cfg(feature = "dummy")]
    {
        if matches!(params.backend, BackendType::Auto | BackendType::Dummy) {
            let mut backend = dummy::DummyBackend::new(params.frames_in_flight);
            if let Some(caps) = params.capabilities {
                backend = backend.with_capabilities(caps);
            }
            log::info!("Using dummy backend");
            return Ok(Box::new(backend));
        }
    }

    Err(BackendError::InitializationFailed(format!(
        "no backend compiled in for {:?}",
        params.backend
    )))
}

/// Check if any backend is compiled in.
pub fn has_backend() -> bool {
    cfg!(feature = "dummy")
}
