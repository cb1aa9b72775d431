//! Dummy GPU backend for testing and headless use.
//!
//! This backend doesn't talk to a GPU. It keeps every texture, buffer,
//! renderbuffer and the backbuffer in host memory, so data written through
//! the device can be read back, and clears are visible in the backbuffer.
//! Draws are counted but not rasterized.
//!
//! Frames retire after a configurable number of newer frames have been
//! submitted, which exercises the device's deferred-disposal and readback
//! stalls the same way a real queue would.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use raw_window_handle::RawWindowHandle;

use crate::addressing::{
    TextureRegion, mip_level_extent, region_layout, region_rows, subresource_offset,
    subresource_size, texture_storage_size,
};
use crate::device::DeviceCapabilities;
use crate::effect::EffectData;
use crate::state::{RenderStateChange, SamplerSlot};
use crate::types::{
    BufferDescriptor, ClearOptions, Color, DepthFormat, IndexElementSize, PresentInterval,
    PresentationParameters, PrimitiveType, Rect, SamplerState, SetDataOptions, SurfaceFormat,
    TextureDescriptor, TextureKind, Vec4, VertexDeclaration,
};

use super::{
    BackendError, BackendResult, BoundRenderTarget, BoundVertexBuffer, GpuBackend, IndexedDraw,
    RawResource, manifest,
};

/// Counters describing the work the dummy backend has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DummyStats {
    /// Individual render state changes applied.
    pub state_changes: u64,
    pub sampler_changes: u64,
    pub vertex_buffer_binds: u64,
    pub render_target_binds: u64,
    pub clears: u64,
    pub draws: u64,
    pub presents: u64,
    pub backbuffer_resets: u64,
    /// Waits that actually blocked on unretired work.
    pub stalls: u64,
    pub effect_applies: u64,
    pub resolves: u64,
    pub mipmap_generations: u64,
    pub resources_created: u64,
    /// Every id passed to a destroy call, in order.
    pub destroyed: Vec<RawResource>,
    /// Destroy calls for ids that were not alive.
    pub invalid_destroys: u64,
    pub markers: Vec<String>,
}

#[derive(Debug)]
struct DummyTexture {
    desc: TextureDescriptor,
    data: Vec<u8>,
}

#[derive(Debug)]
struct DummyRenderbuffer {
    /// Color renderbuffers store their pixels; depth buffers don't.
    format: Option<SurfaceFormat>,
    data: Vec<u8>,
    size: u64,
}

#[derive(Debug, Default)]
struct DummyQuery {
    active: bool,
    samples: u64,
    end_serial: Option<u64>,
}

#[derive(Debug)]
struct DummySurface {
    width: u32,
    height: u32,
    format: SurfaceFormat,
    data: Vec<u8>,
}

impl DummySurface {
    fn new(params: &PresentationParameters) -> Self {
        let size = surface_bytes(
            params.back_buffer_format,
            params.back_buffer_width,
            params.back_buffer_height,
        );
        Self {
            width: params.back_buffer_width,
            height: params.back_buffer_height,
            format: params.back_buffer_format,
            data: vec![0; size as usize],
        }
    }
}

fn surface_bytes(format: SurfaceFormat, width: u32, height: u32) -> u64 {
    format.block_info().bytes as u64 * width as u64 * height as u64
}

/// Encode a clear color in `format`, for the 8-bit color formats.
fn encode_color(format: SurfaceFormat, color: Vec4) -> Option<Vec<u8>> {
    let c = Color::from_vec4(color);
    match format {
        SurfaceFormat::Color => Some(vec![c.r, c.g, c.b, c.a]),
        SurfaceFormat::ColorBgraExt => Some(vec![c.b, c.g, c.r, c.a]),
        SurfaceFormat::Alpha8 => Some(vec![c.a]),
        _ => None,
    }
}

fn fill(target: &mut [u8], pattern: &[u8]) {
    for chunk in target.chunks_exact_mut(pattern.len()) {
        chunk.copy_from_slice(pattern);
    }
}

/// Dummy GPU backend.
pub struct DummyBackend {
    capabilities: DeviceCapabilities,
    frames_in_flight: u32,
    memory_budget: Option<u64>,
    allocated: u64,
    next_id: u64,
    textures: HashMap<RawResource, DummyTexture>,
    buffers: HashMap<RawResource, Vec<u8>>,
    renderbuffers: HashMap<RawResource, DummyRenderbuffer>,
    effects: HashMap<RawResource, usize>,
    queries: HashMap<RawResource, DummyQuery>,
    backbuffer: Option<DummySurface>,
    targets: Vec<BoundRenderTarget>,
    present_interval: PresentInterval,
    in_flight: VecDeque<u64>,
    last_submitted: u64,
    completed: u64,
    stats: Arc<Mutex<DummyStats>>,
}

impl DummyBackend {
    /// Create a dummy backend whose frames retire once `frames_in_flight`
    /// newer frames have been submitted (0 retires on submit).
    pub fn new(frames_in_flight: u32) -> Self {
        Self {
            capabilities: DeviceCapabilities::default(),
            frames_in_flight,
            memory_budget: None,
            allocated: 0,
            next_id: 1,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            renderbuffers: HashMap::new(),
            effects: HashMap::new(),
            queries: HashMap::new(),
            backbuffer: None,
            targets: Vec::new(),
            present_interval: PresentInterval::Default,
            in_flight: VecDeque::new(),
            last_submitted: 0,
            completed: 0,
            stats: Arc::new(Mutex::new(DummyStats::default())),
        }
    }

    /// Report `capabilities` instead of the defaults.
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Fail allocations with `OutOfMemory` beyond `bytes` of live storage.
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Shared handle to the work counters. Stays valid after the backend is
    /// moved into a device.
    pub fn stats(&self) -> Arc<Mutex<DummyStats>> {
        Arc::clone(&self.stats)
    }

    /// Number of backend objects currently alive (excluding the backbuffer).
    pub fn live_objects(&self) -> usize {
        self.textures.len()
            + self.buffers.len()
            + self.renderbuffers.len()
            + self.effects.len()
            + self.queries.len()
    }

    fn allocate(&mut self, bytes: u64) -> BackendResult<RawResource> {
        let allocated = self.allocated;
        if let Some(budget) = self
            .memory_budget
            .filter(|&budget| allocated.saturating_add(bytes) > budget)
        {
            log::warn!(
                "DummyBackend: allocation of {} bytes exceeds budget ({} of {} used)",
                bytes,
                self.allocated,
                budget
            );
            return Err(BackendError::OutOfMemory);
        }
        self.allocated += bytes;
        let id = RawResource(self.next_id);
        self.next_id += 1;
        self.stats.lock().resources_created += 1;
        Ok(id)
    }

    fn release(&mut self, id: RawResource, bytes: Option<u64>) {
        let mut stats = self.stats.lock();
        stats.destroyed.push(id);
        match bytes {
            Some(bytes) => self.allocated = self.allocated.saturating_sub(bytes),
            None => {
                log::error!("DummyBackend: destroy of unknown resource {:?}", id);
                stats.invalid_destroys += 1;
            }
        }
    }

    fn texture(&self, id: RawResource) -> BackendResult<&DummyTexture> {
        self.textures
            .get(&id)
            .ok_or_else(|| BackendError::Internal(format!("unknown texture {id:?}")))
    }

    fn texture_mut(&mut self, id: RawResource) -> BackendResult<&mut DummyTexture> {
        self.textures
            .get_mut(&id)
            .ok_or_else(|| BackendError::Internal(format!("unknown texture {id:?}")))
    }

    fn buffer_range(
        &mut self,
        id: RawResource,
        offset: u64,
        len: usize,
    ) -> BackendResult<&mut [u8]> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or_else(|| BackendError::Internal(format!("unknown buffer {id:?}")))?;
        let start = offset as usize;
        let size = buffer.len();
        buffer.get_mut(start..start + len).ok_or_else(|| {
            BackendError::Internal(format!(
                "range {}..{} outside buffer of {} bytes",
                start,
                start + len,
                size
            ))
        })
    }

    fn record_draw(&mut self, vertices: u64) {
        self.stats.lock().draws += 1;
        for query in self.queries.values_mut().filter(|q| q.active) {
            query.samples += vertices;
        }
    }

    fn retire_through(&mut self, serial: u64) {
        self.completed = self.completed.max(serial);
        while self.in_flight.front().is_some_and(|s| *s <= serial) {
            self.in_flight.pop_front();
        }
    }

    /// Copy level 0 of `layer` from a color renderbuffer into a texture.
    fn copy_into_level0(
        texture: &mut DummyTexture,
        layer: u32,
        pixels: &[u8],
    ) -> BackendResult<()> {
        let offset = subresource_offset(&texture.desc, layer, 0) as usize;
        let target = texture
            .data
            .get_mut(offset..offset + pixels.len())
            .ok_or_else(|| BackendError::Internal("resolve size mismatch".into()))?;
        target.copy_from_slice(pixels);
        Ok(())
    }

    fn box_filter_level(desc: &TextureDescriptor, data: &mut [u8], layer: u32, level: u32) {
        let bpp = desc.format.block_info().bytes as usize;
        let src_extent = mip_level_extent(desc.size, level - 1);
        let dst_extent = mip_level_extent(desc.size, level);
        let src_offset = subresource_offset(desc, layer, level - 1) as usize;
        let dst_offset = subresource_offset(desc, layer, level) as usize;
        let (sw, sh) = (src_extent.width as usize, src_extent.height as usize);
        for y in 0..dst_extent.height as usize {
            for x in 0..dst_extent.width as usize {
                for c in 0..bpp {
                    let mut sum = 0u32;
                    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                        let sx = (x * 2 + dx).min(sw - 1);
                        let sy = (y * 2 + dy).min(sh - 1);
                        sum += data[src_offset + (sy * sw + sx) * bpp + c] as u32;
                    }
                    data[dst_offset + (y * dst_extent.width as usize + x) * bpp + c] =
                        ((sum + 2) / 4) as u8;
                }
            }
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    // ---- Backbuffer -------------------------------------------------------

    fn reset_backbuffer(&mut self, params: &PresentationParameters) -> BackendResult<()> {
        let new_size = surface_bytes(
            params.back_buffer_format,
            params.back_buffer_width,
            params.back_buffer_height,
        );
        let old_size = self.backbuffer.as_ref().map_or(0, |b| b.data.len() as u64);
        let remaining = self.allocated - old_size;
        if self
            .memory_budget
            .is_some_and(|budget| remaining.saturating_add(new_size) > budget)
        {
            return Err(BackendError::OutOfMemory);
        }
        self.allocated = self.allocated - old_size + new_size;
        self.backbuffer = Some(DummySurface::new(params));
        self.present_interval = params.presentation_interval;
        self.stats.lock().backbuffer_resets += 1;
        log::debug!(
            "DummyBackend: backbuffer reset to {}x{} {:?}",
            params.back_buffer_width,
            params.back_buffer_height,
            params.back_buffer_format
        );
        Ok(())
    }

    fn present(
        &mut self,
        source: Option<Rect>,
        destination: Option<Rect>,
        _override_window: Option<RawWindowHandle>,
    ) -> BackendResult<()> {
        if self.backbuffer.is_none() {
            return Err(BackendError::Internal("present without a backbuffer".into()));
        }
        log::trace!(
            "DummyBackend: present {:?} -> {:?} ({:?})",
            source,
            destination,
            self.present_interval
        );
        self.stats.lock().presents += 1;
        Ok(())
    }

    fn set_present_interval(&mut self, interval: PresentInterval) {
        self.present_interval = interval;
    }

    fn read_backbuffer(&mut self, rect: Rect, out: &mut [u8]) -> BackendResult<()> {
        let surface = self
            .backbuffer
            .as_ref()
            .ok_or_else(|| BackendError::Internal("no backbuffer".into()))?;
        let bpp = surface.format.block_info().bytes as usize;
        let row = rect.w as usize * bpp;
        if out.len() != row * rect.h as usize {
            return Err(BackendError::Internal("readback size mismatch".into()));
        }
        for y in 0..rect.h as usize {
            let src = ((rect.y as usize + y) * surface.width as usize + rect.x as usize) * bpp;
            out[y * row..(y + 1) * row].copy_from_slice(&surface.data[src..src + row]);
        }
        Ok(())
    }

    // ---- Textures ---------------------------------------------------------

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<RawResource> {
        let size = texture_storage_size(desc);
        let id = self.allocate(size)?;
        self.textures.insert(
            id,
            DummyTexture {
                desc: *desc,
                data: vec![0; size as usize],
            },
        );
        log::trace!(
            "DummyBackend: created texture {:?} ({:?} {}x{}x{}, {} levels)",
            id,
            desc.format,
            desc.size.width,
            desc.size.height,
            desc.size.depth,
            desc.level_count
        );
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: RawResource) {
        let bytes = self.textures.remove(&texture).map(|t| t.data.len() as u64);
        self.release(texture, bytes);
    }

    fn write_texture(
        &mut self,
        texture: RawResource,
        region: &TextureRegion,
        data: &[u8],
    ) -> BackendResult<()> {
        let tex = self.texture_mut(texture)?;
        let extent = mip_level_extent(tex.desc.size, region.level);
        let layout = region_layout(tex.desc.format, extent, region)
            .map_err(|e| BackendError::Internal(e.to_string()))?;
        if data.len() as u64 != layout.size_in_bytes {
            return Err(BackendError::Internal("texture write size mismatch".into()));
        }
        let base = subresource_offset(&tex.desc, region.layer, region.level) as usize;
        for span in region_rows(tex.desc.format, extent, region, &layout) {
            let dst = base + span.level_offset;
            tex.data[dst..dst + span.len]
                .copy_from_slice(&data[span.packed_offset..span.packed_offset + span.len]);
        }
        Ok(())
    }

    fn read_texture(
        &mut self,
        texture: RawResource,
        region: &TextureRegion,
        out: &mut [u8],
    ) -> BackendResult<()> {
        let tex = self.texture(texture)?;
        let extent = mip_level_extent(tex.desc.size, region.level);
        let layout = region_layout(tex.desc.format, extent, region)
            .map_err(|e| BackendError::Internal(e.to_string()))?;
        if out.len() as u64 != layout.size_in_bytes {
            return Err(BackendError::Internal("texture read size mismatch".into()));
        }
        let base = subresource_offset(&tex.desc, region.layer, region.level) as usize;
        for span in region_rows(tex.desc.format, extent, region, &layout) {
            let src = base + span.level_offset;
            out[span.packed_offset..span.packed_offset + span.len]
                .copy_from_slice(&tex.data[src..src + span.len]);
        }
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: RawResource) -> BackendResult<()> {
        let tex = self.texture_mut(texture)?;
        let filterable = matches!(
            tex.desc.format,
            SurfaceFormat::Color | SurfaceFormat::ColorBgraExt | SurfaceFormat::Alpha8
        );
        if !filterable || tex.desc.kind == TextureKind::Texture3D {
            log::trace!(
                "DummyBackend: skipping mip generation for {:?} {:?}",
                tex.desc.kind,
                tex.desc.format
            );
            return Ok(());
        }
        let desc = tex.desc;
        for layer in 0..desc.layer_count() {
            for level in 1..desc.level_count {
                Self::box_filter_level(&desc, &mut tex.data, layer, level);
            }
        }
        self.stats.lock().mipmap_generations += 1;
        Ok(())
    }

    // ---- Renderbuffers ----------------------------------------------------

    fn create_color_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: SurfaceFormat,
        multisample_count: u32,
        texture: RawResource,
    ) -> BackendResult<RawResource> {
        self.texture(texture)?;
        let size = surface_bytes(format, width, height);
        let id = self.allocate(size)?;
        self.renderbuffers.insert(
            id,
            DummyRenderbuffer {
                format: Some(format),
                data: vec![0; size as usize],
                size,
            },
        );
        log::trace!(
            "DummyBackend: created color renderbuffer {:?} ({}x{}, {}x MSAA)",
            id,
            width,
            height,
            multisample_count
        );
        Ok(id)
    }

    fn create_depth_stencil_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: DepthFormat,
        multisample_count: u32,
    ) -> BackendResult<RawResource> {
        let size = format.bytes_per_pixel() as u64 * width as u64 * height as u64;
        let id = self.allocate(size)?;
        self.renderbuffers.insert(
            id,
            DummyRenderbuffer {
                format: None,
                data: Vec::new(),
                size,
            },
        );
        log::trace!(
            "DummyBackend: created depth renderbuffer {:?} ({}x{} {:?}, {}x MSAA)",
            id,
            width,
            height,
            format,
            multisample_count
        );
        Ok(id)
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RawResource) {
        let bytes = self.renderbuffers.remove(&renderbuffer).map(|r| r.size);
        self.release(renderbuffer, bytes);
    }

    fn resolve_renderbuffer(
        &mut self,
        renderbuffer: RawResource,
        texture: RawResource,
        layer: u32,
    ) -> BackendResult<()> {
        let pixels = self
            .renderbuffers
            .get(&renderbuffer)
            .filter(|r| r.format.is_some())
            .map(|r| r.data.clone())
            .ok_or_else(|| {
                BackendError::Internal(format!("unknown color renderbuffer {renderbuffer:?}"))
            })?;
        let tex = self.texture_mut(texture)?;
        Self::copy_into_level0(tex, layer, &pixels)?;
        self.stats.lock().resolves += 1;
        Ok(())
    }

    // ---- Buffers ----------------------------------------------------------

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<RawResource> {
        let size = desc
            .size_in_bytes()
            .ok_or_else(|| BackendError::ResourceCreationFailed("buffer size overflow".into()))?;
        let id = self.allocate(size)?;
        self.buffers.insert(id, vec![0; size as usize]);
        log::trace!("DummyBackend: created buffer {:?} ({} bytes)", id, size);
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: RawResource) {
        let bytes = self.buffers.remove(&buffer).map(|b| b.len() as u64);
        self.release(buffer, bytes);
    }

    fn write_buffer(
        &mut self,
        buffer: RawResource,
        offset: u64,
        data: &[u8],
        options: SetDataOptions,
    ) -> BackendResult<()> {
        if options == SetDataOptions::Discard {
            // Renamed storage starts out undefined; zero it so it is observable.
            if let Some(storage) = self.buffers.get_mut(&buffer) {
                storage.fill(0);
            }
        }
        self.buffer_range(buffer, offset, data.len())?
            .copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(
        &mut self,
        buffer: RawResource,
        offset: u64,
        out: &mut [u8],
    ) -> BackendResult<()> {
        let len = out.len();
        out.copy_from_slice(self.buffer_range(buffer, offset, len)?);
        Ok(())
    }

    // ---- State ------------------------------------------------------------

    fn apply_render_state(&mut self, changes: &[RenderStateChange]) {
        if changes.is_empty() {
            return;
        }
        log::trace!("DummyBackend: {} state changes", changes.len());
        self.stats.lock().state_changes += changes.len() as u64;
    }

    fn set_sampler(
        &mut self,
        slot: SamplerSlot,
        texture: Option<RawResource>,
        state: &SamplerState,
    ) {
        log::trace!("DummyBackend: sampler {:?} = {:?} {:?}", slot, texture, state.filter);
        self.stats.lock().sampler_changes += 1;
    }

    fn bind_vertex_buffers(&mut self, buffers: &[BoundVertexBuffer], base_vertex: i32) {
        log::trace!(
            "DummyBackend: bound {} vertex buffers, base vertex {}",
            buffers.len(),
            base_vertex
        );
        self.stats.lock().vertex_buffer_binds += 1;
    }

    fn set_render_targets(
        &mut self,
        targets: &[BoundRenderTarget],
        depth_stencil: Option<RawResource>,
        _depth_format: DepthFormat,
    ) -> BackendResult<()> {
        for target in targets {
            self.texture(target.texture)?;
        }
        if let Some(depth) = depth_stencil.filter(|d| !self.renderbuffers.contains_key(d)) {
            return Err(BackendError::Internal(format!(
                "unknown depth renderbuffer {depth:?}"
            )));
        }
        self.targets = targets.to_vec();
        self.stats.lock().render_target_binds += 1;
        Ok(())
    }

    // ---- Drawing ----------------------------------------------------------

    fn clear(&mut self, options: ClearOptions, color: Vec4, _depth: f32, _stencil: i32) {
        self.stats.lock().clears += 1;
        if !options.contains(ClearOptions::TARGET) {
            return;
        }
        if self.targets.is_empty() {
            if let Some(surface) = self.backbuffer.as_mut() {
                if let Some(pattern) = encode_color(surface.format, color) {
                    fill(&mut surface.data, &pattern);
                }
            }
            return;
        }
        for target in &self.targets {
            if let Some(rb) = target.color_buffer.and_then(|id| self.renderbuffers.get_mut(&id)) {
                if let Some(pattern) = rb.format.and_then(|f| encode_color(f, color)) {
                    fill(&mut rb.data, &pattern);
                }
                continue;
            }
            let Some(tex) = self.textures.get_mut(&target.texture) else {
                continue;
            };
            if let Some(pattern) = encode_color(tex.desc.format, color) {
                let offset = subresource_offset(&tex.desc, target.layer, 0) as usize;
                let len = subresource_size(tex.desc.format, tex.desc.size) as usize;
                fill(&mut tex.data[offset..offset + len], &pattern);
            }
        }
    }

    fn draw_indexed_primitives(&mut self, draw: &IndexedDraw) {
        let vertices = draw.primitive_type.vertex_count(draw.primitive_count) as u64
            * draw.instance_count.max(1) as u64;
        self.record_draw(vertices);
    }

    fn draw_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        _vertex_start: u32,
        primitive_count: u32,
    ) {
        self.record_draw(primitive_type.vertex_count(primitive_count) as u64);
    }

    fn draw_user_indexed_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        _vertices: &[u8],
        _declaration: &VertexDeclaration,
        _num_vertices: u32,
        _indices: &[u8],
        _index_element_size: IndexElementSize,
        primitive_count: u32,
    ) {
        self.record_draw(primitive_type.vertex_count(primitive_count) as u64);
    }

    fn draw_user_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        _vertices: &[u8],
        _declaration: &VertexDeclaration,
        primitive_count: u32,
    ) {
        self.record_draw(primitive_type.vertex_count(primitive_count) as u64);
    }

    // ---- Effects ----------------------------------------------------------

    fn create_effect(&mut self, bytecode: &[u8]) -> BackendResult<(RawResource, EffectData)> {
        let data = manifest::parse(bytecode)?;
        let id = self.allocate(0)?;
        self.effects.insert(id, data.techniques.len());
        log::trace!(
            "DummyBackend: created effect {:?} with {} techniques",
            id,
            data.techniques.len()
        );
        Ok((id, data))
    }

    fn destroy_effect(&mut self, program: RawResource) {
        let bytes = self.effects.remove(&program).map(|_| 0);
        self.release(program, bytes);
    }

    fn apply_effect(
        &mut self,
        program: RawResource,
        technique: usize,
        pass: usize,
        _data: &EffectData,
    ) -> BackendResult<()> {
        let techniques = self
            .effects
            .get(&program)
            .ok_or_else(|| BackendError::Internal(format!("unknown effect {program:?}")))?;
        if technique >= *techniques {
            return Err(BackendError::Internal(format!("bad technique {technique}")));
        }
        log::trace!("DummyBackend: apply effect {:?} {}/{}", program, technique, pass);
        self.stats.lock().effect_applies += 1;
        Ok(())
    }

    // ---- Queries ----------------------------------------------------------

    fn create_query(&mut self) -> BackendResult<RawResource> {
        let id = self.allocate(0)?;
        self.queries.insert(id, DummyQuery::default());
        Ok(id)
    }

    fn destroy_query(&mut self, query: RawResource) {
        let bytes = self.queries.remove(&query).map(|_| 0);
        self.release(query, bytes);
    }

    fn query_begin(&mut self, query: RawResource) {
        if let Some(q) = self.queries.get_mut(&query) {
            *q = DummyQuery {
                active: true,
                ..DummyQuery::default()
            };
        }
    }

    fn query_end(&mut self, query: RawResource) {
        let recording = self.last_submitted + 1;
        if let Some(q) = self.queries.get_mut(&query) {
            q.active = false;
            q.end_serial = Some(recording);
        }
    }

    fn query_result(&mut self, query: RawResource) -> Option<u64> {
        let q = self.queries.get(&query)?;
        match q.end_serial {
            Some(serial) if serial <= self.completed => Some(q.samples),
            _ => None,
        }
    }

    // ---- Submission -------------------------------------------------------

    fn submit(&mut self, serial: u64) {
        self.last_submitted = self.last_submitted.max(serial);
        self.in_flight.push_back(serial);
        while self.in_flight.len() > self.frames_in_flight as usize {
            if let Some(retired) = self.in_flight.pop_front() {
                self.completed = self.completed.max(retired);
            }
        }
    }

    fn completed_serial(&mut self) -> u64 {
        self.completed
    }

    fn wait_for_serial(&mut self, serial: u64) {
        if serial <= self.completed {
            return;
        }
        log::trace!(
            "DummyBackend: stalling for serial {} (completed {})",
            serial,
            self.completed
        );
        self.stats.lock().stalls += 1;
        self.retire_through(serial);
    }

    fn wait_idle(&mut self) {
        let recording = self.last_submitted + 1;
        self.retire_through(recording);
    }

    // ---- Debug ------------------------------------------------------------

    fn set_string_marker(&mut self, text: &str) {
        log::debug!("DummyBackend: marker '{}'", text);
        self.stats.lock().markers.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_retire_after_latency() {
        let mut backend = DummyBackend::new(2);
        backend.submit(1);
        backend.submit(2);
        assert_eq!(backend.completed_serial(), 0);
        backend.submit(3);
        assert_eq!(backend.completed_serial(), 1);
        backend.wait_for_serial(3);
        assert_eq!(backend.completed_serial(), 3);
        assert_eq!(backend.stats().lock().stalls, 1);
        backend.wait_for_serial(2);
        assert_eq!(backend.stats().lock().stalls, 1);
    }

    #[test]
    fn test_texture_write_read() {
        let mut backend = DummyBackend::new(0);
        let desc = TextureDescriptor::new_2d(SurfaceFormat::Alpha8, 4, 4, 1, false);
        let tex = backend.create_texture(&desc).unwrap();
        let region = TextureRegion::new_2d(1, 1, 2, 2, 0);
        backend.write_texture(tex, &region, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 16];
        backend
            .read_texture(tex, &TextureRegion::new_2d(0, 0, 4, 4, 0), &mut out)
            .unwrap();
        assert_eq!(out, [0, 0, 0, 0, 0, 1, 2, 0, 0, 3, 4, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_mipmap_generation() {
        let mut backend = DummyBackend::new(0);
        let desc = TextureDescriptor::new_2d(SurfaceFormat::Alpha8, 2, 2, 2, false);
        let tex = backend.create_texture(&desc).unwrap();
        backend
            .write_texture(tex, &TextureRegion::new_2d(0, 0, 2, 2, 0), &[0, 100, 200, 100])
            .unwrap();
        backend.generate_mipmaps(tex).unwrap();
        let mut out = [0u8; 1];
        backend
            .read_texture(tex, &TextureRegion::new_2d(0, 0, 1, 1, 1), &mut out)
            .unwrap();
        assert_eq!(out, [100]);
    }

    #[test]
    fn test_memory_budget() {
        let mut backend = DummyBackend::new(0).with_memory_budget(64);
        let desc = TextureDescriptor::new_2d(SurfaceFormat::Color, 4, 4, 1, false);
        let tex = backend.create_texture(&desc).unwrap();
        assert_eq!(
            backend.create_texture(&desc),
            Err(BackendError::OutOfMemory)
        );
        backend.destroy_texture(tex);
        assert!(backend.create_texture(&desc).is_ok());
    }

    #[test]
    fn test_memory_budget_allows_exact_fit() {
        let mut backend = DummyBackend::new(0).with_memory_budget(128);
        let desc = TextureDescriptor::new_2d(SurfaceFormat::Color, 4, 4, 1, false);
        backend.create_texture(&desc).unwrap();
        backend.create_texture(&desc).unwrap();
        assert_eq!(
            backend.create_texture(&desc),
            Err(BackendError::OutOfMemory)
        );
    }

    #[test]
    fn test_destroy_unknown_is_counted() {
        let mut backend = DummyBackend::new(0);
        backend.destroy_buffer(RawResource(42));
        assert_eq!(backend.stats().lock().invalid_destroys, 1);
    }

    #[test]
    fn test_query_counts_vertices() {
        let mut backend = DummyBackend::new(1);
        let query = backend.create_query().unwrap();
        backend.query_begin(query);
        backend.draw_primitives(PrimitiveType::TriangleList, 0, 2);
        backend.query_end(query);
        backend.draw_primitives(PrimitiveType::TriangleList, 0, 2);
        assert_eq!(backend.query_result(query), None);
        backend.submit(1);
        assert_eq!(backend.query_result(query), None);
        backend.submit(2);
        assert_eq!(backend.query_result(query), Some(6));
    }

    #[test]
    fn test_clear_backbuffer() {
        let mut backend = DummyBackend::new(0);
        backend
            .reset_backbuffer(&PresentationParameters::new(2, 1))
            .unwrap();
        backend.clear(ClearOptions::TARGET, Vec4::new(1.0, 0.0, 0.0, 1.0), 1.0, 0);
        let mut out = [0u8; 8];
        backend.read_backbuffer(Rect::new(0, 0, 2, 1), &mut out).unwrap();
        assert_eq!(out, [255, 0, 0, 255, 255, 0, 0, 255]);
    }
}
