//! Drawing, render state, vertex state and render targets.

use std::sync::Arc;

use crate::backend::{BoundRenderTarget, BoundVertexBuffer, IndexedDraw, RawResource};
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{BufferHandle, RenderbufferHandle, TextureHandle};
use crate::registry::RenderbufferKind;
use crate::state::{RenderTargetState, SamplerSlot};
use crate::types::{
    BlendState, BufferKind, ClearOptions, Color, DepthFormat, DepthStencilState,
    IndexElementSize, MAX_RENDERTARGET_BINDINGS, PrimitiveType, RasterizerState, Rect,
    RenderTarget, RenderTargetBinding, SamplerState, TextureKind, Vec4, VertexBufferBinding,
    VertexDeclaration, Viewport,
};

use super::Device;

/// The bytes of `count` vertices starting at vertex `first`.
fn vertex_window<'a>(
    declaration: &VertexDeclaration,
    data: &'a [u8],
    first: u32,
    count: u32,
) -> GraphicsResult<&'a [u8]> {
    let stride = declaration.stride as u64;
    let start = first as u64 * stride;
    let end = start + count as u64 * stride;
    if end > data.len() as u64 {
        return Err(GraphicsError::OutOfRange(format!(
            "vertices {}..{} need {} bytes, user data has {}",
            first,
            first as u64 + count as u64,
            end,
            data.len()
        )));
    }
    Ok(&data[start as usize..end as usize])
}

impl Device {
    // ========================================================================
    // Clear and draw
    // ========================================================================

    /// Clear the bound render targets.
    pub fn clear(&mut self, options: ClearOptions, color: Vec4, depth: f32, stencil: i32) {
        self.flush_mutable_state();
        self.stamp_render_targets();
        self.backend.clear(options, color, depth, stencil);
    }

    /// Draw indexed primitives from the bound vertex buffers.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        base_vertex: i32,
        min_vertex_index: u32,
        num_vertices: u32,
        start_index: u32,
        primitive_count: u32,
        indices: BufferHandle,
        index_element_size: IndexElementSize,
    ) -> GraphicsResult<()> {
        let (raw, index_count) = self.index_buffer(indices, index_element_size)?;
        self.draw_indexed(
            IndexedDraw {
                primitive_type,
                base_vertex,
                min_vertex_index,
                num_vertices,
                start_index,
                primitive_count,
                instance_count: 1,
                index_buffer: raw,
                index_element_size,
            },
            indices,
            index_count,
        )
    }

    /// Draw `instance_count` instances of indexed primitives.
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` if the device lacks hardware instancing.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_instanced_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        base_vertex: i32,
        min_vertex_index: u32,
        num_vertices: u32,
        start_index: u32,
        primitive_count: u32,
        instance_count: u32,
        indices: BufferHandle,
        index_element_size: IndexElementSize,
    ) -> GraphicsResult<()> {
        if !self.caps.supports_hardware_instancing {
            return Err(GraphicsError::PreconditionViolation(
                "hardware instancing is not supported by this device".into(),
            ));
        }
        if instance_count == 0 {
            return Err(GraphicsError::OutOfRange(
                "instance count must be at least 1".into(),
            ));
        }
        let (raw, index_count) = self.index_buffer(indices, index_element_size)?;
        self.draw_indexed(
            IndexedDraw {
                primitive_type,
                base_vertex,
                min_vertex_index,
                num_vertices,
                start_index,
                primitive_count,
                instance_count,
                index_buffer: raw,
                index_element_size,
            },
            indices,
            index_count,
        )
    }

    /// Raw id and index count of an index buffer holding
    /// `element_size` indices.
    fn index_buffer(
        &self,
        indices: BufferHandle,
        element_size: IndexElementSize,
    ) -> GraphicsResult<(RawResource, u32)> {
        let record = self.registry.buffers.get(indices)?;
        let BufferKind::Index(held) = record.desc.kind else {
            return Err(GraphicsError::PreconditionViolation(format!(
                "{indices:?} is not an index buffer"
            )));
        };
        if held != element_size {
            return Err(GraphicsError::PreconditionViolation(format!(
                "draw uses {element_size:?} indices but {indices:?} holds {held:?}"
            )));
        }
        Ok((record.raw, record.desc.element_count))
    }

    fn draw_indexed(
        &mut self,
        draw: IndexedDraw,
        indices: BufferHandle,
        index_count: u32,
    ) -> GraphicsResult<()> {
        let end = draw.start_index as u64
            + draw.primitive_type.vertex_count(draw.primitive_count) as u64;
        if end > index_count as u64 {
            return Err(GraphicsError::OutOfRange(format!(
                "indices {}..{} exceed index buffer of {}",
                draw.start_index, end, index_count
            )));
        }
        self.require_vertex_buffers()?;

        self.prepare_draw();
        self.registry.buffers.touch(indices, self.serial);
        if self.params.debug_mode {
            log::debug!("Device: {:?}", draw);
        }
        self.backend.draw_indexed_primitives(&draw);
        Ok(())
    }

    /// Draw non-indexed primitives from the bound vertex buffers.
    pub fn draw_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        vertex_start: u32,
        primitive_count: u32,
    ) -> GraphicsResult<()> {
        self.require_vertex_buffers()?;
        let end = vertex_start as u64 + primitive_type.vertex_count(primitive_count) as u64;
        for binding in self.state.vertex().bindings() {
            if binding.instance_frequency != 0 {
                continue;
            }
            let record = self.registry.buffers.get(binding.buffer)?;
            let available =
                (record.desc.element_count as u64).saturating_sub(binding.vertex_offset as u64);
            if end > available {
                return Err(GraphicsError::OutOfRange(format!(
                    "vertices {}..{} exceed {:?} ({} vertices from offset {})",
                    vertex_start, end, binding.buffer, record.desc.element_count,
                    binding.vertex_offset
                )));
            }
        }
        self.prepare_draw();
        self.backend
            .draw_primitives(primitive_type, vertex_start, primitive_count);
        Ok(())
    }

    /// Draw indexed primitives from caller memory.
    ///
    /// The slices are read during the call only. Vertex layout comes from
    /// [`Device::apply_vertex_declaration`]; `vertex_offset` and
    /// `index_offset` count vertices and indices, not bytes.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_user_indexed_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        vertex_data: &[u8],
        vertex_offset: u32,
        num_vertices: u32,
        index_data: &[u8],
        index_offset: u32,
        index_element_size: IndexElementSize,
        primitive_count: u32,
    ) -> GraphicsResult<()> {
        let (declaration, base) = self.user_declaration()?;
        let vertices = vertex_window(
            &declaration,
            vertex_data,
            base.saturating_add(vertex_offset),
            num_vertices,
        )?;

        let index_size = index_element_size.size() as u64;
        let index_count = primitive_type.vertex_count(primitive_count) as u64;
        let start = index_offset as u64 * index_size;
        let end = start + index_count * index_size;
        if end > index_data.len() as u64 {
            return Err(GraphicsError::OutOfRange(format!(
                "indices {}..{} exceed user index data of {} bytes",
                index_offset,
                index_offset as u64 + index_count,
                index_data.len()
            )));
        }
        let indices = &index_data[start as usize..end as usize];
        let stray = (0..index_count as usize)
            .filter_map(|i| index_element_size.read(indices, i))
            .find(|&index| index >= num_vertices);
        if let Some(index) = stray {
            return Err(GraphicsError::OutOfRange(format!(
                "index {index} outside the {num_vertices} supplied vertices"
            )));
        }

        self.prepare_draw();
        self.backend.draw_user_indexed_primitives(
            primitive_type,
            vertices,
            &declaration,
            num_vertices,
            indices,
            index_element_size,
            primitive_count,
        );
        Ok(())
    }

    /// Draw non-indexed primitives from caller memory.
    pub fn draw_user_primitives(
        &mut self,
        primitive_type: PrimitiveType,
        vertex_data: &[u8],
        vertex_offset: u32,
        primitive_count: u32,
    ) -> GraphicsResult<()> {
        let (declaration, base) = self.user_declaration()?;
        let count = primitive_type.vertex_count(primitive_count);
        let vertices = vertex_window(
            &declaration,
            vertex_data,
            base.saturating_add(vertex_offset),
            count,
        )?;
        self.prepare_draw();
        self.backend
            .draw_user_primitives(primitive_type, vertices, &declaration, primitive_count);
        Ok(())
    }

    fn user_declaration(&self) -> GraphicsResult<(Arc<VertexDeclaration>, u32)> {
        self.state
            .vertex()
            .user_declaration()
            .cloned()
            .ok_or_else(|| {
                GraphicsError::PreconditionViolation(
                    "user draw without an applied vertex declaration".into(),
                )
            })
    }

    fn require_vertex_buffers(&self) -> GraphicsResult<()> {
        if self.state.vertex().bindings().is_empty() {
            return Err(GraphicsError::PreconditionViolation(
                "draw without bound vertex buffers".into(),
            ));
        }
        Ok(())
    }

    /// Flush pending state and stamp everything the draw reads or writes.
    fn prepare_draw(&mut self) {
        self.flush_mutable_state();
        let serial = self.serial;
        for binding in self.state.vertex().bindings() {
            self.registry.buffers.touch(binding.buffer, serial);
        }
        for texture in self.state.sampled_textures() {
            self.registry.textures.touch(texture, serial);
        }
        self.stamp_render_targets();
    }

    fn flush_mutable_state(&mut self) {
        self.state.flush_mutable(&mut self.changes);
        self.apply_changes();
    }

    fn stamp_render_targets(&mut self) {
        let serial = self.serial;
        let targets = self.state.render_targets();
        for binding in &targets.bindings {
            self.registry.textures.touch(binding.target.texture(), serial);
            if let Some(rb) = binding.color_buffer {
                self.registry.renderbuffers.touch(rb, serial);
            }
        }
        if let Some(rb) = targets.depth_stencil {
            self.registry.renderbuffers.touch(rb, serial);
        }
    }

    // ========================================================================
    // Mutable state
    // ========================================================================

    pub fn viewport(&self) -> Viewport {
        self.state.mutable().viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.state.mutable_mut().set_viewport(viewport);
    }

    pub fn scissor_rect(&self) -> Rect {
        self.state.mutable().scissor_rect
    }

    pub fn set_scissor_rect(&mut self, rect: Rect) {
        self.state.mutable_mut().set_scissor_rect(rect);
    }

    pub fn blend_factor(&self) -> Color {
        self.state.mutable().blend_factor
    }

    pub fn set_blend_factor(&mut self, color: Color) {
        self.state.mutable_mut().set_blend_factor(color);
    }

    pub fn multisample_mask(&self) -> i32 {
        self.state.mutable().multisample_mask
    }

    pub fn set_multisample_mask(&mut self, mask: i32) {
        self.state.mutable_mut().set_multisample_mask(mask);
    }

    pub fn reference_stencil(&self) -> i32 {
        self.state.mutable().reference_stencil
    }

    pub fn set_reference_stencil(&mut self, reference: i32) {
        self.state.mutable_mut().set_reference_stencil(reference);
    }

    // ========================================================================
    // Immutable state
    // ========================================================================

    /// Apply a whole blend state. Only differing fields reach the backend.
    pub fn set_blend_state(&mut self, state: &BlendState) {
        self.state.set_blend_state(state, &mut self.changes);
        self.apply_changes();
    }

    pub fn blend_state(&self) -> &BlendState {
        self.state.blend_state()
    }

    pub fn set_depth_stencil_state(&mut self, state: &DepthStencilState) {
        self.state.set_depth_stencil_state(state, &mut self.changes);
        self.apply_changes();
    }

    pub fn depth_stencil_state(&self) -> &DepthStencilState {
        self.state.depth_stencil_state()
    }

    /// Apply a whole rasterizer state; depth bias is scaled by the bound
    /// depth format.
    pub fn apply_rasterizer_state(&mut self, state: &RasterizerState) {
        self.state.set_rasterizer_state(state, &mut self.changes);
        self.apply_changes();
    }

    pub fn rasterizer_state(&self) -> &RasterizerState {
        self.state.rasterizer_state()
    }

    /// Bind `texture` and `sampler` to fragment sampler `index`.
    pub fn verify_sampler(
        &mut self,
        index: u32,
        texture: TextureHandle,
        sampler: &SamplerState,
    ) -> GraphicsResult<()> {
        self.bind_sampler(SamplerSlot::Pixel(index), texture, sampler)
    }

    /// Bind `texture` and `sampler` to vertex texture fetch slot `index`.
    pub fn verify_vertex_sampler(
        &mut self,
        index: u32,
        texture: TextureHandle,
        sampler: &SamplerState,
    ) -> GraphicsResult<()> {
        self.bind_sampler(SamplerSlot::Vertex(index), texture, sampler)
    }

    fn bind_sampler(
        &mut self,
        slot: SamplerSlot,
        texture: TextureHandle,
        sampler: &SamplerState,
    ) -> GraphicsResult<()> {
        let record = self.registry.textures.get(texture)?;
        let raw = record.raw;
        let levels = record.desc.level_count;
        if let Some(clamped) = self.state.verify_sampler(slot, texture, levels, sampler)? {
            self.backend.set_sampler(slot, Some(raw), &clamped);
        }
        Ok(())
    }

    // ========================================================================
    // Vertex state
    // ========================================================================

    /// Bind vertex buffers for the following draws.
    ///
    /// The backend is skipped when `bindings_updated` is false and
    /// `base_vertex` is unchanged, or when the bindings equal the bound set.
    pub fn apply_vertex_buffer_bindings(
        &mut self,
        bindings: &[VertexBufferBinding],
        bindings_updated: bool,
        base_vertex: i32,
    ) -> GraphicsResult<()> {
        let mut bound = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let record = self.registry.buffers.get(binding.buffer)?;
            let BufferKind::Vertex { stride } = record.desc.kind else {
                return Err(GraphicsError::PreconditionViolation(format!(
                    "{:?} is not a vertex buffer",
                    binding.buffer
                )));
            };
            if stride != binding.declaration.stride {
                return Err(GraphicsError::PreconditionViolation(format!(
                    "declaration stride {} does not match {:?} stride {}",
                    binding.declaration.stride, binding.buffer, stride
                )));
            }
            bound.push(BoundVertexBuffer {
                buffer: record.raw,
                declaration: Arc::clone(&binding.declaration),
                vertex_offset: binding.vertex_offset,
                instance_frequency: binding.instance_frequency,
            });
        }
        if self
            .state
            .vertex_mut()
            .update(bindings, bindings_updated, base_vertex)
        {
            self.backend.bind_vertex_buffers(&bound, base_vertex);
        }
        Ok(())
    }

    /// Set the vertex layout used by user-memory draws.
    pub fn apply_vertex_declaration(
        &mut self,
        declaration: Arc<VertexDeclaration>,
        vertex_offset: u32,
    ) {
        self.state
            .vertex_mut()
            .set_user_declaration(declaration, vertex_offset);
    }

    // ========================================================================
    // Render targets
    // ========================================================================

    /// Bind color targets and an optional depth/stencil renderbuffer.
    ///
    /// An empty `targets` slice binds the backbuffer. All targets must be
    /// render-target textures of the same size.
    pub fn set_render_targets(
        &mut self,
        targets: &[RenderTargetBinding],
        depth_stencil: Option<RenderbufferHandle>,
        depth_format: DepthFormat,
    ) -> GraphicsResult<()> {
        if targets.is_empty() {
            return self.bind_backbuffer();
        }
        if targets.len() > MAX_RENDERTARGET_BINDINGS {
            return Err(GraphicsError::OutOfRange(format!(
                "{} render targets (at most {})",
                targets.len(),
                MAX_RENDERTARGET_BINDINGS
            )));
        }

        let mut bound = Vec::with_capacity(targets.len());
        let mut size = None;
        for binding in targets {
            let texture = binding.target.texture();
            let record = self.registry.textures.get(texture)?;
            if !record.desc.is_render_target {
                return Err(GraphicsError::PreconditionViolation(format!(
                    "{texture:?} was not created as a render target"
                )));
            }
            let shape_matches = matches!(
                (binding.target, record.desc.kind),
                (RenderTarget::Texture2D(_), TextureKind::Texture2D)
                    | (RenderTarget::Cube { .. }, TextureKind::Cube)
            );
            if !shape_matches {
                return Err(GraphicsError::PreconditionViolation(format!(
                    "{:?} target bound to a {:?} texture",
                    binding.target, record.desc.kind
                )));
            }
            let extent = (record.desc.size.width, record.desc.size.height);
            if *size.get_or_insert(extent) != extent {
                return Err(GraphicsError::InvalidDimensions(format!(
                    "render targets differ in size: {:?} vs {:?}",
                    size, extent
                )));
            }
            let color_buffer = match binding.color_buffer {
                Some(rb) => {
                    let rb_record = self.registry.renderbuffers.get(rb)?;
                    if !matches!(rb_record.kind, RenderbufferKind::Color { .. }) {
                        return Err(GraphicsError::PreconditionViolation(format!(
                            "{rb:?} is not a color renderbuffer"
                        )));
                    }
                    Some(rb_record.raw)
                }
                None => None,
            };
            bound.push(BoundRenderTarget {
                texture: record.raw,
                layer: binding.target.layer(),
                color_buffer,
            });
        }

        let depth_raw = match depth_stencil {
            Some(rb) => {
                let record = self.registry.renderbuffers.get(rb)?;
                match record.kind {
                    RenderbufferKind::DepthStencil(format) if format == depth_format => {
                        Some(record.raw)
                    }
                    kind => {
                        return Err(GraphicsError::PreconditionViolation(format!(
                            "{rb:?} ({kind:?}) cannot be bound as a {depth_format:?} depth target"
                        )));
                    }
                }
            }
            None => None,
        };

        let new_state = RenderTargetState {
            bindings: targets.to_vec(),
            depth_stencil,
            depth_format,
        };
        if *self.state.render_targets() == new_state {
            return Ok(());
        }
        self.backend
            .set_render_targets(&bound, depth_raw, depth_format)?;
        self.state.set_render_targets(new_state, &mut self.changes);
        self.apply_changes();
        Ok(())
    }

    /// The bound render target set.
    pub fn render_targets(&self) -> &RenderTargetState {
        self.state.render_targets()
    }

    pub(super) fn bind_backbuffer(&mut self) -> GraphicsResult<()> {
        let depth_format = self.backbuffer.depth_format();
        let targets = self.state.render_targets();
        if targets.is_backbuffer() && targets.depth_format == depth_format {
            return Ok(());
        }
        self.backend.set_render_targets(&[], None, depth_format)?;
        self.state.bind_backbuffer(&mut self.changes);
        self.apply_changes();
        Ok(())
    }

    /// Finish rendering into `binding`: resolve its multisampled color
    /// buffer into the texture and regenerate mips if it has any.
    pub fn resolve_target(&mut self, binding: &RenderTargetBinding) -> GraphicsResult<()> {
        let texture = binding.target.texture();
        let record = self.registry.textures.get(texture)?;
        let (raw, levels) = (record.raw, record.desc.level_count);
        if let Some(rb) = binding.color_buffer {
            let rb_record = self.registry.renderbuffers.get(rb)?;
            if !matches!(rb_record.kind, RenderbufferKind::Color { .. }) {
                return Err(GraphicsError::PreconditionViolation(format!(
                    "{rb:?} is not a color renderbuffer"
                )));
            }
            self.backend
                .resolve_renderbuffer(rb_record.raw, raw, binding.target.layer())?;
            self.registry.renderbuffers.touch(rb, self.serial);
        }
        if levels > 1 {
            self.backend.generate_mipmaps(raw)?;
        }
        self.registry.textures.touch(texture, self.serial);
        Ok(())
    }
}
