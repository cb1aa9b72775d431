//! The render state cache.
//!
//! Tracks what the backend currently has bound so that redundant state
//! changes never reach it. Immutable state objects are diffed field by
//! field; mutable values are deferred until the next draw.

use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{EffectHandle, RenderbufferHandle, TextureHandle};
use crate::types::{
    BlendState, DepthFormat, DepthStencilState, RasterizerState, RenderTargetBinding,
    SamplerState,
};

use super::immutable::{StateCategory, diff_blend, diff_depth_stencil, diff_rasterizer};
use super::mutable::{MutableState, MutableValues};
use super::vertex::VertexBindingCache;
use super::RenderStateChange;

/// A sampler slot, either fragment or vertex stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerSlot {
    Pixel(u32),
    Vertex(u32),
}

/// Texture and sampler state bound to one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerBinding {
    pub texture: Option<TextureHandle>,
    pub state: SamplerState,
}

impl Default for SamplerBinding {
    fn default() -> Self {
        Self {
            texture: None,
            state: SamplerState::default(),
        }
    }
}

/// The bound render target set. An empty `bindings` list means the
/// backbuffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderTargetState {
    pub bindings: Vec<RenderTargetBinding>,
    pub depth_stencil: Option<RenderbufferHandle>,
    pub depth_format: DepthFormat,
}

impl RenderTargetState {
    /// Returns true when rendering goes to the backbuffer.
    pub fn is_backbuffer(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Tracked<T> {
    value: T,
    synced: bool,
}

impl<T> Tracked<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            synced: false,
        }
    }

    fn backend_view(&self) -> Option<&T> {
        self.synced.then_some(&self.value)
    }
}

/// Everything pass-restore needs to put back.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Effect whose pass-restore pushed this snapshot.
    owner: EffectHandle,
    blend: BlendState,
    depth_stencil: DepthStencilState,
    rasterizer: RasterizerState,
    samplers: Vec<SamplerBinding>,
    vertex_samplers: Vec<SamplerBinding>,
    mutable: MutableValues,
    /// Which of blend, depth/stencil and rasterizer were synced at push.
    synced: [bool; 3],
}

/// Render state cache.
#[derive(Debug)]
pub struct StateCache {
    blend: Tracked<BlendState>,
    depth_stencil: Tracked<DepthStencilState>,
    rasterizer: Tracked<RasterizerState>,
    /// Depth bias scale the backend's current rasterizer bias was computed with.
    applied_bias_scale: f32,
    samplers: Vec<SamplerBinding>,
    vertex_samplers: Vec<SamplerBinding>,
    mutable: MutableState,
    vertex: VertexBindingCache,
    targets: RenderTargetState,
    backbuffer_depth_format: DepthFormat,
    snapshots: Vec<StateSnapshot>,
}

impl StateCache {
    /// Create a cache for a backbuffer of the given size and depth format.
    pub fn new(
        width: u32,
        height: u32,
        backbuffer_depth_format: DepthFormat,
        texture_slots: u32,
        vertex_texture_slots: u32,
    ) -> Self {
        Self {
            blend: Tracked::new(BlendState::default()),
            depth_stencil: Tracked::new(DepthStencilState::default()),
            rasterizer: Tracked::new(RasterizerState::default()),
            applied_bias_scale: backbuffer_depth_format.depth_bias_scale(),
            samplers: vec![SamplerBinding::default(); texture_slots as usize],
            vertex_samplers: vec![SamplerBinding::default(); vertex_texture_slots as usize],
            mutable: MutableState::new(MutableValues::for_surface(width, height)),
            vertex: VertexBindingCache::default(),
            targets: RenderTargetState {
                depth_format: backbuffer_depth_format,
                ..RenderTargetState::default()
            },
            backbuffer_depth_format,
            snapshots: Vec::new(),
        }
    }

    // ========================================================================
    // Immutable state
    // ========================================================================

    /// Replace the blend state; its blend factor and multisample mask go to
    /// the mutable layer.
    pub fn set_blend_state(&mut self, state: &BlendState, out: &mut Vec<RenderStateChange>) {
        diff_blend(self.blend.backend_view(), state, out);
        self.blend = Tracked {
            value: *state,
            synced: true,
        };
        self.mutable.set_blend_factor(state.blend_factor);
        self.mutable.set_multisample_mask(state.multisample_mask);
    }

    pub fn blend_state(&self) -> &BlendState {
        &self.blend.value
    }

    /// Replace the depth/stencil state; its reference stencil goes to the
    /// mutable layer.
    pub fn set_depth_stencil_state(
        &mut self,
        state: &DepthStencilState,
        out: &mut Vec<RenderStateChange>,
    ) {
        diff_depth_stencil(self.depth_stencil.backend_view(), state, out);
        self.depth_stencil = Tracked {
            value: *state,
            synced: true,
        };
        self.mutable.set_reference_stencil(state.reference_stencil);
    }

    pub fn depth_stencil_state(&self) -> &DepthStencilState {
        &self.depth_stencil.value
    }

    /// Replace the rasterizer state, scaling depth bias by the bound depth
    /// format.
    pub fn set_rasterizer_state(
        &mut self,
        state: &RasterizerState,
        out: &mut Vec<RenderStateChange>,
    ) {
        let scale = self.targets.depth_format.depth_bias_scale();
        let old = self
            .rasterizer
            .backend_view()
            .map(|s| (s, self.applied_bias_scale));
        diff_rasterizer(old, state, scale, out);
        self.rasterizer = Tracked {
            value: *state,
            synced: true,
        };
        self.applied_bias_scale = scale;
    }

    pub fn rasterizer_state(&self) -> &RasterizerState {
        &self.rasterizer.value
    }

    /// Forget what the backend has for `category`, so the next set emits a
    /// full state object.
    pub fn invalidate(&mut self, category: StateCategory) {
        match category {
            StateCategory::Blend => self.blend.synced = false,
            StateCategory::DepthStencil => self.depth_stencil.synced = false,
            StateCategory::Rasterizer => self.rasterizer.synced = false,
            StateCategory::Mutable => self.mutable.invalidate(),
        }
    }

    // ========================================================================
    // Samplers
    // ========================================================================

    fn slot_mut(&mut self, slot: SamplerSlot) -> GraphicsResult<&mut SamplerBinding> {
        let (slots, index, stage) = match slot {
            SamplerSlot::Pixel(i) => (&mut self.samplers, i, "texture"),
            SamplerSlot::Vertex(i) => (&mut self.vertex_samplers, i, "vertex texture"),
        };
        let count = slots.len();
        slots.get_mut(index as usize).ok_or_else(|| {
            GraphicsError::OutOfRange(format!("{stage} slot {index} (device has {count})"))
        })
    }

    /// Bind `texture` with `state` to `slot`.
    ///
    /// `max_mip_level` is clamped to the texture's `level_count` and
    /// `max_anisotropy` to at least 1. Returns the clamped state if the
    /// backend must be updated, `None` if the slot already matches.
    pub fn verify_sampler(
        &mut self,
        slot: SamplerSlot,
        texture: TextureHandle,
        level_count: u32,
        state: &SamplerState,
    ) -> GraphicsResult<Option<SamplerState>> {
        let max_level = level_count.saturating_sub(1) as i32;
        let clamped = SamplerState {
            max_mip_level: state.max_mip_level.clamp(0, max_level),
            max_anisotropy: state.max_anisotropy.max(1),
            ..*state
        };
        let binding = SamplerBinding {
            texture: Some(texture),
            state: clamped,
        };
        let current = self.slot_mut(slot)?;
        if *current == binding {
            return Ok(None);
        }
        *current = binding;
        Ok(Some(clamped))
    }

    /// Current binding of `slot`.
    pub fn sampler(&self, slot: SamplerSlot) -> Option<&SamplerBinding> {
        match slot {
            SamplerSlot::Pixel(i) => self.samplers.get(i as usize),
            SamplerSlot::Vertex(i) => self.vertex_samplers.get(i as usize),
        }
    }

    /// Forget `slot`'s binding, forcing the next verify to reach the backend.
    pub fn invalidate_sampler(&mut self, slot: SamplerSlot) {
        if let Ok(binding) = self.slot_mut(slot) {
            *binding = SamplerBinding {
                texture: None,
                state: binding.state,
            };
        }
    }

    /// Textures currently referenced by sampler slots.
    pub fn sampled_textures(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.samplers
            .iter()
            .chain(self.vertex_samplers.iter())
            .filter_map(|b| b.texture)
    }

    /// Unbind `texture` from every sampler slot, returning the slots cleared.
    pub fn unbind_texture(&mut self, texture: TextureHandle) -> Vec<SamplerSlot> {
        let pixel = self
            .samplers
            .iter_mut()
            .enumerate()
            .map(|(i, b)| (SamplerSlot::Pixel(i as u32), b));
        let vertex = self
            .vertex_samplers
            .iter_mut()
            .enumerate()
            .map(|(i, b)| (SamplerSlot::Vertex(i as u32), b));
        let mut cleared = Vec::new();
        for (slot, binding) in pixel.chain(vertex) {
            if binding.texture == Some(texture) {
                binding.texture = None;
                cleared.push(slot);
            }
        }
        // Saved bindings must not bring the texture back on restore.
        for snapshot in &mut self.snapshots {
            for binding in snapshot
                .samplers
                .iter_mut()
                .chain(snapshot.vertex_samplers.iter_mut())
                .filter(|b| b.texture == Some(texture))
            {
                binding.texture = None;
            }
        }
        cleared
    }

    // ========================================================================
    // Mutable state
    // ========================================================================

    pub fn mutable(&self) -> &MutableValues {
        self.mutable.values()
    }

    pub fn mutable_mut(&mut self) -> &mut MutableState {
        &mut self.mutable
    }

    /// Emit pending mutable state; called before every draw and clear.
    pub fn flush_mutable(&mut self, out: &mut Vec<RenderStateChange>) {
        self.mutable.flush(out);
    }

    // ========================================================================
    // Vertex bindings
    // ========================================================================

    pub fn vertex(&self) -> &VertexBindingCache {
        &self.vertex
    }

    pub fn vertex_mut(&mut self) -> &mut VertexBindingCache {
        &mut self.vertex
    }

    // ========================================================================
    // Render targets
    // ========================================================================

    pub fn render_targets(&self) -> &RenderTargetState {
        &self.targets
    }

    /// Record a new render target set. Returns false if it matches the bound
    /// one. A depth format change rescales the rasterizer depth bias.
    pub fn set_render_targets(
        &mut self,
        targets: RenderTargetState,
        out: &mut Vec<RenderStateChange>,
    ) -> bool {
        if self.targets == targets {
            return false;
        }
        let format_changed = self.targets.depth_format != targets.depth_format;
        self.targets = targets;
        if format_changed && self.rasterizer.synced {
            let state = self.rasterizer.value;
            self.set_rasterizer_state(&state, out);
        }
        true
    }

    /// Bind the backbuffer.
    pub fn bind_backbuffer(&mut self, out: &mut Vec<RenderStateChange>) -> bool {
        let targets = RenderTargetState {
            depth_format: self.backbuffer_depth_format,
            ..RenderTargetState::default()
        };
        self.set_render_targets(targets, out)
    }

    /// Track a backbuffer reset.
    pub fn set_backbuffer_depth_format(
        &mut self,
        format: DepthFormat,
        out: &mut Vec<RenderStateChange>,
    ) {
        self.backbuffer_depth_format = format;
        if self.targets.is_backbuffer() {
            self.bind_backbuffer(out);
        }
    }

    /// Returns true if a bound render target uses `texture`.
    pub fn targets_texture(&self, texture: TextureHandle) -> bool {
        self.targets.bindings.iter().any(|b| b.target.texture() == texture)
    }

    /// Returns true if a bound render target uses `renderbuffer`.
    pub fn targets_renderbuffer(&self, renderbuffer: RenderbufferHandle) -> bool {
        self.targets.depth_stencil == Some(renderbuffer)
            || self
                .targets
                .bindings
                .iter()
                .any(|b| b.color_buffer == Some(renderbuffer))
    }

    // ========================================================================
    // Pass restore
    // ========================================================================

    /// Push the current state onto the restore stack on behalf of `owner`.
    pub fn push_snapshot(&mut self, owner: EffectHandle) {
        let snapshot = StateSnapshot {
            owner,
            blend: self.blend.value,
            depth_stencil: self.depth_stencil.value,
            rasterizer: self.rasterizer.value,
            samplers: self.samplers.clone(),
            vertex_samplers: self.vertex_samplers.clone(),
            mutable: *self.mutable.values(),
            synced: [
                self.blend.synced,
                self.depth_stencil.synced,
                self.rasterizer.synced,
            ],
        };
        self.snapshots.push(snapshot);
    }

    /// Depth of the restore stack.
    pub fn snapshot_depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Effect that pushed the top of the restore stack.
    pub fn snapshot_owner(&self) -> Option<EffectHandle> {
        self.snapshots.last().map(|s| s.owner)
    }

    /// Drop every snapshot pushed by `owner`, returning how many were dropped.
    pub fn discard_snapshots(&mut self, owner: EffectHandle) -> usize {
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.owner != owner);
        before - self.snapshots.len()
    }

    /// Pop the restore stack and converge to it.
    ///
    /// Immutable state differences are appended to `out`; a category the
    /// backend knew at push time but that was invalidated since is emitted in
    /// full. Mutable values become pending. Returns the sampler slots whose binding changed, for
    /// the caller to forward to the backend.
    pub fn pop_snapshot(
        &mut self,
        out: &mut Vec<RenderStateChange>,
    ) -> Option<Vec<(SamplerSlot, SamplerBinding)>> {
        let snapshot = self.snapshots.pop()?;
        let [blend_synced, depth_synced, raster_synced] = snapshot.synced;
        if self.blend.synced || blend_synced {
            self.set_blend_state(&snapshot.blend, out);
        } else {
            self.blend.value = snapshot.blend;
        }
        if self.depth_stencil.synced || depth_synced {
            self.set_depth_stencil_state(&snapshot.depth_stencil, out);
        } else {
            self.depth_stencil.value = snapshot.depth_stencil;
        }
        if self.rasterizer.synced || raster_synced {
            self.set_rasterizer_state(&snapshot.rasterizer, out);
        } else {
            self.rasterizer.value = snapshot.rasterizer;
        }
        self.mutable.restore(snapshot.mutable);

        let mut changed = Vec::new();
        for (i, saved) in snapshot.samplers.into_iter().enumerate() {
            if self.samplers[i] != saved {
                self.samplers[i] = saved;
                changed.push((SamplerSlot::Pixel(i as u32), saved));
            }
        }
        for (i, saved) in snapshot.vertex_samplers.into_iter().enumerate() {
            if self.vertex_samplers[i] != saved {
                self.vertex_samplers[i] = saved;
                changed.push((SamplerSlot::Vertex(i as u32), saved));
            }
        }
        Some(changed)
    }
}
