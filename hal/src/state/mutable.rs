//! Mutable per-draw state.
//!
//! Setters only record a pending value. [`MutableState::flush`] runs at the
//! next draw or clear and emits the fields that differ from what the backend
//! last saw.

use crate::types::{Color, Rect, Viewport};

use super::RenderStateChange;

/// The five independently settable per-draw values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutableValues {
    pub viewport: Viewport,
    pub scissor_rect: Rect,
    pub blend_factor: Color,
    pub multisample_mask: i32,
    pub reference_stencil: i32,
}

impl MutableValues {
    /// Defaults for a `width` x `height` backbuffer.
    pub fn for_surface(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::from_dimensions(width, height),
            scissor_rect: Rect::from_dimensions(width, height),
            blend_factor: Color::WHITE,
            multisample_mask: -1,
            reference_stencil: 0,
        }
    }
}

/// Pending and applied mutable state.
#[derive(Debug, Clone)]
pub struct MutableState {
    pending: MutableValues,
    applied: Option<MutableValues>,
}

impl MutableState {
    pub fn new(initial: MutableValues) -> Self {
        Self {
            pending: initial,
            applied: None,
        }
    }

    /// Values the next draw will use.
    pub fn values(&self) -> &MutableValues {
        &self.pending
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.pending.viewport = viewport;
    }

    pub fn set_scissor_rect(&mut self, rect: Rect) {
        self.pending.scissor_rect = rect;
    }

    pub fn set_blend_factor(&mut self, color: Color) {
        self.pending.blend_factor = color;
    }

    pub fn set_multisample_mask(&mut self, mask: i32) {
        self.pending.multisample_mask = mask;
    }

    pub fn set_reference_stencil(&mut self, reference: i32) {
        self.pending.reference_stencil = reference;
    }

    /// Replace every pending value at once.
    pub fn restore(&mut self, values: MutableValues) {
        self.pending = values;
    }

    /// Forget what the backend has seen, forcing a full flush.
    pub fn invalidate(&mut self) {
        self.applied = None;
    }

    /// Returns true if a flush would emit anything.
    pub fn is_dirty(&self) -> bool {
        self.applied.as_ref() != Some(&self.pending)
    }

    /// Emit changes for pending values the backend has not seen.
    pub fn flush(&mut self, out: &mut Vec<RenderStateChange>) {
        let p = self.pending;
        let a = self.applied;
        if a.is_none_or(|a| a.viewport != p.viewport) {
            out.push(RenderStateChange::Viewport(p.viewport));
        }
        if a.is_none_or(|a| a.scissor_rect != p.scissor_rect) {
            out.push(RenderStateChange::ScissorRect(p.scissor_rect));
        }
        if a.is_none_or(|a| a.blend_factor != p.blend_factor) {
            out.push(RenderStateChange::BlendColor(p.blend_factor));
        }
        if a.is_none_or(|a| a.multisample_mask != p.multisample_mask) {
            out.push(RenderStateChange::MultisampleMask(p.multisample_mask));
        }
        if a.is_none_or(|a| a.reference_stencil != p.reference_stencil) {
            out.push(RenderStateChange::ReferenceStencil(p.reference_stencil));
        }
        self.applied = Some(p);
    }
}
