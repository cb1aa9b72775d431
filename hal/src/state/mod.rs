//! Render state cache: immutable state objects, mutable per-draw values,
//! vertex bindings and render targets.

mod cache;
mod immutable;
mod mutable;
mod vertex;

pub use cache::{RenderTargetState, SamplerBinding, SamplerSlot, StateCache, StateSnapshot};
pub use immutable::{
    RenderStateChange, StateCategory, StencilFace, diff_blend, diff_depth_stencil,
    diff_rasterizer,
};
pub use mutable::{MutableState, MutableValues};
pub use vertex::VertexBindingCache;
