//! Generation-checked resource handles.
//!
//! Each resource kind gets its own key type, so a buffer handle cannot be
//! passed where a texture is expected. A slot is only recycled once its
//! resource is reclaimed, and recycling bumps the slot's generation, so a
//! stale handle never aliases a newer resource.

use slotmap::{Key, new_key_type};
use static_assertions::assert_impl_all;

new_key_type! {
    /// Handle to a 2D, 3D or cube texture.
    pub struct TextureHandle;
    /// Handle to a vertex or index buffer.
    pub struct BufferHandle;
    /// Handle to a color or depth/stencil renderbuffer.
    pub struct RenderbufferHandle;
    /// Handle to an effect instance.
    pub struct EffectHandle;
    /// Handle to an occlusion query.
    pub struct QueryHandle;
}

assert_impl_all!(TextureHandle: Copy, Send, Sync, Eq, std::hash::Hash);
assert_impl_all!(BufferHandle: Copy, Send, Sync, Eq, std::hash::Hash);
assert_impl_all!(RenderbufferHandle: Copy, Send, Sync, Eq, std::hash::Hash);
assert_impl_all!(EffectHandle: Copy, Send, Sync, Eq, std::hash::Hash);
assert_impl_all!(QueryHandle: Copy, Send, Sync, Eq, std::hash::Hash);

/// Packed 64-bit identity of a handle (slot index and generation), for
/// logging and backend debug labels.
pub fn handle_bits<K: Key>(key: K) -> u64 {
    key.data().as_ffi()
}
