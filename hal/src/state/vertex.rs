//! Vertex buffer binding cache.

use std::sync::Arc;

use crate::handle::BufferHandle;
use crate::types::{VertexBufferBinding, VertexDeclaration};

/// Tracks the vertex buffers last handed to the backend.
#[derive(Debug, Clone, Default)]
pub struct VertexBindingCache {
    bindings: Vec<VertexBufferBinding>,
    base_vertex: Option<i32>,
    user_declaration: Option<(Arc<VertexDeclaration>, u32)>,
}

impl VertexBindingCache {
    /// Decide whether `bindings` must be sent to the backend, and record them
    /// if so.
    ///
    /// Rebinding is skipped when the caller reports no change and the base
    /// vertex matches, or when the binding set compares equal.
    pub fn update(
        &mut self,
        bindings: &[VertexBufferBinding],
        bindings_updated: bool,
        base_vertex: i32,
    ) -> bool {
        let same_base = self.base_vertex == Some(base_vertex);
        if same_base && (!bindings_updated || self.bindings == bindings) {
            return false;
        }
        if self.bindings != bindings {
            self.bindings.clear();
            self.bindings.extend_from_slice(bindings);
        }
        self.base_vertex = Some(base_vertex);
        true
    }

    /// Currently bound vertex buffers.
    pub fn bindings(&self) -> &[VertexBufferBinding] {
        &self.bindings
    }

    /// Record the declaration used by user-memory draws.
    pub fn set_user_declaration(&mut self, declaration: Arc<VertexDeclaration>, vertex_offset: u32) {
        self.user_declaration = Some((declaration, vertex_offset));
    }

    /// Declaration and vertex offset for user-memory draws.
    pub fn user_declaration(&self) -> Option<&(Arc<VertexDeclaration>, u32)> {
        self.user_declaration.as_ref()
    }

    /// Drop cached bindings that reference `buffer`, returning true if any did.
    pub fn forget_buffer(&mut self, buffer: BufferHandle) -> bool {
        if self.bindings.iter().any(|b| b.buffer == buffer) {
            self.invalidate();
            true
        } else {
            false
        }
    }

    /// Forget everything, forcing the next update to rebind.
    pub fn invalidate(&mut self) {
        self.bindings.clear();
        self.base_vertex = None;
    }
}
