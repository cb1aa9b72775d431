//! Thread-safe deferred disposal queue.
//!
//! Any thread may queue a handle for destruction through a
//! [`DisposeSender`]; the device drains the queue on its own thread at the
//! next frame boundary.

use std::sync::Arc;

use parking_lot::Mutex;
use static_assertions::assert_impl_all;

use crate::handle::{BufferHandle, EffectHandle, QueryHandle, RenderbufferHandle, TextureHandle};

/// A queued disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisposeRequest {
    Texture(TextureHandle),
    Buffer(BufferHandle),
    Renderbuffer(RenderbufferHandle),
    Effect(EffectHandle),
    Query(QueryHandle),
}

/// Cloneable handle onto a device's disposal queue.
///
/// Queuing only records the request; nothing is destroyed until the device
/// reconciles at `begin_frame` or `swap_buffers`, and then only once the
/// resource's last use has retired.
#[derive(Debug, Clone, Default)]
pub struct DisposeSender {
    queue: Arc<Mutex<Vec<DisposeRequest>>>,
}

assert_impl_all!(DisposeSender: Send, Sync, Clone);

impl DisposeSender {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, request: DisposeRequest) {
        self.queue.lock().push(request);
    }

    pub fn dispose_texture(&self, texture: TextureHandle) {
        self.send(DisposeRequest::Texture(texture));
    }

    /// Queue a vertex or index buffer.
    pub fn dispose_buffer(&self, buffer: BufferHandle) {
        self.send(DisposeRequest::Buffer(buffer));
    }

    pub fn dispose_renderbuffer(&self, renderbuffer: RenderbufferHandle) {
        self.send(DisposeRequest::Renderbuffer(renderbuffer));
    }

    pub fn dispose_effect(&self, effect: EffectHandle) {
        self.send(DisposeRequest::Effect(effect));
    }

    pub fn dispose_query(&self, query: QueryHandle) {
        self.send(DisposeRequest::Query(query));
    }

    /// Number of requests not yet drained.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn drain(&self) -> Vec<DisposeRequest> {
        std::mem::take(&mut *self.queue.lock())
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    #[test]
    fn test_requests_from_other_threads() {
        let mut textures: SlotMap<TextureHandle, ()> = SlotMap::with_key();
        let tex = textures.insert(());
        let sender = DisposeSender::new();
        let remote = sender.clone();
        std::thread::spawn(move || remote.dispose_texture(tex))
            .join()
            .unwrap();
        assert_eq!(sender.pending(), 1);
        assert_eq!(sender.drain(), vec![DisposeRequest::Texture(tex)]);
        assert_eq!(sender.pending(), 0);
    }
}
