//! Resource registry.
//!
//! Owns the record behind every handle the device hands out, tracks the
//! newest frame that referenced each resource, and destroys disposed
//! resources once that frame has retired on the backend.
//!
//! # Lifecycle
//!
//! ```text
//! insert --> Live --mark--> Disposing --last_use <= completed--> reclaimed
//! ```

mod disposal;
mod pool;
mod records;

pub use disposal::{DisposeRequest, DisposeSender};
pub use pool::{Liveness, MarkOutcome, Pool};
pub use records::{
    BufferRecord, EffectProgram, EffectRecord, QueryRecord, RenderbufferKind, RenderbufferRecord,
    TextureRecord,
};

use crate::backend::GpuBackend;
use crate::handle::{BufferHandle, EffectHandle, QueryHandle, RenderbufferHandle, TextureHandle};

/// Counts of live and disposing resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryCounts {
    pub textures: usize,
    pub buffers: usize,
    pub renderbuffers: usize,
    pub effects: usize,
    pub queries: usize,
    pub disposing: usize,
}

/// All resource pools of a device plus its disposal queue.
#[derive(Debug)]
pub struct Registry {
    pub textures: Pool<TextureHandle, TextureRecord>,
    pub buffers: Pool<BufferHandle, BufferRecord>,
    pub renderbuffers: Pool<RenderbufferHandle, RenderbufferRecord>,
    pub effects: Pool<EffectHandle, EffectRecord>,
    pub queries: Pool<QueryHandle, QueryRecord>,
    disposals: DisposeSender,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            textures: Pool::new("texture"),
            buffers: Pool::new("buffer"),
            renderbuffers: Pool::new("renderbuffer"),
            effects: Pool::new("effect"),
            queries: Pool::new("query"),
            disposals: DisposeSender::new(),
        }
    }

    /// The shared disposal queue.
    pub fn dispose_sender(&self) -> &DisposeSender {
        &self.disposals
    }

    /// Drain the disposal queue and mark each named resource disposing.
    ///
    /// Returns the requests that were newly marked; stale and repeated
    /// requests are logged and dropped.
    pub fn mark_queued(&mut self) -> Vec<DisposeRequest> {
        let mut marked = Vec::new();
        for request in self.disposals.drain() {
            let outcome = match request {
                DisposeRequest::Texture(h) => self.textures.mark_disposing(h),
                DisposeRequest::Buffer(h) => self.buffers.mark_disposing(h),
                DisposeRequest::Renderbuffer(h) => self.renderbuffers.mark_disposing(h),
                DisposeRequest::Effect(h) => self.effects.mark_disposing(h),
                DisposeRequest::Query(h) => self.queries.mark_disposing(h),
            };
            match outcome {
                MarkOutcome::Marked => marked.push(request),
                MarkOutcome::AlreadyDisposing => {
                    log::debug!("Registry: {:?} disposed twice, ignoring", request)
                }
                MarkOutcome::Stale => {
                    log::warn!("Registry: stale handle in dispose queue: {:?}", request)
                }
            }
        }
        marked
    }

    /// Destroy every disposing resource whose last use is at or before
    /// `completed`. Returns how many were destroyed.
    pub fn reclaim(&mut self, completed: u64, backend: &mut dyn GpuBackend) -> usize {
        let mut count = 0;
        count += self.textures.reclaim(completed, |h, r| {
            log::trace!("Registry: destroying texture {:?}", h);
            backend.destroy_texture(r.raw);
        });
        count += self.renderbuffers.reclaim(completed, |h, r| {
            log::trace!("Registry: destroying renderbuffer {:?}", h);
            backend.destroy_renderbuffer(r.raw);
        });
        count += self.buffers.reclaim(completed, |h, r| {
            log::trace!("Registry: destroying buffer {:?}", h);
            backend.destroy_buffer(r.raw);
        });
        count += self.effects.reclaim(completed, |h, r| {
            log::trace!("Registry: destroying effect {:?}", h);
            if let Some(raw) = r.release() {
                backend.destroy_effect(raw);
            }
        });
        count += self.queries.reclaim(completed, |h, r| {
            log::trace!("Registry: destroying query {:?}", h);
            backend.destroy_query(r.raw);
        });
        count
    }

    /// Destroy every resource, live or disposing. Returns how many were
    /// destroyed.
    pub fn destroy_all(&mut self, backend: &mut dyn GpuBackend) -> usize {
        // Anything still queued is about to be destroyed anyway.
        self.disposals.drain();
        let mut count = 0;
        count += self.textures.drain_all(|_, r| backend.destroy_texture(r.raw));
        count += self
            .renderbuffers
            .drain_all(|_, r| backend.destroy_renderbuffer(r.raw));
        count += self.buffers.drain_all(|_, r| backend.destroy_buffer(r.raw));
        count += self.effects.drain_all(|_, r| {
            if let Some(raw) = r.release() {
                backend.destroy_effect(raw);
            }
        });
        count += self.queries.drain_all(|_, r| backend.destroy_query(r.raw));
        count
    }

    pub fn counts(&self) -> RegistryCounts {
        RegistryCounts {
            textures: self.textures.live_count(),
            buffers: self.buffers.live_count(),
            renderbuffers: self.renderbuffers.live_count(),
            effects: self.effects.live_count(),
            queries: self.queries.live_count(),
            disposing: self.textures.disposing_count()
                + self.buffers.disposing_count()
                + self.renderbuffers.disposing_count()
                + self.effects.disposing_count()
                + self.queries.disposing_count(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
