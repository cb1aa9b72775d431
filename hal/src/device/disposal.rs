//! Deferred disposal and device teardown.

use crate::handle::{BufferHandle, EffectHandle, QueryHandle, RenderbufferHandle, TextureHandle};
use crate::registry::DisposeRequest;
use crate::types::BufferKind;

use super::Device;

impl Device {
    // ========================================================================
    // add_dispose_*
    // ========================================================================

    /// Mark a texture for destruction once its last use retires.
    ///
    /// The handle must not be used afterwards. Sampler slots and render
    /// targets still referring to it are unbound immediately.
    pub fn add_dispose_texture(&mut self, texture: TextureHandle) {
        self.registry.dispose_sender().dispose_texture(texture);
        self.mark_pending();
    }

    /// Mark a vertex buffer for destruction. Index buffers passed here are
    /// ignored.
    pub fn add_dispose_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.dispose_buffer_of_kind(buffer, true);
    }

    /// Mark an index buffer for destruction. Vertex buffers passed here are
    /// ignored.
    pub fn add_dispose_index_buffer(&mut self, buffer: BufferHandle) {
        self.dispose_buffer_of_kind(buffer, false);
    }

    fn dispose_buffer_of_kind(&mut self, buffer: BufferHandle, vertex: bool) {
        if let Ok(record) = self.registry.buffers.get(buffer) {
            let is_vertex = matches!(record.desc.kind, BufferKind::Vertex { .. });
            if is_vertex != vertex {
                log::debug!(
                    "Device: ignoring dispose of {:?} as the wrong buffer kind ({:?})",
                    buffer,
                    record.desc.kind
                );
                return;
            }
        }
        self.registry.dispose_sender().dispose_buffer(buffer);
        self.mark_pending();
    }

    pub fn add_dispose_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.registry.dispose_sender().dispose_renderbuffer(renderbuffer);
        self.mark_pending();
    }

    /// Mark an effect for destruction. The compiled program survives while
    /// clones of the effect are alive.
    pub fn add_dispose_effect(&mut self, effect: EffectHandle) {
        self.registry.dispose_sender().dispose_effect(effect);
        self.mark_pending();
    }

    pub fn add_dispose_query(&mut self, query: QueryHandle) {
        self.registry.dispose_sender().dispose_query(query);
        self.mark_pending();
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Mark everything in the disposal queue and drop state-cache references
    /// to it.
    fn mark_pending(&mut self) {
        for request in self.registry.mark_queued() {
            match request {
                DisposeRequest::Texture(texture) => {
                    for slot in self.state.unbind_texture(texture) {
                        let state = self
                            .state
                            .sampler(slot)
                            .map(|binding| binding.state)
                            .unwrap_or_default();
                        self.backend.set_sampler(slot, None, &state);
                    }
                    if self.state.targets_texture(texture) {
                        self.unbind_disposed_target(request);
                    }
                }
                DisposeRequest::Buffer(buffer) => {
                    self.state.vertex_mut().forget_buffer(buffer);
                }
                DisposeRequest::Renderbuffer(renderbuffer) => {
                    if self.state.targets_renderbuffer(renderbuffer) {
                        self.unbind_disposed_target(request);
                    }
                }
                DisposeRequest::Effect(effect) => {
                    let dropped = self.state.discard_snapshots(effect);
                    if dropped > 0 {
                        log::debug!(
                            "Device: {:?} disposed with {} open pass restores",
                            effect,
                            dropped
                        );
                    }
                }
                DisposeRequest::Query(_) => {}
            }
        }
    }

    fn unbind_disposed_target(&mut self, request: DisposeRequest) {
        log::debug!("Device: {:?} disposed while bound, binding backbuffer", request);
        if let Err(err) = self.bind_backbuffer() {
            log::error!("Device: failed to rebind backbuffer: {}", err);
        }
    }

    /// Mark queued disposals and destroy every disposing resource whose last
    /// use has retired.
    pub(super) fn reconcile_disposals(&mut self) {
        crate::profile_scope!("reconcile_disposals");
        self.mark_pending();
        let completed = self.backend.completed_serial();
        let destroyed = self.registry.reclaim(completed, self.backend.as_mut());
        if destroyed > 0 {
            log::trace!(
                "Device: reclaimed {} resources (completed frame {})",
                destroyed,
                completed
            );
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Wait for the backend to go idle and destroy every remaining resource.
    pub fn destroy(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.backend.wait_idle();
        let released = self.registry.destroy_all(self.backend.as_mut());
        log::info!(
            "Device: destroyed {} backend, released {} resources",
            self.backend.name(),
            released
        );
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::super::tests::{device, device_with};
    use super::super::DeviceCapabilities;
    use crate::error::GraphicsError;
    use crate::state::SamplerSlot;
    use crate::types::{
        BufferUsage, ClearOptions, DepthFormat, IndexElementSize, RenderTargetBinding,
        SamplerState, SurfaceFormat, Vec4,
    };

    #[test]
    fn test_disposal_waits_for_retirement() {
        let (mut device, stats) = device_with(DeviceCapabilities::default(), 2);
        let target = device
            .create_texture_2d(SurfaceFormat::Color, 16, 16, 1, true)
            .unwrap();
        device
            .set_render_targets(&[RenderTargetBinding::texture_2d(target)], None, DepthFormat::None)
            .unwrap();
        device.clear(ClearOptions::TARGET, Vec4::new(1.0, 0.0, 0.0, 1.0), 1.0, 0);
        device.add_dispose_texture(target);
        assert!(device.render_targets().is_backbuffer());

        device.swap_buffers(None, None, None).unwrap();
        device.swap_buffers(None, None, None).unwrap();
        assert!(stats.lock().destroyed.is_empty());
        assert_eq!(device.resource_counts().disposing, 1);

        device.swap_buffers(None, None, None).unwrap();
        assert_eq!(stats.lock().destroyed.len(), 1);
        assert_eq!(device.resource_counts().disposing, 0);
    }

    #[test]
    fn test_dispose_unbinds_sampler() {
        let (mut device, stats) = device();
        let tex = device.create_texture_2d(SurfaceFormat::Color, 4, 4, 1, false).unwrap();
        device.verify_sampler(0, tex, &SamplerState::default()).unwrap();
        let before = stats.lock().sampler_changes;
        device.add_dispose_texture(tex);
        assert_eq!(device.state.sampler(SamplerSlot::Pixel(0)).unwrap().texture, None);
        assert_eq!(stats.lock().sampler_changes, before + 1);
    }

    #[test]
    fn test_use_after_dispose_and_no_aliasing() {
        let (mut device, _) = device();
        let old = device.gen_vertex_buffer(false, BufferUsage::None, 4, 4).unwrap();
        device.add_dispose_vertex_buffer(old);
        assert!(matches!(
            device.buffer_size(old),
            Err(GraphicsError::PreconditionViolation(_))
        ));
        device.begin_frame();
        let new = device.gen_vertex_buffer(false, BufferUsage::None, 4, 4).unwrap();
        assert_ne!(old, new);
        assert!(device.buffer_size(old).is_err());
        assert_eq!(device.buffer_size(new).unwrap(), 16);

        // Double dispose is ignored.
        device.add_dispose_vertex_buffer(old);
        assert_eq!(device.resource_counts().buffers, 1);
    }

    #[test]
    fn test_dispose_as_wrong_buffer_kind_is_ignored() {
        let (mut device, stats) = device();
        let vb = device.gen_vertex_buffer(false, BufferUsage::None, 4, 4).unwrap();
        let ib = device
            .gen_index_buffer(false, BufferUsage::None, 4, IndexElementSize::Bits16)
            .unwrap();
        device.add_dispose_index_buffer(vb);
        device.add_dispose_vertex_buffer(ib);
        device.begin_frame();
        assert_eq!(device.buffer_size(vb).unwrap(), 16);
        assert_eq!(device.buffer_size(ib).unwrap(), 8);
        assert!(stats.lock().destroyed.is_empty());

        device.add_dispose_vertex_buffer(vb);
        device.add_dispose_index_buffer(ib);
        device.begin_frame();
        assert_eq!(device.resource_counts().buffers, 0);
    }

    #[test]
    fn test_off_thread_disposal() {
        let (mut device, stats) = device();
        let query = device.create_query().unwrap();
        let sender = device.dispose_sender();
        std::thread::spawn(move || sender.dispose_query(query))
            .join()
            .unwrap();
        assert_eq!(device.resource_counts().queries, 1);
        device.begin_frame();
        assert_eq!(device.resource_counts().queries, 0);
        assert_eq!(stats.lock().destroyed.len(), 1);
    }

    #[test]
    fn test_destroy_releases_everything_once() {
        let (mut device, stats) = device();
        device.create_texture_2d(SurfaceFormat::Color, 4, 4, 1, false).unwrap();
        let vb = device.gen_vertex_buffer(false, BufferUsage::None, 4, 4).unwrap();
        device.create_query().unwrap();
        device
            .gen_depth_stencil_renderbuffer(8, 8, DepthFormat::D16, 0)
            .unwrap();
        device.add_dispose_vertex_buffer(vb);
        device.destroy();
        let stats = stats.lock();
        assert_eq!(stats.destroyed.len(), 4);
        assert_eq!(stats.invalid_destroys, 0);
    }

    #[test]
    fn test_drop_releases_resources() {
        let (mut device, stats) = device();
        device.create_texture_2d(SurfaceFormat::Alpha8, 4, 4, 1, false).unwrap();
        drop(device);
        assert_eq!(stats.lock().destroyed.len(), 1);
    }
}
