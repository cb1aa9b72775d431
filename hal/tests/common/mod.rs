//! Shared fixtures for the integration tests.
//!
//! Every test runs on the in-memory dummy backend, whose [`DummyStats`]
//! expose what actually reached the "GPU".

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use redlilium_hal::{
    DepthFormat, Device, DeviceCapabilities, DeviceParameters, DummyBackend, DummyStats,
    PresentationParameters, SurfaceFormat,
};

/// Install a test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A device on a dummy backend plus that backend's counters.
pub struct TestContext {
    pub device: Device,
    pub stats: Arc<Mutex<DummyStats>>,
}

impl TestContext {
    /// 256x256 backbuffer, D24S8 depth, default capabilities.
    pub fn new(frames_in_flight: u32) -> Self {
        Self::with_capabilities(DeviceCapabilities::default(), frames_in_flight)
    }

    pub fn with_capabilities(caps: DeviceCapabilities, frames_in_flight: u32) -> Self {
        init_logging();
        let backend = DummyBackend::new(frames_in_flight).with_capabilities(caps);
        let stats = backend.stats();
        let presentation = PresentationParameters::new(256, 256)
            .with_depth_stencil_format(DepthFormat::D24S8);
        let device = Device::with_backend(
            DeviceParameters::new().with_frames_in_flight(frames_in_flight),
            Box::new(backend),
            &presentation,
        )
        .expect("dummy device");
        Self { device, stats }
    }

    /// Present `count` frames.
    pub fn swap(&mut self, count: usize) {
        for _ in 0..count {
            self.device.swap_buffers(None, None, None).expect("swap");
        }
    }

    pub fn destroyed_count(&self) -> usize {
        self.stats.lock().destroyed.len()
    }
}

/// Deterministic byte pattern of `len` bytes.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Bytes needed for a `width` x `height` region of `format`.
pub fn region_bytes(format: SurfaceFormat, width: u32, height: u32) -> usize {
    let block = format.block_info();
    (width.div_ceil(block.width) * height.div_ceil(block.height) * block.bytes) as usize
}
