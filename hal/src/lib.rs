//! # RedLilium HAL
//!
//! Backend-neutral 3D graphics device layer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Device`] - The device context: resources, render state, drawing and
//!   presentation
//! - [`registry`] - Generation-checked resource handles with deferred
//!   disposal
//! - [`state`] - Render state cache that keeps redundant changes away from
//!   the backend
//! - [`addressing`] - Subresource addressing for every texture transfer
//! - [`GpuBackend`] - Trait for backend implementations, with an in-memory
//!   [`DummyBackend`] for tests and headless use
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_hal::{Device, DeviceParameters, PresentationParameters, SurfaceFormat};
//!
//! let mut device = Device::new(DeviceParameters::new(), &PresentationParameters::new(800, 600))?;
//! let texture = device.create_texture_2d(SurfaceFormat::Color, 256, 256, 1, false)?;
//! device.set_texture_data_2d(texture, 0, 0, 64, 64, 0, &pixels)?;
//! device.swap_buffers(None, None, None)?;
//! device.add_dispose_texture(texture);
//! ```

pub mod addressing;
pub mod backbuffer;
pub mod backend;
pub mod device;
pub mod effect;
pub mod error;
pub mod handle;
pub mod profiling;
pub mod query;
pub mod registry;
pub mod state;
pub mod types;

// Re-export main types for convenience
#[cfg(feature = "dummy")]
pub use backend::dummy::{DummyBackend, DummyStats};
pub use backend::{BackendError, BackendType, GpuBackend, RawResource};
pub use backbuffer::Backbuffer;
pub use device::{
    Device, DeviceCapabilities, DeviceParameters, WindowFlags, prepare_window_attributes,
};
pub use effect::{EffectData, EffectStateChanges};
pub use error::{GraphicsError, GraphicsResult};
pub use handle::{BufferHandle, EffectHandle, QueryHandle, RenderbufferHandle, TextureHandle};
pub use query::QueryState;
pub use registry::{DisposeSender, RegistryCounts};
pub use state::RenderStateChange;
pub use types::*;

/// HAL library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
