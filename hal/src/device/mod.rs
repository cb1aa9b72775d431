//! The graphics device.
//!
//! [`Device`] is the single owner of everything this crate manages: the
//! backend, every resource behind a handle, the render state cache and the
//! backbuffer. All operations are methods on it and are meant to be called
//! from one thread; the only cross-thread entry point is the
//! [`DisposeSender`] returned by [`Device::dispose_sender`].
//!
//! # Frames and serials
//!
//! Commands are recorded into frames numbered by a serial starting at 1.
//! Every draw stamps the current serial on the resources it references.
//! [`Device::swap_buffers`] submits the frame and reconciles deferred
//! disposal: a disposed resource is destroyed once the backend reports its
//! last-use frame as completed.
//!
//! # Example
//!
//! ```ignore
//! let params = DeviceParameters::new().with_backend(BackendType::Dummy);
//! let mut device = Device::new(params, &PresentationParameters::new(800, 600))?;
//!
//! let texture = device.create_texture_2d(SurfaceFormat::Color, 256, 256, 1, false)?;
//! device.set_texture_data_2d(texture, 0, 0, 64, 64, 0, &red_pixels)?;
//! device.clear(ClearOptions::all(), Vec4::new(0.0, 0.0, 0.0, 1.0), 1.0, 0);
//! device.swap_buffers(None, None, None)?;
//! ```

mod disposal;
mod draw;
mod effects;
mod queries;
mod resources;

use bitflags::bitflags;
use raw_window_handle::RawWindowHandle;

use crate::backbuffer::Backbuffer;
use crate::backend::{self, BackendType, GpuBackend};
use crate::error::{GraphicsError, GraphicsResult};
use crate::registry::{DisposeSender, Registry, RegistryCounts};
use crate::state::{RenderStateChange, StateCache};
use crate::types::{PresentInterval, PresentationParameters, Rect};

// ============================================================================
// Configuration
// ============================================================================

/// Capabilities of the active backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum width/height of 2D and cube textures and of the backbuffer.
    pub max_texture_size: u32,
    /// Maximum extent of volume textures.
    pub max_texture_size_3d: u32,
    /// Fragment sampler slots.
    pub max_texture_slots: u32,
    /// Vertex texture fetch slots.
    pub max_vertex_texture_slots: u32,
    pub max_multisample_count: u32,
    pub supports_dxt1: bool,
    /// DXT3 and DXT5.
    pub supports_s3tc: bool,
    pub supports_hardware_instancing: bool,
    pub supports_no_overwrite: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_size: 16384,
            max_texture_size_3d: 2048,
            max_texture_slots: 16,
            max_vertex_texture_slots: 4,
            max_multisample_count: 8,
            supports_dxt1: true,
            supports_s3tc: true,
            supports_hardware_instancing: true,
            supports_no_overwrite: true,
        }
    }
}

/// Parameters for device creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceParameters {
    /// Which backend to create.
    pub backend: BackendType,
    /// Enables backend validation and verbose logging.
    pub debug_mode: bool,
    /// Frames the backend may run ahead before the device blocks.
    pub frames_in_flight: u32,
    /// Capabilities to report instead of the backend's own.
    pub capabilities: Option<DeviceCapabilities>,
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            debug_mode: false,
            frames_in_flight: 3,
            capabilities: None,
        }
    }
}

impl DeviceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_frames_in_flight(mut self, frames: u32) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Override the capability table, e.g. to test fallbacks.
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }
}

bitflags! {
    /// Window creation flags the platform layer must use for a backend.
    ///
    /// Values match SDL's `SDL_WindowFlags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WindowFlags: u32 {
        const OPENGL = 0x0000_0002;
        const ALLOW_HIGHDPI = 0x0000_2000;
        const VULKAN = 0x1000_0000;
        const METAL = 0x2000_0000;
    }
}

/// Window flags to create the device window with, for the backend
/// `params` selects.
pub fn prepare_window_attributes(params: &DeviceParameters) -> WindowFlags {
    let flags = match params.backend {
        // Headless; any window will do.
        BackendType::Auto | BackendType::Dummy => WindowFlags::ALLOW_HIGHDPI,
    };
    log::debug!("Device: window flags for {:?}: {:?}", params.backend, flags);
    flags
}

// ============================================================================
// Device
// ============================================================================

/// A graphics device.
pub struct Device {
    backend: Box<dyn GpuBackend>,
    params: DeviceParameters,
    caps: DeviceCapabilities,
    registry: Registry,
    state: StateCache,
    backbuffer: Backbuffer,
    /// Serial of the frame being recorded.
    serial: u64,
    /// Scratch list of state changes on their way to the backend.
    changes: Vec<RenderStateChange>,
    destroyed: bool,
}

impl Device {
    /// Create a device on the backend selected by `params`.
    ///
    /// # Errors
    ///
    /// Fails if no backend could be created or the presentation parameters
    /// are invalid.
    pub fn new(
        params: DeviceParameters,
        presentation: &PresentationParameters,
    ) -> GraphicsResult<Self> {
        let backend = backend::create_backend(&params)?;
        Self::with_backend(params, backend, presentation)
    }

    /// Create a device on an already constructed backend.
    pub fn with_backend(
        params: DeviceParameters,
        mut backend: Box<dyn GpuBackend>,
        presentation: &PresentationParameters,
    ) -> GraphicsResult<Self> {
        let caps = backend.capabilities();
        let validated = Backbuffer::validate(presentation, &caps)?;
        backend.reset_backbuffer(&validated)?;
        let state = StateCache::new(
            validated.back_buffer_width,
            validated.back_buffer_height,
            validated.depth_stencil_format,
            caps.max_texture_slots,
            caps.max_vertex_texture_slots,
        );
        log::info!(
            "Device: created on {} ({}x{} {:?}, debug={})",
            backend.name(),
            validated.back_buffer_width,
            validated.back_buffer_height,
            validated.back_buffer_format,
            params.debug_mode
        );
        Ok(Self {
            backend,
            params,
            caps,
            registry: Registry::new(),
            state,
            backbuffer: Backbuffer::new(validated),
            serial: 1,
            changes: Vec::new(),
            destroyed: false,
        })
    }

    pub fn parameters(&self) -> &DeviceParameters {
        &self.params
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Serial of the frame currently being recorded.
    pub fn current_serial(&self) -> u64 {
        self.serial
    }

    /// Live and disposing resource counts.
    pub fn resource_counts(&self) -> RegistryCounts {
        self.registry.counts()
    }

    /// Cloneable handle for disposing resources from any thread.
    pub fn dispose_sender(&self) -> DisposeSender {
        self.registry.dispose_sender().clone()
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Start a frame: reconciles deferred disposal.
    pub fn begin_frame(&mut self) {
        crate::profile_scope!("begin_frame");
        self.reconcile_disposals();
    }

    /// Present the backbuffer and finish the frame.
    ///
    /// `source` selects a backbuffer sub-rectangle and `destination` a window
    /// rectangle to scale it into; `override_window` presents to a window
    /// other than the device window.
    pub fn swap_buffers(
        &mut self,
        source: Option<Rect>,
        destination: Option<Rect>,
        override_window: Option<RawWindowHandle>,
    ) -> GraphicsResult<()> {
        crate::profile_scope!("swap_buffers");
        self.backbuffer.validate_source_rect(source)?;
        if let Some(dest) = destination.filter(|d| d.w <= 0 || d.h <= 0) {
            return Err(GraphicsError::OutOfRange(format!(
                "present destination {dest:?} is empty"
            )));
        }
        self.backend.present(source, destination, override_window)?;
        self.backend.submit(self.serial);
        self.reconcile_disposals();
        self.serial += 1;
        crate::profile_plot!("disposing_resources", self.registry.counts().disposing);
        crate::frame_mark!();
        Ok(())
    }

    pub fn set_presentation_interval(&mut self, interval: PresentInterval) {
        self.backbuffer.set_present_interval(interval);
        self.backend.set_present_interval(interval);
    }

    // ========================================================================
    // Backbuffer
    // ========================================================================

    pub fn backbuffer(&self) -> &Backbuffer {
        &self.backbuffer
    }

    /// Reset the backbuffer to `params`.
    ///
    /// Atomic: on error the previous backbuffer stays in effect.
    pub fn reset_backbuffer(&mut self, params: &PresentationParameters) -> GraphicsResult<()> {
        crate::profile_function!();
        let validated = Backbuffer::validate(params, &self.caps)?;
        self.backend.reset_backbuffer(&validated)?;
        self.backbuffer = Backbuffer::new(validated);
        self.state
            .set_backbuffer_depth_format(validated.depth_stencil_format, &mut self.changes);
        self.apply_changes();
        log::info!(
            "Device: backbuffer reset to {}x{} {:?} ({}x MSAA)",
            validated.back_buffer_width,
            validated.back_buffer_height,
            validated.back_buffer_format,
            validated.multisample_count
        );
        Ok(())
    }

    /// Read backbuffer pixels in `rect` into `out`, waiting for all
    /// submitted work first.
    pub fn read_backbuffer(&mut self, rect: Rect, out: &mut [u8]) -> GraphicsResult<()> {
        crate::profile_scope!("read_backbuffer");
        self.backbuffer.validate_read(rect, out.len())?;
        self.wait_for_use(self.serial);
        self.backend.read_backbuffer(rect, out)?;
        Ok(())
    }

    // ========================================================================
    // Feature queries and debug
    // ========================================================================

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    pub fn supports_dxt1(&self) -> bool {
        self.caps.supports_dxt1
    }

    pub fn supports_s3tc(&self) -> bool {
        self.caps.supports_s3tc
    }

    pub fn supports_hardware_instancing(&self) -> bool {
        self.caps.supports_hardware_instancing
    }

    pub fn supports_no_overwrite(&self) -> bool {
        self.caps.supports_no_overwrite
    }

    pub fn max_texture_slots(&self) -> u32 {
        self.caps.max_texture_slots
    }

    pub fn max_multisample_count(&self) -> u32 {
        self.caps.max_multisample_count
    }

    /// Insert a named marker into the command stream.
    pub fn set_string_marker(&mut self, text: &str) {
        if self.params.debug_mode {
            log::debug!("Device: marker '{}'", text);
        }
        crate::profile_message!(text);
        self.backend.set_string_marker(text);
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Hand accumulated state changes to the backend.
    fn apply_changes(&mut self) {
        if !self.changes.is_empty() {
            self.backend.apply_render_state(&self.changes);
            self.changes.clear();
        }
    }

    /// Submit the commands recorded so far as their own frame.
    fn flush_commands(&mut self) {
        self.backend.submit(self.serial);
        self.serial += 1;
    }

    /// Block until commands of frame `last_use` have retired.
    ///
    /// If that frame is still being recorded it is flushed first.
    fn wait_for_use(&mut self, last_use: u64) {
        if last_use <= self.backend.completed_serial() {
            return;
        }
        if last_use >= self.serial {
            self.flush_commands();
        }
        log::trace!("Device: waiting for frame {}", last_use);
        self.backend.wait_for_serial(last_use);
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.backend.name())
            .field("capabilities", &self.caps)
            .field("backbuffer", &self.backbuffer)
            .field("serial", &self.serial)
            .field("resources", &self.registry.counts())
            .finish()
    }
}

#[cfg(all(test, feature = "dummy"))]
pub(crate) mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, DummyStats};
    use crate::types::{ClearOptions, DepthFormat, SurfaceFormat, Vec4};
    use parking_lot::Mutex;
    use std::sync::Arc;

    pub(crate) fn device_with(
        caps: DeviceCapabilities,
        frames_in_flight: u32,
    ) -> (Device, Arc<Mutex<DummyStats>>) {
        let backend = DummyBackend::new(frames_in_flight).with_capabilities(caps);
        let stats = backend.stats();
        let device = Device::with_backend(
            DeviceParameters::new().with_frames_in_flight(frames_in_flight),
            Box::new(backend),
            &PresentationParameters::new(64, 32).with_depth_stencil_format(DepthFormat::D24S8),
        )
        .unwrap();
        (device, stats)
    }

    pub(crate) fn device() -> (Device, Arc<Mutex<DummyStats>>) {
        device_with(DeviceCapabilities::default(), 1)
    }

    #[test]
    fn test_prepare_window_attributes() {
        let flags = prepare_window_attributes(&DeviceParameters::new());
        assert!(flags.contains(WindowFlags::ALLOW_HIGHDPI));
        assert!(!flags.contains(WindowFlags::VULKAN));
    }

    #[test]
    fn test_device_parameters_builder() {
        let params = DeviceParameters::new()
            .with_backend(BackendType::Dummy)
            .with_debug_mode(true)
            .with_frames_in_flight(1);
        assert_eq!(params.backend, BackendType::Dummy);
        assert!(params.debug_mode);
        assert_eq!(params.frames_in_flight, 1);
        assert_eq!(params.capabilities, None);
    }

    #[test]
    fn test_new_selects_dummy() {
        let device = Device::new(DeviceParameters::new(), &PresentationParameters::new(8, 8)).unwrap();
        assert_eq!(device.backend_name(), "Dummy Backend");
        assert_eq!(device.current_serial(), 1);
    }

    #[test]
    fn test_swap_buffers_advances_serial() {
        let (mut device, stats) = device();
        device.swap_buffers(None, None, None).unwrap();
        device.swap_buffers(None, None, None).unwrap();
        assert_eq!(device.current_serial(), 3);
        assert_eq!(stats.lock().presents, 2);
    }

    #[test]
    fn test_swap_buffers_rejects_bad_source() {
        let (mut device, stats) = device();
        let result = device.swap_buffers(Some(Rect::new(0, 0, 65, 32)), None, None);
        assert!(matches!(result, Err(GraphicsError::OutOfRange(_))));
        assert_eq!(stats.lock().presents, 0);
        assert_eq!(device.current_serial(), 1);
    }

    #[test]
    fn test_swap_buffers_rejects_empty_destination() {
        let (mut device, stats) = device();
        let result = device.swap_buffers(None, Some(Rect::new(0, 0, 0, 32)), None);
        assert!(matches!(result, Err(GraphicsError::OutOfRange(_))));
        assert_eq!(stats.lock().presents, 0);
        device
            .swap_buffers(None, Some(Rect::new(10, 10, 128, 96)), None)
            .unwrap();
        assert_eq!(stats.lock().presents, 1);
    }

    #[test]
    fn test_reset_is_atomic() {
        let (mut device, _) = device();
        let bad = PresentationParameters::new(0, 100);
        assert!(device.reset_backbuffer(&bad).is_err());
        assert_eq!(device.backbuffer().width(), 64);
        device
            .reset_backbuffer(&PresentationParameters::new(128, 96))
            .unwrap();
        assert_eq!(device.backbuffer().width(), 128);
        assert_eq!(device.backbuffer().height(), 96);
        assert_eq!(device.backbuffer().depth_format(), DepthFormat::None);
    }

    #[test]
    fn test_read_backbuffer_after_clear() {
        let (mut device, stats) = device();
        device.clear(ClearOptions::TARGET, Vec4::new(0.0, 1.0, 0.0, 1.0), 1.0, 0);
        let mut out = vec![0u8; 2 * 2 * 4];
        device.read_backbuffer(Rect::new(10, 10, 2, 2), &mut out).unwrap();
        assert!(out.chunks(4).all(|px| px == [0, 255, 0, 255]));
        assert_eq!(stats.lock().stalls, 1);
        assert_eq!(device.backbuffer().format(), SurfaceFormat::Color);
    }

    #[test]
    fn test_string_marker_reaches_backend() {
        let (mut device, stats) = device();
        device.set_string_marker("shadow pass");
        assert_eq!(stats.lock().markers, vec!["shadow pass".to_string()]);
    }
}
