//! Presentation parameters for the backbuffer.

use raw_window_handle::RawWindowHandle;

use super::{DepthFormat, SurfaceFormat};

/// Synchronization policy for presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentInterval {
    /// Backend default; equivalent to `One`.
    #[default]
    Default,
    /// Wait for one vertical blank.
    One,
    /// Wait for two vertical blanks.
    Two,
    /// Present immediately. May tear.
    Immediate,
}

/// Display orientation hint for mobile targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayOrientation {
    #[default]
    Default,
    LandscapeLeft,
    LandscapeRight,
    Portrait,
}

/// What happens to render target content when it is rebound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTargetUsage {
    #[default]
    DiscardContents,
    PreserveContents,
    PlatformContents,
}

/// Backbuffer configuration, passed to device creation and reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationParameters {
    pub back_buffer_width: u32,
    pub back_buffer_height: u32,
    pub back_buffer_format: SurfaceFormat,
    pub multisample_count: u32,
    /// Window that receives presented frames; `None` for headless devices.
    pub device_window_handle: Option<RawWindowHandle>,
    pub is_full_screen: bool,
    pub depth_stencil_format: DepthFormat,
    pub presentation_interval: PresentInterval,
    pub display_orientation: DisplayOrientation,
    pub render_target_usage: RenderTargetUsage,
}

impl PresentationParameters {
    /// Create headless parameters for a `width` x `height` color backbuffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            back_buffer_width: width,
            back_buffer_height: height,
            back_buffer_format: SurfaceFormat::Color,
            multisample_count: 0,
            device_window_handle: None,
            is_full_screen: false,
            depth_stencil_format: DepthFormat::None,
            presentation_interval: PresentInterval::Default,
            display_orientation: DisplayOrientation::Default,
            render_target_usage: RenderTargetUsage::DiscardContents,
        }
    }

    /// Set the color format.
    pub fn with_format(mut self, format: SurfaceFormat) -> Self {
        self.back_buffer_format = format;
        self
    }

    /// Set the depth/stencil format.
    pub fn with_depth_stencil_format(mut self, format: DepthFormat) -> Self {
        self.depth_stencil_format = format;
        self
    }

    /// Set the multisample count (0 disables multisampling).
    pub fn with_multisample_count(mut self, count: u32) -> Self {
        self.multisample_count = count;
        self
    }

    /// Set the target window.
    pub fn with_window(mut self, handle: RawWindowHandle) -> Self {
        self.device_window_handle = Some(handle);
        self
    }

    /// Set the present interval.
    pub fn with_present_interval(mut self, interval: PresentInterval) -> Self {
        self.presentation_interval = interval;
        self
    }

    /// Set fullscreen mode.
    pub fn with_full_screen(mut self, full_screen: bool) -> Self {
        self.is_full_screen = full_screen;
        self
    }

    /// Set the display orientation.
    pub fn with_orientation(mut self, orientation: DisplayOrientation) -> Self {
        self.display_orientation = orientation;
        self
    }

    /// Set the render target usage policy.
    pub fn with_render_target_usage(mut self, usage: RenderTargetUsage) -> Self {
        self.render_target_usage = usage;
        self
    }
}
