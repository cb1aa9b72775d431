//! Backbuffer manager.
//!
//! The backbuffer is the implicit render target presented to the window.
//! Its size, format and multisample count change only through an explicit
//! reset, which the device performs atomically: the new parameters are
//! validated, handed to the backend, and only committed here once the
//! backend accepted them.

use raw_window_handle::RawWindowHandle;

use crate::device::DeviceCapabilities;
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{DepthFormat, PresentInterval, PresentationParameters, Rect, SurfaceFormat};

/// Live state of the backbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backbuffer {
    params: PresentationParameters,
}

impl Backbuffer {
    /// Validate `params` against `caps`, returning the parameters the
    /// backbuffer would actually use.
    ///
    /// The multisample count is clamped to the device maximum rather than
    /// rejected.
    pub fn validate(
        params: &PresentationParameters,
        caps: &DeviceCapabilities,
    ) -> GraphicsResult<PresentationParameters> {
        let (width, height) = (params.back_buffer_width, params.back_buffer_height);
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidDimensions(format!(
                "backbuffer size {width}x{height} has a zero dimension"
            )));
        }
        if width > caps.max_texture_size || height > caps.max_texture_size {
            return Err(GraphicsError::InvalidDimensions(format!(
                "backbuffer size {}x{} exceeds device maximum {}",
                width, height, caps.max_texture_size
            )));
        }
        if !params.back_buffer_format.is_renderable() {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "{:?} cannot be used as a backbuffer format",
                params.back_buffer_format
            )));
        }
        let mut validated = *params;
        if params.multisample_count > caps.max_multisample_count {
            log::debug!(
                "Backbuffer: multisample count {} clamped to {}",
                params.multisample_count,
                caps.max_multisample_count
            );
            validated.multisample_count = caps.max_multisample_count;
        }
        Ok(validated)
    }

    /// Wrap already validated parameters.
    pub(crate) fn new(params: PresentationParameters) -> Self {
        Self { params }
    }

    pub fn width(&self) -> u32 {
        self.params.back_buffer_width
    }

    pub fn height(&self) -> u32 {
        self.params.back_buffer_height
    }

    pub fn format(&self) -> SurfaceFormat {
        self.params.back_buffer_format
    }

    pub fn depth_format(&self) -> DepthFormat {
        self.params.depth_stencil_format
    }

    pub fn multisample_count(&self) -> u32 {
        self.params.multisample_count
    }

    pub fn present_interval(&self) -> PresentInterval {
        self.params.presentation_interval
    }

    pub fn window(&self) -> Option<RawWindowHandle> {
        self.params.device_window_handle
    }

    /// The parameters of the most recent successful create or reset.
    pub fn parameters(&self) -> &PresentationParameters {
        &self.params
    }

    pub(crate) fn set_present_interval(&mut self, interval: PresentInterval) {
        self.params.presentation_interval = interval;
    }

    /// Check an optional present source rectangle.
    pub fn validate_source_rect(&self, rect: Option<Rect>) -> GraphicsResult<()> {
        match rect {
            Some(r) if !r.fits_within(self.width(), self.height()) => {
                Err(GraphicsError::OutOfRange(format!(
                    "present source {:?} outside {}x{} backbuffer",
                    r,
                    self.width(),
                    self.height()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Check a readback request: the rectangle must lie inside the
    /// backbuffer and `out_len` must hold exactly its pixels.
    pub fn validate_read(&self, rect: Rect, out_len: usize) -> GraphicsResult<()> {
        if !rect.fits_within(self.width(), self.height()) {
            return Err(GraphicsError::OutOfRange(format!(
                "readback {:?} outside {}x{} backbuffer",
                rect,
                self.width(),
                self.height()
            )));
        }
        let bpp = self.format().block_info().bytes as u64;
        let expected = rect.w as u64 * rect.h as u64 * bpp;
        if out_len as u64 != expected {
            return Err(GraphicsError::OutOfRange(format!(
                "readback of {:?} needs {} bytes, got {}",
                rect, expected, out_len
            )));
        }
        Ok(())
    }
}
