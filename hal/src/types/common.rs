//! Common value types shared across the device API.

use bytemuck::{Pod, Zeroable};
use static_assertions::assert_eq_size;

assert_eq_size!(Color, [u8; 4]);
assert_eq_size!(Vec4, [f32; 4]);
assert_eq_size!(Rect, [i32; 4]);

// ============================================================================
// Color / Vec4
// ============================================================================

/// Packed 8-bit-per-channel RGBA color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Opaque white, the default blend factor.
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    /// Transparent black.
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    /// Create a color from its components.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Quantize a normalized float color.
    pub fn from_vec4(v: Vec4) -> Self {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(q(v.x), q(v.y), q(v.z), q(v.w))
    }
}

/// Four-component float vector, used for clear colors.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    /// Create a vector from its components.
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

// ============================================================================
// Rect
// ============================================================================

/// Integer rectangle in pixels, origin at the top-left.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle covering `width` x `height` at the origin.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Returns true if the rectangle lies within a `width` x `height` surface
    /// and has a positive area.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        if self.x < 0 || self.y < 0 || self.w <= 0 || self.h <= 0 {
            return false;
        }
        let right = self.x as i64 + self.w as i64;
        let bottom = self.y as i64 + self.h as i64;
        right <= width as i64 && bottom <= height as i64
    }
}

// ============================================================================
// Viewport
// ============================================================================

/// Viewport: destination rectangle plus depth range mapping.
///
/// Depth range is `[0, 1]`; `min_depth > max_depth` is accepted for
/// reverse-Z setups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl Viewport {
    /// Create a new viewport with the standard `[0, 1]` depth range.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Create a viewport covering `width` x `height` at the origin.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Set the depth range.
    pub fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }
}

// ============================================================================
// Extent3d
// ============================================================================

/// 3D extent for textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (1 for 2D and cube textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Returns true if any dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}
