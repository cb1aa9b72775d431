//! Primitive topology and clear options.

use bitflags::bitflags;

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

impl PrimitiveType {
    /// Number of vertices (or indices) consumed by `primitive_count`
    /// primitives.
    pub fn vertex_count(&self, primitive_count: u32) -> u32 {
        match self {
            Self::TriangleList => primitive_count.saturating_mul(3),
            Self::TriangleStrip => primitive_count.saturating_add(2),
            Self::LineList => primitive_count.saturating_mul(2),
            Self::LineStrip => primitive_count.saturating_add(1),
            Self::PointList => primitive_count,
        }
    }
}

bitflags! {
    /// Attachments affected by a clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearOptions: u32 {
        const TARGET = 1;
        const DEPTH_BUFFER = 2;
        const STENCIL = 4;
    }
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self::TARGET | Self::DEPTH_BUFFER | Self::STENCIL
    }
}
