//! Texture formats, faces and descriptors.

use super::Extent3d;

/// Surface format of a texture or color target.
///
/// Variants follow the XNA 4.0 surface format table; `ColorBgraExt` is the
/// byte-swapped 32-bit color extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceFormat {
    /// 32-bit RGBA, 8 bits per channel.
    #[default]
    Color,
    /// 16-bit packed BGR, 5-6-5 bits.
    Bgr565,
    /// 16-bit packed BGRA, 5-5-5-1 bits.
    Bgra5551,
    /// 16-bit packed BGRA, 4 bits per channel.
    Bgra4444,
    /// BC1 block compression, 8 bytes per 4x4 block.
    Dxt1,
    /// BC2 block compression, 16 bytes per 4x4 block.
    Dxt3,
    /// BC3 block compression, 16 bytes per 4x4 block.
    Dxt5,
    /// Two signed normalized 8-bit channels.
    NormalizedByte2,
    /// Four signed normalized 8-bit channels.
    NormalizedByte4,
    /// 32-bit packed RGBA, 10-10-10-2 bits.
    Rgba1010102,
    /// Two unsigned normalized 16-bit channels.
    Rg32,
    /// Four unsigned normalized 16-bit channels.
    Rgba64,
    /// Single 8-bit alpha channel.
    Alpha8,
    /// Single 32-bit float channel.
    Single,
    /// Two 32-bit float channels.
    Vector2,
    /// Four 32-bit float channels.
    Vector4,
    /// Single 16-bit float channel.
    HalfSingle,
    /// Two 16-bit float channels.
    HalfVector2,
    /// Four 16-bit float channels.
    HalfVector4,
    /// Backend-chosen blendable HDR format, 16-bit float per channel.
    HdrBlendable,
    /// 32-bit BGRA, 8 bits per channel.
    ColorBgraExt,
}

/// Texel block description of a surface format.
///
/// Uncompressed formats use a 1x1 block whose size is the texel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// Block width in texels.
    pub width: u32,
    /// Block height in texels.
    pub height: u32,
    /// Size of one block in bytes.
    pub bytes: u32,
}

impl SurfaceFormat {
    /// All surface formats, in declaration order.
    pub const ALL: [SurfaceFormat; 21] = [
        Self::Color,
        Self::Bgr565,
        Self::Bgra5551,
        Self::Bgra4444,
        Self::Dxt1,
        Self::Dxt3,
        Self::Dxt5,
        Self::NormalizedByte2,
        Self::NormalizedByte4,
        Self::Rgba1010102,
        Self::Rg32,
        Self::Rgba64,
        Self::Alpha8,
        Self::Single,
        Self::Vector2,
        Self::Vector4,
        Self::HalfSingle,
        Self::HalfVector2,
        Self::HalfVector4,
        Self::HdrBlendable,
        Self::ColorBgraExt,
    ];

    /// Returns the texel block layout of this format.
    pub fn block_info(&self) -> BlockInfo {
        let (dim, bytes) = match self {
            Self::Dxt1 => (4, 8),
            Self::Dxt3 | Self::Dxt5 => (4, 16),
            Self::Alpha8 => (1, 1),
            Self::Bgr565
            | Self::Bgra5551
            | Self::Bgra4444
            | Self::NormalizedByte2
            | Self::HalfSingle => (1, 2),
            Self::Color
            | Self::ColorBgraExt
            | Self::NormalizedByte4
            | Self::Rgba1010102
            | Self::Rg32
            | Self::Single
            | Self::HalfVector2 => (1, 4),
            Self::Rgba64 | Self::Vector2 | Self::HalfVector4 | Self::HdrBlendable => (1, 8),
            Self::Vector4 => (1, 16),
        };
        BlockInfo {
            width: dim,
            height: dim,
            bytes,
        }
    }

    /// Returns true for the DXT family of 4x4 block-compressed formats.
    pub fn is_block_compressed(&self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt3 | Self::Dxt5)
    }

    /// Size of one texel in bytes, or `None` for block-compressed formats.
    pub fn texel_size(&self) -> Option<u32> {
        if self.is_block_compressed() {
            None
        } else {
            Some(self.block_info().bytes)
        }
    }

    /// Returns true if the format can back a color render target.
    pub fn is_renderable(&self) -> bool {
        !self.is_block_compressed()
    }
}

/// Depth/stencil format of a depth target or the backbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFormat {
    /// No depth buffer.
    #[default]
    None,
    /// 16-bit depth.
    D16,
    /// 24-bit depth.
    D24,
    /// 24-bit depth with 8-bit stencil.
    D24S8,
}

impl DepthFormat {
    /// Size in bytes of one depth/stencil texel.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::D16 => 2,
            Self::D24 | Self::D24S8 => 4,
        }
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::D24S8)
    }

    /// Factor converting a normalized depth bias into depth buffer units.
    pub fn depth_bias_scale(&self) -> f32 {
        match self {
            Self::None => 0.0,
            Self::D16 => 65_535.0,
            Self::D24 | Self::D24S8 => 16_777_215.0,
        }
    }
}

/// One face of a cube texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CubeMapFace {
    #[default]
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeMapFace {
    /// All six faces, in layer order.
    pub const ALL: [CubeMapFace; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    /// Array layer index of this face.
    pub fn layer(&self) -> u32 {
        *self as u32
    }
}

/// Shape of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Two-dimensional texture.
    Texture2D,
    /// Volume texture.
    Texture3D,
    /// Cube texture with six square faces.
    Cube,
}

/// Immutable description of a texture, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Shape of the texture.
    pub kind: TextureKind,
    /// Surface format.
    pub format: SurfaceFormat,
    /// Size of the top mip level (`depth` is 1 unless `kind` is 3D).
    pub size: Extent3d,
    /// Number of mip levels.
    pub level_count: u32,
    /// Whether the texture can be bound as a render target.
    pub is_render_target: bool,
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor.
    pub fn new_2d(
        format: SurfaceFormat,
        width: u32,
        height: u32,
        level_count: u32,
        is_render_target: bool,
    ) -> Self {
        Self {
            kind: TextureKind::Texture2D,
            format,
            size: Extent3d::new_2d(width, height),
            level_count,
            is_render_target,
        }
    }

    /// Create a volume texture descriptor.
    pub fn new_3d(
        format: SurfaceFormat,
        width: u32,
        height: u32,
        depth: u32,
        level_count: u32,
    ) -> Self {
        Self {
            kind: TextureKind::Texture3D,
            format,
            size: Extent3d::new_3d(width, height, depth),
            level_count,
            is_render_target: false,
        }
    }

    /// Create a cube texture descriptor.
    pub fn new_cube(
        format: SurfaceFormat,
        size: u32,
        level_count: u32,
        is_render_target: bool,
    ) -> Self {
        Self {
            kind: TextureKind::Cube,
            format,
            size: Extent3d::new_2d(size, size),
            level_count,
            is_render_target,
        }
    }

    /// Number of array layers (6 for cube textures, 1 otherwise).
    pub fn layer_count(&self) -> u32 {
        match self.kind {
            TextureKind::Cube => 6,
            TextureKind::Texture2D | TextureKind::Texture3D => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_info() {
        assert_eq!(
            SurfaceFormat::Dxt1.block_info(),
            BlockInfo {
                width: 4,
                height: 4,
                bytes: 8
            }
        );
        assert_eq!(SurfaceFormat::Dxt5.block_info().bytes, 16);
        assert_eq!(SurfaceFormat::Color.texel_size(), Some(4));
        assert_eq!(SurfaceFormat::Vector4.texel_size(), Some(16));
        assert_eq!(SurfaceFormat::Dxt3.texel_size(), None);
    }

    #[test]
    fn test_renderable() {
        for format in SurfaceFormat::ALL {
            assert_eq!(format.is_renderable(), !format.is_block_compressed());
        }
    }

    #[test]
    fn test_cube_layers() {
        let desc = TextureDescriptor::new_cube(SurfaceFormat::Color, 64, 1, false);
        assert_eq!(desc.layer_count(), 6);
        assert_eq!(desc.size.depth, 1);
        assert_eq!(CubeMapFace::NegativeZ.layer(), 5);
    }

    #[test]
    fn test_depth_bias_scale() {
        assert_eq!(DepthFormat::None.depth_bias_scale(), 0.0);
        assert_eq!(DepthFormat::D16.depth_bias_scale(), 65_535.0);
        assert!(DepthFormat::D24S8.has_stencil());
        assert!(!DepthFormat::D24.has_stencil());
    }
}
