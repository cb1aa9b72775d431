//! Immutable render-state value objects.
//!
//! Each struct is submitted wholesale; the state cache diffs it against the
//! active value. `Default` impls are the XNA defaults (opaque blending,
//! less-equal depth test, counter-clockwise culling, linear-wrap sampling).

use bitflags::bitflags;

use super::Color;

// ============================================================================
// Enums
// ============================================================================

/// Blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blend {
    One,
    Zero,
    SourceColor,
    InverseSourceColor,
    SourceAlpha,
    InverseSourceAlpha,
    DestinationColor,
    InverseDestinationColor,
    DestinationAlpha,
    InverseDestinationAlpha,
    BlendFactor,
    InverseBlendFactor,
    SourceAlphaSaturation,
}

/// Blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFunction {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Max,
    Min,
}

bitflags! {
    /// Color channels written by a render target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteChannels: u8 {
        const RED = 1;
        const GREEN = 2;
        const BLUE = 4;
        const ALPHA = 8;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

impl Default for ColorWriteChannels {
    fn default() -> Self {
        Self::ALL
    }
}

/// Depth or stencil comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Always,
    Never,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
}

/// Stencil buffer update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    IncrementSaturation,
    DecrementSaturation,
    Invert,
}

/// Face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    CullClockwiseFace,
    CullCounterClockwiseFace,
}

/// Polygon rasterization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

/// Texture coordinate addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAddressMode {
    Wrap,
    Clamp,
    Mirror,
}

/// Texture filtering (min/mag/mip combination).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Linear,
    Point,
    Anisotropic,
    LinearMipPoint,
    PointMipLinear,
    MinLinearMagPointMipLinear,
    MinLinearMagPointMipPoint,
    MinPointMagLinearMipLinear,
    MinPointMagLinearMipPoint,
}

// ============================================================================
// BlendState
// ============================================================================

/// Color blending for all render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Constant color used by `Blend::BlendFactor`.
    pub blend_factor: Color,
    pub multisample_mask: i32,
    pub color_blend_function: BlendFunction,
    pub alpha_blend_function: BlendFunction,
    pub color_source_blend: Blend,
    pub color_destination_blend: Blend,
    pub alpha_source_blend: Blend,
    pub alpha_destination_blend: Blend,
    /// Write masks for render target slots 0..4.
    pub color_write_enable: [ColorWriteChannels; 4],
}

impl Default for BlendState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

impl BlendState {
    /// Source replaces destination.
    pub const OPAQUE: BlendState = BlendState {
        blend_factor: Color::WHITE,
        multisample_mask: -1,
        color_blend_function: BlendFunction::Add,
        alpha_blend_function: BlendFunction::Add,
        color_source_blend: Blend::One,
        color_destination_blend: Blend::Zero,
        alpha_source_blend: Blend::One,
        alpha_destination_blend: Blend::Zero,
        color_write_enable: [ColorWriteChannels::ALL; 4],
    };

    /// Premultiplied alpha blending.
    pub const ALPHA_BLEND: BlendState = BlendState {
        color_source_blend: Blend::One,
        color_destination_blend: Blend::InverseSourceAlpha,
        alpha_source_blend: Blend::One,
        alpha_destination_blend: Blend::InverseSourceAlpha,
        ..Self::OPAQUE
    };

    /// Additive blending.
    pub const ADDITIVE: BlendState = BlendState {
        color_source_blend: Blend::SourceAlpha,
        color_destination_blend: Blend::One,
        alpha_source_blend: Blend::SourceAlpha,
        alpha_destination_blend: Blend::One,
        ..Self::OPAQUE
    };

    /// Returns true if the equation is a plain source copy.
    pub fn is_opaque(&self) -> bool {
        self.color_source_blend == Blend::One
            && self.color_destination_blend == Blend::Zero
            && self.alpha_source_blend == Blend::One
            && self.alpha_destination_blend == Blend::Zero
    }
}

// ============================================================================
// DepthStencilState
// ============================================================================

/// Depth test and stencil configuration.
///
/// `ccw_*` fields apply to counter-clockwise faces when
/// `two_sided_stencil_mode` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_buffer_enable: bool,
    pub depth_buffer_write_enable: bool,
    pub depth_buffer_function: CompareFunction,
    pub stencil_enable: bool,
    pub stencil_write_mask: i32,
    pub two_sided_stencil_mode: bool,
    pub reference_stencil: i32,
    pub stencil_mask: i32,
    pub stencil_function: CompareFunction,
    pub stencil_fail: StencilOperation,
    pub stencil_depth_buffer_fail: StencilOperation,
    pub stencil_pass: StencilOperation,
    pub ccw_stencil_function: CompareFunction,
    pub ccw_stencil_fail: StencilOperation,
    pub ccw_stencil_depth_buffer_fail: StencilOperation,
    pub ccw_stencil_pass: StencilOperation,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_buffer_enable: true,
            depth_buffer_write_enable: true,
            depth_buffer_function: CompareFunction::LessEqual,
            stencil_enable: false,
            stencil_write_mask: -1,
            two_sided_stencil_mode: false,
            reference_stencil: 0,
            stencil_mask: -1,
            stencil_function: CompareFunction::Always,
            stencil_fail: StencilOperation::Keep,
            stencil_depth_buffer_fail: StencilOperation::Keep,
            stencil_pass: StencilOperation::Keep,
            ccw_stencil_function: CompareFunction::Always,
            ccw_stencil_fail: StencilOperation::Keep,
            ccw_stencil_depth_buffer_fail: StencilOperation::Keep,
            ccw_stencil_pass: StencilOperation::Keep,
        }
    }
}

impl DepthStencilState {
    /// Depth testing and writing disabled.
    pub fn none() -> Self {
        Self {
            depth_buffer_enable: false,
            depth_buffer_write_enable: false,
            ..Self::default()
        }
    }
}

// ============================================================================
// RasterizerState
// ============================================================================

/// Rasterization configuration.
///
/// `depth_bias` is normalized; it is scaled by the bound depth format before
/// reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub scissor_test_enable: bool,
    pub cull_mode: CullMode,
    pub fill_mode: FillMode,
    pub depth_bias: f32,
    pub slope_scale_depth_bias: f32,
    pub multisample_anti_alias: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            scissor_test_enable: false,
            cull_mode: CullMode::CullCounterClockwiseFace,
            fill_mode: FillMode::Solid,
            depth_bias: 0.0,
            slope_scale_depth_bias: 0.0,
            multisample_anti_alias: true,
        }
    }
}

// ============================================================================
// SamplerState
// ============================================================================

/// Texture sampling configuration for one sampler slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerState {
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub filter: TextureFilter,
    pub max_anisotropy: i32,
    /// Most detailed mip level the sampler may use.
    pub max_mip_level: i32,
    pub mip_map_level_of_detail_bias: f32,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::LINEAR_WRAP
    }
}

impl SamplerState {
    /// Linear filtering, wrapping addressing.
    pub const LINEAR_WRAP: SamplerState = SamplerState {
        address_u: TextureAddressMode::Wrap,
        address_v: TextureAddressMode::Wrap,
        address_w: TextureAddressMode::Wrap,
        filter: TextureFilter::Linear,
        max_anisotropy: 4,
        max_mip_level: 0,
        mip_map_level_of_detail_bias: 0.0,
    };

    /// Point filtering, clamped addressing.
    pub const POINT_CLAMP: SamplerState = SamplerState {
        address_u: TextureAddressMode::Clamp,
        address_v: TextureAddressMode::Clamp,
        address_w: TextureAddressMode::Clamp,
        filter: TextureFilter::Point,
        ..Self::LINEAR_WRAP
    };

    /// Set address mode for all coordinates.
    pub fn with_address_mode(mut self, mode: TextureAddressMode) -> Self {
        self.address_u = mode;
        self.address_v = mode;
        self.address_w = mode;
        self
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: TextureFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set anisotropic filtering level.
    pub fn with_anisotropy(mut self, level: i32) -> Self {
        self.max_anisotropy = level;
        self
    }

    /// Set the most detailed mip level.
    pub fn with_max_mip_level(mut self, level: i32) -> Self {
        self.max_mip_level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_presets() {
        assert!(BlendState::default().is_opaque());
        assert!(!BlendState::ALPHA_BLEND.is_opaque());
        assert_eq!(BlendState::ADDITIVE.blend_factor, Color::WHITE);
        assert_eq!(ColorWriteChannels::ALL.bits(), 15);
    }

    #[test]
    fn test_sampler_builder() {
        let s = SamplerState::POINT_CLAMP
            .with_anisotropy(8)
            .with_address_mode(TextureAddressMode::Mirror);
        assert_eq!(s.filter, TextureFilter::Point);
        assert_eq!(s.max_anisotropy, 8);
        assert_eq!(s.address_w, TextureAddressMode::Mirror);
    }
}
