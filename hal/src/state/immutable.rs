//! Field-by-field diffing of immutable state objects.
//!
//! Each `diff_*` function compares an incoming state object with the one the
//! backend last saw (`None` when unknown) and appends the minimal set of
//! [`RenderStateChange`]s that converge the backend to the new value.

use crate::types::{
    Blend, BlendFunction, BlendState, Color, ColorWriteChannels, CompareFunction, CullMode,
    DepthStencilState, FillMode, RasterizerState, Rect, StencilOperation, Viewport,
};

/// Group of render state a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateCategory {
    Blend,
    DepthStencil,
    Rasterizer,
    Mutable,
}

/// Stencil test configuration for one face orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFace {
    pub function: CompareFunction,
    pub fail: StencilOperation,
    pub depth_fail: StencilOperation,
    pub pass: StencilOperation,
}

/// A single backend state mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderStateChange {
    // Blend
    BlendEnable(bool),
    BlendEquation {
        color: BlendFunction,
        alpha: BlendFunction,
    },
    BlendFactors {
        color_source: Blend,
        color_destination: Blend,
        alpha_source: Blend,
        alpha_destination: Blend,
    },
    ColorWriteMask {
        slot: u8,
        channels: ColorWriteChannels,
    },

    // Depth / stencil
    DepthTest {
        enable: bool,
        function: CompareFunction,
    },
    DepthWrite(bool),
    StencilEnable(bool),
    StencilWriteMask(i32),
    StencilReadMask(i32),
    TwoSidedStencil(bool),
    StencilFront(StencilFace),
    StencilBack(StencilFace),

    // Rasterizer
    ScissorTest(bool),
    CullMode(CullMode),
    FillMode(FillMode),
    /// Depth bias in depth buffer units (already scaled by the depth format).
    DepthBias {
        constant: f32,
        slope_scale: f32,
    },
    MultisampleEnable(bool),

    // Mutable per-draw state
    Viewport(Viewport),
    ScissorRect(Rect),
    BlendColor(Color),
    MultisampleMask(i32),
    ReferenceStencil(i32),
}

impl RenderStateChange {
    /// The state group this change belongs to.
    pub fn category(&self) -> StateCategory {
        match self {
            Self::BlendEnable(_)
            | Self::BlendEquation { .. }
            | Self::BlendFactors { .. }
            | Self::ColorWriteMask { .. } => StateCategory::Blend,
            Self::DepthTest { .. }
            | Self::DepthWrite(_)
            | Self::StencilEnable(_)
            | Self::StencilWriteMask(_)
            | Self::StencilReadMask(_)
            | Self::TwoSidedStencil(_)
            | Self::StencilFront(_)
            | Self::StencilBack(_) => StateCategory::DepthStencil,
            Self::ScissorTest(_)
            | Self::CullMode(_)
            | Self::FillMode(_)
            | Self::DepthBias { .. }
            | Self::MultisampleEnable(_) => StateCategory::Rasterizer,
            Self::Viewport(_)
            | Self::ScissorRect(_)
            | Self::BlendColor(_)
            | Self::MultisampleMask(_)
            | Self::ReferenceStencil(_) => StateCategory::Mutable,
        }
    }
}

/// Push `change` if `old` is unknown or `field` differs between old and new.
fn push_if<S, T: PartialEq>(
    out: &mut Vec<RenderStateChange>,
    old: Option<&S>,
    new: &S,
    field: impl Fn(&S) -> T,
    change: impl FnOnce(T) -> RenderStateChange,
) {
    let value = field(new);
    if old.is_none_or(|o| field(o) != value) {
        out.push(change(value));
    }
}

/// Diff blend state. `blend_factor` and `multisample_mask` are mutable state
/// and are not diffed here.
pub fn diff_blend(old: Option<&BlendState>, new: &BlendState, out: &mut Vec<RenderStateChange>) {
    push_if(out, old, new, |s| !s.is_opaque(), RenderStateChange::BlendEnable);
    push_if(
        out,
        old,
        new,
        |s| (s.color_blend_function, s.alpha_blend_function),
        |(color, alpha)| RenderStateChange::BlendEquation { color, alpha },
    );
    push_if(
        out,
        old,
        new,
        |s| {
            (
                s.color_source_blend,
                s.color_destination_blend,
                s.alpha_source_blend,
                s.alpha_destination_blend,
            )
        },
        |(color_source, color_destination, alpha_source, alpha_destination)| {
            RenderStateChange::BlendFactors {
                color_source,
                color_destination,
                alpha_source,
                alpha_destination,
            }
        },
    );
    for slot in 0..new.color_write_enable.len() {
        push_if(
            out,
            old,
            new,
            |s| s.color_write_enable[slot],
            |channels| RenderStateChange::ColorWriteMask {
                slot: slot as u8,
                channels,
            },
        );
    }
}

fn front_face(s: &DepthStencilState) -> StencilFace {
    StencilFace {
        function: s.stencil_function,
        fail: s.stencil_fail,
        depth_fail: s.stencil_depth_buffer_fail,
        pass: s.stencil_pass,
    }
}

fn back_face(s: &DepthStencilState) -> StencilFace {
    StencilFace {
        function: s.ccw_stencil_function,
        fail: s.ccw_stencil_fail,
        depth_fail: s.ccw_stencil_depth_buffer_fail,
        pass: s.ccw_stencil_pass,
    }
}

/// Diff depth/stencil state. `reference_stencil` is mutable state and is not
/// diffed here.
pub fn diff_depth_stencil(
    old: Option<&DepthStencilState>,
    new: &DepthStencilState,
    out: &mut Vec<RenderStateChange>,
) {
    push_if(
        out,
        old,
        new,
        |s| (s.depth_buffer_enable, s.depth_buffer_function),
        |(enable, function)| RenderStateChange::DepthTest { enable, function },
    );
    push_if(out, old, new, |s| s.depth_buffer_write_enable, RenderStateChange::DepthWrite);
    push_if(out, old, new, |s| s.stencil_enable, RenderStateChange::StencilEnable);
    push_if(out, old, new, |s| s.stencil_write_mask, RenderStateChange::StencilWriteMask);
    push_if(out, old, new, |s| s.stencil_mask, RenderStateChange::StencilReadMask);
    push_if(out, old, new, |s| s.two_sided_stencil_mode, RenderStateChange::TwoSidedStencil);
    push_if(out, old, new, front_face, RenderStateChange::StencilFront);
    push_if(out, old, new, back_face, RenderStateChange::StencilBack);
}

/// Diff rasterizer state, scaling depth bias by `depth_bias_scale`.
///
/// `old_scale` is the scale the backend's current bias was computed with.
pub fn diff_rasterizer(
    old: Option<(&RasterizerState, f32)>,
    new: &RasterizerState,
    depth_bias_scale: f32,
    out: &mut Vec<RenderStateChange>,
) {
    let old_state = old.map(|(s, _)| s);
    push_if(out, old_state, new, |s| s.scissor_test_enable, RenderStateChange::ScissorTest);
    push_if(out, old_state, new, |s| s.cull_mode, RenderStateChange::CullMode);
    push_if(out, old_state, new, |s| s.fill_mode, RenderStateChange::FillMode);

    let constant = new.depth_bias * depth_bias_scale;
    let slope_scale = new.slope_scale_depth_bias;
    let bias_changed = match old {
        Some((o, old_scale)) => {
            o.depth_bias * old_scale != constant || o.slope_scale_depth_bias != slope_scale
        }
        None => true,
    };
    if bias_changed {
        out.push(RenderStateChange::DepthBias {
            constant,
            slope_scale,
        });
    }
    push_if(
        out,
        old_state,
        new,
        |s| s.multisample_anti_alias,
        RenderStateChange::MultisampleEnable,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_state_emits_everything() {
        let mut out = Vec::new();
        diff_blend(None, &BlendState::OPAQUE, &mut out);
        // enable, equation, factors, four write masks
        assert_eq!(out.len(), 7);
        assert!(out.iter().all(|c| c.category() == StateCategory::Blend));
    }

    #[test]
    fn test_identical_blend_is_noop() {
        let mut out = Vec::new();
        diff_blend(Some(&BlendState::ALPHA_BLEND), &BlendState::ALPHA_BLEND, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_blend_factor_not_diffed() {
        let mut out = Vec::new();
        let tinted = BlendState {
            blend_factor: Color::new(1, 2, 3, 4),
            ..BlendState::OPAQUE
        };
        diff_blend(Some(&BlendState::OPAQUE), &tinted, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_blend_minimal_diff() {
        let mut out = Vec::new();
        diff_blend(Some(&BlendState::OPAQUE), &BlendState::ADDITIVE, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], RenderStateChange::BlendEnable(true));
        assert!(matches!(out[1], RenderStateChange::BlendFactors { .. }));
    }

    #[test]
    fn test_depth_stencil_diff() {
        let mut out = Vec::new();
        diff_depth_stencil(
            Some(&DepthStencilState::default()),
            &DepthStencilState::none(),
            &mut out,
        );
        assert_eq!(
            out,
            vec![
                RenderStateChange::DepthTest {
                    enable: false,
                    function: CompareFunction::LessEqual
                },
                RenderStateChange::DepthWrite(false),
            ]
        );
    }

    #[test]
    fn test_depth_bias_rescaled() {
        let state = RasterizerState {
            depth_bias: 0.5,
            ..RasterizerState::default()
        };
        let mut out = Vec::new();
        diff_rasterizer(Some((&state, 65_535.0)), &state, 65_535.0, &mut out);
        assert!(out.is_empty());

        diff_rasterizer(Some((&state, 65_535.0)), &state, 16_777_215.0, &mut out);
        assert_eq!(
            out,
            vec![RenderStateChange::DepthBias {
                constant: 0.5 * 16_777_215.0,
                slope_scale: 0.0
            }]
        );
    }
}
