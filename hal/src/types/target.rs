//! Render target bindings.

use crate::handle::{RenderbufferHandle, TextureHandle};

use super::CubeMapFace;

/// Maximum number of simultaneously bound color targets.
pub const MAX_RENDERTARGET_BINDINGS: usize = 4;

/// Texture subresource rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// Level 0 of a 2D texture.
    Texture2D(TextureHandle),
    /// Level 0 of one cube face.
    Cube {
        texture: TextureHandle,
        face: CubeMapFace,
    },
}

impl RenderTarget {
    /// The texture backing this target.
    pub fn texture(&self) -> TextureHandle {
        match self {
            Self::Texture2D(texture) => *texture,
            Self::Cube { texture, .. } => *texture,
        }
    }

    /// Array layer rendered into (the face index for cube targets).
    pub fn layer(&self) -> u32 {
        match self {
            Self::Texture2D(_) => 0,
            Self::Cube { face, .. } => face.layer(),
        }
    }
}

/// One color attachment.
///
/// When `color_buffer` is set, rendering goes to that multisampled
/// renderbuffer and [`crate::Device::resolve_target`] copies it into the
/// texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBinding {
    pub target: RenderTarget,
    pub color_buffer: Option<RenderbufferHandle>,
}

impl RenderTargetBinding {
    /// Bind a 2D texture directly.
    pub fn texture_2d(texture: TextureHandle) -> Self {
        Self {
            target: RenderTarget::Texture2D(texture),
            color_buffer: None,
        }
    }

    /// Bind one face of a cube texture directly.
    pub fn cube(texture: TextureHandle, face: CubeMapFace) -> Self {
        Self {
            target: RenderTarget::Cube { texture, face },
            color_buffer: None,
        }
    }

    /// Render through a multisampled color renderbuffer.
    pub fn with_color_buffer(mut self, renderbuffer: RenderbufferHandle) -> Self {
        self.color_buffer = Some(renderbuffer);
        self
    }
}
