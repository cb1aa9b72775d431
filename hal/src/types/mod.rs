//! Plain value types passed across the device API.
//!
//! Everything here is a fixed-layout value: formats, state objects,
//! presentation parameters, vertex declarations and target bindings.

mod buffer;
mod common;
mod draw;
mod format;
mod presentation;
mod state;
mod target;
mod vertex;

pub use buffer::{BufferDescriptor, BufferKind, BufferUsage, IndexElementSize, SetDataOptions};
pub use common::{Color, Extent3d, Rect, Vec4, Viewport};
pub use draw::{ClearOptions, PrimitiveType};
pub use format::{BlockInfo, CubeMapFace, DepthFormat, SurfaceFormat, TextureDescriptor, TextureKind};
pub use presentation::{
    DisplayOrientation, PresentInterval, PresentationParameters, RenderTargetUsage,
};
pub use state::{
    Blend, BlendFunction, BlendState, ColorWriteChannels, CompareFunction, CullMode,
    DepthStencilState, FillMode, RasterizerState, SamplerState, StencilOperation,
    TextureAddressMode, TextureFilter,
};
pub use target::{MAX_RENDERTARGET_BINDINGS, RenderTarget, RenderTargetBinding};
pub use vertex::{
    VertexBufferBinding, VertexDeclaration, VertexElement, VertexElementFormat,
    VertexElementUsage,
};
