//! Vertex declarations and vertex buffer bindings.
//!
//! A [`VertexDeclaration`] describes one vertex buffer's memory layout. It is
//! shared via `Arc` so that bindings which reuse a declaration compare cheaply.

use std::sync::Arc;

use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::BufferHandle;

/// Format of a vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementFormat {
    /// Single 32-bit float.
    Single,
    /// Two 32-bit floats.
    Vector2,
    /// Three 32-bit floats.
    Vector3,
    /// Four 32-bit floats.
    Vector4,
    /// Four unsigned normalized bytes.
    Color,
    /// Four unsigned bytes.
    Byte4,
    /// Two signed 16-bit integers.
    Short2,
    /// Four signed 16-bit integers.
    Short4,
    /// Two signed normalized 16-bit integers.
    NormalizedShort2,
    /// Four signed normalized 16-bit integers.
    NormalizedShort4,
    /// Two 16-bit floats.
    HalfVector2,
    /// Four 16-bit floats.
    HalfVector4,
}

impl VertexElementFormat {
    /// Size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Single | Self::Color | Self::Byte4 => 4,
            Self::Short2 | Self::NormalizedShort2 | Self::HalfVector2 => 4,
            Self::Vector2 | Self::Short4 | Self::NormalizedShort4 | Self::HalfVector4 => 8,
            Self::Vector3 => 12,
            Self::Vector4 => 16,
        }
    }
}

/// Semantic meaning of a vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementUsage {
    Position,
    Color,
    TextureCoordinate,
    Normal,
    Binormal,
    Tangent,
    BlendIndices,
    BlendWeight,
    Depth,
    Fog,
    PointSize,
    Sample,
    TessellateFactor,
}

/// One attribute inside a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// Byte offset from the start of the vertex.
    pub offset: u32,
    pub format: VertexElementFormat,
    pub usage: VertexElementUsage,
    /// Distinguishes repeated usages (e.g. `TEXCOORD1`).
    pub usage_index: u32,
}

impl VertexElement {
    /// Create a new vertex element.
    pub fn new(
        offset: u32,
        format: VertexElementFormat,
        usage: VertexElementUsage,
        usage_index: u32,
    ) -> Self {
        Self {
            offset,
            format,
            usage,
            usage_index,
        }
    }
}

/// Memory layout of one vertex stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexDeclaration {
    /// Bytes between consecutive vertices.
    pub stride: u32,
    pub elements: Vec<VertexElement>,
}

impl VertexDeclaration {
    /// Create a declaration, checking that every element fits in the stride
    /// and that no `(usage, usage_index)` pair repeats.
    pub fn new(stride: u32, elements: Vec<VertexElement>) -> GraphicsResult<Self> {
        if stride == 0 {
            return Err(GraphicsError::InvalidDimensions(
                "vertex stride must be non-zero".into(),
            ));
        }
        for (i, element) in elements.iter().enumerate() {
            let end = element.offset as u64 + element.format.size() as u64;
            if end > stride as u64 {
                return Err(GraphicsError::OutOfRange(format!(
                    "vertex element {} ({:?} at offset {}) exceeds stride {}",
                    i, element.format, element.offset, stride
                )));
            }
            let duplicate = elements[..i]
                .iter()
                .any(|e| e.usage == element.usage && e.usage_index == element.usage_index);
            if duplicate {
                return Err(GraphicsError::PreconditionViolation(format!(
                    "vertex usage {:?}{} declared twice",
                    element.usage, element.usage_index
                )));
            }
        }
        Ok(Self { stride, elements })
    }

    /// Create a declaration whose stride is the packed size of `elements`.
    pub fn packed(elements: Vec<VertexElement>) -> GraphicsResult<Self> {
        let stride = elements
            .iter()
            .map(|e| e.offset + e.format.size())
            .max()
            .unwrap_or(0);
        Self::new(stride, elements)
    }

    /// Find an element by semantic.
    pub fn element(&self, usage: VertexElementUsage, usage_index: u32) -> Option<&VertexElement> {
        self.elements
            .iter()
            .find(|e| e.usage == usage && e.usage_index == usage_index)
    }
}

/// A vertex buffer bound to one input slot.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferBinding {
    pub buffer: BufferHandle,
    pub declaration: Arc<VertexDeclaration>,
    /// First vertex read from the buffer.
    pub vertex_offset: u32,
    /// 0 for per-vertex data; N advances once every N instances.
    pub instance_frequency: u32,
}

impl VertexBufferBinding {
    /// Bind `buffer` as per-vertex data starting at vertex 0.
    pub fn new(buffer: BufferHandle, declaration: Arc<VertexDeclaration>) -> Self {
        Self {
            buffer,
            declaration,
            vertex_offset: 0,
            instance_frequency: 0,
        }
    }

    /// Set the starting vertex.
    pub fn with_vertex_offset(mut self, offset: u32) -> Self {
        self.vertex_offset = offset;
        self
    }

    /// Mark as per-instance data.
    pub fn with_instance_frequency(mut self, frequency: u32) -> Self {
        self.instance_frequency = frequency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_color() -> Vec<VertexElement> {
        vec![
            VertexElement::new(0, VertexElementFormat::Vector3, VertexElementUsage::Position, 0),
            VertexElement::new(12, VertexElementFormat::Color, VertexElementUsage::Color, 0),
        ]
    }

    #[test]
    fn test_packed_stride() {
        let decl = VertexDeclaration::packed(position_color()).unwrap();
        assert_eq!(decl.stride, 16);
        assert!(decl.element(VertexElementUsage::Color, 0).is_some());
        assert!(decl.element(VertexElementUsage::Normal, 0).is_none());
    }

    #[test]
    fn test_element_outside_stride() {
        let err = VertexDeclaration::new(12, position_color()).unwrap_err();
        assert!(matches!(err, GraphicsError::OutOfRange(_)));
    }

    #[test]
    fn test_duplicate_usage() {
        let mut elements = position_color();
        elements.push(VertexElement::new(
            16,
            VertexElementFormat::Single,
            VertexElementUsage::Position,
            0,
        ));
        let err = VertexDeclaration::new(20, elements).unwrap_err();
        assert!(matches!(err, GraphicsError::PreconditionViolation(_)));
    }

    #[test]
    fn test_zero_stride() {
        assert!(VertexDeclaration::new(0, Vec::new()).is_err());
    }
}
