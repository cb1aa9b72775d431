//! Buffer usage hints and data-transfer options.

/// CPU access hint for a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Content can be written and read back.
    #[default]
    None,
    /// Content is only ever written; read-back is rejected.
    WriteOnly,
}

/// Synchronization policy for a buffer write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SetDataOptions {
    /// Wait for in-flight commands referencing the buffer before writing.
    #[default]
    None,
    /// Replace the backing storage; previous content is discarded.
    Discard,
    /// Write without waiting; the caller promises not to touch ranges that
    /// in-flight commands read.
    NoOverwrite,
}

/// Width of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexElementSize {
    #[default]
    Bits16,
    Bits32,
}

impl IndexElementSize {
    /// Size of one index in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::Bits16 => 2,
            Self::Bits32 => 4,
        }
    }

    /// Decode the index at `position` from little-endian index data.
    pub fn read(&self, data: &[u8], position: usize) -> Option<u32> {
        match self {
            Self::Bits16 => {
                let start = position.checked_mul(2)?;
                let bytes = data.get(start..start + 2)?;
                Some(u16::from_le_bytes([bytes[0], bytes[1]]) as u32)
            }
            Self::Bits32 => {
                let start = position.checked_mul(4)?;
                let bytes = data.get(start..start + 4)?;
                Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
        }
    }
}

/// Role of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex buffer with a fixed per-vertex stride.
    Vertex { stride: u32 },
    /// Index buffer with a fixed index width.
    Index(IndexElementSize),
}

/// Immutable description of a buffer, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    /// Vertex or index role.
    pub kind: BufferKind,
    /// Number of vertices or indices.
    pub element_count: u32,
    /// Whether the buffer honours [`SetDataOptions`].
    pub dynamic: bool,
    /// CPU access hint.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Describe a vertex buffer.
    pub fn vertex(dynamic: bool, usage: BufferUsage, vertex_count: u32, stride: u32) -> Self {
        Self {
            kind: BufferKind::Vertex { stride },
            element_count: vertex_count,
            dynamic,
            usage,
        }
    }

    /// Describe an index buffer.
    pub fn index(
        dynamic: bool,
        usage: BufferUsage,
        index_count: u32,
        element_size: IndexElementSize,
    ) -> Self {
        Self {
            kind: BufferKind::Index(element_size),
            element_count: index_count,
            dynamic,
            usage,
        }
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> u32 {
        match self.kind {
            BufferKind::Vertex { stride } => stride,
            BufferKind::Index(size) => size.size(),
        }
    }

    /// Total size in bytes, or `None` on overflow.
    pub fn size_in_bytes(&self) -> Option<u64> {
        (self.element_count as u64).checked_mul(self.element_size() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_read() {
        let data = [1u8, 0, 2, 0, 0xff, 0xff];
        assert_eq!(IndexElementSize::Bits16.read(&data, 1), Some(2));
        assert_eq!(IndexElementSize::Bits16.read(&data, 2), Some(0xffff));
        assert_eq!(IndexElementSize::Bits16.read(&data, 3), None);
        assert_eq!(IndexElementSize::Bits32.read(&data, 0), Some(0x0002_0001));
    }

    #[test]
    fn test_buffer_size() {
        let desc = BufferDescriptor::vertex(false, BufferUsage::None, 100, 24);
        assert_eq!(desc.size_in_bytes(), Some(2400));
        let desc = BufferDescriptor::index(true, BufferUsage::WriteOnly, 10, IndexElementSize::Bits32);
        assert_eq!(desc.element_size(), 4);
        assert_eq!(desc.size_in_bytes(), Some(40));
    }
}
