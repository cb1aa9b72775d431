//! Per-kind resource records kept by the registry.

use std::sync::Arc;

use crate::backend::RawResource;
use crate::effect::EffectData;
use crate::handle::TextureHandle;
use crate::query::OcclusionQuery;
use crate::types::{BufferDescriptor, DepthFormat, SurfaceFormat, TextureDescriptor};

#[derive(Debug, Clone)]
pub struct TextureRecord {
    pub desc: TextureDescriptor,
    pub raw: RawResource,
}

#[derive(Debug, Clone)]
pub struct BufferRecord {
    pub desc: BufferDescriptor,
    pub raw: RawResource,
}

/// What a renderbuffer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderbufferKind {
    /// Multisampled color storage resolved into `texture`.
    Color {
        format: SurfaceFormat,
        texture: TextureHandle,
    },
    DepthStencil(DepthFormat),
}

#[derive(Debug, Clone)]
pub struct RenderbufferRecord {
    pub kind: RenderbufferKind,
    pub width: u32,
    pub height: u32,
    /// Multisample count after clamping to the device maximum.
    pub multisample_count: u32,
    pub raw: RawResource,
}

/// A compiled effect program, shared by an effect and its clones.
#[derive(Debug)]
pub struct EffectProgram {
    pub raw: RawResource,
}

#[derive(Debug, Clone)]
pub struct EffectRecord {
    pub program: Arc<EffectProgram>,
    pub data: EffectData,
}

impl EffectRecord {
    pub fn new(raw: RawResource, data: EffectData) -> Self {
        Self {
            program: Arc::new(EffectProgram { raw }),
            data,
        }
    }

    /// A clone sharing the program, with copied parameter values.
    pub fn share(&self) -> Self {
        Self {
            program: Arc::clone(&self.program),
            data: self.data.clone(),
        }
    }

    /// Give up this record's share of the program, returning the raw id if
    /// it was the last one.
    pub fn release(self) -> Option<RawResource> {
        Arc::try_unwrap(self.program).ok().map(|p| p.raw)
    }
}

#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub raw: RawResource,
    pub query: OcclusionQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_program_released_by_last_sharer() {
        let original = EffectRecord::new(RawResource(9), EffectData::default());
        let clone = original.share();
        assert_eq!(original.release(), None);
        assert_eq!(clone.release(), Some(RawResource(9)));
    }
}
