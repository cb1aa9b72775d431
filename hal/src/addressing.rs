//! Subresource addressing.
//!
//! Pure functions that turn a (format, mip level extent, region) triple into
//! byte sizes, pitches and offsets. Every texture data transfer goes through
//! [`region_layout`] before touching a resource, so a region that is out of
//! bounds or misaligned for a block-compressed format fails here.
//!
//! Subresource storage is tightly packed: rows of texel blocks, then slices,
//! with no padding. A texture's full storage is every layer's mip chain laid
//! out layer-major (layer 0 levels 0..n, layer 1 levels 0..n, ...).

use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{BlockInfo, Extent3d, SurfaceFormat, TextureDescriptor, TextureKind};

// ============================================================================
// Mip levels
// ============================================================================

/// Size of one dimension at `level`, never smaller than 1.
pub fn mip_dim(base: u32, level: u32) -> u32 {
    base.checked_shr(level).unwrap_or(0).max(1)
}

/// Extent of mip `level` for a texture whose top level is `base`.
pub fn mip_level_extent(base: Extent3d, level: u32) -> Extent3d {
    Extent3d::new_3d(
        mip_dim(base.width, level),
        mip_dim(base.height, level),
        mip_dim(base.depth, level),
    )
}

/// Length of a full mip chain: `floor(log2(max(w, h, d))) + 1`.
pub fn max_mip_levels(base: Extent3d) -> u32 {
    let largest = base.width.max(base.height).max(base.depth);
    if largest == 0 {
        0
    } else {
        u32::BITS - largest.leading_zeros()
    }
}

// ============================================================================
// Regions
// ============================================================================

/// A box of texels inside one subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Mip level.
    pub level: u32,
    /// Array layer (cube face index for cube textures).
    pub layer: u32,
}

impl TextureRegion {
    /// Region of a 2D texture level.
    pub fn new_2d(x: u32, y: u32, width: u32, height: u32, level: u32) -> Self {
        Self {
            x,
            y,
            z: 0,
            width,
            height,
            depth: 1,
            level,
            layer: 0,
        }
    }

    /// Region of a volume texture level.
    pub fn new_3d(
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
        level: u32,
    ) -> Self {
        Self {
            x,
            y,
            z,
            width,
            height,
            depth,
            level,
            layer: 0,
        }
    }

    /// Whole subresource at `level` / `layer` of a texture with top extent
    /// `base`.
    pub fn whole(base: Extent3d, level: u32, layer: u32) -> Self {
        let extent = mip_level_extent(base, level);
        Self {
            x: 0,
            y: 0,
            z: 0,
            width: extent.width,
            height: extent.height,
            depth: extent.depth,
            level,
            layer,
        }
    }

    /// Same region on another array layer.
    pub fn on_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }
}

/// Byte layout of a region's packed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubresourceLayout {
    /// Texel block layout of the format.
    pub block: BlockInfo,
    /// Bytes in one row of blocks.
    pub row_pitch: u64,
    /// Rows of blocks in one depth slice.
    pub rows_per_slice: u32,
    /// Bytes in one depth slice.
    pub slice_pitch: u64,
    /// Depth slices.
    pub slices: u32,
    /// Total bytes the caller's buffer must hold.
    pub size_in_bytes: u64,
}

impl SubresourceLayout {
    /// Number of texel blocks (texels, for uncompressed formats).
    pub fn block_count(&self) -> u64 {
        (self.row_pitch / self.block.bytes as u64) * self.rows_per_slice as u64 * self.slices as u64
    }

    /// Number of `element_size`-byte elements covering the region, or an
    /// error if the region size is not a whole number of elements.
    pub fn element_count(&self, element_size: u32) -> GraphicsResult<u64> {
        if element_size == 0 || self.size_in_bytes % element_size as u64 != 0 {
            return Err(GraphicsError::OutOfRange(format!(
                "region of {} bytes is not a multiple of element size {}",
                self.size_in_bytes, element_size
            )));
        }
        Ok(self.size_in_bytes / element_size as u64)
    }
}

fn packed_layout(block: BlockInfo, width: u32, height: u32, depth: u32) -> GraphicsResult<SubresourceLayout> {
    let overflow = || GraphicsError::InvalidDimensions("subresource size overflows u64".into());
    let row_pitch = (width.div_ceil(block.width) as u64)
        .checked_mul(block.bytes as u64)
        .ok_or_else(overflow)?;
    let rows_per_slice = height.div_ceil(block.height);
    let slice_pitch = row_pitch
        .checked_mul(rows_per_slice as u64)
        .ok_or_else(overflow)?;
    let size_in_bytes = slice_pitch.checked_mul(depth as u64).ok_or_else(overflow)?;
    Ok(SubresourceLayout {
        block,
        row_pitch,
        rows_per_slice,
        slice_pitch,
        slices: depth,
        size_in_bytes,
    })
}

fn check_axis(
    axis: &str,
    start: u32,
    len: u32,
    limit: u32,
    block: u32,
) -> GraphicsResult<()> {
    let end = start.checked_add(len).ok_or_else(|| {
        GraphicsError::OutOfRange(format!("{axis} range {start}+{len} overflows"))
    })?;
    if end > limit {
        return Err(GraphicsError::OutOfRange(format!(
            "{axis} range {start}..{end} exceeds level size {limit}"
        )));
    }
    if block > 1 && (start % block != 0 || (end % block != 0 && end != limit)) {
        return Err(GraphicsError::OutOfRange(format!(
            "{axis} range {start}..{end} is not aligned to {block}-texel blocks"
        )));
    }
    Ok(())
}

/// Validate `region` against a mip level of extent `level_extent` and return
/// the byte layout of its packed data.
///
/// Fails with `InvalidDimensions` for an empty region and `OutOfRange` when
/// the region leaves the level or, for block-compressed formats, does not
/// start on a block boundary or end on one (or at the level edge).
pub fn region_layout(
    format: SurfaceFormat,
    level_extent: Extent3d,
    region: &TextureRegion,
) -> GraphicsResult<SubresourceLayout> {
    if region.width == 0 || region.height == 0 || region.depth == 0 {
        return Err(GraphicsError::InvalidDimensions(format!(
            "empty region {}x{}x{}",
            region.width, region.height, region.depth
        )));
    }
    let block = format.block_info();
    check_axis("x", region.x, region.width, level_extent.width, block.width)?;
    check_axis("y", region.y, region.height, level_extent.height, block.height)?;
    check_axis("z", region.z, region.depth, level_extent.depth, 1)?;
    packed_layout(block, region.width, region.height, region.depth)
}

/// Size in bytes of a whole mip level of extent `level_extent`.
pub fn subresource_size(format: SurfaceFormat, level_extent: Extent3d) -> u64 {
    let block = format.block_info();
    let row = level_extent.width.div_ceil(block.width) as u64 * block.bytes as u64;
    row * level_extent.height.div_ceil(block.height) as u64 * level_extent.depth as u64
}

/// Byte offset of subresource (`layer`, `level`) inside a texture's packed
/// storage.
pub fn subresource_offset(desc: &TextureDescriptor, layer: u32, level: u32) -> u64 {
    let chain: u64 = (0..desc.level_count)
        .map(|l| subresource_size(desc.format, mip_level_extent(desc.size, l)))
        .sum();
    let within: u64 = (0..level)
        .map(|l| subresource_size(desc.format, mip_level_extent(desc.size, l)))
        .sum();
    chain * layer as u64 + within
}

/// Total size in bytes of every layer and level of a texture.
pub fn texture_storage_size(desc: &TextureDescriptor) -> u64 {
    subresource_offset(desc, desc.layer_count(), 0)
}

/// Byte offset of texel (`x`, `y`, `z`) inside a packed mip level of extent
/// `level_extent`. `x` and `y` are rounded down to their block.
pub fn region_byte_offset(format: SurfaceFormat, level_extent: Extent3d, x: u32, y: u32, z: u32) -> u64 {
    let block = format.block_info();
    let row_pitch = level_extent.width.div_ceil(block.width) as u64 * block.bytes as u64;
    let slice_pitch = row_pitch * level_extent.height.div_ceil(block.height) as u64;
    z as u64 * slice_pitch + (y / block.height) as u64 * row_pitch + (x / block.width) as u64 * block.bytes as u64
}

/// One contiguous run of bytes shared by a region's packed data and the
/// packed level storage it maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowSpan {
    /// Offset into the region's packed data.
    pub packed_offset: usize,
    /// Offset into the level's packed storage.
    pub level_offset: usize,
    /// Length in bytes.
    pub len: usize,
}

/// Enumerate the block rows of `region` as copy spans between its packed
/// data and the packed storage of a level of extent `level_extent`.
///
/// `layout` must be the result of [`region_layout`] for the same inputs.
pub fn region_rows(
    format: SurfaceFormat,
    level_extent: Extent3d,
    region: &TextureRegion,
    layout: &SubresourceLayout,
) -> impl Iterator<Item = RowSpan> {
    let block = layout.block;
    let level_row_pitch = level_extent.width.div_ceil(block.width) as usize * block.bytes as usize;
    let level_slice_pitch = level_row_pitch * level_extent.height.div_ceil(block.height) as usize;
    let origin = region_byte_offset(format, level_extent, region.x, region.y, region.z) as usize;
    let row_pitch = layout.row_pitch as usize;
    let slice_pitch = layout.slice_pitch as usize;
    let rows = layout.rows_per_slice as usize;
    (0..layout.slices as usize).flat_map(move |slice| {
        (0..rows).map(move |row| RowSpan {
            packed_offset: slice * slice_pitch + row * row_pitch,
            level_offset: origin + slice * level_slice_pitch + row * level_row_pitch,
            len: row_pitch,
        })
    })
}

// ============================================================================
// Descriptor validation
// ============================================================================

/// Check a texture descriptor's intrinsic consistency.
///
/// Capability limits (maximum sizes, format support) are checked by the
/// device; this only rejects descriptors no backend could represent.
pub fn validate_descriptor(desc: &TextureDescriptor) -> GraphicsResult<()> {
    if desc.size.is_empty() {
        return Err(GraphicsError::InvalidDimensions(format!(
            "texture size {}x{}x{} has a zero dimension",
            desc.size.width, desc.size.height, desc.size.depth
        )));
    }
    if desc.kind == TextureKind::Cube && desc.size.width != desc.size.height {
        return Err(GraphicsError::InvalidDimensions(format!(
            "cube faces must be square, got {}x{}",
            desc.size.width, desc.size.height
        )));
    }
    if desc.level_count == 0 {
        return Err(GraphicsError::InvalidDimensions(
            "level count must be at least 1".into(),
        ));
    }
    let max_levels = max_mip_levels(desc.size);
    if desc.level_count > max_levels {
        return Err(GraphicsError::InvalidDimensions(format!(
            "level count {} exceeds full mip chain of {} for {}x{}x{}",
            desc.level_count, max_levels, desc.size.width, desc.size.height, desc.size.depth
        )));
    }
    if desc.format.is_block_compressed() {
        if desc.kind == TextureKind::Texture3D {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "{:?} volume textures",
                desc.format
            )));
        }
        let block = desc.format.block_info();
        if desc.size.width % block.width != 0 || desc.size.height % block.height != 0 {
            return Err(GraphicsError::InvalidDimensions(format!(
                "{:?} base level {}x{} is not a multiple of the {}x{} block",
                desc.format, desc.size.width, desc.size.height, block.width, block.height
            )));
        }
    }
    if desc.is_render_target && !desc.format.is_renderable() {
        return Err(GraphicsError::UnsupportedFormat(format!(
            "{:?} cannot be a render target",
            desc.format
        )));
    }
    Ok(())
}
