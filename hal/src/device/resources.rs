//! Texture, renderbuffer and buffer entry points.

use crate::addressing::{TextureRegion, mip_level_extent, region_layout, validate_descriptor};
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{BufferHandle, RenderbufferHandle, TextureHandle};
use crate::registry::{
    BufferRecord, RenderbufferKind, RenderbufferRecord, TextureRecord,
};
use crate::types::{
    BufferDescriptor, BufferKind, BufferUsage, CubeMapFace, DepthFormat, IndexElementSize,
    SetDataOptions, SurfaceFormat, TextureDescriptor, TextureKind,
};

use super::Device;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Write,
    Read,
}

impl Device {
    // ========================================================================
    // Textures
    // ========================================================================

    /// Create a 2D texture.
    ///
    /// # Errors
    ///
    /// - `InvalidDimensions` for a zero or over-limit size, or a level count
    ///   above the full mip chain
    /// - `UnsupportedFormat` for a compressed format the device lacks, or a
    ///   compressed render target
    pub fn create_texture_2d(
        &mut self,
        format: SurfaceFormat,
        width: u32,
        height: u32,
        level_count: u32,
        is_render_target: bool,
    ) -> GraphicsResult<TextureHandle> {
        self.create_texture(TextureDescriptor::new_2d(
            format,
            width,
            height,
            level_count,
            is_render_target,
        ))
    }

    /// Create a volume texture.
    pub fn create_texture_3d(
        &mut self,
        format: SurfaceFormat,
        width: u32,
        height: u32,
        depth: u32,
        level_count: u32,
    ) -> GraphicsResult<TextureHandle> {
        self.create_texture(TextureDescriptor::new_3d(
            format,
            width,
            height,
            depth,
            level_count,
        ))
    }

    /// Create a cube texture with `size` x `size` faces.
    pub fn create_texture_cube(
        &mut self,
        format: SurfaceFormat,
        size: u32,
        level_count: u32,
        is_render_target: bool,
    ) -> GraphicsResult<TextureHandle> {
        self.create_texture(TextureDescriptor::new_cube(
            format,
            size,
            level_count,
            is_render_target,
        ))
    }

    fn create_texture(&mut self, desc: TextureDescriptor) -> GraphicsResult<TextureHandle> {
        validate_descriptor(&desc)?;
        let limit = match desc.kind {
            TextureKind::Texture3D => self.caps.max_texture_size_3d,
            TextureKind::Texture2D | TextureKind::Cube => self.caps.max_texture_size,
        };
        let size = desc.size;
        if size.width > limit || size.height > limit || size.depth > limit {
            return Err(GraphicsError::InvalidDimensions(format!(
                "{:?} texture {}x{}x{} exceeds device maximum {}",
                desc.kind, size.width, size.height, size.depth, limit
            )));
        }
        let supported = match desc.format {
            SurfaceFormat::Dxt1 => self.caps.supports_dxt1,
            SurfaceFormat::Dxt3 | SurfaceFormat::Dxt5 => self.caps.supports_s3tc,
            _ => true,
        };
        if !supported {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "{:?} is not supported by this device",
                desc.format
            )));
        }

        let raw = self.backend.create_texture(&desc)?;
        let handle = self.registry.textures.insert(TextureRecord { desc, raw });
        log::trace!(
            "Device: created texture {:?} ({:?} {:?} {}x{}x{}, {} levels)",
            handle,
            desc.kind,
            desc.format,
            size.width,
            size.height,
            size.depth,
            desc.level_count
        );
        Ok(handle)
    }

    /// Descriptor of a live texture.
    pub fn texture_descriptor(&self, texture: TextureHandle) -> GraphicsResult<TextureDescriptor> {
        Ok(self.registry.textures.get(texture)?.desc)
    }

    /// Write `data` into a region of a 2D texture level.
    #[allow(clippy::too_many_arguments)]
    pub fn set_texture_data_2d(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        level: u32,
        data: &[u8],
    ) -> GraphicsResult<()> {
        let region = TextureRegion::new_2d(x, y, width, height, level);
        self.write_texture(texture, TextureKind::Texture2D, &region, data)
    }

    /// Write `data` into a box of a volume texture level.
    #[allow(clippy::too_many_arguments)]
    pub fn set_texture_data_3d(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
        level: u32,
        data: &[u8],
    ) -> GraphicsResult<()> {
        let region = TextureRegion::new_3d(x, y, z, width, height, depth, level);
        self.write_texture(texture, TextureKind::Texture3D, &region, data)
    }

    /// Write `data` into a region of one cube face level.
    #[allow(clippy::too_many_arguments)]
    pub fn set_texture_data_cube(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        face: CubeMapFace,
        level: u32,
        data: &[u8],
    ) -> GraphicsResult<()> {
        let region = TextureRegion::new_2d(x, y, width, height, level).on_layer(face.layer());
        self.write_texture(texture, TextureKind::Cube, &region, data)
    }

    /// Upload a planar YUV frame into three `Alpha8` textures.
    ///
    /// `data` holds the full Y plane followed by the U and V planes, tightly
    /// packed.
    #[allow(clippy::too_many_arguments)]
    pub fn set_texture_data_yuv(
        &mut self,
        y: TextureHandle,
        u: TextureHandle,
        v: TextureHandle,
        y_width: u32,
        y_height: u32,
        uv_width: u32,
        uv_height: u32,
        data: &[u8],
    ) -> GraphicsResult<()> {
        let y_size = y_width as usize * y_height as usize;
        let uv_size = uv_width as usize * uv_height as usize;
        if data.len() != y_size + 2 * uv_size {
            return Err(GraphicsError::OutOfRange(format!(
                "YUV data of {} bytes, planes need {}",
                data.len(),
                y_size + 2 * uv_size
            )));
        }
        for plane in [y, u, v] {
            let format = self.registry.textures.get(plane)?.desc.format;
            if format != SurfaceFormat::Alpha8 {
                return Err(GraphicsError::UnsupportedFormat(format!(
                    "YUV plane {plane:?} is {format:?}, expected Alpha8"
                )));
            }
        }
        let (y_data, rest) = data.split_at(y_size);
        let (u_data, v_data) = rest.split_at(uv_size);
        let y_region = TextureRegion::new_2d(0, 0, y_width, y_height, 0);
        let uv_region = TextureRegion::new_2d(0, 0, uv_width, uv_height, 0);
        let planes = [(y, &y_region, y_data), (u, &uv_region, u_data), (v, &uv_region, v_data)];
        // All planes are checked before any of them is written.
        for (plane, region, plane_data) in planes {
            self.check_texture_transfer(plane, TextureKind::Texture2D, region, plane_data.len())?;
        }
        for (plane, region, plane_data) in planes {
            self.write_texture(plane, TextureKind::Texture2D, region, plane_data)?;
        }
        Ok(())
    }

    /// Read a region of a 2D texture level into `out`.
    #[allow(clippy::too_many_arguments)]
    pub fn get_texture_data_2d(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        level: u32,
        out: &mut [u8],
    ) -> GraphicsResult<()> {
        let region = TextureRegion::new_2d(x, y, width, height, level);
        self.read_texture(texture, TextureKind::Texture2D, &region, out)
    }

    /// Read a box of a volume texture level into `out`.
    #[allow(clippy::too_many_arguments)]
    pub fn get_texture_data_3d(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
        level: u32,
        out: &mut [u8],
    ) -> GraphicsResult<()> {
        let region = TextureRegion::new_3d(x, y, z, width, height, depth, level);
        self.read_texture(texture, TextureKind::Texture3D, &region, out)
    }

    /// Read a region of one cube face level into `out`.
    #[allow(clippy::too_many_arguments)]
    pub fn get_texture_data_cube(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        face: CubeMapFace,
        level: u32,
        out: &mut [u8],
    ) -> GraphicsResult<()> {
        let region = TextureRegion::new_2d(x, y, width, height, level).on_layer(face.layer());
        self.read_texture(texture, TextureKind::Cube, &region, out)
    }

    /// Check a transfer against the texture and wait for its last use.
    fn prepare_texture_transfer(
        &mut self,
        texture: TextureHandle,
        kind: TextureKind,
        region: &TextureRegion,
        len: usize,
        direction: Transfer,
    ) -> GraphicsResult<crate::backend::RawResource> {
        let raw = self.check_texture_transfer(texture, kind, region, len)?;
        if let Some(last_use) = self.registry.textures.last_use(texture) {
            self.wait_for_use(last_use);
        }
        log::trace!(
            "Device: {} texture {:?} level {} layer {} ({} bytes)",
            if direction == Transfer::Write { "write" } else { "read" },
            texture,
            region.level,
            region.layer,
            len
        );
        Ok(raw)
    }

    fn check_texture_transfer(
        &self,
        texture: TextureHandle,
        kind: TextureKind,
        region: &TextureRegion,
        len: usize,
    ) -> GraphicsResult<crate::backend::RawResource> {
        let record = self.registry.textures.get(texture)?;
        let desc = record.desc;
        let raw = record.raw;
        if desc.kind != kind {
            return Err(GraphicsError::PreconditionViolation(format!(
                "{:?} transfer on {:?} texture {:?}",
                kind, desc.kind, texture
            )));
        }
        if region.level >= desc.level_count {
            return Err(GraphicsError::OutOfRange(format!(
                "level {} of a {}-level texture",
                region.level, desc.level_count
            )));
        }
        let extent = mip_level_extent(desc.size, region.level);
        let layout = region_layout(desc.format, extent, region)?;
        if len as u64 != layout.size_in_bytes {
            return Err(GraphicsError::OutOfRange(format!(
                "{} bytes for a region of {} bytes",
                len, layout.size_in_bytes
            )));
        }
        Ok(raw)
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        kind: TextureKind,
        region: &TextureRegion,
        data: &[u8],
    ) -> GraphicsResult<()> {
        let raw =
            self.prepare_texture_transfer(texture, kind, region, data.len(), Transfer::Write)?;
        self.backend.write_texture(raw, region, data)?;
        Ok(())
    }

    fn read_texture(
        &mut self,
        texture: TextureHandle,
        kind: TextureKind,
        region: &TextureRegion,
        out: &mut [u8],
    ) -> GraphicsResult<()> {
        crate::profile_scope!("read_texture");
        let raw =
            self.prepare_texture_transfer(texture, kind, region, out.len(), Transfer::Read)?;
        self.backend.read_texture(raw, region, out)?;
        Ok(())
    }

    // ========================================================================
    // Renderbuffers
    // ========================================================================

    /// Create a multisampled color renderbuffer that resolves into
    /// `texture`.
    ///
    /// The multisample count is clamped to the device maximum.
    pub fn gen_color_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: SurfaceFormat,
        multisample_count: u32,
        texture: TextureHandle,
    ) -> GraphicsResult<RenderbufferHandle> {
        self.check_renderbuffer_size(width, height)?;
        if !format.is_renderable() {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "{format:?} cannot back a color renderbuffer"
            )));
        }
        let record = self.registry.textures.get(texture)?;
        if record.desc.format != format
            || record.desc.size.width != width
            || record.desc.size.height != height
        {
            return Err(GraphicsError::PreconditionViolation(format!(
                "renderbuffer {width}x{height} {format:?} does not match resolve texture {texture:?}"
            )));
        }
        let texture_raw = record.raw;
        let samples = self.clamp_multisample(multisample_count);
        let raw = self
            .backend
            .create_color_renderbuffer(width, height, format, samples, texture_raw)?;
        let handle = self.registry.renderbuffers.insert(RenderbufferRecord {
            kind: RenderbufferKind::Color { format, texture },
            width,
            height,
            multisample_count: samples,
            raw,
        });
        log::trace!(
            "Device: created color renderbuffer {:?} ({}x{} {:?}, {}x MSAA)",
            handle,
            width,
            height,
            format,
            samples
        );
        Ok(handle)
    }

    /// Create a depth/stencil renderbuffer.
    pub fn gen_depth_stencil_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
        format: DepthFormat,
        multisample_count: u32,
    ) -> GraphicsResult<RenderbufferHandle> {
        self.check_renderbuffer_size(width, height)?;
        if format == DepthFormat::None {
            return Err(GraphicsError::UnsupportedFormat(
                "depth renderbuffer needs a depth format".into(),
            ));
        }
        let samples = self.clamp_multisample(multisample_count);
        let raw = self
            .backend
            .create_depth_stencil_renderbuffer(width, height, format, samples)?;
        let handle = self.registry.renderbuffers.insert(RenderbufferRecord {
            kind: RenderbufferKind::DepthStencil(format),
            width,
            height,
            multisample_count: samples,
            raw,
        });
        log::trace!(
            "Device: created depth renderbuffer {:?} ({}x{} {:?}, {}x MSAA)",
            handle,
            width,
            height,
            format,
            samples
        );
        Ok(handle)
    }

    /// Multisample count a renderbuffer actually got.
    pub fn renderbuffer_multisample_count(
        &self,
        renderbuffer: RenderbufferHandle,
    ) -> GraphicsResult<u32> {
        Ok(self.registry.renderbuffers.get(renderbuffer)?.multisample_count)
    }

    fn check_renderbuffer_size(&self, width: u32, height: u32) -> GraphicsResult<()> {
        let max = self.caps.max_texture_size;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GraphicsError::InvalidDimensions(format!(
                "renderbuffer size {width}x{height} (maximum {max})"
            )));
        }
        Ok(())
    }

    fn clamp_multisample(&self, requested: u32) -> u32 {
        let max = self.caps.max_multisample_count;
        if requested > max {
            log::debug!("Device: multisample count {} clamped to {}", requested, max);
            max
        } else {
            requested
        }
    }

    // ========================================================================
    // Buffers
    // ========================================================================

    /// Create a vertex buffer of `vertex_count` vertices of `vertex_stride`
    /// bytes.
    pub fn gen_vertex_buffer(
        &mut self,
        dynamic: bool,
        usage: BufferUsage,
        vertex_count: u32,
        vertex_stride: u32,
    ) -> GraphicsResult<BufferHandle> {
        self.create_buffer(BufferDescriptor::vertex(
            dynamic,
            usage,
            vertex_count,
            vertex_stride,
        ))
    }

    /// Create an index buffer of `index_count` indices.
    pub fn gen_index_buffer(
        &mut self,
        dynamic: bool,
        usage: BufferUsage,
        index_count: u32,
        element_size: IndexElementSize,
    ) -> GraphicsResult<BufferHandle> {
        self.create_buffer(BufferDescriptor::index(
            dynamic,
            usage,
            index_count,
            element_size,
        ))
    }

    fn create_buffer(&mut self, desc: BufferDescriptor) -> GraphicsResult<BufferHandle> {
        if desc.element_count == 0 || desc.element_size() == 0 {
            return Err(GraphicsError::InvalidDimensions(format!(
                "buffer of {} elements of {} bytes",
                desc.element_count,
                desc.element_size()
            )));
        }
        let size = desc.size_in_bytes().ok_or_else(|| {
            GraphicsError::InvalidDimensions("buffer size overflows u64".into())
        })?;
        let raw = self.backend.create_buffer(&desc)?;
        let handle = self.registry.buffers.insert(BufferRecord { desc, raw });
        log::trace!(
            "Device: created {:?} buffer {:?} ({} bytes, dynamic={})",
            desc.kind,
            handle,
            size,
            desc.dynamic
        );
        Ok(handle)
    }

    /// Size of a buffer in bytes.
    pub fn buffer_size(&self, buffer: BufferHandle) -> GraphicsResult<u64> {
        let desc = self.registry.buffers.get(buffer)?.desc;
        Ok(desc.size_in_bytes().unwrap_or(u64::MAX))
    }

    /// Write `data` into a vertex buffer at byte `offset`.
    pub fn set_vertex_buffer_data(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
        options: SetDataOptions,
    ) -> GraphicsResult<()> {
        self.set_buffer_data(buffer, true, offset, data, options)
    }

    /// Write `data` into an index buffer at byte `offset`.
    pub fn set_index_buffer_data(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
        options: SetDataOptions,
    ) -> GraphicsResult<()> {
        self.set_buffer_data(buffer, false, offset, data, options)
    }

    /// Read vertex data starting at byte `offset`.
    ///
    /// Gathers `out.len() / element_size` elements of `element_size` bytes,
    /// `vertex_stride` bytes apart; a stride of 0 means tightly packed.
    pub fn get_vertex_buffer_data(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        out: &mut [u8],
        element_size: u32,
        vertex_stride: u32,
    ) -> GraphicsResult<()> {
        if element_size == 0 || out.len() % element_size as usize != 0 {
            return Err(GraphicsError::OutOfRange(format!(
                "{} bytes is not a whole number of {}-byte elements",
                out.len(),
                element_size
            )));
        }
        let stride = if vertex_stride == 0 { element_size } else { vertex_stride };
        if stride < element_size {
            return Err(GraphicsError::OutOfRange(format!(
                "stride {stride} shorter than element size {element_size}"
            )));
        }
        let count = (out.len() / element_size as usize) as u64;
        if count == 0 {
            return Ok(());
        }
        if stride == element_size {
            return self.get_buffer_data(buffer, true, offset, out);
        }
        let size = self.buffer_record(buffer, true)?.desc.size_in_bytes().unwrap_or(u64::MAX);
        let span = (count - 1)
            .checked_mul(stride as u64)
            .and_then(|span| span.checked_add(element_size as u64))
            .and_then(|span| usize::try_from(span).ok())
            .ok_or_else(|| {
                GraphicsError::OutOfRange(format!(
                    "{count} elements at stride {stride} overflow the address space"
                ))
            })?;
        Self::check_buffer_range(size, offset, span)?;
        let mut scratch = vec![0u8; span];
        self.get_buffer_data(buffer, true, offset, &mut scratch)?;
        for (i, chunk) in out.chunks_exact_mut(element_size as usize).enumerate() {
            let start = i * stride as usize;
            chunk.copy_from_slice(&scratch[start..start + element_size as usize]);
        }
        Ok(())
    }

    /// Read index data starting at byte `offset`.
    pub fn get_index_buffer_data(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        out: &mut [u8],
    ) -> GraphicsResult<()> {
        self.get_buffer_data(buffer, false, offset, out)
    }

    fn buffer_record(&self, buffer: BufferHandle, vertex: bool) -> GraphicsResult<&BufferRecord> {
        let record = self.registry.buffers.get(buffer)?;
        let is_vertex = matches!(record.desc.kind, BufferKind::Vertex { .. });
        if is_vertex != vertex {
            return Err(GraphicsError::PreconditionViolation(format!(
                "{:?} is not a {} buffer",
                buffer,
                if vertex { "vertex" } else { "index" }
            )));
        }
        Ok(record)
    }

    fn check_buffer_range(size: u64, offset: u64, len: usize) -> GraphicsResult<()> {
        let end = offset.checked_add(len as u64);
        if end.is_none_or(|end| end > size) {
            return Err(GraphicsError::OutOfRange(format!(
                "range {offset}+{len} exceeds buffer of {size} bytes"
            )));
        }
        Ok(())
    }

    fn set_buffer_data(
        &mut self,
        buffer: BufferHandle,
        vertex: bool,
        offset: u64,
        data: &[u8],
        options: SetDataOptions,
    ) -> GraphicsResult<()> {
        let record = self.buffer_record(buffer, vertex)?;
        let (desc, raw) = (record.desc, record.raw);
        Self::check_buffer_range(desc.size_in_bytes().unwrap_or(u64::MAX), offset, data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        let mut options = if desc.dynamic { options } else { SetDataOptions::None };
        if options == SetDataOptions::NoOverwrite && !self.caps.supports_no_overwrite {
            log::debug!("Device: NoOverwrite unsupported, writing {:?} synchronously", buffer);
            options = SetDataOptions::None;
        }
        if options == SetDataOptions::None {
            if let Some(last_use) = self.registry.buffers.last_use(buffer) {
                self.wait_for_use(last_use);
            }
        }
        self.backend.write_buffer(raw, offset, data, options)?;
        Ok(())
    }

    fn get_buffer_data(
        &mut self,
        buffer: BufferHandle,
        vertex: bool,
        offset: u64,
        out: &mut [u8],
    ) -> GraphicsResult<()> {
        crate::profile_scope!("get_buffer_data");
        let record = self.buffer_record(buffer, vertex)?;
        let (desc, raw) = (record.desc, record.raw);
        if desc.usage == BufferUsage::WriteOnly {
            return Err(GraphicsError::PreconditionViolation(format!(
                "{buffer:?} is write-only"
            )));
        }
        Self::check_buffer_range(desc.size_in_bytes().unwrap_or(u64::MAX), offset, out.len())?;
        if out.is_empty() {
            return Ok(());
        }
        if let Some(last_use) = self.registry.buffers.last_use(buffer) {
            self.wait_for_use(last_use);
        }
        self.backend.read_buffer(raw, offset, out)?;
        Ok(())
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::super::tests::{device, device_with};
    use super::*;
    use crate::device::DeviceCapabilities;

    #[test]
    fn test_texture_creation_validation() {
        let (mut device, _) = device();
        assert!(matches!(
            device.create_texture_2d(SurfaceFormat::Color, 0, 4, 1, false),
            Err(GraphicsError::InvalidDimensions(_))
        ));
        assert!(matches!(
            device.create_texture_2d(SurfaceFormat::Color, 4, 4, 4, false),
            Err(GraphicsError::InvalidDimensions(_))
        ));
        assert!(matches!(
            device.create_texture_2d(SurfaceFormat::Color, 32768, 4, 1, false),
            Err(GraphicsError::InvalidDimensions(_))
        ));
        assert!(matches!(
            device.create_texture_2d(SurfaceFormat::Dxt5, 16, 16, 1, true),
            Err(GraphicsError::UnsupportedFormat(_))
        ));
        assert_eq!(device.resource_counts().textures, 0);
    }

    #[test]
    fn test_compressed_formats_follow_capabilities() {
        let caps = DeviceCapabilities {
            supports_s3tc: false,
            ..DeviceCapabilities::default()
        };
        let (mut device, _) = device_with(caps, 1);
        assert!(device.create_texture_2d(SurfaceFormat::Dxt1, 8, 8, 1, false).is_ok());
        assert!(matches!(
            device.create_texture_2d(SurfaceFormat::Dxt3, 8, 8, 1, false),
            Err(GraphicsError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_texture_transfer_checks() {
        let (mut device, _) = device();
        let tex = device.create_texture_2d(SurfaceFormat::Color, 8, 8, 2, false).unwrap();
        let data = vec![7u8; 4 * 4 * 4];
        device.set_texture_data_2d(tex, 4, 4, 4, 4, 0, &data).unwrap();
        assert!(matches!(
            device.set_texture_data_2d(tex, 0, 0, 4, 4, 2, &data),
            Err(GraphicsError::OutOfRange(_))
        ));
        assert!(matches!(
            device.set_texture_data_2d(tex, 0, 0, 4, 4, 0, &data[1..]),
            Err(GraphicsError::OutOfRange(_))
        ));
        assert!(matches!(
            device.set_texture_data_cube(tex, 0, 0, 4, 4, CubeMapFace::PositiveX, 0, &data),
            Err(GraphicsError::PreconditionViolation(_))
        ));
        let mut out = vec![0u8; 16];
        device.get_texture_data_2d(tex, 5, 5, 2, 2, 0, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_cube_faces_are_independent() {
        let (mut device, _) = device();
        let cube = device.create_texture_cube(SurfaceFormat::Alpha8, 4, 1, false).unwrap();
        for face in CubeMapFace::ALL {
            let fill = vec![face.layer() as u8 + 1; 16];
            device.set_texture_data_cube(cube, 0, 0, 4, 4, face, 0, &fill).unwrap();
        }
        let mut out = vec![0u8; 16];
        device
            .get_texture_data_cube(cube, 0, 0, 4, 4, CubeMapFace::NegativeY, 0, &mut out)
            .unwrap();
        assert!(out.iter().all(|&b| b == CubeMapFace::NegativeY.layer() as u8 + 1));
    }

    #[test]
    fn test_volume_round_trip() {
        let (mut device, _) = device();
        let vol = device.create_texture_3d(SurfaceFormat::Alpha8, 4, 4, 4, 1).unwrap();
        let data: Vec<u8> = (0..8).collect();
        device.set_texture_data_3d(vol, 1, 1, 1, 2, 2, 2, 0, &data).unwrap();
        let mut out = vec![0u8; 8];
        device.get_texture_data_3d(vol, 1, 1, 1, 2, 2, 2, 0, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_yuv_planes() {
        let (mut device, _) = device();
        let y = device.create_texture_2d(SurfaceFormat::Alpha8, 4, 2, 1, false).unwrap();
        let u = device.create_texture_2d(SurfaceFormat::Alpha8, 2, 1, 1, false).unwrap();
        let v = device.create_texture_2d(SurfaceFormat::Alpha8, 2, 1, 1, false).unwrap();
        let mut data = vec![1u8; 8];
        data.extend([2, 2, 3, 3]);
        device.set_texture_data_yuv(y, u, v, 4, 2, 2, 1, &data).unwrap();
        let mut out = [0u8; 2];
        device.get_texture_data_2d(v, 0, 0, 2, 1, 0, &mut out).unwrap();
        assert_eq!(out, [3, 3]);
        assert!(matches!(
            device.set_texture_data_yuv(y, u, v, 4, 2, 2, 1, &data[1..]),
            Err(GraphicsError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_yuv_rejects_undersized_plane_without_writing() {
        let (mut device, _) = device();
        let y = device.create_texture_2d(SurfaceFormat::Alpha8, 4, 2, 1, false).unwrap();
        let u = device.create_texture_2d(SurfaceFormat::Alpha8, 1, 1, 1, false).unwrap();
        let v = device.create_texture_2d(SurfaceFormat::Alpha8, 2, 1, 1, false).unwrap();
        let data = [7u8; 12];
        assert!(matches!(
            device.set_texture_data_yuv(y, u, v, 4, 2, 2, 1, &data),
            Err(GraphicsError::OutOfRange(_))
        ));
        let mut out = [0xAAu8; 8];
        device.get_texture_data_2d(y, 0, 0, 4, 2, 0, &mut out).unwrap();
        assert_eq!(out, [0; 8]);
    }

    #[test]
    fn test_renderbuffer_multisample_clamped() {
        let (mut device, _) = device();
        let max = device.max_multisample_count();
        let rb = device
            .gen_depth_stencil_renderbuffer(16, 16, DepthFormat::D24S8, max * 4)
            .unwrap();
        assert_eq!(device.renderbuffer_multisample_count(rb).unwrap(), max);
        assert!(device
            .gen_depth_stencil_renderbuffer(16, 16, DepthFormat::None, 0)
            .is_err());
    }

    #[test]
    fn test_buffer_options_and_usage() {
        let (mut device, _) = device();
        let vb = device.gen_vertex_buffer(true, BufferUsage::None, 4, 8).unwrap();
        assert_eq!(device.buffer_size(vb).unwrap(), 32);
        device
            .set_vertex_buffer_data(vb, 8, &[1; 8], SetDataOptions::None)
            .unwrap();
        device
            .set_vertex_buffer_data(vb, 0, &[2; 8], SetDataOptions::Discard)
            .unwrap();
        let mut out = [9u8; 16];
        device.get_vertex_buffer_data(vb, 0, &mut out, 16, 0).unwrap();
        assert_eq!(out[..8], [2; 8]);
        assert_eq!(out[8..], [0; 8]);
        assert!(matches!(
            device.set_vertex_buffer_data(vb, 30, &[0; 4], SetDataOptions::None),
            Err(GraphicsError::OutOfRange(_))
        ));
        assert!(matches!(
            device.set_index_buffer_data(vb, 0, &[0; 4], SetDataOptions::None),
            Err(GraphicsError::PreconditionViolation(_))
        ));

        let ib = device
            .gen_index_buffer(false, BufferUsage::WriteOnly, 4, IndexElementSize::Bits16)
            .unwrap();
        device
            .set_index_buffer_data(ib, 0, &[1, 0, 2, 0], SetDataOptions::None)
            .unwrap();
        let mut indices = [0u8; 4];
        assert!(matches!(
            device.get_index_buffer_data(ib, 0, &mut indices),
            Err(GraphicsError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_strided_vertex_read() {
        let (mut device, _) = device();
        let vb = device.gen_vertex_buffer(false, BufferUsage::None, 3, 4).unwrap();
        device
            .set_vertex_buffer_data(vb, 0, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12], SetDataOptions::None)
            .unwrap();
        let mut out = [0u8; 6];
        device.get_vertex_buffer_data(vb, 1, &mut out, 2, 4).unwrap();
        assert_eq!(out, [2, 3, 6, 7, 10, 11]);
        let mut too_far = [0u8; 6];
        assert!(device.get_vertex_buffer_data(vb, 2, &mut too_far, 2, 4).is_ok());
        let mut past_end = [0u8; 8];
        assert!(matches!(
            device.get_vertex_buffer_data(vb, 1, &mut past_end, 2, 4),
            Err(GraphicsError::OutOfRange(_))
        ));
        // A stride far past the buffer fails before any staging is sized.
        assert!(matches!(
            device.get_vertex_buffer_data(vb, 0, &mut out, 2, u32::MAX),
            Err(GraphicsError::OutOfRange(_))
        ));
    }
}
