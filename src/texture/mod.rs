//! Texture Upload Pipeline
//!
//! # Overview
//!
//! Validates and normalizes texture image specification and updates:
//!
//! 1. **Specification**: level, size and border against the limits.
//! 2. **Selection**: sub-image rectangles lie inside the allocated image.
//! 3. **Unpack folding**: pixel store state becomes one
//!    [`UnpackDescriptor`].
//! 4. **Sizing**: the bytes an upload reads are computed with checked
//!    arithmetic. Overflow is `OUT_OF_MEMORY`; a short source is
//!    `INVALID_OPERATION` and never reaches the driver.
//! 5. **Fast path or conversion**: uploads the backend can take directly
//!    pass through untouched. Everything else goes through a CPU pass
//!    (row repacking, flip, alpha handling, RGBA8 to the destination
//!    format), unless `UNPACK_REQUIRE_FASTPATH` turns that into an error.
//!
//! Which uploads count as fast is decided by
//! [`GlBackend::is_fast_upload_eligible`](crate::backend::GlBackend::is_fast_upload_eligible).

mod convert;
pub mod formats;
mod unpack;

pub use unpack::{UnpackDescriptor, UnpackLayout};

use formats::ResolvedFormat;

use crate::backend::{TexStorageDesc, TexUpload, UploadData, UploadShape, UploadSourceKind};
use crate::context::{Failure, Limits, Validated, WebGlContext};
use crate::gl::{self, GLenum};
use crate::objects::{ImageInfo, SlotRef, TextureId, face_index};

// ============================================================================
// Pixel Sources
// ============================================================================

/// Decoded pixels of a document image element.
#[derive(Debug, Clone, Copy)]
pub struct DomImage<'a> {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows, top row first.
    pub pixels: &'a [u8],
    pub premultiplied: bool,
}

/// Where the pixels of an upload come from.
#[derive(Debug, Clone, Copy)]
pub enum TexSource<'a> {
    /// `null` data: zero-initialised storage.
    Zeroed,
    /// Client memory laid out per the unpack state.
    Bytes(&'a [u8]),
    /// Byte offset into the bound `PIXEL_UNPACK_BUFFER`.
    Pbo { offset: i64 },
    Image(DomImage<'a>),
}

/// Upload data after the fast-path decision.
enum Prepared<'a> {
    Zeroed,
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
    Pbo(u64),
}

impl Prepared<'_> {
    fn as_upload(&self) -> UploadData<'_> {
        match self {
            Self::Zeroed => UploadData::Zeroed,
            Self::Borrowed(bytes) => UploadData::Bytes(bytes),
            Self::Owned(bytes) => UploadData::Bytes(bytes),
            Self::Pbo(offset) => UploadData::Pbo(*offset),
        }
    }
}

/// One `texImage*` / `texSubImage*` call, before validation.
#[derive(Debug, Clone, Copy)]
struct ImageRequest {
    is_3d: bool,
    image_target: GLenum,
    level: i32,
    offset: [i32; 3],
    size: [i32; 3],
    border: i32,
    /// `None` for sub-image updates.
    internal_format: Option<GLenum>,
    format: GLenum,
    ty: GLenum,
}

fn to_u32s(values: [i32; 3], what: &str) -> Validated<[u32; 3]> {
    let mut out = [0; 3];
    for (dst, value) in out.iter_mut().zip(values) {
        *dst = u32::try_from(value).map_err(|_| Failure::invalid_value(format!("{what} must be >= 0.")))?;
    }
    Ok(out)
}

/// Largest `(width/height, depth)` for a bind target.
fn max_extent(limits: &Limits, bind_target: GLenum) -> (u32, u32) {
    match bind_target {
        gl::TEXTURE_CUBE_MAP => (limits.max_cube_map_texture_size, 1),
        gl::TEXTURE_3D => (limits.max_3d_texture_size, limits.max_3d_texture_size),
        gl::TEXTURE_2D_ARRAY => (limits.max_texture_size, limits.max_array_texture_layers),
        _ => (limits.max_texture_size, 1),
    }
}

impl WebGlContext {
    // ========================================================================
    // Target & Size Validation
    // ========================================================================

    /// Maps an image target to its bind target.
    fn image_bind_target(&self, image_target: GLenum, is_3d: bool) -> Validated<GLenum> {
        let bind_target = match image_target {
            gl::TEXTURE_2D if !is_3d => gl::TEXTURE_2D,
            gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z if !is_3d => gl::TEXTURE_CUBE_MAP,
            gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY if is_3d => image_target,
            _ => {
                return Err(Failure::invalid_enum(format!(
                    "Bad image target: 0x{image_target:04x}"
                )));
            }
        };
        self.validate_texture_target(bind_target)?;
        Ok(bind_target)
    }

    fn require_texture_for(&self, bind_target: GLenum) -> Validated<TextureId> {
        match SlotRef::resolve(self.bound_texture(bind_target), &self.objects.textures) {
            SlotRef::Live(id) => Ok(id),
            SlotRef::Deleted(_) | SlotRef::Empty => Err(Failure::invalid_operation(format!(
                "No texture bound to 0x{bind_target:04x}."
            ))),
        }
    }

    fn validate_image_size(&self, bind_target: GLenum, level: u32, size: [u32; 3]) -> Validated<()> {
        let (max_size, max_depth) = max_extent(&self.limits, bind_target);
        if level > Limits::max_level_for(max_size) {
            return Err(Failure::invalid_value(format!("`level` ({level}) is too large.")));
        }
        let [width, height, depth] = size;
        let level_max = max_size >> level;
        let level_depth = if bind_target == gl::TEXTURE_3D {
            max_depth >> level
        } else {
            max_depth
        };
        if width > level_max || height > level_max || depth > level_depth {
            return Err(Failure::invalid_value(format!(
                "Size {width}x{height}x{depth} exceeds the limit for level {level}."
            )));
        }
        if bind_target == gl::TEXTURE_CUBE_MAP && width != height {
            return Err(Failure::invalid_value("Cube map faces must be square."));
        }
        let npot = |d: u32| d != 0 && !d.is_power_of_two();
        if !self.version.is_webgl2() && level > 0 && (npot(width) || npot(height)) {
            return Err(Failure::invalid_value(
                "Mip levels above 0 need power-of-two sizes in WebGL 1.",
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Entry Points
    // ========================================================================

    /// `texImage2D`. An [`TexSource::Image`] must match `width`/`height`.
    pub fn tex_image_2d(
        &mut self,
        target: GLenum,
        level: i32,
        internal_format: GLenum,
        width: i32,
        height: i32,
        border: i32,
        format: GLenum,
        ty: GLenum,
        source: TexSource<'_>,
    ) {
        self.run("texImage2D", |ctx| {
            ctx.tex_image(
                ImageRequest {
                    is_3d: false,
                    image_target: target,
                    level,
                    offset: [0; 3],
                    size: [width, height, 1],
                    border,
                    internal_format: Some(internal_format),
                    format,
                    ty,
                },
                source,
            )
        });
    }

    /// `texImage2D(target, level, internalformat, format, type, source)`:
    /// the size comes from the image.
    pub fn tex_image_2d_from_image(
        &mut self,
        target: GLenum,
        level: i32,
        internal_format: GLenum,
        format: GLenum,
        ty: GLenum,
        image: DomImage<'_>,
    ) {
        let clamp = |d: u32| i32::try_from(d).unwrap_or(i32::MAX);
        let (width, height) = (clamp(image.width), clamp(image.height));
        self.tex_image_2d(
            target,
            level,
            internal_format,
            width,
            height,
            0,
            format,
            ty,
            TexSource::Image(image),
        );
    }

    /// `texImage3D` (WebGL 2).
    pub fn tex_image_3d(
        &mut self,
        target: GLenum,
        level: i32,
        internal_format: GLenum,
        size: [i32; 3],
        border: i32,
        format: GLenum,
        ty: GLenum,
        source: TexSource<'_>,
    ) {
        self.run("texImage3D", |ctx| {
            ctx.require_webgl2()?;
            ctx.tex_image(
                ImageRequest {
                    is_3d: true,
                    image_target: target,
                    level,
                    offset: [0; 3],
                    size,
                    border,
                    internal_format: Some(internal_format),
                    format,
                    ty,
                },
                source,
            )
        });
    }

    /// `texSubImage2D`.
    pub fn tex_sub_image_2d(
        &mut self,
        target: GLenum,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        width: i32,
        height: i32,
        format: GLenum,
        ty: GLenum,
        source: TexSource<'_>,
    ) {
        self.run("texSubImage2D", |ctx| {
            ctx.tex_image(
                ImageRequest {
                    is_3d: false,
                    image_target: target,
                    level,
                    offset: [xoffset, yoffset, 0],
                    size: [width, height, 1],
                    border: 0,
                    internal_format: None,
                    format,
                    ty,
                },
                source,
            )
        });
    }

    /// `texSubImage3D` (WebGL 2).
    pub fn tex_sub_image_3d(
        &mut self,
        target: GLenum,
        level: i32,
        offset: [i32; 3],
        size: [i32; 3],
        format: GLenum,
        ty: GLenum,
        source: TexSource<'_>,
    ) {
        self.run("texSubImage3D", |ctx| {
            ctx.require_webgl2()?;
            ctx.tex_image(
                ImageRequest {
                    is_3d: true,
                    image_target: target,
                    level,
                    offset,
                    size,
                    border: 0,
                    internal_format: None,
                    format,
                    ty,
                },
                source,
            )
        });
    }

    /// `texStorage2D` (WebGL 2).
    pub fn tex_storage_2d(&mut self, target: GLenum, levels: i32, internal_format: GLenum, width: i32, height: i32) {
        self.run("texStorage2D", |ctx| {
            if !matches!(target, gl::TEXTURE_2D | gl::TEXTURE_CUBE_MAP) {
                return Err(Failure::invalid_enum(format!("Bad target: 0x{target:04x}")));
            }
            ctx.tex_storage(target, levels, internal_format, [width, height, 1])
        });
    }

    /// `texStorage3D` (WebGL 2).
    pub fn tex_storage_3d(&mut self, target: GLenum, levels: i32, internal_format: GLenum, size: [i32; 3]) {
        self.run("texStorage3D", |ctx| {
            if !matches!(target, gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY) {
                return Err(Failure::invalid_enum(format!("Bad target: 0x{target:04x}")));
            }
            ctx.tex_storage(target, levels, internal_format, size)
        });
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    fn tex_image(&mut self, request: ImageRequest, source: TexSource<'_>) -> Validated<()> {
        let bind_target = self.image_bind_target(request.image_target, request.is_3d)?;
        let texture = self.require_texture_for(bind_target)?;
        let level = u32::try_from(request.level).map_err(|_| Failure::invalid_value("`level` must be >= 0."))?;
        let size = to_u32s(request.size, "Width, height and depth")?;
        let offset = to_u32s(request.offset, "Offsets")?;
        if request.border != 0 {
            return Err(Failure::invalid_value("`border` must be 0."));
        }
        self.validate_image_size(bind_target, level, size)?;

        let Some(tex) = self.objects.textures.data(texture) else {
            return Err(Failure::implementation_bug("Live texture without data."));
        };
        let resolved = match request.internal_format {
            Some(internal_format) => {
                if tex.immutable {
                    return Err(Failure::invalid_operation(
                        "Texture storage is immutable; use texSubImage.",
                    ));
                }
                let resolved = formats::resolve_tex_format(
                    self.version,
                    self.extensions_enabled,
                    internal_format,
                    request.format,
                    request.ty,
                )?;
                if bind_target == gl::TEXTURE_3D
                    && formats::sized_format(resolved.effective).is_some_and(|f| f.has_depth() || f.has_stencil())
                {
                    return Err(Failure::invalid_operation(
                        "Depth and stencil formats cannot be used with TEXTURE_3D.",
                    ));
                }
                resolved
            }
            None => {
                let Some(image) = tex.image(request.image_target, level) else {
                    return Err(Failure::invalid_operation(format!(
                        "No image has been specified for level {level}."
                    )));
                };
                let extent = [image.width, image.height, image.depth];
                let inside = offset
                    .iter()
                    .zip(size)
                    .zip(extent)
                    .all(|((o, s), e)| u64::from(*o) + u64::from(s) <= u64::from(e));
                if !inside {
                    return Err(Failure::invalid_value(
                        "Offset and size exceed the image's extent.",
                    ));
                }
                formats::resolve_sub_image_format(
                    self.version,
                    self.extensions_enabled,
                    image.internal_format,
                    request.format,
                    request.ty,
                )?
            }
        };

        let (prepared, unpack) = self.prepare_upload(&request, size, &resolved, source)?;

        let is_sub_image = request.internal_format.is_none();
        let upload = TexUpload {
            image_target: request.image_target,
            level,
            internal_format: request.internal_format.unwrap_or(resolved.effective),
            format: resolved.format,
            ty: resolved.ty,
            offset,
            size,
            is_sub_image,
            unpack,
            data: prepared.as_upload(),
        };
        if !self.backend.tex_image(&upload) {
            return Err(Failure::out_of_memory("Driver failed to allocate the texture image."));
        }

        if !is_sub_image && let Some(tex) = self.objects.textures.data_mut(texture) {
            let [width, height, depth] = size;
            tex.images.insert(
                (face_index(request.image_target), level),
                ImageInfo {
                    internal_format: resolved.effective,
                    width,
                    height,
                    depth,
                },
            );
        }
        Ok(())
    }

    /// Folds unpack state, sizes the source and picks the fast path or a
    /// CPU conversion.
    fn prepare_upload<'a>(
        &mut self,
        request: &ImageRequest,
        size: [u32; 3],
        resolved: &ResolvedFormat,
        source: TexSource<'a>,
    ) -> Validated<(Prepared<'a>, UnpackDescriptor)> {
        let unpack = UnpackDescriptor::from_pixel_store(&self.state.pixel_store, request.is_3d);
        let pbo = self.bindings.pixel_unpack_buffer;
        let reject_pbo = || {
            Failure::invalid_operation("Client data cannot be uploaded while a PIXEL_UNPACK_BUFFER is bound.")
        };
        let alpha_or_flip = unpack.flip_y || unpack.premultiply_alpha;
        let shape = |source| UploadShape {
            source,
            internal_format: resolved.effective,
            format: resolved.format,
            ty: resolved.ty,
            size,
            unpack,
        };

        match source {
            TexSource::Zeroed => {
                if request.internal_format.is_none() {
                    return Err(Failure::invalid_value("Sub-image updates require pixel data."));
                }
                if pbo.is_some() {
                    return Err(reject_pbo());
                }
                Ok((Prepared::Zeroed, UnpackDescriptor::tight()))
            }

            TexSource::Bytes(bytes) => {
                if pbo.is_some() {
                    return Err(reject_pbo());
                }
                if request.is_3d && alpha_or_flip {
                    return Err(Failure::invalid_operation(
                        "FLIP_Y and PREMULTIPLY_ALPHA are not allowed for 3D uploads from client data.",
                    ));
                }
                let layout = unpack.layout(size, resolved.bytes_per_pixel)?;
                if (bytes.len() as u64) < layout.total_bytes {
                    return Err(Failure::invalid_operation(format!(
                        "Provided buffer is too small: needs {} bytes, has {}.",
                        layout.total_bytes,
                        bytes.len()
                    )));
                }
                if !alpha_or_flip && self.backend.is_fast_upload_eligible(&shape(UploadSourceKind::Bytes)) {
                    return Ok((Prepared::Borrowed(bytes), unpack));
                }

                self.note_slow_upload()?;
                let mut pixels = convert::repack(bytes, &layout, size, unpack.flip_y)
                    .map_err(|_| Failure::out_of_memory("Failed to allocate conversion buffer."))?;
                if unpack.premultiply_alpha {
                    convert::premultiply(resolved.format, resolved.ty, &mut pixels);
                }
                Ok((Prepared::Owned(pixels), UnpackDescriptor::tight()))
            }

            TexSource::Pbo { offset } => {
                self.require_webgl2()?;
                let offset = u64::try_from(offset).map_err(|_| Failure::invalid_value("`offset` must be >= 0."))?;
                let buffer = match SlotRef::resolve(pbo, &self.objects.buffers) {
                    SlotRef::Live(id) => id,
                    _ => return Err(Failure::invalid_operation("No PIXEL_UNPACK_BUFFER is bound.")),
                };
                if alpha_or_flip {
                    return Err(Failure::invalid_operation(
                        "FLIP_Y and PREMULTIPLY_ALPHA are not allowed for uploads from a PIXEL_UNPACK_BUFFER.",
                    ));
                }
                let type_size = gl::type_byte_size(resolved.ty).unwrap_or(1);
                if offset % u64::from(type_size) != 0 {
                    return Err(Failure::invalid_operation("`offset` must be a multiple of the type size."));
                }
                let layout = unpack.layout(size, resolved.bytes_per_pixel)?;
                let buffer_len = self.objects.buffers.data(buffer).map_or(0, |b| b.byte_length);
                if offset
                    .checked_add(layout.total_bytes)
                    .is_none_or(|end| end > buffer_len)
                {
                    return Err(Failure::invalid_operation(
                        "Upload reads past the end of the PIXEL_UNPACK_BUFFER.",
                    ));
                }
                if !self.backend.is_fast_upload_eligible(&shape(UploadSourceKind::Pbo)) {
                    // Buffer contents are not visible to the CPU pass.
                    self.perf_warn("Driver-side conversion of PIXEL_UNPACK_BUFFER upload.");
                }
                Ok((Prepared::Pbo(offset), unpack))
            }

            TexSource::Image(image) => {
                if pbo.is_some() {
                    return Err(reject_pbo());
                }
                if [image.width, image.height, 1] != size {
                    return Err(Failure::invalid_value("Image size does not match the upload size."));
                }
                let expected = u64::from(image.width) * u64::from(image.height) * 4;
                if image.pixels.len() as u64 != expected {
                    return Err(Failure::invalid_value("Image data does not match its dimensions."));
                }

                let alpha_matches = image.premultiplied == unpack.premultiply_alpha;
                let direct = resolved.format == gl::RGBA
                    && resolved.ty == gl::UNSIGNED_BYTE
                    && alpha_matches
                    && !unpack.flip_y;
                if direct && self.backend.is_fast_upload_eligible(&shape(UploadSourceKind::Image)) {
                    return Ok((Prepared::Borrowed(image.pixels), UnpackDescriptor::tight()));
                }

                self.note_slow_upload()?;
                let oom = |_| Failure::out_of_memory("Failed to allocate conversion buffer.");
                let mut rgba = Vec::new();
                rgba.try_reserve_exact(image.pixels.len()).map_err(oom)?;
                rgba.extend_from_slice(image.pixels);
                if !alpha_matches {
                    if unpack.premultiply_alpha {
                        convert::premultiply_rgba8(&mut rgba);
                    } else {
                        convert::unpremultiply_rgba8(&mut rgba);
                    }
                }
                let mut pixels = convert::rgba8_to_format(&rgba, resolved.format, resolved.ty)
                    .map_err(oom)?
                    .ok_or_else(|| {
                        Failure::invalid_operation(format!(
                            "Images cannot be uploaded as 0x{:04x}/0x{:04x}.",
                            resolved.format, resolved.ty
                        ))
                    })?;
                if unpack.flip_y {
                    let row_bytes = image.width as usize * resolved.bytes_per_pixel as usize;
                    convert::flip_rows(&mut pixels, row_bytes);
                }
                Ok((Prepared::Owned(pixels), UnpackDescriptor::tight()))
            }
        }
    }

    fn note_slow_upload(&mut self) -> Validated<()> {
        if self.state.pixel_store.require_fast_path {
            return Err(Failure::invalid_operation(
                "Upload needs a CPU conversion pass, which UNPACK_REQUIRE_FASTPATH forbids.",
            ));
        }
        self.perf_warn("Upload needed a CPU conversion pass.");
        Ok(())
    }

    // ========================================================================
    // Immutable Storage
    // ========================================================================

    fn tex_storage(&mut self, target: GLenum, levels: i32, internal_format: GLenum, size: [i32; 3]) -> Validated<()> {
        self.require_webgl2()?;
        let texture = self.require_texture_for(target)?;
        let levels = u32::try_from(levels)
            .ok()
            .filter(|l| *l >= 1)
            .ok_or_else(|| Failure::invalid_value("`levels` must be >= 1."))?;
        let size = to_u32s(size, "Width, height and depth")?;
        if size.contains(&0) {
            return Err(Failure::invalid_value("Width, height and depth must be >= 1."));
        }
        self.validate_image_size(target, 0, size)?;
        let [width, height, depth] = size;
        let largest = if target == gl::TEXTURE_3D {
            width.max(height).max(depth)
        } else {
            width.max(height)
        };
        if levels > Limits::max_level_for(largest) + 1 {
            return Err(Failure::invalid_operation("Too many levels for the given size."));
        }
        let format = formats::sized_format(internal_format)
            .filter(|f| f.format != gl::NONE)
            .ok_or_else(|| Failure::invalid_enum(format!("Bad sized internalformat: 0x{internal_format:04x}")))?;
        if target == gl::TEXTURE_3D && (format.has_depth() || format.has_stencil()) {
            return Err(Failure::invalid_operation(
                "Depth and stencil formats cannot be used with TEXTURE_3D.",
            ));
        }
        if self.objects.textures.data(texture).is_some_and(|t| t.immutable) {
            return Err(Failure::invalid_operation("Texture storage is already immutable."));
        }

        let desc = TexStorageDesc {
            target,
            levels,
            internal_format,
            size,
        };
        if !self.backend.tex_storage(&desc) {
            return Err(Failure::out_of_memory("Driver failed to allocate texture storage."));
        }

        let Some(tex) = self.objects.textures.data_mut(texture) else {
            return Ok(());
        };
        tex.immutable = true;
        tex.immutable_levels = levels;
        tex.images.clear();
        let faces: u8 = if target == gl::TEXTURE_CUBE_MAP { 6 } else { 1 };
        for level in 0..levels {
            let info = ImageInfo {
                internal_format,
                width: (width >> level).max(1),
                height: (height >> level).max(1),
                depth: if target == gl::TEXTURE_3D {
                    (depth >> level).max(1)
                } else {
                    depth
                },
            };
            for face in 0..faces {
                tex.images.insert((face, level), info);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{DriverCall, RecordedUpload, RecordingBackend, RecordingHandle};
    use crate::context::{ContextBuilder, GlError, InitContextDesc, WebGlVersion};
    use crate::loss::{ContextManager, ManualClock};

    fn context(version: WebGlVersion) -> (WebGlContext, RecordingHandle) {
        let backend = RecordingBackend::default();
        let handle = backend.handle();
        let manager = Arc::new(ContextManager::new(Arc::new(ManualClock::new(0)), 3000));
        let ctx = ContextBuilder::new(InitContextDesc {
            version,
            ..InitContextDesc::default()
        })
        .manager(manager)
        .build(backend)
        .unwrap();
        (ctx, handle)
    }

    fn bind_new_texture(ctx: &mut WebGlContext) {
        let tex = ctx.create_texture();
        ctx.bind_texture(gl::TEXTURE_2D, tex);
    }

    fn tex_image_calls(handle: &RecordingHandle) -> usize {
        handle.count(|c| matches!(c, DriverCall::TexImage { .. }))
    }

    #[test]
    fn short_buffer_never_reaches_driver() {
        let (mut ctx, handle) = context(WebGlVersion::WebGl1);
        bind_new_texture(&mut ctx);
        // 2x2 RGBA8 needs 16 bytes.
        ctx.tex_image_2d(
            gl::TEXTURE_2D,
            0,
            gl::RGBA,
            2,
            2,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            TexSource::Bytes(&[0; 15]),
        );
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        assert_eq!(tex_image_calls(&handle), 0);
    }

    #[test]
    fn fast_path_passes_bytes_through() {
        let (mut ctx, handle) = context(WebGlVersion::WebGl1);
        bind_new_texture(&mut ctx);
        let pixels = [7u8; 16];
        ctx.tex_image_2d(
            gl::TEXTURE_2D,
            0,
            gl::RGBA,
            2,
            2,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            TexSource::Bytes(&pixels),
        );
        assert_eq!(ctx.get_error(), GlError::NoError);
        assert!(matches!(
            handle.last_call(),
            Some(DriverCall::TexImage { data: RecordedUpload::Bytes(ref b), .. }) if b == &pixels
        ));
    }

    #[test]
    fn flip_y_converts_on_the_cpu() {
        let (mut ctx, handle) = context(WebGlVersion::WebGl1);
        bind_new_texture(&mut ctx);
        ctx.pixel_storei(gl::UNPACK_FLIP_Y_WEBGL, 1);
        ctx.pixel_storei(gl::UNPACK_ALIGNMENT, 1);
        ctx.tex_image_2d(
            gl::TEXTURE_2D,
            0,
            gl::LUMINANCE,
            1,
            2,
            0,
            gl::LUMINANCE,
            gl::UNSIGNED_BYTE,
            TexSource::Bytes(&[1, 2]),
        );
        assert_eq!(ctx.get_error(), GlError::NoError);
        assert!(matches!(
            handle.last_call(),
            Some(DriverCall::TexImage { data: RecordedUpload::Bytes(ref b), .. }) if b == &[2, 1]
        ));
    }

    #[test]
    fn sub_image_must_fit_the_level() {
        let (mut ctx, handle) = context(WebGlVersion::WebGl1);
        bind_new_texture(&mut ctx);
        ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 4, 4, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
        handle.clear();

        ctx.tex_sub_image_2d(gl::TEXTURE_2D, 0, 3, 0, 2, 1, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 8]));
        assert_eq!(ctx.get_error(), GlError::InvalidValue);
        ctx.tex_sub_image_2d(gl::TEXTURE_2D, 1, 0, 0, 1, 1, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 4]));
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        ctx.tex_sub_image_2d(gl::TEXTURE_2D, 0, 2, 2, 2, 2, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 16]));
        assert_eq!(ctx.get_error(), GlError::NoError);
        assert_eq!(tex_image_calls(&handle), 1);
    }

    #[test]
    fn immutable_storage_rejects_tex_image() {
        let (mut ctx, _handle) = context(WebGlVersion::WebGl2);
        bind_new_texture(&mut ctx);
        ctx.tex_storage_2d(gl::TEXTURE_2D, 3, gl::RGBA8, 4, 4);
        assert_eq!(ctx.get_error(), GlError::NoError);
        ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 4, 4, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        // Level 2 of a 4x4 texture is 1x1.
        ctx.tex_sub_image_2d(gl::TEXTURE_2D, 2, 0, 0, 1, 1, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 4]));
        assert_eq!(ctx.get_error(), GlError::NoError);
        ctx.tex_storage_2d(gl::TEXTURE_2D, 4, gl::RGBA8, 4, 4);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    }

    #[test]
    fn require_fast_path_turns_conversion_into_an_error() {
        let (mut ctx, handle) = context(WebGlVersion::WebGl1);
        assert!(ctx.get_extension("MOZ_debug").is_some());
        ctx.pixel_storei(gl::UNPACK_REQUIRE_FASTPATH, 1);
        bind_new_texture(&mut ctx);
        let image = DomImage {
            width: 1,
            height: 1,
            pixels: &[1, 2, 3, 4],
            premultiplied: false,
        };
        ctx.tex_image_2d_from_image(gl::TEXTURE_2D, 0, gl::RGB, gl::RGB, gl::UNSIGNED_BYTE, image);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        assert_eq!(tex_image_calls(&handle), 0);

        ctx.pixel_storei(gl::UNPACK_REQUIRE_FASTPATH, 0);
        ctx.tex_image_2d_from_image(gl::TEXTURE_2D, 0, gl::RGB, gl::RGB, gl::UNSIGNED_BYTE, image);
        assert_eq!(ctx.get_error(), GlError::NoError);
        assert!(matches!(
            handle.last_call(),
            Some(DriverCall::TexImage { data: RecordedUpload::Bytes(ref b), .. }) if b == &[1, 2, 3]
        ));
    }

    #[test]
    fn pbo_uploads_are_bounded_by_the_buffer() {
        let (mut ctx, handle) = context(WebGlVersion::WebGl2);
        bind_new_texture(&mut ctx);
        let pbo = ctx.create_buffer();
        ctx.bind_buffer(gl::PIXEL_UNPACK_BUFFER, pbo);
        ctx.buffer_data(gl::PIXEL_UNPACK_BUFFER, crate::binding::BufferInit::Size(16), gl::STATIC_DRAW);

        ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 2, 2, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Pbo { offset: 4 });
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 2, 2, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 16]));
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 2, 2, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Pbo { offset: 0 });
        assert_eq!(ctx.get_error(), GlError::NoError);
        assert!(matches!(
            handle.last_call(),
            Some(DriverCall::TexImage { data: RecordedUpload::Pbo(0), .. })
        ));
    }
}
