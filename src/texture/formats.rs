//! Format/type compatibility tables.
//!
//! Unsized WebGL 1 formats are resolved to an effective sized format when
//! an image is specified, so completeness and renderability checks only
//! ever look at sized formats.

use crate::context::{Failure, Validated, WebGlVersion};
use crate::extensions::ExtensionSet;
use crate::gl::{self, GLenum};

/// What a format can be attached as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderable {
    No,
    Color,
    /// Color-renderable with `EXT_color_buffer_float`.
    ColorFloat,
    Depth,
    Stencil,
    DepthStencil,
}

#[derive(Debug, Clone, Copy)]
pub struct SizedFormat {
    pub internal_format: GLenum,
    /// Unpack format matching the internal format.
    pub format: GLenum,
    pub types: &'static [GLenum],
    pub renderable: Renderable,
}

impl SizedFormat {
    #[must_use]
    pub fn has_depth(&self) -> bool {
        matches!(self.renderable, Renderable::Depth | Renderable::DepthStencil)
    }

    #[must_use]
    pub fn has_stencil(&self) -> bool {
        matches!(self.renderable, Renderable::Stencil | Renderable::DepthStencil)
    }

    /// Color-renderable given the enabled extensions.
    #[must_use]
    pub fn is_color_renderable(&self, extensions: ExtensionSet) -> bool {
        match self.renderable {
            Renderable::Color => true,
            Renderable::ColorFloat => extensions.contains(ExtensionSet::EXT_COLOR_BUFFER_FLOAT),
            _ => false,
        }
    }
}

const fn sized(
    internal_format: GLenum,
    format: GLenum,
    types: &'static [GLenum],
    renderable: Renderable,
) -> SizedFormat {
    SizedFormat {
        internal_format,
        format,
        types,
        renderable,
    }
}

static SIZED_FORMATS: &[SizedFormat] = &[
    sized(gl::R8, gl::RED, &[gl::UNSIGNED_BYTE], Renderable::Color),
    sized(gl::RG8, gl::RG, &[gl::UNSIGNED_BYTE], Renderable::Color),
    sized(gl::RGB8, gl::RGB, &[gl::UNSIGNED_BYTE], Renderable::Color),
    sized(gl::RGBA8, gl::RGBA, &[gl::UNSIGNED_BYTE], Renderable::Color),
    sized(gl::SRGB8_ALPHA8, gl::RGBA, &[gl::UNSIGNED_BYTE], Renderable::Color),
    sized(gl::RGBA4, gl::RGBA, &[gl::UNSIGNED_BYTE, gl::UNSIGNED_SHORT_4_4_4_4], Renderable::Color),
    sized(gl::RGB5_A1, gl::RGBA, &[gl::UNSIGNED_BYTE, gl::UNSIGNED_SHORT_5_5_5_1], Renderable::Color),
    sized(gl::RGB565, gl::RGB, &[gl::UNSIGNED_BYTE, gl::UNSIGNED_SHORT_5_6_5], Renderable::Color),
    sized(gl::R16F, gl::RED, &[gl::HALF_FLOAT, gl::FLOAT], Renderable::ColorFloat),
    sized(gl::R32F, gl::RED, &[gl::FLOAT], Renderable::ColorFloat),
    sized(gl::RGBA16F, gl::RGBA, &[gl::HALF_FLOAT, gl::FLOAT], Renderable::ColorFloat),
    sized(gl::RGB16F, gl::RGB, &[gl::HALF_FLOAT, gl::FLOAT], Renderable::No),
    sized(gl::RGBA32F, gl::RGBA, &[gl::FLOAT], Renderable::ColorFloat),
    sized(gl::RGB32F, gl::RGB, &[gl::FLOAT], Renderable::No),
    sized(gl::R8UI, gl::RED_INTEGER, &[gl::UNSIGNED_BYTE], Renderable::Color),
    sized(gl::RGBA8UI, gl::RGBA_INTEGER, &[gl::UNSIGNED_BYTE], Renderable::Color),
    sized(
        gl::DEPTH_COMPONENT16,
        gl::DEPTH_COMPONENT,
        &[gl::UNSIGNED_SHORT, gl::UNSIGNED_INT],
        Renderable::Depth,
    ),
    sized(gl::DEPTH_COMPONENT24, gl::DEPTH_COMPONENT, &[gl::UNSIGNED_INT], Renderable::Depth),
    sized(gl::DEPTH_COMPONENT32F, gl::DEPTH_COMPONENT, &[gl::FLOAT], Renderable::Depth),
    sized(gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, &[gl::UNSIGNED_INT_24_8], Renderable::DepthStencil),
    // Renderbuffer only.
    sized(gl::STENCIL_INDEX8, gl::NONE, &[], Renderable::Stencil),
];

#[must_use]
pub fn sized_format(internal_format: GLenum) -> Option<&'static SizedFormat> {
    SIZED_FORMATS.iter().find(|f| f.internal_format == internal_format)
}

/// Components per pixel of an unpack format.
#[must_use]
pub fn components(format: GLenum) -> Option<u32> {
    Some(match format {
        gl::RED | gl::RED_INTEGER | gl::ALPHA | gl::LUMINANCE | gl::DEPTH_COMPONENT | gl::DEPTH_STENCIL => 1,
        gl::RG | gl::LUMINANCE_ALPHA => 2,
        gl::RGB => 3,
        gl::RGBA | gl::RGBA_INTEGER => 4,
        _ => return None,
    })
}

fn is_packed_pixel_type(ty: GLenum) -> bool {
    matches!(
        ty,
        gl::UNSIGNED_SHORT_4_4_4_4
            | gl::UNSIGNED_SHORT_5_5_5_1
            | gl::UNSIGNED_SHORT_5_6_5
            | gl::UNSIGNED_INT_24_8
            | gl::UNSIGNED_INT_2_10_10_10_REV
    )
}

/// Bytes per pixel for a `(format, type)` pair.
#[must_use]
pub fn bytes_per_pixel(format: GLenum, ty: GLenum) -> Option<u32> {
    let type_size = gl::type_byte_size(ty)?;
    if is_packed_pixel_type(ty) {
        return Some(type_size);
    }
    Some(components(format)? * type_size)
}

/// A validated `(internalformat, format, type)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFormat {
    /// Sized format the image ends up with; the unsized format itself for
    /// luminance/alpha formats.
    pub effective: GLenum,
    pub format: GLenum,
    pub ty: GLenum,
    pub bytes_per_pixel: u32,
}

fn unsized_effective(format: GLenum, ty: GLenum) -> Option<GLenum> {
    Some(match (format, ty) {
        (gl::RGBA, gl::UNSIGNED_BYTE) => gl::RGBA8,
        (gl::RGB, gl::UNSIGNED_BYTE) => gl::RGB8,
        (gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4) => gl::RGBA4,
        (gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1) => gl::RGB5_A1,
        (gl::RGB, gl::UNSIGNED_SHORT_5_6_5) => gl::RGB565,
        (gl::RGBA, gl::FLOAT) => gl::RGBA32F,
        (gl::RGB, gl::FLOAT) => gl::RGB32F,
        (gl::RGBA, gl::HALF_FLOAT | gl::HALF_FLOAT_OES) => gl::RGBA16F,
        (gl::RGB, gl::HALF_FLOAT | gl::HALF_FLOAT_OES) => gl::RGB16F,
        (
            gl::LUMINANCE | gl::LUMINANCE_ALPHA | gl::ALPHA,
            gl::UNSIGNED_BYTE | gl::FLOAT | gl::HALF_FLOAT | gl::HALF_FLOAT_OES,
        ) => format,
        _ => return None,
    })
}

/// Float and half-float pixel types are gated on extensions in WebGL 1.
fn require_type_enabled(version: WebGlVersion, extensions: ExtensionSet, ty: GLenum) -> Validated<()> {
    let webgl2 = version.is_webgl2();
    match ty {
        gl::FLOAT if !webgl2 && !extensions.contains(ExtensionSet::OES_TEXTURE_FLOAT) => {
            Err(Failure::invalid_enum("FLOAT textures require OES_texture_float."))
        }
        gl::HALF_FLOAT_OES if !webgl2 && !extensions.contains(ExtensionSet::OES_TEXTURE_HALF_FLOAT) => Err(
            Failure::invalid_enum("HALF_FLOAT_OES textures require OES_texture_half_float."),
        ),
        gl::HALF_FLOAT if !webgl2 => Err(Failure::invalid_enum("HALF_FLOAT requires WebGL 2.")),
        _ => Ok(()),
    }
}

/// Validates a texture upload format triple.
///
/// Unknown enums are `INVALID_ENUM`; known but mismatched combinations are
/// `INVALID_OPERATION`.
pub fn resolve_tex_format(
    version: WebGlVersion,
    extensions: ExtensionSet,
    internal_format: GLenum,
    format: GLenum,
    ty: GLenum,
) -> Validated<ResolvedFormat> {
    let webgl2 = version.is_webgl2();
    let bytes_per_pixel = bytes_per_pixel(format, ty)
        .ok_or_else(|| Failure::invalid_enum(format!("Bad format/type: 0x{format:04x}/0x{ty:04x}")))?;
    require_type_enabled(version, extensions, ty)?;

    let effective = if internal_format == format {
        unsized_effective(format, ty).ok_or_else(|| {
            Failure::invalid_operation(format!(
                "Format 0x{format:04x} is incompatible with type 0x{ty:04x}."
            ))
        })?
    } else {
        if !webgl2 {
            return Err(Failure::invalid_operation(
                "`internalformat` must match `format` in WebGL 1.",
            ));
        }
        let sized = sized_format(internal_format)
            .filter(|f| f.format != gl::NONE)
            .ok_or_else(|| Failure::invalid_enum(format!("Bad internalformat: 0x{internal_format:04x}")))?;
        if sized.format != format || !sized.types.contains(&ty) {
            return Err(Failure::invalid_operation(format!(
                "Internal format 0x{internal_format:04x} is incompatible with 0x{format:04x}/0x{ty:04x}."
            )));
        }
        internal_format
    };

    Ok(ResolvedFormat {
        effective,
        format,
        ty,
        bytes_per_pixel,
    })
}

/// Validates `(format, type)` of a sub-image update against the format the
/// image was specified with.
pub fn resolve_sub_image_format(
    version: WebGlVersion,
    extensions: ExtensionSet,
    image_format: GLenum,
    format: GLenum,
    ty: GLenum,
) -> Validated<ResolvedFormat> {
    let bytes_per_pixel = bytes_per_pixel(format, ty)
        .ok_or_else(|| Failure::invalid_enum(format!("Bad format/type: 0x{format:04x}/0x{ty:04x}")))?;
    require_type_enabled(version, extensions, ty)?;

    // WebGL 1 images keep the type they were specified with.
    let compatible = unsized_effective(format, ty) == Some(image_format)
        || (version.is_webgl2()
            && sized_format(image_format).is_some_and(|sized| sized.format == format && sized.types.contains(&ty)));
    if !compatible {
        return Err(Failure::invalid_operation(format!(
            "0x{format:04x}/0x{ty:04x} does not match the image's format 0x{image_format:04x}."
        )));
    }
    Ok(ResolvedFormat {
        effective: image_format,
        format,
        ty,
        bytes_per_pixel,
    })
}

/// Validates a renderbuffer storage format, returning its sized form.
pub fn resolve_renderbuffer_format(
    version: WebGlVersion,
    extensions: ExtensionSet,
    internal_format: GLenum,
) -> Validated<&'static SizedFormat> {
    let internal_format = match internal_format {
        gl::DEPTH_STENCIL => gl::DEPTH24_STENCIL8,
        other => other,
    };
    let webgl1_ok = matches!(
        internal_format,
        gl::RGBA4
            | gl::RGB5_A1
            | gl::RGB565
            | gl::DEPTH_COMPONENT16
            | gl::STENCIL_INDEX8
            | gl::DEPTH24_STENCIL8
    );
    let info = sized_format(internal_format)
        .filter(|_| version.is_webgl2() || webgl1_ok)
        .ok_or_else(|| Failure::invalid_enum(format!("Bad internalformat: 0x{internal_format:04x}")))?;
    let renderable = match info.renderable {
        Renderable::No => false,
        Renderable::ColorFloat => info.is_color_renderable(extensions),
        _ => true,
    };
    if !renderable {
        return Err(Failure::invalid_enum(format!(
            "Internal format 0x{internal_format:04x} is not renderable."
        )));
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsized_formats_resolve_to_sized() {
        let resolved = resolve_tex_format(
            WebGlVersion::WebGl1,
            ExtensionSet::empty(),
            gl::RGBA,
            gl::RGBA,
            gl::UNSIGNED_SHORT_4_4_4_4,
        )
        .unwrap();
        assert_eq!(resolved.effective, gl::RGBA4);
        assert_eq!(resolved.bytes_per_pixel, 2);
    }

    #[test]
    fn float_needs_extension_on_webgl1() {
        let err = resolve_tex_format(WebGlVersion::WebGl1, ExtensionSet::empty(), gl::RGBA, gl::RGBA, gl::FLOAT)
            .unwrap_err();
        assert_eq!(err.code, crate::context::GlError::InvalidEnum);

        let ok = resolve_tex_format(
            WebGlVersion::WebGl1,
            ExtensionSet::OES_TEXTURE_FLOAT,
            gl::RGBA,
            gl::RGBA,
            gl::FLOAT,
        )
        .unwrap();
        assert_eq!(ok.bytes_per_pixel, 16);
    }

    #[test]
    fn sized_mismatch_is_invalid_operation() {
        let err = resolve_tex_format(WebGlVersion::WebGl2, ExtensionSet::empty(), gl::RGBA8, gl::RGB, gl::UNSIGNED_BYTE)
            .unwrap_err();
        assert_eq!(err.code, crate::context::GlError::InvalidOperation);
        assert!(
            resolve_tex_format(WebGlVersion::WebGl2, ExtensionSet::empty(), gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT)
                .is_ok()
        );
    }

    #[test]
    fn sub_image_accepts_any_listed_type() {
        let ok = resolve_sub_image_format(
            WebGlVersion::WebGl2,
            ExtensionSet::empty(),
            gl::RGBA4,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
        )
        .unwrap();
        assert_eq!(ok.bytes_per_pixel, 4);
        let err = resolve_sub_image_format(
            WebGlVersion::WebGl1,
            ExtensionSet::empty(),
            gl::LUMINANCE,
            gl::ALPHA,
            gl::UNSIGNED_BYTE,
        )
        .unwrap_err();
        assert_eq!(err.code, crate::context::GlError::InvalidOperation);
    }

    #[test]
    fn float_renderbuffers_need_color_buffer_float() {
        assert!(resolve_renderbuffer_format(WebGlVersion::WebGl2, ExtensionSet::empty(), gl::RGBA32F).is_err());
        assert!(
            resolve_renderbuffer_format(WebGlVersion::WebGl2, ExtensionSet::EXT_COLOR_BUFFER_FLOAT, gl::RGBA32F)
                .is_ok()
        );
        assert!(resolve_renderbuffer_format(WebGlVersion::WebGl1, ExtensionSet::empty(), gl::RGBA8).is_err());
        assert_eq!(
            resolve_renderbuffer_format(WebGlVersion::WebGl1, ExtensionSet::empty(), gl::DEPTH_STENCIL)
                .unwrap()
                .internal_format,
            gl::DEPTH24_STENCIL8
        );
    }
}
