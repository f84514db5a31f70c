//! Texture upload pipeline tests
//!
//! Tests for:
//! - Level, size and border validation
//! - Cube map and 3D targets
//! - Unpack state folding and source sizing
//! - Fast path vs CPU conversion
//! - Pixel unpack buffer uploads

use std::sync::Arc;

use parking_lot::Mutex;
use webgl_core::backend::RecordedUpload;
use webgl_core::gl;
use webgl_core::{
    BufferInit, ContextBuilder, ContextManager, DomImage, DriverCall, GlError, InitContextDesc, ManualClock,
    RecordingBackend, RecordingHandle, TexSource, WarningKind, WebGlContext, WebGlVersion,
};

// ============================================================================
// Helpers
// ============================================================================

type Warnings = Arc<Mutex<Vec<(WarningKind, String)>>>;

fn context(version: WebGlVersion) -> (WebGlContext, RecordingHandle, Warnings) {
    let backend = RecordingBackend::default();
    let handle = backend.handle();
    let warnings: Warnings = Arc::default();
    let sink = Arc::clone(&warnings);
    let manager = Arc::new(ContextManager::new(Arc::new(ManualClock::new(0)), 3000));
    let ctx = ContextBuilder::new(InitContextDesc {
        version,
        ..InitContextDesc::default()
    })
    .manager(manager)
    .warning_sink(move |kind: WarningKind, message: &str| sink.lock().push((kind, message.to_owned())))
    .build(backend)
    .unwrap();
    (ctx, handle, warnings)
}

fn bind_new(ctx: &mut WebGlContext, target: u32) {
    let texture = ctx.create_texture();
    ctx.bind_texture(target, texture);
}

fn last_upload(handle: &RecordingHandle) -> Option<RecordedUpload> {
    handle.calls().into_iter().rev().find_map(|call| match call {
        DriverCall::TexImage { data, .. } => Some(data),
        _ => None,
    })
}

fn perf_warnings(warnings: &Warnings) -> usize {
    warnings
        .lock()
        .iter()
        .filter(|(kind, _)| *kind == WarningKind::Performance)
        .count()
}

fn rgba_2d(ctx: &mut WebGlContext, level: i32, width: i32, height: i32, source: TexSource<'_>) {
    ctx.tex_image_2d(gl::TEXTURE_2D, level, gl::RGBA, width, height, 0, gl::RGBA, gl::UNSIGNED_BYTE, source);
}

// ============================================================================
// Specification Checks
// ============================================================================

#[test]
fn upload_without_bound_texture_fails() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl1);
    rgba_2d(&mut ctx, 0, 1, 1, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert!(last_upload(&handle).is_none());
}

#[test]
fn level_size_and_border_are_validated() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);

    rgba_2d(&mut ctx, -1, 1, 1, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    rgba_2d(&mut ctx, 0, -1, 1, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    rgba_2d(&mut ctx, 0, 16385, 1, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    // Level 14 of a 16384 texture is at most 1x1.
    rgba_2d(&mut ctx, 14, 2, 2, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 1, 1, 1, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    assert!(last_upload(&handle).is_none());
}

#[test]
fn webgl1_mips_need_power_of_two_sizes() {
    let (mut ctx, _handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    rgba_2d(&mut ctx, 1, 3, 2, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    rgba_2d(&mut ctx, 0, 3, 2, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::NoError);

    let (mut ctx2, _handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx2, gl::TEXTURE_2D);
    rgba_2d(&mut ctx2, 1, 3, 2, TexSource::Zeroed);
    assert_eq!(ctx2.get_error(), GlError::NoError);
}

#[test]
fn format_and_type_must_be_compatible() {
    let (mut ctx, _handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGB, 1, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 1, 1, 0, gl::RGBA, 0x1234, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    // Float textures need OES_texture_float in WebGL 1.
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 1, 1, 0, gl::RGBA, gl::FLOAT, TexSource::Zeroed);
    assert_ne!(ctx.get_error(), GlError::NoError);
    assert!(ctx.get_extension("OES_texture_float").is_some());
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA, 1, 1, 0, gl::RGBA, gl::FLOAT, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::NoError);
}

#[test]
fn packed_pixel_types_upload_two_bytes_per_pixel() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    for (format, ty) in [
        (gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4),
        (gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1),
        (gl::RGB, gl::UNSIGNED_SHORT_5_6_5),
    ] {
        ctx.tex_image_2d(gl::TEXTURE_2D, 0, format, 2, 2, 0, format, ty, TexSource::Bytes(&[0; 7]));
        assert_eq!(ctx.get_error(), GlError::InvalidOperation, "0x{ty:04x}");

        ctx.tex_image_2d(gl::TEXTURE_2D, 0, format, 2, 2, 0, format, ty, TexSource::Bytes(&[0; 8]));
        assert_eq!(ctx.get_error(), GlError::NoError, "0x{ty:04x}");
        assert!(matches!(
            handle.last_call(),
            Some(DriverCall::TexImage { ty: recorded, .. }) if recorded == ty
        ));
    }
}

#[test]
fn depth_stencil_uploads_use_the_packed_type() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    ctx.tex_image_2d(
        gl::TEXTURE_2D,
        0,
        gl::DEPTH24_STENCIL8,
        2,
        2,
        0,
        gl::DEPTH_STENCIL,
        gl::UNSIGNED_INT_24_8,
        TexSource::Zeroed,
    );
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert!(matches!(
        handle.last_call(),
        Some(DriverCall::TexImage { internal_format: gl::DEPTH24_STENCIL8, .. })
    ));

    ctx.tex_image_2d(
        gl::TEXTURE_2D,
        0,
        gl::DEPTH24_STENCIL8,
        2,
        2,
        0,
        gl::DEPTH_STENCIL,
        gl::UNSIGNED_INT_24_8,
        TexSource::Bytes(&[0; 15]),
    );
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
}

#[test]
fn cube_faces_must_be_square() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_CUBE_MAP);
    let face = gl::TEXTURE_CUBE_MAP_NEGATIVE_Y;
    ctx.tex_image_2d(face, 0, gl::RGBA, 4, 2, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    ctx.tex_image_2d(face, 0, gl::RGBA, 4, 4, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::NoError);
    // Binding target, not face, is not a valid image target.
    ctx.tex_image_2d(gl::TEXTURE_CUBE_MAP, 0, gl::RGBA, 4, 4, 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);

    assert!(matches!(
        handle.last_call(),
        Some(DriverCall::TexImage { image_target, .. }) if image_target == face
    ));
}

#[test]
fn three_d_uploads_need_webgl2() {
    let (mut ctx, _handle, _) = context(WebGlVersion::WebGl1);
    ctx.tex_image_3d(gl::TEXTURE_3D, 0, gl::RGBA8, [2, 2, 2], 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);

    let (mut ctx2, handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx2, gl::TEXTURE_3D);
    let pixels = [0u8; 2 * 2 * 2 * 4];
    ctx2.tex_image_3d(gl::TEXTURE_3D, 0, gl::RGBA8, [2, 2, 2], 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&pixels));
    assert_eq!(ctx2.get_error(), GlError::NoError);
    assert!(matches!(
        handle.last_call(),
        Some(DriverCall::TexImage { size: [2, 2, 2], .. })
    ));
}

#[test]
fn depth_formats_are_rejected_for_3d_textures() {
    let (mut ctx, _handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_3D);
    ctx.tex_image_3d(
        gl::TEXTURE_3D,
        0,
        gl::DEPTH_COMPONENT16,
        [2, 2, 2],
        0,
        gl::DEPTH_COMPONENT,
        gl::UNSIGNED_SHORT,
        TexSource::Zeroed,
    );
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
}

// ============================================================================
// Unpack State & Sizing
// ============================================================================

#[test]
fn short_source_is_rejected_before_the_driver() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    // 3x2 RGB with alignment 4: 12 + 9 bytes.
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGB, 3, 2, 0, gl::RGB, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 20]));
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert!(last_upload(&handle).is_none());

    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGB, 3, 2, 0, gl::RGB, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 21]));
    assert_eq!(ctx.get_error(), GlError::NoError);
}

#[test]
fn fast_path_forwards_unpack_state() {
    let (mut ctx, handle, warnings) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    ctx.pixel_storei(gl::UNPACK_ROW_LENGTH, 4);
    ctx.pixel_storei(gl::UNPACK_SKIP_PIXELS, 1);
    let pixels = [0u8; 4 * 4 * 2];
    rgba_2d(&mut ctx, 0, 2, 2, TexSource::Bytes(&pixels));
    assert_eq!(ctx.get_error(), GlError::NoError);
    // Passed through untouched; the driver applies the skips.
    assert_eq!(last_upload(&handle), Some(RecordedUpload::Bytes(pixels.to_vec())));
    assert_eq!(perf_warnings(&warnings), 0);
}

#[test]
fn slow_path_repacks_tightly_and_warns() {
    let (mut ctx, handle, warnings) = context(WebGlVersion::WebGl1);
    handle.set_fast_uploads(false);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    // Two 1-pixel RGB rows padded to 4 bytes.
    let pixels = [1, 2, 3, 0, 4, 5, 6];
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGB, 1, 2, 0, gl::RGB, gl::UNSIGNED_BYTE, TexSource::Bytes(&pixels));
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert_eq!(last_upload(&handle), Some(RecordedUpload::Bytes(vec![1, 2, 3, 4, 5, 6])));
    assert_eq!(perf_warnings(&warnings), 1);
}

#[test]
fn premultiply_applies_to_client_bytes() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    ctx.pixel_storei(gl::UNPACK_PREMULTIPLY_ALPHA_WEBGL, 1);
    rgba_2d(&mut ctx, 0, 1, 1, TexSource::Bytes(&[255, 255, 255, 0]));
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert_eq!(last_upload(&handle), Some(RecordedUpload::Bytes(vec![0, 0, 0, 0])));
}

#[test]
fn flip_and_premultiply_are_forbidden_for_3d_bytes() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_2D_ARRAY);
    ctx.pixel_storei(gl::UNPACK_FLIP_Y_WEBGL, 1);
    ctx.tex_image_3d(
        gl::TEXTURE_2D_ARRAY,
        0,
        gl::RGBA8,
        [1, 1, 2],
        0,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        TexSource::Bytes(&[0; 8]),
    );
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert!(last_upload(&handle).is_none());
}

#[test]
fn skip_rows_past_image_height_is_invalid() {
    let (mut ctx, _handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_3D);
    ctx.pixel_storei(gl::UNPACK_IMAGE_HEIGHT, 2);
    ctx.pixel_storei(gl::UNPACK_SKIP_ROWS, 1);
    ctx.tex_image_3d(gl::TEXTURE_3D, 0, gl::RGBA8, [1, 2, 1], 0, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 64]));
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
}

// ============================================================================
// Image Sources
// ============================================================================

#[test]
fn images_convert_to_the_requested_format() {
    let (mut ctx, handle, warnings) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    ctx.pixel_storei(gl::UNPACK_FLIP_Y_WEBGL, 1);
    let image = DomImage {
        width: 1,
        height: 2,
        pixels: &[10, 20, 30, 255, 40, 50, 60, 255],
        premultiplied: false,
    };
    ctx.tex_image_2d_from_image(gl::TEXTURE_2D, 0, gl::LUMINANCE, gl::LUMINANCE, gl::UNSIGNED_BYTE, image);
    assert_eq!(ctx.get_error(), GlError::NoError);
    // Red channel only, bottom row first.
    assert_eq!(last_upload(&handle), Some(RecordedUpload::Bytes(vec![40, 10])));
    assert_eq!(perf_warnings(&warnings), 1);
}

#[test]
fn image_size_must_match_upload_size() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    let image = DomImage {
        width: 1,
        height: 1,
        pixels: &[0; 4],
        premultiplied: false,
    };
    rgba_2d(&mut ctx, 0, 2, 2, TexSource::Image(image));
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    assert!(last_upload(&handle).is_none());
}

// ============================================================================
// Pixel Unpack Buffers
// ============================================================================

#[test]
fn pbo_offset_must_be_type_aligned() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    let pbo = ctx.create_buffer();
    ctx.bind_buffer(gl::PIXEL_UNPACK_BUFFER, pbo);
    ctx.buffer_data(gl::PIXEL_UNPACK_BUFFER, BufferInit::Size(64), gl::STREAM_DRAW);

    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA32F, 1, 1, 0, gl::RGBA, gl::FLOAT, TexSource::Pbo { offset: 2 });
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA32F, 1, 1, 0, gl::RGBA, gl::FLOAT, TexSource::Pbo { offset: -4 });
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    ctx.tex_image_2d(gl::TEXTURE_2D, 0, gl::RGBA32F, 1, 1, 0, gl::RGBA, gl::FLOAT, TexSource::Pbo { offset: 4 });
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert_eq!(last_upload(&handle), Some(RecordedUpload::Pbo(4)));
}

#[test]
fn null_data_with_pbo_bound_is_invalid() {
    let (mut ctx, _handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    let pbo = ctx.create_buffer();
    ctx.bind_buffer(gl::PIXEL_UNPACK_BUFFER, pbo);
    rgba_2d(&mut ctx, 0, 1, 1, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
}

// ============================================================================
// Immutable Storage
// ============================================================================

#[test]
fn tex_storage_validates_levels_and_format() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    ctx.tex_storage_2d(gl::TEXTURE_2D, 0, gl::RGBA8, 4, 4);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    ctx.tex_storage_2d(gl::TEXTURE_2D, 1, gl::RGBA, 4, 4);
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    ctx.tex_storage_2d(gl::TEXTURE_2D, 4, gl::RGBA8, 4, 4);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert_eq!(handle.count(|c| matches!(c, DriverCall::TexStorage(_))), 0);

    ctx.tex_storage_2d(gl::TEXTURE_2D, 3, gl::RGBA8, 4, 4);
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert_eq!(handle.count(|c| matches!(c, DriverCall::TexStorage(_))), 1);
}

#[test]
fn tex_storage_allocates_every_cube_face() {
    let (mut ctx, _handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_CUBE_MAP);
    ctx.tex_storage_2d(gl::TEXTURE_CUBE_MAP, 2, gl::RGBA8, 8, 8);
    assert_eq!(ctx.get_error(), GlError::NoError);
    for face in gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z {
        ctx.tex_sub_image_2d(face, 1, 0, 0, 4, 4, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 64]));
        assert_eq!(ctx.get_error(), GlError::NoError);
    }
}

#[test]
fn sub_image_updates_need_pixel_data() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl2);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    ctx.tex_storage_2d(gl::TEXTURE_2D, 1, gl::RGBA8, 4, 4);
    handle.clear();

    ctx.tex_sub_image_2d(gl::TEXTURE_2D, 0, 0, 0, 2, 2, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);

    bind_new(&mut ctx, gl::TEXTURE_3D);
    ctx.tex_storage_3d(gl::TEXTURE_3D, 1, gl::RGBA8, [2, 2, 2]);
    handle.clear();
    ctx.tex_sub_image_3d(gl::TEXTURE_3D, 0, [0; 3], [2, 2, 2], gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    assert!(last_upload(&handle).is_none());
}

#[test]
fn driver_allocation_failure_is_out_of_memory() {
    let (mut ctx, handle, _) = context(WebGlVersion::WebGl1);
    bind_new(&mut ctx, gl::TEXTURE_2D);
    handle.fail_allocations(true);
    rgba_2d(&mut ctx, 0, 4, 4, TexSource::Zeroed);
    assert_eq!(ctx.get_error(), GlError::OutOfMemory);

    // The failed image was never recorded, so updating it is invalid.
    handle.fail_allocations(false);
    ctx.tex_sub_image_2d(gl::TEXTURE_2D, 0, 0, 0, 1, 1, gl::RGBA, gl::UNSIGNED_BYTE, TexSource::Bytes(&[0; 4]));
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
}
