//! CPU conversion pass for uploads the driver cannot take as-is.
//!
//! Everything here produces tightly packed rows (alignment 1, no skips).

use std::collections::TryReserveError;

use half::f16;

use super::unpack::UnpackLayout;
use crate::gl::{self, GLenum};

fn try_vec<T>(capacity: usize) -> Result<Vec<T>, TryReserveError> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(capacity)?;
    Ok(vec)
}

/// Copies the used rows out of client memory, optionally bottom row first.
pub(crate) fn repack(
    src: &[u8],
    layout: &UnpackLayout,
    size: [u32; 3],
    flip_y: bool,
) -> Result<Vec<u8>, TryReserveError> {
    let [_, height, depth] = size.map(|d| d as usize);
    let row_bytes = layout.row_bytes as usize;
    let mut out = try_vec(row_bytes * height * depth)?;
    for image in 0..depth {
        let image_start = layout.skip_bytes as usize + image * layout.image_stride as usize;
        for row in 0..height {
            let src_row = if flip_y { height - 1 - row } else { row };
            let start = image_start + src_row * layout.row_stride as usize;
            out.extend_from_slice(&src[start..start + row_bytes]);
        }
    }
    Ok(out)
}

/// Reverses the row order of tightly packed pixels in place.
pub(crate) fn flip_rows(pixels: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = pixels.len() / row_bytes;
    for row in 0..rows / 2 {
        let (top, bottom) = pixels.split_at_mut((rows - 1 - row) * row_bytes);
        top[row * row_bytes..(row + 1) * row_bytes].swap_with_slice(&mut bottom[..row_bytes]);
    }
}

fn multiply_u8(color: u8, alpha: u8) -> u8 {
    let product = u32::from(color) * u32::from(alpha) + 128;
    ((product + (product >> 8)) >> 8) as u8
}

pub(crate) fn premultiply_rgba8(pixels: &mut [u8]) {
    for rgba in pixels.chunks_exact_mut(4) {
        let a = rgba[3];
        for c in &mut rgba[..3] {
            *c = multiply_u8(*c, a);
        }
    }
}

pub(crate) fn unpremultiply_rgba8(pixels: &mut [u8]) {
    for rgba in pixels.chunks_exact_mut(4) {
        let a = rgba[3];
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut rgba[..3] {
            *c = ((u32::from(*c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
        }
    }
}

fn read_f32(bytes: &[u8]) -> f32 {
    bytemuck::pod_read_unaligned(bytes)
}

fn read_u16(bytes: &[u8]) -> u16 {
    bytemuck::pod_read_unaligned(bytes)
}

/// Premultiplies client pixels of `(format, type)` in place. Formats
/// without alpha are left untouched.
pub(crate) fn premultiply(format: GLenum, ty: GLenum, pixels: &mut [u8]) {
    let channels = match format {
        gl::RGBA => 4,
        gl::LUMINANCE_ALPHA => 2,
        _ => return,
    };
    match ty {
        gl::UNSIGNED_BYTE => {
            for px in pixels.chunks_exact_mut(channels) {
                let a = px[channels - 1];
                for c in &mut px[..channels - 1] {
                    *c = multiply_u8(*c, a);
                }
            }
        }
        gl::FLOAT => {
            for px in pixels.chunks_exact_mut(channels * 4) {
                let a = read_f32(&px[(channels - 1) * 4..]);
                for c in px[..(channels - 1) * 4].chunks_exact_mut(4) {
                    let value = read_f32(c) * a;
                    c.copy_from_slice(bytemuck::bytes_of(&value));
                }
            }
        }
        gl::HALF_FLOAT | gl::HALF_FLOAT_OES => {
            for px in pixels.chunks_exact_mut(channels * 2) {
                let a = f16::from_bits(read_u16(&px[(channels - 1) * 2..])).to_f32();
                for c in px[..(channels - 1) * 2].chunks_exact_mut(2) {
                    let value = f16::from_f32(f16::from_bits(read_u16(c)).to_f32() * a).to_bits();
                    c.copy_from_slice(bytemuck::bytes_of(&value));
                }
            }
        }
        gl::UNSIGNED_SHORT_5_5_5_1 => {
            for px in pixels.chunks_exact_mut(2) {
                if read_u16(px) & 1 == 0 {
                    px.copy_from_slice(&[0, 0]);
                }
            }
        }
        gl::UNSIGNED_SHORT_4_4_4_4 => {
            let widen = |v: u16| ((v & 0x0f) | ((v & 0x0f) << 4)) as u8;
            for px in pixels.chunks_exact_mut(2) {
                let p = read_u16(px);
                let a = widen(p);
                let [r, g, b] = [p >> 12, p >> 8, p >> 4].map(|v| u16::from(multiply_u8(widen(v), a) >> 4));
                let packed = (r << 12) | (g << 8) | (b << 4) | (p & 0x0f);
                px.copy_from_slice(bytemuck::bytes_of(&packed));
            }
        }
        _ => {}
    }
}

/// Channels of an RGBA8 source pixel that feed each destination component.
fn source_channels(format: GLenum) -> Option<&'static [usize]> {
    Some(match format {
        gl::RGBA => &[0, 1, 2, 3],
        gl::RGB => &[0, 1, 2],
        gl::RG => &[0, 1],
        gl::RED | gl::LUMINANCE => &[0],
        gl::ALPHA => &[3],
        gl::LUMINANCE_ALPHA => &[0, 3],
        _ => return None,
    })
}

/// Translates RGBA8 pixels (red first) to `(format, type)`.
///
/// Returns `Ok(None)` for destinations an image cannot be uploaded to.
pub(crate) fn rgba8_to_format(
    rgba: &[u8],
    format: GLenum,
    ty: GLenum,
) -> Result<Option<Vec<u8>>, TryReserveError> {
    let pixel_count = rgba.len() / 4;
    let pixels = rgba.chunks_exact(4);

    let packed = |pack: fn(&[u8]) -> u16| -> Result<Vec<u8>, TryReserveError> {
        let mut out = try_vec(pixel_count * 2)?;
        for px in rgba.chunks_exact(4) {
            out.extend_from_slice(&pack(px).to_ne_bytes());
        }
        Ok(out)
    };
    match (format, ty) {
        (gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4) => {
            return packed(|p| {
                (u16::from(p[0] & 0xf0) << 8)
                    | (u16::from(p[1] & 0xf0) << 4)
                    | u16::from(p[2] & 0xf0)
                    | (u16::from(p[3]) >> 4)
            })
            .map(Some);
        }
        (gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1) => {
            return packed(|p| {
                (u16::from(p[0] & 0xf8) << 8)
                    | (u16::from(p[1] & 0xf8) << 3)
                    | (u16::from(p[2] & 0xf8) >> 2)
                    | (u16::from(p[3]) >> 7)
            })
            .map(Some);
        }
        (gl::RGB, gl::UNSIGNED_SHORT_5_6_5) => {
            return packed(|p| {
                (u16::from(p[0] & 0xf8) << 8) | (u16::from(p[1] & 0xfc) << 3) | (u16::from(p[2]) >> 3)
            })
            .map(Some);
        }
        _ => {}
    }

    let Some(channels) = source_channels(format) else {
        return Ok(None);
    };
    let component_size = match ty {
        gl::UNSIGNED_BYTE => 1,
        gl::HALF_FLOAT | gl::HALF_FLOAT_OES => 2,
        gl::FLOAT => 4,
        _ => return Ok(None),
    };
    let mut out = try_vec(pixel_count * channels.len() * component_size)?;
    for px in pixels {
        for &channel in channels {
            let value = px[channel];
            match component_size {
                1 => out.push(value),
                2 => out.extend_from_slice(&f16::from_f32(f32::from(value) / 255.0).to_bits().to_ne_bytes()),
                _ => out.extend_from_slice(bytemuck::bytes_of(&(f32::from(value) / 255.0))),
            }
        }
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::UnpackDescriptor;

    #[test]
    fn repack_drops_padding_and_flips() {
        // Two RGB8 rows of one pixel, padded to 4 bytes.
        let src = [1, 2, 3, 0, 4, 5, 6, 0];
        let layout = UnpackDescriptor {
            alignment: 4,
            ..UnpackDescriptor::tight()
        }
        .layout([1, 2, 1], 3)
        .unwrap();
        assert_eq!(repack(&src, &layout, [1, 2, 1], false).unwrap(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(repack(&src, &layout, [1, 2, 1], true).unwrap(), [4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn flip_rows_swaps_top_and_bottom() {
        let mut pixels = [1, 1, 2, 2, 3, 3];
        flip_rows(&mut pixels, 2);
        assert_eq!(pixels, [3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn premultiply_scales_color_by_alpha() {
        let mut pixels = [255, 128, 0, 128];
        premultiply_rgba8(&mut pixels);
        assert_eq!(pixels, [128, 64, 0, 128]);
        unpremultiply_rgba8(&mut pixels);
        assert_eq!(pixels[0], 255);
    }

    #[test]
    fn packed_5551_drops_transparent_pixels() {
        let mut pixels = 0xFFFEu16.to_ne_bytes();
        premultiply(gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1, &mut pixels);
        assert_eq!(pixels, [0, 0]);
    }

    #[test]
    fn rgba8_converts_to_luminance_alpha_and_half_float() {
        let rgba = [10, 20, 30, 40];
        assert_eq!(
            rgba8_to_format(&rgba, gl::LUMINANCE_ALPHA, gl::UNSIGNED_BYTE).unwrap(),
            Some(vec![10, 40])
        );
        let half = rgba8_to_format(&[255, 0, 0, 255], gl::RGBA, gl::HALF_FLOAT).unwrap().unwrap();
        assert_eq!(half.len(), 8);
        assert_eq!(u16::from_ne_bytes([half[0], half[1]]), f16::ONE.to_bits());
        assert_eq!(rgba8_to_format(&rgba, gl::RGBA_INTEGER, gl::UNSIGNED_BYTE).unwrap(), None);
    }

    #[test]
    fn rgb565_packs_high_bits() {
        let out = rgba8_to_format(&[0xff, 0, 0xff, 0xff], gl::RGB, gl::UNSIGNED_SHORT_5_6_5)
            .unwrap()
            .unwrap();
        assert_eq!(u16::from_ne_bytes([out[0], out[1]]), 0xF81F);
    }
}
