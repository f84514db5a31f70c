//! Unpack layout: how client pixel rows are laid out in memory.

use crate::context::{Failure, PixelStore, Validated};
use crate::gl;

/// Canonical packing descriptor for one upload, folded from the pixel
/// store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackDescriptor {
    pub alignment: u32,
    /// Pixels per row; zero means the upload width.
    pub row_length: u32,
    /// Rows per image; zero means the upload height.
    pub image_height: u32,
    pub skip_pixels: u32,
    pub skip_rows: u32,
    pub skip_images: u32,
    pub flip_y: bool,
    pub premultiply_alpha: bool,
    pub colorspace_conversion: bool,
}

impl Default for UnpackDescriptor {
    fn default() -> Self {
        Self::tight()
    }
}

/// Byte offsets of an upload in client memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackLayout {
    pub row_stride: u64,
    pub image_stride: u64,
    /// Offset of the first used pixel.
    pub skip_bytes: u64,
    /// Bytes actually read from each row.
    pub row_bytes: u64,
    /// Bytes the upload needs, up to the end of its last row.
    pub total_bytes: u64,
}

impl UnpackDescriptor {
    /// Rows packed back to back with no skips.
    #[must_use]
    pub const fn tight() -> Self {
        Self {
            alignment: 1,
            row_length: 0,
            image_height: 0,
            skip_pixels: 0,
            skip_rows: 0,
            skip_images: 0,
            flip_y: false,
            premultiply_alpha: false,
            colorspace_conversion: false,
        }
    }

    /// Folds the pixel store. 2D uploads ignore the image parameters.
    #[must_use]
    pub fn from_pixel_store(store: &PixelStore, is_3d: bool) -> Self {
        Self {
            alignment: store.unpack_alignment,
            row_length: store.unpack_row_length,
            image_height: if is_3d { store.unpack_image_height } else { 0 },
            skip_pixels: store.unpack_skip_pixels,
            skip_rows: store.unpack_skip_rows,
            skip_images: if is_3d { store.unpack_skip_images } else { 0 },
            flip_y: store.flip_y,
            premultiply_alpha: store.premultiply_alpha,
            colorspace_conversion: store.colorspace_conversion != gl::NONE,
        }
    }

    /// Computes the layout of a `size` upload with `bytes_per_pixel`.
    ///
    /// Skips that run past an explicit row length or image height are
    /// `INVALID_OPERATION`; arithmetic overflow is `OUT_OF_MEMORY`.
    pub fn layout(&self, size: [u32; 3], bytes_per_pixel: u32) -> Validated<UnpackLayout> {
        let [width, height, depth] = size.map(u64::from);
        let bpp = u64::from(bytes_per_pixel);

        let used_pixels = u64::from(self.skip_pixels) + width;
        if self.row_length != 0 && used_pixels > u64::from(self.row_length) {
            return Err(Failure::invalid_operation(
                "UNPACK_SKIP_PIXELS + width exceeds UNPACK_ROW_LENGTH.",
            ));
        }
        let used_rows = u64::from(self.skip_rows) + height;
        if self.image_height != 0 && used_rows > u64::from(self.image_height) {
            return Err(Failure::invalid_operation(
                "UNPACK_SKIP_ROWS + height exceeds UNPACK_IMAGE_HEIGHT.",
            ));
        }

        let overflow = || Failure::out_of_memory("Upload size overflows.");
        let stride_pixels = if self.row_length == 0 {
            used_pixels
        } else {
            u64::from(self.row_length)
        };
        let stride_rows = if self.image_height == 0 {
            used_rows
        } else {
            u64::from(self.image_height)
        };
        let row_stride = stride_pixels
            .checked_mul(bpp)
            .and_then(|bytes| gl::round_up_to_multiple_of(bytes, u64::from(self.alignment)))
            .ok_or_else(overflow)?;
        let image_stride = row_stride.checked_mul(stride_rows).ok_or_else(overflow)?;
        let row_bytes = width.checked_mul(bpp).ok_or_else(overflow)?;

        if width == 0 || height == 0 || depth == 0 {
            return Ok(UnpackLayout {
                row_stride,
                image_stride,
                skip_bytes: 0,
                row_bytes,
                total_bytes: 0,
            });
        }

        let skip_bytes = u64::from(self.skip_images)
            .checked_mul(image_stride)
            .and_then(|b| b.checked_add(u64::from(self.skip_rows).checked_mul(row_stride)?))
            .and_then(|b| b.checked_add(u64::from(self.skip_pixels).checked_mul(bpp)?))
            .ok_or_else(overflow)?;
        let used_images = u64::from(self.skip_images) + depth;
        let total_bytes = (used_images - 1)
            .checked_mul(image_stride)
            .and_then(|b| b.checked_add((used_rows - 1).checked_mul(row_stride)?))
            .and_then(|b| b.checked_add(used_pixels.checked_mul(bpp)?))
            .ok_or_else(overflow)?;

        Ok(UnpackLayout {
            row_stride,
            image_stride,
            skip_bytes,
            row_bytes,
            total_bytes,
        })
    }
}
