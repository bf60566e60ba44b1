// convert.rs — Row-wise copies between image layouts.
//
// Host and device never agree on a row stride: decoded images are packed,
// device images use an aligned pitch, and encoders want packed rows again.
// Every crossing goes through one of these helpers, which copy row by row
// and never carry padding across.
//
//   pack_rows    Image<u8> (any stride) → packed bytes, for encoders
//   repitch      Image<u8> → Image<u8> with a new stride
//   widen_rows   Image<u8> → Image<u32> (GPU staging, one word per pixel)
//   narrow_rows  u32 words at a pitch → packed Image<u8>

use std::borrow::Cow;

use crate::image::{Image, Pixel};

/// Round `value` up to the next multiple of `alignment` (non-zero).
///
///   align_to(100, 64) = 128
///   align_to(128, 64) = 128
#[inline]
pub fn align_to(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment > 0);
    value.div_ceil(alignment) * alignment
}

/// Visible pixels as one packed buffer (`width * height` bytes).
///
/// Borrows when the image is already packed.
pub fn pack_rows(src: &Image<u8>) -> Cow<'_, [u8]> {
    if src.stride() == src.width() {
        return Cow::Borrowed(src.as_slice());
    }
    let mut out = Vec::with_capacity(src.width() * src.height());
    for row in src.rows() {
        out.extend_from_slice(row);
    }
    Cow::Owned(out)
}

/// Copy `src` into a new image with the given stride.
///
/// # Panics
/// Panics if `stride < src.width()`.
pub fn repitch<T: Pixel>(src: &Image<T>, stride: usize) -> Image<T> {
    let mut dst = Image::new_with_stride(src.width(), src.height(), stride);
    for y in 0..src.height() {
        dst.row_mut(y).copy_from_slice(src.row(y));
    }
    dst
}

/// Widen 8-bit samples into 32-bit words at the given pitch.
pub fn widen_rows(src: &Image<u8>, pitch: usize) -> Image<u32> {
    let mut dst = Image::<u32>::new_with_stride(src.width(), src.height(), pitch);
    for y in 0..src.height() {
        for (d, &s) in dst.row_mut(y).iter_mut().zip(src.row(y)) {
            *d = s.to_u32();
        }
    }
    dst
}

/// Narrow 32-bit words laid out at `pitch` into a packed 8-bit image.
/// Words above 255 saturate.
///
/// # Panics
/// Panics if `words` is shorter than `pitch * height`.
pub fn narrow_rows(words: &[u32], width: usize, height: usize, pitch: usize) -> Image<u8> {
    assert!(
        words.len() >= pitch * height,
        "word buffer ({}) shorter than pitch * height ({})",
        words.len(),
        pitch * height,
    );
    let mut dst = Image::<u8>::new(width, height);
    for y in 0..height {
        let src_row = &words[y * pitch..y * pitch + width];
        for (d, &s) in dst.row_mut(y).iter_mut().zip(src_row) {
            *d = u8::from_u32(s);
        }
    }
    dst
}
