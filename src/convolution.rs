// convolution.rs — CPU reference Gaussian blur with border handling.
//
// This is the authoritative implementation of the filter primitive. The
// host device runs it directly; the GPU kernel in shaders/gauss_blur.wgsl
// is validated against it byte for byte.
//
// The mask is applied as a full 2D integer convolution rather than two
// separable passes: rounding once at the end is what keeps the CPU and GPU
// results identical, and a 13×13 mask is still cheap at image sizes this
// tool handles.
//
// BORDER HANDLING
// ───────────────
// Pixels whose mask lies entirely inside the image take the fast interior
// path with unchecked loads. Pixels within `radius` of an edge resolve each
// sample coordinate through `BorderPolicy::resolve`.

use crate::filter::{BorderPolicy, FilterConfig, FilterStatus, GaussKernel};
use crate::image::Image;

/// Blur `src` into the pre-allocated `dst` of identical dimensions.
///
/// Returns `FilterStatus::SizeMismatch` without touching `dst` when the
/// dimensions differ or are zero. Strides of `src` and `dst` are
/// independent.
pub fn filter_gauss_border(
    src: &Image<u8>,
    dst: &mut Image<u8>,
    config: &FilterConfig,
) -> FilterStatus {
    if src.is_empty() || src.dimensions() != dst.dimensions() {
        return FilterStatus::SizeMismatch;
    }

    let kernel = config.kernel();
    let w = src.width();
    let h = src.height();
    let r = kernel.radius();

    for y in 0..h {
        let interior_row = y >= r && y + r < h;
        for x in 0..w {
            let interior = interior_row && x >= r && x + r < w;
            let acc = if interior {
                // SAFETY: x-r..=x+r and y-r..=y+r are all within bounds.
                unsafe { accumulate_interior(src, &kernel, x, y) }
            } else {
                accumulate_border(src, &kernel, config.border, x, y)
            };
            dst.set(x, y, kernel.normalize(acc) as u8);
        }
    }
    FilterStatus::Success
}

/// Convenience wrapper: blur into a freshly allocated packed image.
/// Fails with the status `filter_gauss_border` reports, e.g. for an empty
/// `src`.
pub fn gauss_blur(src: &Image<u8>, config: &FilterConfig) -> Result<Image<u8>, FilterStatus> {
    let mut dst = Image::new(src.width(), src.height());
    match filter_gauss_border(src, &mut dst, config) {
        FilterStatus::Success => Ok(dst),
        status => Err(status),
    }
}

/// # Safety
/// The whole mask centred on (x, y) must lie inside `src`.
#[inline]
unsafe fn accumulate_interior(src: &Image<u8>, kernel: &GaussKernel, x: usize, y: usize) -> u32 {
    let n = kernel.side();
    let r = kernel.radius();
    let mut acc = 0u32;
    for i in 0..n {
        let sy = y + i - r;
        for j in 0..n {
            let sx = x + j - r;
            acc += kernel.weight(i, j) * src.get_unchecked(sx, sy) as u32;
        }
    }
    acc
}

fn accumulate_border(
    src: &Image<u8>,
    kernel: &GaussKernel,
    border: BorderPolicy,
    x: usize,
    y: usize,
) -> u32 {
    let n = kernel.side();
    let r = kernel.radius() as isize;
    let fill = match border {
        BorderPolicy::Constant(v) => v as u32,
        _ => 0,
    };
    let mut acc = 0u32;
    for i in 0..n {
        let sy = border.resolve(y as isize + i as isize - r, src.height());
        for j in 0..n {
            let sx = border.resolve(x as isize + j as isize - r, src.width());
            let sample = match (sx, sy) {
                (Some(sx), Some(sy)) => src.get(sx, sy) as u32,
                _ => fill,
            };
            acc += kernel.weight(i, j) * sample;
        }
    }
    acc
}
