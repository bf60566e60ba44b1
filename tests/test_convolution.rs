// tests/test_convolution.rs — Integration tests for the CPU reference blur.

use gauss_blur::convolution::{filter_gauss_border, gauss_blur};
use gauss_blur::filter::{BorderPolicy, FilterConfig, FilterStatus, MaskSize};
use gauss_blur::image::Image;

const REFLECTING: [BorderPolicy; 3] = [BorderPolicy::Replicate, BorderPolicy::Mirror, BorderPolicy::Wrap];

fn diagonal_bands(w: usize, h: usize) -> Image<u8> {
    let mut img = Image::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.set(x, y, ((x * 7 + y * 13) % 256) as u8);
        }
    }
    img
}

// ===== Invariants =====

#[test]
fn constant_image_stays_constant() {
    for mask in MaskSize::ALL {
        for border in REFLECTING {
            for value in [0u8, 1, 128, 255] {
                let img = Image::filled(19, 11, value);
                let out = gauss_blur(&img, &FilterConfig::new(mask, border)).unwrap();
                assert!(
                    out.pixels().all(|(_, _, v)| v == value),
                    "{mask} {border} value {value}"
                );
            }
        }
    }
}

#[test]
fn constant_border_matching_image_is_identity_on_flat_input() {
    let img = Image::filled(8, 8, 77u8);
    let cfg = FilterConfig::new(MaskSize::Size9x9, BorderPolicy::Constant(77));
    assert_eq!(gauss_blur(&img, &cfg).unwrap(), img);
}

#[test]
fn output_dimensions_match_input() {
    for (w, h) in [(1, 1), (1, 17), (17, 1), (64, 48), (3, 200)] {
        let img = diagonal_bands(w, h);
        for mask in MaskSize::ALL {
            let out = gauss_blur(&img, &FilterConfig::new(mask, BorderPolicy::Replicate)).unwrap();
            assert_eq!(out.dimensions(), (w, h), "{mask} on {w}×{h}");
        }
    }
}

#[test]
fn blurring_twice_differs_from_once() {
    let img = diagonal_bands(32, 32);
    let cfg = FilterConfig::default();
    let once = gauss_blur(&img, &cfg).unwrap();
    let twice = gauss_blur(&once, &cfg).unwrap();
    assert_ne!(once, img);
    assert_ne!(twice, once);
}

#[test]
fn blur_roughly_preserves_mean() {
    let img = diagonal_bands(32, 32);
    let n = (img.width() * img.height()) as f32;
    let mean = |im: &Image<u8>| im.pixels().map(|(_, _, v)| v as f32).sum::<f32>() / n;

    let blurred = gauss_blur(&img, &FilterConfig::default()).unwrap();
    let (before, after) = (mean(&img), mean(&blurred));
    assert!((before - after).abs() < 3.0, "mean shifted too much: {before} → {after}");
}

#[test]
fn horizontal_gradient_survives_in_interior() {
    // A symmetric kernel reproduces a linear ramp exactly, even in integers.
    let mut img: Image<u8> = Image::new(20, 20);
    for y in 0..20 {
        for x in 0..20 {
            img.set(x, y, (x * 10) as u8);
        }
    }
    for mask in MaskSize::ALL {
        let r = mask.radius();
        let out = gauss_blur(&img, &FilterConfig::new(mask, BorderPolicy::Replicate)).unwrap();
        for y in 0..20 {
            for x in r..20 - r {
                assert_eq!(out.get(x, y), img.get(x, y), "{mask} at ({x},{y})");
            }
        }
    }
}

#[test]
fn larger_masks_smooth_more() {
    // A single bright pixel: the peak drops as the mask grows.
    let mut img: Image<u8> = Image::new(31, 31);
    img.set(15, 15, 255);
    let peaks: Vec<u8> = MaskSize::ALL
        .iter()
        .map(|&m| gauss_blur(&img, &FilterConfig::new(m, BorderPolicy::Replicate)).unwrap().get(15, 15))
        .collect();
    assert!(peaks.windows(2).all(|w| w[0] >= w[1]), "{peaks:?}");
    assert!(peaks[0] > peaks[5]);
}

// ===== Layout =====

#[test]
fn source_stride_does_not_change_result() {
    let packed = diagonal_bands(23, 9);
    let mut padded: Image<u8> = Image::new_with_stride(23, 9, 64);
    for y in 0..9 {
        padded.row_mut(y).copy_from_slice(packed.row(y));
    }
    // Garbage in the padding must never be sampled.
    for y in 0..9 {
        let start = y * 64 + 23;
        padded.as_mut_slice()[start..start + 41].fill(0xAB);
    }
    for border in REFLECTING {
        let cfg = FilterConfig::new(MaskSize::Size13x13, border);
        assert_eq!(gauss_blur(&padded, &cfg).unwrap(), gauss_blur(&packed, &cfg).unwrap(), "{border}");
    }
}

#[test]
fn mismatched_destination_is_rejected() {
    let src = diagonal_bands(10, 10);
    let mut dst: Image<u8> = Image::new(10, 9);
    assert_eq!(
        filter_gauss_border(&src, &mut dst, &FilterConfig::default()),
        FilterStatus::SizeMismatch
    );
}
