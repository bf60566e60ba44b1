// filter.rs — Gaussian filter parameters, integer kernels and status codes.
//
// A blur call is fully described by a `FilterConfig`: the square mask size
// and the border policy. The anchor is not a free parameter; it is always
// the mask centre.
//
// KERNELS
// ───────
// Weights are integers so that the CPU reference (convolution.rs) and the
// GPU kernel (shaders/gauss_blur.wgsl) produce identical bytes:
//
//   out = (Σ w[i][j] · p[i][j] + sum / 2) / sum
//
// 3×3 and 5×5 use the classic fixed tables (sum 16 and 571). Larger masks
// sample a 2D Gaussian scaled so the centre weight is 1024, with
//   σ = 0.3 · ((n − 1)/2 − 1) + 0.8
// The largest mask (13×13) stays far below u32 overflow: sum < 2^17 and
// 255 · sum < 2^25.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// MaskSize
// ---------------------------------------------------------------------------

/// Square mask footprint of the Gaussian filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaskSize {
    Size3x3,
    #[default]
    Size5x5,
    Size7x7,
    Size9x9,
    Size11x11,
    Size13x13,
}

impl MaskSize {
    /// Every supported mask, smallest first.
    pub const ALL: [MaskSize; 6] = [
        MaskSize::Size3x3,
        MaskSize::Size5x5,
        MaskSize::Size7x7,
        MaskSize::Size9x9,
        MaskSize::Size11x11,
        MaskSize::Size13x13,
    ];

    /// Side length in pixels.
    pub fn side(self) -> usize {
        match self {
            MaskSize::Size3x3 => 3,
            MaskSize::Size5x5 => 5,
            MaskSize::Size7x7 => 7,
            MaskSize::Size9x9 => 9,
            MaskSize::Size11x11 => 11,
            MaskSize::Size13x13 => 13,
        }
    }

    /// Distance from the anchor to the mask edge (side / 2).
    pub fn radius(self) -> usize {
        self.side() / 2
    }

    /// Look up a mask by side length.
    pub fn from_side(side: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.side() == side)
    }
}

impl fmt::Display for MaskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.side();
        write!(f, "{n}x{n}")
    }
}

/// Accepts `"5"` and `"5x5"`.
impl FromStr for MaskSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let side_str = match s.split_once(['x', 'X']) {
            Some((a, b)) if a == b => a,
            Some(_) => return Err(format!("mask must be square, got {s:?}")),
            None => s,
        };
        let side: usize = side_str
            .parse()
            .map_err(|_| format!("invalid mask size {s:?}"))?;
        MaskSize::from_side(side)
            .ok_or_else(|| format!("unsupported mask size {side} (expected 3, 5, 7, 9, 11 or 13)"))
    }
}

// ---------------------------------------------------------------------------
// BorderPolicy
// ---------------------------------------------------------------------------

/// How samples outside the image are produced when the mask overhangs an
/// edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderPolicy {
    /// Nearest edge pixel (`aaa|abcd|ddd`).
    #[default]
    Replicate,
    /// A fixed sample value.
    Constant(u8),
    /// Reflection without repeating the edge pixel (`dcb|abcd|cba`).
    Mirror,
    /// Periodic continuation (`bcd|abcd|abc`).
    Wrap,
}

impl BorderPolicy {
    /// Discriminant shared with the WGSL kernel (`BORDER_*` constants).
    pub fn shader_id(self) -> u32 {
        match self {
            BorderPolicy::Replicate => 0,
            BorderPolicy::Constant(_) => 1,
            BorderPolicy::Mirror => 2,
            BorderPolicy::Wrap => 3,
        }
    }

    /// Map a coordinate to an in-bounds index along an axis of length `len`.
    ///
    /// Returns `None` only for `Constant`, meaning "use the constant value".
    /// `len` must be non-zero.
    #[inline]
    pub fn resolve(self, i: isize, len: usize) -> Option<usize> {
        debug_assert!(len > 0);
        let n = len as isize;
        if (0..n).contains(&i) {
            return Some(i as usize);
        }
        match self {
            BorderPolicy::Replicate => Some(i.clamp(0, n - 1) as usize),
            BorderPolicy::Constant(_) => None,
            BorderPolicy::Wrap => Some(i.rem_euclid(n) as usize),
            BorderPolicy::Mirror => {
                if n == 1 {
                    return Some(0);
                }
                // Reflect with period 2(n-1); repeated reflection for masks
                // wider than the image collapses to one modulo.
                let period = 2 * (n - 1);
                let m = i.rem_euclid(period);
                Some(if m < n { m } else { period - m } as usize)
            }
        }
    }
}

impl fmt::Display for BorderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BorderPolicy::Replicate => write!(f, "replicate"),
            BorderPolicy::Constant(v) => write!(f, "constant({v})"),
            BorderPolicy::Mirror => write!(f, "mirror"),
            BorderPolicy::Wrap => write!(f, "wrap"),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterConfig
// ---------------------------------------------------------------------------

/// Immutable parameter bundle for one Gaussian blur call.
///
/// The default is the classic configuration: 5×5 mask, edge replication,
/// anchor at (2, 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterConfig {
    pub mask: MaskSize,
    pub border: BorderPolicy,
}

impl FilterConfig {
    pub fn new(mask: MaskSize, border: BorderPolicy) -> Self {
        FilterConfig { mask, border }
    }

    /// Anchor offset inside the mask, always the centre.
    pub fn anchor(&self) -> (usize, usize) {
        let r = self.mask.radius();
        (r, r)
    }

    /// Integer weights for this configuration's mask.
    pub fn kernel(&self) -> GaussKernel {
        GaussKernel::new(self.mask)
    }
}

impl fmt::Display for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ax, ay) = self.anchor();
        write!(f, "mask {}, border {}, anchor ({ax}, {ay})", self.mask, self.border)
    }
}

// ---------------------------------------------------------------------------
// GaussKernel
// ---------------------------------------------------------------------------

const KERNEL_3X3: [u32; 9] = [
    1, 2, 1,
    2, 4, 2,
    1, 2, 1,
];

const KERNEL_5X5: [u32; 25] = [
     2,  7,  12,  7,  2,
     7, 31,  52, 31,  7,
    12, 52, 127, 52, 12,
     7, 31,  52, 31,  7,
     2,  7,  12,  7,  2,
];

/// Centre weight of the generated kernels (7×7 and up).
const GENERATED_CENTRE_WEIGHT: f64 = 1024.0;

/// Row-major `side × side` integer weights and their sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaussKernel {
    side: usize,
    weights: Vec<u32>,
    sum: u32,
}

impl GaussKernel {
    pub fn new(mask: MaskSize) -> Self {
        let side = mask.side();
        let weights = match mask {
            MaskSize::Size3x3 => KERNEL_3X3.to_vec(),
            MaskSize::Size5x5 => KERNEL_5X5.to_vec(),
            _ => generated_weights(side),
        };
        let sum = weights.iter().sum();
        GaussKernel { side, weights, sum }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn radius(&self) -> usize {
        self.side / 2
    }

    /// Weights in row-major order, `side * side` entries.
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    /// Weight at mask row `i`, column `j`.
    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> u32 {
        self.weights[i * self.side + j]
    }

    pub fn sum(&self) -> u32 {
        self.sum
    }

    /// Normalise an accumulated sum back to a pixel value, rounding half up.
    #[inline]
    pub fn normalize(&self, acc: u32) -> u32 {
        (acc + self.sum / 2) / self.sum
    }
}

fn generated_weights(side: usize) -> Vec<u32> {
    let r = (side / 2) as f64;
    let sigma = 0.3 * (r - 1.0) + 0.8;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut weights = Vec::with_capacity(side * side);
    for i in 0..side {
        for j in 0..side {
            let dy = i as f64 - r;
            let dx = j as f64 - r;
            let w = GENERATED_CENTRE_WEIGHT * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
            // Corner weights never round to zero for n <= 13, but keep every
            // tap non-zero so the footprint is the full mask.
            weights.push((w.round() as u32).max(1));
        }
    }
    weights
}

// ---------------------------------------------------------------------------
// FilterStatus
// ---------------------------------------------------------------------------

/// Result code of a filter primitive. The caller must check it; only
/// `Success` means the destination holds valid pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a filter status must be checked"]
pub enum FilterStatus {
    Success,
    /// Source and destination dimensions differ, or are zero.
    SizeMismatch,
    /// A row pitch is smaller than the image width.
    StrideError,
    /// The mask does not fit the device's kernel limits.
    MaskSizeError,
    /// The border policy is not supported by the device.
    BorderError,
    /// The device failed while executing the filter.
    ExecutionFailed,
}

impl FilterStatus {
    /// Stable integer code: 0 for success, negative for errors.
    pub fn code(self) -> i32 {
        match self {
            FilterStatus::Success => 0,
            FilterStatus::SizeMismatch => -6,
            FilterStatus::StrideError => -14,
            FilterStatus::MaskSizeError => -33,
            FilterStatus::BorderError => -35,
            FilterStatus::ExecutionFailed => -1000,
        }
    }

    pub fn is_success(self) -> bool {
        self == FilterStatus::Success
    }
}

impl fmt::Display for FilterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterStatus::Success => "success",
            FilterStatus::SizeMismatch => "size mismatch",
            FilterStatus::StrideError => "stride error",
            FilterStatus::MaskSizeError => "mask size error",
            FilterStatus::BorderError => "border error",
            FilterStatus::ExecutionFailed => "execution failed",
        };
        write!(f, "{name} ({})", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_5x5_replicate_centre_anchor() {
        let cfg = FilterConfig::default();
        assert_eq!(cfg.mask, MaskSize::Size5x5);
        assert_eq!(cfg.border, BorderPolicy::Replicate);
        assert_eq!(cfg.anchor(), (2, 2));
    }

    #[test]
    fn test_fixed_kernel_sums() {
        assert_eq!(GaussKernel::new(MaskSize::Size3x3).sum(), 16);
        assert_eq!(GaussKernel::new(MaskSize::Size5x5).sum(), 571);
    }

    #[test]
    fn test_kernels_are_symmetric_and_peak_at_centre() {
        for mask in MaskSize::ALL {
            let k = GaussKernel::new(mask);
            let n = k.side();
            let r = k.radius();
            assert_eq!(k.weights().len(), n * n);
            let centre = k.weight(r, r);
            for i in 0..n {
                for j in 0..n {
                    assert_eq!(k.weight(i, j), k.weight(j, i), "{mask}: transpose ({i},{j})");
                    assert_eq!(k.weight(i, j), k.weight(n - 1 - i, n - 1 - j), "{mask}: flip ({i},{j})");
                    assert!(k.weight(i, j) <= centre);
                    assert!(k.weight(i, j) > 0);
                }
            }
        }
    }

    #[test]
    fn test_largest_kernel_cannot_overflow() {
        let k = GaussKernel::new(MaskSize::Size13x13);
        assert!((k.sum() as u64) * 255 + (k.sum() as u64) / 2 < u32::MAX as u64);
    }

    #[test]
    fn test_normalize_constant_is_identity() {
        for mask in MaskSize::ALL {
            let k = GaussKernel::new(mask);
            for v in [0u32, 1, 127, 128, 254, 255] {
                assert_eq!(k.normalize(v * k.sum()), v, "{mask} v={v}");
            }
        }
    }

    #[test]
    fn test_mask_size_parse() {
        assert_eq!("5".parse::<MaskSize>(), Ok(MaskSize::Size5x5));
        assert_eq!("13x13".parse::<MaskSize>(), Ok(MaskSize::Size13x13));
        assert_eq!("3X3".parse::<MaskSize>(), Ok(MaskSize::Size3x3));
        assert!("4".parse::<MaskSize>().is_err());
        assert!("5x7".parse::<MaskSize>().is_err());
        assert!("big".parse::<MaskSize>().is_err());
    }

    #[test]
    fn test_resolve_replicate() {
        let b = BorderPolicy::Replicate;
        assert_eq!(b.resolve(-3, 4), Some(0));
        assert_eq!(b.resolve(2, 4), Some(2));
        assert_eq!(b.resolve(9, 4), Some(3));
    }

    #[test]
    fn test_resolve_mirror() {
        // abcd → index sequence around the left edge: d c b | a b c d | c b a
        let b = BorderPolicy::Mirror;
        assert_eq!(b.resolve(-1, 4), Some(1));
        assert_eq!(b.resolve(-2, 4), Some(2));
        assert_eq!(b.resolve(-3, 4), Some(3));
        assert_eq!(b.resolve(4, 4), Some(2));
        assert_eq!(b.resolve(5, 4), Some(1));
        // Beyond one reflection: reflect again.
        assert_eq!(b.resolve(-4, 4), Some(2));
        assert_eq!(b.resolve(-5, 2), Some(1));
        assert_eq!(b.resolve(-6, 1), Some(0));
    }

    #[test]
    fn test_resolve_wrap_and_constant() {
        assert_eq!(BorderPolicy::Wrap.resolve(-1, 4), Some(3));
        assert_eq!(BorderPolicy::Wrap.resolve(9, 4), Some(1));
        assert_eq!(BorderPolicy::Constant(7).resolve(-1, 4), None);
        assert_eq!(BorderPolicy::Constant(7).resolve(1, 4), Some(1));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(FilterStatus::Success.code(), 0);
        assert!(FilterStatus::Success.is_success());
        for s in [
            FilterStatus::SizeMismatch,
            FilterStatus::StrideError,
            FilterStatus::MaskSizeError,
            FilterStatus::BorderError,
            FilterStatus::ExecutionFailed,
        ] {
            assert!(s.code() < 0);
            assert!(!s.is_success());
        }
    }
}
