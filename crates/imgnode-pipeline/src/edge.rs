//! Edge detection (Canny, Sobel) and edge overlay.
//!
//! Both detectors read a single-channel image and return a binary mask:
//! 255 for edge pixels, 0 for background. The aperture comes from the
//! kernel parameter as `2k - 1`, so `k = 1..=4` gives apertures 1, 3, 5
//! and 7.
//!
//! - **Canny** pre-smooths with a Gaussian of the aperture's width, then
//!   runs gradient, non-maximum suppression and hysteresis between the
//!   lower and upper thresholds.
//! - **Sobel** takes the horizontal and vertical derivatives at the
//!   aperture, blends their absolute values 50/50 and binarizes at the
//!   lower threshold. The upper threshold is unused.

use image::Luma;
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel::Kernel;
use serde::{Deserialize, Serialize};

use crate::blur;
use crate::canny;
use crate::raster::Raster;
use crate::threshold;
use crate::types::{EdgeConfig, GrayImage};

/// Minimum allowed Canny threshold.
///
/// A zero threshold makes every pixel with any gradient a candidate
/// edge and floods the mask.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Smallest kernel parameter (aperture 1).
pub const MIN_KERNEL_PARAM: u32 = 1;
/// Largest kernel parameter (aperture 7).
pub const MAX_KERNEL_PARAM: u32 = 4;

/// Overlay highlight color (pure red) for color buffers.
pub const HIGHLIGHT_RGB: [u8; 3] = [255, 0, 0];
/// Overlay highlight intensity for single-channel buffers.
///
/// A single-channel buffer only has room for the first component of
/// the highlight as stored blue-first, which is 0, so edges darken.
pub const HIGHLIGHT_GRAY: u8 = 0;

/// Which edge detector to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeMethod {
    /// Gradient with non-maximum suppression and hysteresis.
    #[default]
    Canny,
    /// Thresholded gradient magnitude.
    Sobel,
}

/// Odd aperture for a kernel parameter: `2k - 1`.
#[must_use]
pub const fn aperture(kernel: u32) -> u32 {
    kernel.saturating_mul(2).saturating_sub(1)
}

/// Detect edges in `image` with the method and thresholds in `config`.
#[must_use = "returns the binary edge map"]
pub fn detect_edges(image: &GrayImage, config: &EdgeConfig) -> GrayImage {
    match config.method {
        EdgeMethod::Canny => canny(image, config.lower, config.upper, config.aperture()),
        EdgeMethod::Sobel => sobel(image, config.lower, config.aperture()),
    }
}

/// Canny edges after a Gaussian pre-smooth of width `aperture`.
///
/// Thresholds given in the wrong order are swapped, and both are raised
/// to at least [`MIN_THRESHOLD`].
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, lower: u8, upper: u8, aperture: u32) -> GrayImage {
    let (low, high) = if lower <= upper {
        (lower, upper)
    } else {
        (upper, lower)
    };
    let smoothed = blur::gaussian_gray(image, aperture);
    canny::canny(
        &smoothed,
        f32::from(low).max(MIN_THRESHOLD),
        f32::from(high).max(MIN_THRESHOLD),
    )
}

/// Sobel edges: `255` where the blended gradient magnitude exceeds `lower`.
#[must_use = "returns the binary edge map"]
pub fn sobel(image: &GrayImage, lower: u8, aperture: u32) -> GrayImage {
    threshold::binary(&sobel_magnitude(image, aperture), lower)
}

/// `(|dx| + |dy|) / 2`, each derivative saturated to `[0, 255]` first
/// and the blend rounded half to even.
#[must_use]
pub fn sobel_magnitude(image: &GrayImage, aperture: u32) -> GrayImage {
    let (smooth, derivative) = sobel_kernels(aperture);
    let (smooth_len, derivative_len) = (smooth.len(), derivative.len());

    // Outer products: x differentiates along rows, y along columns.
    let dx_data: Vec<i32> = smooth
        .iter()
        .flat_map(|&s| derivative.iter().map(move |&d| s * d))
        .collect();
    let dy_data: Vec<i32> = derivative
        .iter()
        .flat_map(|&d| smooth.iter().map(move |&s| d * s))
        .collect();
    let (Ok(smooth_len), Ok(derivative_len)) =
        (u32::try_from(smooth_len), u32::try_from(derivative_len))
    else {
        return GrayImage::new(image.width(), image.height());
    };
    let dx: Image<Luma<i32>> =
        filter_clamped::<_, i32, i32>(image, Kernel::new(&dx_data, derivative_len, smooth_len));
    let dy: Image<Luma<i32>> =
        filter_clamped::<_, i32, i32>(image, Kernel::new(&dy_data, smooth_len, derivative_len));

    let saturate = |g: i32| g.unsigned_abs().min(255);
    let blended: Vec<u8> = dx
        .iter()
        .zip(dy.iter())
        .map(|(&gx, &gy)| blend_half(saturate(gx) + saturate(gy)))
        .collect();
    GrayImage::from_vec(image.width(), image.height(), blended)
        .unwrap_or_else(|| GrayImage::new(image.width(), image.height()))
}

/// `sum / 2` rounded half to even, saturated to `u8`.
fn blend_half(sum: u32) -> u8 {
    let (q, r) = (sum / 2, sum % 2);
    u8::try_from(q + (r & q & 1)).unwrap_or(u8::MAX)
}

/// Smoothing and derivative rows for a Sobel operator of width `aperture`.
///
/// Aperture 1 differentiates with `[-1, 0, 1]` and does no cross
/// smoothing. Larger apertures smooth with the binomial row of that
/// length and differentiate with the binomial row two shorter,
/// convolved with `[-1, 0, 1]`.
#[must_use]
pub fn sobel_kernels(aperture: u32) -> (Vec<i32>, Vec<i32>) {
    if aperture <= 1 {
        return (vec![1], vec![-1, 0, 1]);
    }
    let smooth = binomial(aperture as usize);
    let base = binomial(aperture as usize - 2);
    let mut derivative = vec![0; base.len() + 2];
    for (i, &b) in base.iter().enumerate() {
        derivative[i] -= b;
        derivative[i + 2] += b;
    }
    (smooth, derivative)
}

/// Row `len - 1` of Pascal's triangle.
fn binomial(len: usize) -> Vec<i32> {
    let mut row = vec![1];
    for _ in 1..len {
        let mut next = vec![1; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// Blend the highlight color into `base` wherever `mask` is set.
///
/// Edge pixels become `round(0.7 * original + 0.3 * highlight)`; other
/// pixels and any alpha channel are left alone. `mask` must have the
/// same dimensions as `base`.
#[must_use = "returns the composited raster"]
pub fn overlay(base: Raster, mask: &GrayImage) -> Raster {
    let blend = |o: u8, hl: u8| {
        let value = (7 * u16::from(o) + 3 * u16::from(hl) + 5) / 10;
        u8::try_from(value).unwrap_or(u8::MAX)
    };
    let edges = mask.iter().map(|&m| m > 0);

    match base {
        Raster::Gray(mut img) => {
            for (px, on) in img.iter_mut().zip(edges) {
                if on {
                    *px = blend(*px, HIGHLIGHT_GRAY);
                }
            }
            Raster::Gray(img)
        }
        Raster::Rgb(mut img) => {
            for (px, on) in img.pixels_mut().zip(edges) {
                if on {
                    for (c, hl) in px.0.iter_mut().zip(HIGHLIGHT_RGB) {
                        *c = blend(*c, hl);
                    }
                }
            }
            Raster::Rgb(img)
        }
        Raster::Rgba(mut img) => {
            for (px, on) in img.pixels_mut().zip(edges) {
                if on {
                    for (c, hl) in px.0.iter_mut().zip(HIGHLIGHT_RGB) {
                        *c = blend(*c, hl);
                    }
                }
            }
            Raster::Rgba(img)
        }
    }
}

/// Count non-zero pixels in a binary mask.
#[must_use]
pub fn count_edge_pixels(mask: &GrayImage) -> u64 {
    mask.iter().map(|&v| u64::from(v > 0)).sum()
}
