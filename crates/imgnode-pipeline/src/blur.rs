//! Gaussian and box blur with an explicit odd kernel size.
//!
//! The kernel width is always `2 * radius + 1`. Both variants replicate
//! the border pixels and keep channel count and dimensions. The box
//! variant runs `imageproc`'s running-sum filter on each channel, which
//! truncates after each pass. The Gaussian variant runs through
//! [`crate::convolve`] and rounds once.
//!
//! The Gaussian variant takes no sigma from the caller. Sigma is
//! derived from the kernel width as `0.3 * ((k - 1) / 2 - 1) + 0.8`,
//! which gives 0.8 for a 3x3 kernel and grows linearly from there.

use serde::{Deserialize, Serialize};

use imageproc::filter::box_filter;

use crate::convolve;
use crate::raster::Raster;
use crate::types::GrayImage;

/// Smallest blur radius (3x3 kernel).
pub const MIN_RADIUS: u32 = 1;
/// Largest blur radius (41x41 kernel).
pub const MAX_RADIUS: u32 = 20;
const _: () = assert!(kernel_size(MIN_RADIUS) >= 3);

/// Which blur kernel to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlurMethod {
    /// Gaussian-weighted kernel with sigma derived from its width.
    #[default]
    Gaussian,
    /// Unweighted mean over the kernel window.
    Box,
}

/// Kernel width for a given radius: `2 * radius + 1`.
#[must_use]
pub const fn kernel_size(radius: u32) -> u32 {
    2 * radius + 1
}

/// Sigma used for a Gaussian kernel of the given width.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gaussian_sigma(kernel_size: u32) -> f32 {
    0.3f32.mul_add((kernel_size.saturating_sub(1) as f32).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1-D Gaussian weights of length `kernel_size`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gaussian_kernel(kernel_size: u32) -> Vec<f32> {
    let sigma = gaussian_sigma(kernel_size);
    let half = (kernel_size / 2) as f32;
    let weights: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let d = i as f32 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Blur every channel of `raster` with a `2 * radius + 1` kernel.
#[must_use = "returns the blurred raster"]
pub fn blur(raster: &Raster, radius: u32, method: BlurMethod) -> Raster {
    match method {
        BlurMethod::Gaussian => gaussian(raster, &gaussian_kernel(kernel_size(radius))),
        BlurMethod::Box => box_mean(raster, radius),
    }
}

/// Gaussian-smooth a single-channel image with an odd `kernel_size`.
///
/// A kernel size of 1 returns the image unchanged.
#[must_use = "returns the blurred image"]
pub fn gaussian_gray(image: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return image.clone();
    }
    let data = convolve::separable_u8(
        image.as_raw(),
        image.width(),
        image.height(),
        1,
        &gaussian_kernel(kernel_size),
    );
    GrayImage::from_vec(image.width(), image.height(), data).unwrap_or_else(|| image.clone())
}

fn gaussian(raster: &Raster, kernel: &[f32]) -> Raster {
    let (w, h) = (raster.width(), raster.height());
    let channels = usize::from(raster.channels().count());
    let data = convolve::separable_u8(raster.as_raw(), w, h, channels, kernel);
    // Same shape as the input, so this only fails on a logic error.
    Raster::from_raw(w, h, raster.channels().count(), data).unwrap_or_else(|_| raster.clone())
}

fn box_mean(raster: &Raster, radius: u32) -> Raster {
    let (w, h) = (raster.width(), raster.height());
    let stride = usize::from(raster.channels().count());
    let raw = raster.as_raw();
    let mut data = vec![0; raw.len()];

    // Split into single-channel planes, filter each, interleave back.
    for c in 0..stride {
        let plane: Vec<u8> = raw.iter().skip(c).step_by(stride).copied().collect();
        let Some(plane) = GrayImage::from_vec(w, h, plane) else {
            return raster.clone();
        };
        let filtered = box_filter(&plane, radius, radius);
        for (dst, &v) in data.iter_mut().skip(c).step_by(stride).zip(filtered.iter()) {
            *dst = v;
        }
    }
    Raster::from_raw(w, h, raster.channels().count(), data).unwrap_or_else(|_| raster.clone())
}
