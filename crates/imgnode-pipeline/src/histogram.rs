//! 256-bin intensity histogram.
//!
//! Used for display and as the input to Otsu threshold selection. The
//! histogram is always computed over single-channel intensities; color
//! rasters are luma-reduced first.

use serde::{Deserialize, Serialize};

use crate::raster::Raster;
use crate::types::GrayImage;

/// Per-intensity pixel counts for a single-channel image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    counts: Vec<u32>,
}

impl Histogram {
    /// Number of bins, one per 8-bit intensity.
    pub const BINS: usize = 256;

    /// Histogram of a single-channel image.
    #[must_use]
    pub fn of_gray(image: &GrayImage) -> Self {
        let counts = imageproc::stats::histogram(image)
            .channels
            .first()
            .map_or_else(|| vec![0; Self::BINS], |bins| bins.to_vec());
        Self { counts }
    }

    /// Histogram of any raster, luma-reducing color input first.
    #[must_use]
    pub fn of(raster: &Raster) -> Self {
        Self::of_gray(&raster.gray_view())
    }

    /// Raw per-bin counts, indexed by intensity.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Per-bin counts as floats, the form display widgets plot.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bins(&self) -> Vec<f32> {
        self.counts.iter().map(|&c| c as f32).collect()
    }

    /// Bins scaled to sum to one. All zeros for an empty image.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn normalized(&self) -> Vec<f32> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; Self::BINS];
        }
        let total = total as f64;
        self.counts
            .iter()
            .map(|&c| (f64::from(c) / total) as f32)
            .collect()
    }

    /// Total number of pixels counted.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Most populated intensity and its count. Ties pick the darker bin.
    #[must_use]
    pub fn peak(&self) -> Option<(u8, u32)> {
        let (index, &count) = self
            .counts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
        if count == 0 {
            return None;
        }
        Some((u8::try_from(index).ok()?, count))
    }

    /// Mean intensity, or `None` for an empty image.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let weighted: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(i, &c)| i as f64 * f64::from(c))
            .sum();
        Some(weighted / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RgbImage;

    #[test]
    fn counts_every_pixel_once() {
        let img = GrayImage::from_fn(4, 4, |x, _| image::Luma([[0, 85, 170, 255][x as usize]]));
        let hist = Histogram::of_gray(&img);
        assert_eq!(hist.counts().len(), Histogram::BINS);
        assert_eq!(hist.total(), 16);
        for v in [0, 85, 170, 255] {
            assert_eq!(hist.counts()[v], 4);
        }
        assert_eq!(hist.counts().iter().filter(|&&c| c > 0).count(), 4);
    }

    #[test]
    fn color_input_is_luma_reduced() {
        let img = RgbImage::from_pixel(3, 2, image::Rgb([0, 255, 0]));
        let hist = Histogram::of(&Raster::Rgb(img));
        assert_eq!(hist.counts()[150], 6);
    }

    #[test]
    fn bins_are_floats_of_counts() {
        let img = GrayImage::from_pixel(2, 5, image::Luma([9]));
        let bins = Histogram::of_gray(&img).bins();
        assert_eq!(bins.len(), 256);
        assert!((bins[9] - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn normalized_sums_to_one() {
        let img = GrayImage::from_fn(7, 3, |x, y| image::Luma([u8::try_from(x * 30 + y).unwrap_or(0)]));
        let sum: f32 = Histogram::of_gray(&img).normalized().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_image_has_no_peak_or_mean() {
        let hist = Histogram::of_gray(&GrayImage::new(0, 0));
        assert_eq!(hist.total(), 0);
        assert_eq!(hist.peak(), None);
        assert_eq!(hist.mean(), None);
        assert!(hist.normalized().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn peak_prefers_darker_bin_on_tie() {
        let img = GrayImage::from_fn(2, 1, |x, _| image::Luma([if x == 0 { 200 } else { 40 }]));
        assert_eq!(Histogram::of_gray(&img).peak(), Some((40, 1)));
    }

    #[test]
    fn mean_of_two_levels() {
        let img = GrayImage::from_fn(2, 1, |x, _| image::Luma([if x == 0 { 10 } else { 30 }]));
        let mean = Histogram::of_gray(&img).mean().unwrap_or_default();
        assert!((mean - 20.0).abs() < 1e-9);
    }
}
