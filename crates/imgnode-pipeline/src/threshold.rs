//! Binarization: global, locally adaptive, and Otsu.
//!
//! Every method reads a single-channel image and produces a mask whose
//! pixels are exactly 0 or 255. A pixel is set when its intensity is
//! strictly greater than the level it is compared against.

use serde::{Deserialize, Serialize};

use imageproc::filter::box_filter;

use crate::histogram::Histogram;
use crate::types::{GrayImage, ThresholdConfig};

/// Smallest adaptive neighborhood width.
pub const MIN_BLOCK_SIZE: u32 = 3;
/// Largest adaptive neighborhood width.
pub const MAX_BLOCK_SIZE: u32 = 99;
/// Lowest adaptive mean offset.
pub const MIN_CONSTANT: f32 = -10.0;
/// Highest adaptive mean offset.
pub const MAX_CONSTANT: f32 = 10.0;
const _: () = assert!(MIN_BLOCK_SIZE % 2 == 1 && MAX_BLOCK_SIZE % 2 == 1);

/// How the threshold level is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThresholdMethod {
    /// One fixed level for the whole image.
    #[default]
    Binary,
    /// Per-pixel level: neighborhood mean minus a constant.
    Adaptive,
    /// One level chosen from the histogram to best separate two classes.
    Otsu,
}

/// Clamp a block size to `[3, 99]` and bump even values to the next odd.
#[must_use]
pub const fn coerce_block_size(block_size: u32) -> u32 {
    let clamped = if block_size < MIN_BLOCK_SIZE {
        MIN_BLOCK_SIZE
    } else if block_size > MAX_BLOCK_SIZE {
        MAX_BLOCK_SIZE
    } else {
        block_size
    };
    if clamped % 2 == 0 { clamped + 1 } else { clamped }
}

/// Binarize `image` with the method and parameters in `config`.
#[must_use = "returns the binary mask"]
pub fn threshold(image: &GrayImage, config: &ThresholdConfig) -> GrayImage {
    match config.method {
        ThresholdMethod::Binary => binary(image, config.value),
        ThresholdMethod::Adaptive => {
            adaptive_mean(image, config.effective_block_size(), config.constant)
        }
        ThresholdMethod::Otsu => binary(image, otsu_level(&Histogram::of_gray(image))),
    }
}

/// The global level `config` would compare against, if it uses one.
///
/// `None` for the adaptive method, whose level varies per pixel.
#[must_use]
pub fn global_level(image: &GrayImage, config: &ThresholdConfig) -> Option<u8> {
    match config.method {
        ThresholdMethod::Binary => Some(config.value),
        ThresholdMethod::Adaptive => None,
        ThresholdMethod::Otsu => Some(otsu_level(&Histogram::of_gray(image))),
    }
}

/// `255` where `pixel > level`, `0` elsewhere.
#[must_use = "returns the binary mask"]
pub fn binary(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = image.clone();
    for v in out.iter_mut() {
        *v = if *v > level { u8::MAX } else { 0 };
    }
    out
}

/// `255` where `pixel > mean - constant`, with `mean` taken over a
/// `block_size` x `block_size` window (replicate border, truncated).
///
/// `block_size` is expected to be odd; callers pass it through
/// [`coerce_block_size`].
#[must_use = "returns the binary mask"]
pub fn adaptive_mean(image: &GrayImage, block_size: u32, constant: f32) -> GrayImage {
    let radius = block_size / 2;
    let means = box_filter(image, radius, radius);
    let mut out = image.clone();
    for (v, &mean) in out.iter_mut().zip(means.iter()) {
        *v = if f32::from(*v) > f32::from(mean) - constant {
            u8::MAX
        } else {
            0
        };
    }
    out
}

/// Otsu's level: the split that maximizes between-class variance.
///
/// Class 0 is every intensity `<= level`. When a range of levels ties
/// for the maximum (as happens whenever the histogram has empty bins
/// between its populated ones), the midpoint of that range is chosen,
/// so two well-separated clusters are split halfway between them.
///
/// A histogram with a single populated bin returns that intensity; an
/// empty histogram returns 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn otsu_level(histogram: &Histogram) -> u8 {
    let counts = histogram.counts();
    let total = histogram.total() as f64;
    if total == 0.0 {
        return 0;
    }
    let weighted_total: f64 = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * f64::from(c))
        .sum();

    let mut background = 0.0;
    let mut background_sum = 0.0;
    let mut best: f64 = -1.0;
    let mut first = None;
    let mut last = 0;

    for (level, &count) in counts.iter().enumerate() {
        background += f64::from(count);
        background_sum += level as f64 * f64::from(count);
        let foreground = total - background;
        if background == 0.0 || foreground == 0.0 {
            continue;
        }
        let mean_diff = background_sum / background - (weighted_total - background_sum) / foreground;
        let variance = background * foreground * mean_diff * mean_diff;

        let tolerance = best.abs() * 1e-12;
        if variance > best + tolerance {
            best = variance;
            first = Some(level);
            last = level;
        } else if (variance - best).abs() <= tolerance {
            last = level;
        }
    }

    let level = first.map_or_else(
        || histogram.peak().map_or(0, |(v, _)| usize::from(v)),
        |first| (first + last) / 2,
    );
    u8::try_from(level).unwrap_or(u8::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 4x4 image whose every row is `[0, 85, 170, 255]`.
    fn ramp_4x4() -> GrayImage {
        GrayImage::from_fn(4, 4, |x, _| image::Luma([[0, 85, 170, 255][x as usize]]))
    }

    /// 100 pixels at 10 followed by 100 pixels at 240.
    fn bimodal() -> GrayImage {
        GrayImage::from_fn(20, 10, |x, _| image::Luma([if x < 10 { 10 } else { 240 }]))
    }

    fn is_binary(mask: &GrayImage) -> bool {
        mask.iter().all(|&v| v == 0 || v == 255)
    }

    #[test]
    fn even_block_sizes_are_bumped_to_odd() {
        for block_size in (2..=98).step_by(2) {
            assert_eq!(coerce_block_size(block_size), block_size + 1);
        }
    }

    #[test]
    fn odd_block_sizes_in_range_are_kept() {
        for block_size in (3..=99).step_by(2) {
            assert_eq!(coerce_block_size(block_size), block_size);
        }
    }

    #[test]
    fn block_sizes_out_of_range_are_clamped() {
        assert_eq!(coerce_block_size(0), 3);
        assert_eq!(coerce_block_size(1), 3);
        assert_eq!(coerce_block_size(100), 99);
        assert_eq!(coerce_block_size(u32::MAX), 99);
    }

    #[test]
    fn binary_at_127_splits_ramp() {
        let mask = binary(&ramp_4x4(), 127);
        for (x, _, px) in mask.enumerate_pixels() {
            let expected = if x < 2 { 0 } else { 255 };
            assert_eq!(px.0[0], expected, "column {x}");
        }
    }

    #[test]
    fn binary_level_itself_maps_to_zero() {
        let img = GrayImage::from_pixel(2, 2, image::Luma([127]));
        assert!(binary(&img, 127).iter().all(|&v| v == 0));
        assert!(binary(&img, 126).iter().all(|&v| v == 255));
    }

    #[test]
    fn otsu_splits_bimodal_between_clusters() {
        let level = otsu_level(&Histogram::of_gray(&bimodal()));
        assert!(level > 10 && level < 240, "level {level} not between clusters");
    }

    #[test]
    fn otsu_takes_midpoint_of_tied_levels() {
        // Every level from 10 to 239 separates the clusters equally well.
        assert_eq!(otsu_level(&Histogram::of_gray(&bimodal())), 124);
    }

    #[test]
    fn otsu_mask_separates_clusters() {
        let config = ThresholdConfig {
            method: ThresholdMethod::Otsu,
            // Ignored by Otsu.
            value: 0,
            ..ThresholdConfig::default()
        };
        let mask = threshold(&bimodal(), &config);
        for (x, _, px) in mask.enumerate_pixels() {
            assert_eq!(px.0[0], if x < 10 { 0 } else { 255 });
        }
    }

    #[test]
    fn otsu_on_constant_image_sets_nothing() {
        let img = GrayImage::from_pixel(5, 5, image::Luma([77]));
        assert_eq!(otsu_level(&Histogram::of_gray(&img)), 77);
        let config = ThresholdConfig {
            method: ThresholdMethod::Otsu,
            ..ThresholdConfig::default()
        };
        assert!(threshold(&img, &config).iter().all(|&v| v == 0));
    }

    #[test]
    fn otsu_on_empty_histogram_is_zero() {
        assert_eq!(otsu_level(&Histogram::of_gray(&GrayImage::new(0, 0))), 0);
    }

    #[test]
    fn otsu_prefers_the_unbalanced_gap() {
        // Three clusters: the widest, most populated gap wins.
        let img = GrayImage::from_fn(30, 1, |x, _| {
            image::Luma([match x {
                0..10 => 20,
                10..20 => 30,
                _ => 220,
            }])
        });
        let level = otsu_level(&Histogram::of_gray(&img));
        assert!((30..220).contains(&level), "level {level}");
    }

    #[test]
    fn adaptive_on_uniform_image_follows_constant_sign() {
        let img = GrayImage::from_pixel(9, 9, image::Luma([100]));
        assert!(adaptive_mean(&img, 5, 2.0).iter().all(|&v| v == 255));
        assert!(adaptive_mean(&img, 5, -2.0).iter().all(|&v| v == 0));
    }

    #[test]
    fn adaptive_window_mean_is_truncated() {
        // Middle window is 5 / 3: truncated to 1, so 2 clears it.
        let img = GrayImage::from_raw(3, 1, vec![1, 2, 2]).unwrap();
        assert_eq!(adaptive_mean(&img, 3, 0.0).as_raw(), &[0, 255, 0]);
    }

    #[test]
    fn adaptive_picks_out_local_bright_spot() {
        // Dim background with one bright pixel: only the spot exceeds
        // its neighborhood mean by more than the constant.
        let mut img = GrayImage::from_pixel(9, 9, image::Luma([50]));
        img.put_pixel(4, 4, image::Luma([200]));
        let mask = adaptive_mean(&img, 3, -5.0);
        assert_eq!(mask.get_pixel(4, 4).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(3, 4).0[0], 0);
    }

    #[test]
    fn adaptive_even_block_matches_next_odd() {
        let img = GrayImage::from_fn(12, 12, |x, y| image::Luma([u8::try_from((x * 19 + y * 7) % 256).unwrap()]));
        let even = ThresholdConfig {
            method: ThresholdMethod::Adaptive,
            block_size: 6,
            ..ThresholdConfig::default()
        };
        let odd = ThresholdConfig {
            block_size: 7,
            ..even
        };
        assert_eq!(even.effective_block_size(), 7);
        assert_eq!(threshold(&img, &even), threshold(&img, &odd));
    }

    #[test]
    fn every_method_yields_binary_mask() {
        let img = GrayImage::from_fn(16, 16, |x, y| image::Luma([u8::try_from((x * 16 + y) % 256).unwrap()]));
        for method in [
            ThresholdMethod::Binary,
            ThresholdMethod::Adaptive,
            ThresholdMethod::Otsu,
        ] {
            let config = ThresholdConfig {
                method,
                ..ThresholdConfig::default()
            };
            let mask = threshold(&img, &config);
            assert!(is_binary(&mask), "{method:?}");
            assert_eq!(mask.dimensions(), img.dimensions());
        }
    }

    #[test]
    fn global_level_reports_effective_split() {
        let binary_config = ThresholdConfig::default();
        assert_eq!(global_level(&bimodal(), &binary_config), Some(127));
        let adaptive = ThresholdConfig {
            method: ThresholdMethod::Adaptive,
            ..ThresholdConfig::default()
        };
        assert_eq!(global_level(&bimodal(), &adaptive), None);
    }
}
