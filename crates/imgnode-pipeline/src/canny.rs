//! Canny gradient, non-maximum suppression and hysteresis.
//!
//! Derived from `imageproc::edges::canny` (0.26) with these changes:
//!
//! - Gradient magnitude is the L1 norm `|gx| + |gy|`.
//! - No internal Gaussian blur. The edge stage pre-smooths with a kernel
//!   sized by its aperture, so this module starts at the gradient step.
//! - Hysteresis visits all 8 neighbors and bounds-checks them, so a
//!   trace that reaches the image border neither panics on `u32`
//!   underflow nor misses the north and north-east neighbors
//!   (<https://github.com/image-rs/imageproc/issues/705>).
//! - No `unsafe` pixel access.
//! - Images without an interior (narrower or shorter than 3 pixels)
//!   yield an all-zero mask instead of underflowing the loop bounds.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

/// Detect edges in an already smoothed image.
///
/// `low` must not exceed `high`; the caller orders and clamps them.
/// Returns 255 for edge pixels and 0 elsewhere.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return GrayImage::new(w, h);
    }

    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    let magnitude: Vec<f32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(&x, &y)| f32::from(x).abs() + f32::from(y).abs())
        .collect();

    let thinned = non_maximum_suppression(&magnitude, &gx, &gy);
    hysteresis(&thinned, w, h, low, high)
}

/// Direction of the gradient, quantized to the four neighbor axes.
#[derive(Clone, Copy)]
enum Direction {
    Horizontal,
    Diagonal,
    Vertical,
    AntiDiagonal,
}

impl Direction {
    fn of(x_gradient: f32, y_gradient: f32) -> Self {
        let mut angle = y_gradient.atan2(x_gradient).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if (22.5..67.5).contains(&angle) {
            Self::Diagonal
        } else if (67.5..112.5).contains(&angle) {
            Self::Vertical
        } else if (112.5..157.5).contains(&angle) {
            Self::AntiDiagonal
        } else {
            Self::Horizontal
        }
    }

    /// Offsets of the two neighbors across the edge.
    const fn across(self) -> [(isize, isize); 2] {
        match self {
            Self::Horizontal => [(-1, 0), (1, 0)],
            Self::Diagonal => [(1, 1), (-1, -1)],
            Self::Vertical => [(0, -1), (0, 1)],
            Self::AntiDiagonal => [(-1, 1), (1, -1)],
        }
    }
}

/// Zero every interior pixel that is not a local maximum across the edge.
/// Border pixels are always zero.
fn non_maximum_suppression(
    magnitude: &[f32],
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
) -> Vec<f32> {
    let (w, h) = (gx.width() as usize, gx.height() as usize);
    let mut out = vec![0.0; magnitude.len()];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let direction = Direction::of(f32::from(gx.as_raw()[i]), f32::from(gy.as_raw()[i]));
            let value = magnitude[i];
            let is_peak = direction.across().iter().all(|&(dx, dy)| {
                let nx = x.saturating_add_signed(dx);
                let ny = y.saturating_add_signed(dy);
                value >= magnitude[ny * w + nx]
            });
            if is_peak {
                out[i] = value;
            }
        }
    }
    out
}

/// Keep strong edges (`>= high`) and every weak pixel (`>= low`)
/// 8-connected to one.
fn hysteresis(thinned: &[f32], width: u32, height: u32, low: f32, high: f32) -> GrayImage {
    let (w, h) = (width as usize, height as usize);
    let mut out = GrayImage::new(width, height);
    let marked = |out: &GrayImage, i: usize| out.as_raw()[i] != 0;
    let mut stack = Vec::new();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            if thinned[i] < high || marked(&out, i) {
                continue;
            }
            mark(&mut out, i);
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for (dx, dy) in NEIGHBORS {
                    let (Some(nx), Some(ny)) =
                        (cx.checked_add_signed(dx), cy.checked_add_signed(dy))
                    else {
                        continue;
                    };
                    if nx >= w || ny >= h {
                        continue;
                    }
                    let n = ny * w + nx;
                    if thinned[n] >= low && !marked(&out, n) {
                        mark(&mut out, n);
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}

const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

fn mark(out: &mut GrayImage, i: usize) {
    if let Some(px) = out.get_mut(i) {
        *px = u8::MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_count(mask: &GrayImage) -> usize {
        mask.iter().filter(|&&v| v > 0).count()
    }

    /// A strong edge one pixel from the left border makes the trace
    /// reach x = 0 and try to step past it.
    #[test]
    fn border_edge_does_not_panic() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x == 1 { 255 } else { 0 }]));
        let edges = canny(&img, 1.0, 2.0);
        assert!(edge_count(&edges) > 0);
    }

    #[test]
    fn output_dimensions_match_input() {
        let edges = canny(&GrayImage::new(17, 31), 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn sharp_edge_detected() {
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 0 } else { 255 }]));
        let edges = canny(&img, 50.0, 150.0);
        assert!(edge_count(&edges) > 0, "expected edges at sharp boundary");
        // The boundary is vertical, so edge pixels hug columns 9 and 10.
        for (x, _, px) in edges.enumerate_pixels() {
            if px.0[0] > 0 {
                assert!((8..=11).contains(&x), "stray edge at column {x}");
            }
        }
    }

    #[test]
    fn diagonal_magnitude_is_l1_norm() {
        // |gx| = |gy| = 120 along the step: 240 in L1, under 170 in L2.
        let img = GrayImage::from_fn(20, 20, |x, y| Luma([if x > y { 40 } else { 0 }]));
        assert!(edge_count(&canny(&img, 200.0, 240.0)) > 0);
        assert_eq!(edge_count(&canny(&img, 200.0, 241.0)), 0);
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = GrayImage::from_pixel(12, 12, Luma([128]));
        assert_eq!(edge_count(&canny(&img, 1.0, 2.0)), 0);
    }

    #[test]
    fn tiny_images_yield_empty_mask() {
        for (w, h) in [(0, 0), (1, 5), (2, 2), (5, 2)] {
            let img = GrayImage::from_fn(w, h, |x, _| Luma([if x % 2 == 0 { 0 } else { 255 }]));
            let edges = canny(&img, 1.0, 2.0);
            assert_eq!(edges.dimensions(), (w, h));
            assert_eq!(edge_count(&edges), 0);
        }
    }

    #[test]
    fn higher_threshold_finds_no_more_edges() {
        let img = GrayImage::from_fn(24, 24, |x, y| Luma([u8::try_from((x * 7 + y * 3) % 200).unwrap_or(0)]));
        let loose = edge_count(&canny(&img, 10.0, 50.0));
        let strict = edge_count(&canny(&img, 10.0, 400.0));
        assert!(strict <= loose);
    }

    #[test]
    fn output_is_binary() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([if (x / 4 + y / 4) % 2 == 0 { 30 } else { 220 }]));
        assert!(canny(&img, 20.0, 80.0).iter().all(|&v| v == 0 || v == 255));
    }
}
