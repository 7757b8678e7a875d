//! Separable Gaussian correlation over interleaved 8-bit buffers.
//!
//! Border policy: **replicate**. A tap that falls outside the image
//! reads the nearest edge pixel of the same row (horizontal pass) or
//! column (vertical pass), matching `imageproc`'s clamped filters.
//!
//! An `f32` intermediate is kept between the two passes and rounded
//! once at the end, so a kernel that sums to one leaves a uniform image
//! exactly unchanged. `imageproc::filter::separable_filter` rounds to
//! `u8` after the first pass, and `gaussian_blur_f32` picks its own
//! kernel width from sigma, so neither fits an exact-width kernel.

/// Correlate each channel of an interleaved buffer with `kernel`
/// horizontally, then vertically.
///
/// `kernel` must have odd length. Output has the same shape as `data`.
pub(crate) fn separable_u8(
    data: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    kernel: &[f32],
) -> Vec<u8> {
    if kernel.len() <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let (w, h) = (width as usize, height as usize);
    let input: Vec<f32> = data.iter().copied().map(f32::from).collect();
    let horizontal = pass(&input, w, h, channels, kernel, Axis::Row);
    let vertical = pass(&horizontal, w, h, channels, kernel, Axis::Column);

    vertical.into_iter().map(saturate).collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn saturate(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Column,
}

fn pass(input: &[f32], w: usize, h: usize, channels: usize, kernel: &[f32], axis: Axis) -> Vec<f32> {
    let mut out = vec![0.0; input.len()];
    if w == 0 || h == 0 {
        return out;
    }
    let half = kernel.len() / 2;
    let row_stride = w * channels;

    for y in 0..h {
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0;
                for (k, &weight) in kernel.iter().enumerate() {
                    // Tap offset relative to the center, clamped into the image.
                    let (sx, sy) = match axis {
                        Axis::Row => (replicate(x, k, half, w), y),
                        Axis::Column => (x, replicate(y, k, half, h)),
                    };
                    acc += input[sy * row_stride + sx * channels + c] * weight;
                }
                out[y * row_stride + x * channels + c] = acc;
            }
        }
    }
    out
}

/// Index of tap `k` around `center`, replicated at both ends of `[0, len)`.
const fn replicate(center: usize, k: usize, half: usize, len: usize) -> usize {
    let pos = center + k;
    if pos < half {
        0
    } else if pos - half >= len {
        len - 1
    } else {
        pos - half
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicate_clamps_both_ends() {
        // 5-tap kernel (half = 2) on a row of length 4.
        assert_eq!(replicate(0, 0, 2, 4), 0);
        assert_eq!(replicate(0, 1, 2, 4), 0);
        assert_eq!(replicate(0, 2, 2, 4), 0);
        assert_eq!(replicate(0, 3, 2, 4), 1);
        assert_eq!(replicate(3, 3, 2, 4), 3);
        assert_eq!(replicate(3, 4, 2, 4), 3);
        assert_eq!(replicate(2, 4, 2, 4), 3);
    }

    #[test]
    fn identity_kernel_is_noop() {
        let data: Vec<u8> = (0..30).collect();
        assert_eq!(separable_u8(&data, 5, 2, 3, &[1.0]), data);
        assert_eq!(separable_u8(&data, 5, 2, 3, &[0.0, 1.0, 0.0]), data);
    }

    #[test]
    fn mean_kernel_on_uniform_buffer_is_exact() {
        let data = vec![128u8; 7 * 5 * 4];
        let kernel = vec![1.0 / 7.0; 7];
        assert_eq!(separable_u8(&data, 7, 5, 4, &kernel), data);
    }

    #[test]
    fn replicate_border_on_step_row() {
        // Single row [0, 0, 90]: a 3-tap mean replicates 90 past the end.
        let out = separable_u8(&[0, 0, 90], 3, 1, 1, &[1.0 / 3.0; 3]);
        assert_eq!(out, vec![0, 30, 60]);
    }

    #[test]
    fn channels_do_not_bleed() {
        // Two red pixels: green and blue must stay zero.
        let data = [255, 0, 0, 255, 0, 0];
        let out = separable_u8(&data, 2, 1, 3, &[1.0 / 3.0; 3]);
        assert_eq!(out, data.to_vec());
    }
}
