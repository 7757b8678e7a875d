//! Brightness and contrast.
//!
//! `out = clamp(round(in * contrast + brightness), 0, 255)` on every
//! color channel. Alpha passes through untouched.

use crate::convolve::saturate;
use crate::raster::Raster;

/// Lowest brightness offset the configuration layer allows.
pub const MIN_BRIGHTNESS: f32 = -100.0;
/// Highest brightness offset the configuration layer allows.
pub const MAX_BRIGHTNESS: f32 = 100.0;
/// Lowest contrast gain the configuration layer allows.
pub const MIN_CONTRAST: f32 = 0.0;
/// Highest contrast gain the configuration layer allows.
pub const MAX_CONTRAST: f32 = 3.0;

/// Precompute the mapping for every input intensity.
#[must_use]
pub fn tone_lut(brightness: f32, contrast: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (value, slot) in (0u8..=u8::MAX).zip(lut.iter_mut()) {
        *slot = saturate(f32::from(value).mul_add(contrast, brightness));
    }
    lut
}

/// Apply brightness and contrast in a single pass.
///
/// Both parameters are always applied together; see
/// [`ToneConfig`](crate::types::ToneConfig) for how the toggles map
/// onto this call.
#[must_use = "returns the adjusted raster"]
pub fn brightness_contrast(raster: Raster, brightness: f32, contrast: f32) -> Raster {
    let lut = tone_lut(brightness, contrast);
    let map = |v: &mut u8| *v = lut[usize::from(*v)];

    match raster {
        Raster::Gray(mut img) => {
            img.iter_mut().for_each(map);
            Raster::Gray(img)
        }
        Raster::Rgb(mut img) => {
            img.iter_mut().for_each(map);
            Raster::Rgb(img)
        }
        Raster::Rgba(mut img) => {
            for px in img.pixels_mut() {
                px.0[..3].iter_mut().for_each(map);
            }
            Raster::Rgba(img)
        }
    }
}
