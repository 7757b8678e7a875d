//! The working image buffer and channel-count normalization.
//!
//! A [`Raster`] is an owned, row-major 8-bit pixel matrix with exactly
//! 1, 3 or 4 interleaved channels (gray, RGB, RGBA). Every stage reads
//! and writes rasters; the pipeline converts between layouts with
//! [`Raster::to_channels`] whenever a stage needs a specific count.
//!
//! Conversion rules:
//!
//! | from \ to | 1 | 3 | 4 |
//! |---|---|---|---|
//! | 1 | - | replicate | replicate, alpha 255 |
//! | 3 | luma | - | alpha 255 |
//! | 4 | luma (alpha ignored) | drop alpha | - |
//!
//! Luma uses `0.299 R + 0.587 G + 0.114 B`, rounded to nearest, so a
//! replicated gray pixel reduces back to exactly its original value.

use std::borrow::Cow;
use std::fmt;

use image::{DynamicImage, Luma, Rgb, Rgba};
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, GrayImage, PipelineError, RgbImage, RgbaImage};

/// Number of interleaved channels in a [`Raster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channels {
    /// Single luma channel.
    One,
    /// Red, green, blue.
    Three,
    /// Red, green, blue, alpha.
    Four,
}

impl Channels {
    /// Numeric channel count.
    #[must_use]
    pub const fn count(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Three => 3,
            Self::Four => 4,
        }
    }
}

impl TryFrom<u8> for Channels {
    type Error = PipelineError;

    fn try_from(channels: u8) -> Result<Self, Self::Error> {
        match channels {
            1 => Ok(Self::One),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            _ => Err(PipelineError::UnsupportedChannelCount { channels }),
        }
    }
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

/// An owned 8-bit image with 1, 3 or 4 channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raster {
    /// Single-channel luma.
    Gray(GrayImage),
    /// Three-channel RGB.
    Rgb(RgbImage),
    /// Four-channel RGBA.
    Rgba(RgbaImage),
}

impl Raster {
    /// Build a raster from raw row-major bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedChannelCount`] if `channels`
    /// is not 1, 3 or 4, and [`PipelineError::BufferSizeMismatch`] if
    /// `data.len() != width * height * channels`.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        let layout = Channels::try_from(channels)?;
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(usize::from(channels)))
            .unwrap_or(usize::MAX);
        let actual = data.len();
        if actual != expected {
            return Err(PipelineError::BufferSizeMismatch { expected, actual });
        }

        let raster = match layout {
            Channels::One => GrayImage::from_raw(width, height, data).map(Self::Gray),
            Channels::Three => RgbImage::from_raw(width, height, data).map(Self::Rgb),
            Channels::Four => RgbaImage::from_raw(width, height, data).map(Self::Rgba),
        };
        raster.ok_or(PipelineError::BufferSizeMismatch { expected, actual })
    }

    /// Narrow any decoded image to the closest 8-bit 1/3/4-channel layout.
    ///
    /// Gray+alpha widens to RGBA; 16-bit and float images are quantized.
    #[must_use]
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::Gray(gray),
            DynamicImage::ImageRgb8(rgb) => Self::Rgb(rgb),
            DynamicImage::ImageRgba8(rgba) => Self::Rgba(rgba),
            other => {
                let color = other.color();
                if color.has_alpha() {
                    Self::Rgba(other.to_rgba8())
                } else if color.has_color() {
                    Self::Rgb(other.to_rgb8())
                } else {
                    Self::Gray(other.to_luma8())
                }
            }
        }
    }

    /// Hand the pixels over to the `image` crate.
    #[must_use]
    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            Self::Gray(gray) => DynamicImage::ImageLuma8(gray),
            Self::Rgb(rgb) => DynamicImage::ImageRgb8(rgb),
            Self::Rgba(rgba) => DynamicImage::ImageRgba8(rgba),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(img) => img.width(),
            Self::Rgb(img) => img.width(),
            Self::Rgba(img) => img.width(),
        }
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(img) => img.height(),
            Self::Rgb(img) => img.height(),
            Self::Rgba(img) => img.height(),
        }
    }

    /// Width and height together.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Channel layout.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        match self {
            Self::Gray(_) => Channels::One,
            Self::Rgb(_) => Channels::Three,
            Self::Rgba(_) => Channels::Four,
        }
    }

    /// Row-major interleaved pixel bytes.
    ///
    /// Always `width * height * channels` long.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Gray(img) => img.as_raw(),
            Self::Rgb(img) => img.as_raw(),
            Self::Rgba(img) => img.as_raw(),
        }
    }

    /// Single-channel view, borrowing when the raster is already gray.
    #[must_use]
    pub fn gray_view(&self) -> Cow<'_, GrayImage> {
        match self {
            Self::Gray(img) => Cow::Borrowed(img),
            Self::Rgb(img) => {
                let mut out = GrayImage::new(img.width(), img.height());
                for (dst, src) in out.pixels_mut().zip(img.pixels()) {
                    let [r, g, b] = src.0;
                    *dst = Luma([luma(r, g, b)]);
                }
                Cow::Owned(out)
            }
            Self::Rgba(img) => {
                let mut out = GrayImage::new(img.width(), img.height());
                for (dst, src) in out.pixels_mut().zip(img.pixels()) {
                    let [r, g, b, _] = src.0;
                    *dst = Luma([luma(r, g, b)]);
                }
                Cow::Owned(out)
            }
        }
    }

    /// Luma-reduced copy.
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        self.gray_view().into_owned()
    }

    /// Three-channel copy.
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Self::Gray(img) => {
                let mut out = RgbImage::new(img.width(), img.height());
                for (dst, src) in out.pixels_mut().zip(img.pixels()) {
                    let v = src.0[0];
                    *dst = Rgb([v, v, v]);
                }
                out
            }
            Self::Rgb(img) => img.clone(),
            Self::Rgba(img) => {
                let mut out = RgbImage::new(img.width(), img.height());
                for (dst, src) in out.pixels_mut().zip(img.pixels()) {
                    let [r, g, b, _] = src.0;
                    *dst = Rgb([r, g, b]);
                }
                out
            }
        }
    }

    /// Four-channel copy; missing alpha is opaque.
    #[must_use]
    pub fn to_rgba(&self) -> RgbaImage {
        match self {
            Self::Gray(img) => {
                let mut out = RgbaImage::new(img.width(), img.height());
                for (dst, src) in out.pixels_mut().zip(img.pixels()) {
                    let v = src.0[0];
                    *dst = Rgba([v, v, v, u8::MAX]);
                }
                out
            }
            Self::Rgb(img) => {
                let mut out = RgbaImage::new(img.width(), img.height());
                for (dst, src) in out.pixels_mut().zip(img.pixels()) {
                    let [r, g, b] = src.0;
                    *dst = Rgba([r, g, b, u8::MAX]);
                }
                out
            }
            Self::Rgba(img) => img.clone(),
        }
    }

    /// Copy converted to `target` channels.
    #[must_use]
    pub fn to_channels(&self, target: Channels) -> Self {
        match target {
            Channels::One => Self::Gray(self.to_gray()),
            Channels::Three => Self::Rgb(self.to_rgb()),
            Channels::Four => Self::Rgba(self.to_rgba()),
        }
    }

    /// Convert to `target` channels, reusing the buffer when it already
    /// has that layout.
    #[must_use]
    pub fn into_channels(self, target: Channels) -> Self {
        if self.channels() == target {
            self
        } else {
            self.to_channels(target)
        }
    }
}

/// Convert `raster` to a numeric channel count.
///
/// # Errors
///
/// Returns [`PipelineError::UnsupportedChannelCount`] if `target` is not
/// 1, 3 or 4.
pub fn normalize_to_channels(raster: &Raster, target: u8) -> Result<Raster, PipelineError> {
    let target = Channels::try_from(target)?;
    Ok(raster.to_channels(target))
}

/// Rec. 601 luma of an RGB triple, rounded to nearest.
#[must_use]
pub const fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    // Max is 255_000 + 500, so the quotient always fits in a u8.
    #[allow(clippy::cast_possible_truncation)]
    let value = ((weighted + 500) / 1000) as u8;
    value
}
