//! Shared types for the imgnode filter pipeline.

use serde::{Deserialize, Serialize};

use crate::blur::{self, BlurMethod};
use crate::edge::{self, EdgeMethod};
use crate::threshold::{self, ThresholdMethod};
use crate::tone;

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` for the 3-channel layout used by export.
pub use image::RgbImage;

/// Re-export `RgbaImage` for the 4-channel layout used by display surfaces.
pub use image::RgbaImage;

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Brightness and contrast parameters.
///
/// The two parameters have separate toggles but are always applied
/// together: turning on either toggle applies *both* the current
/// brightness offset and the current contrast gain. Enabling only
/// contrast with a non-zero brightness still shifts the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Brightness toggle.
    pub brightness_enabled: bool,
    /// Contrast toggle.
    pub contrast_enabled: bool,
    /// Additive offset in `[-100, 100]`.
    pub brightness: f32,
    /// Multiplicative gain in `[0, 3]`.
    pub contrast: f32,
}

impl ToneConfig {
    /// Whether the brightness/contrast stage runs at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.brightness_enabled || self.contrast_enabled
    }

    #[must_use]
    fn sanitized(self) -> Self {
        Self {
            brightness: finite_or(self.brightness, PipelineConfig::DEFAULT_BRIGHTNESS)
                .clamp(tone::MIN_BRIGHTNESS, tone::MAX_BRIGHTNESS),
            contrast: finite_or(self.contrast, PipelineConfig::DEFAULT_CONTRAST)
                .clamp(tone::MIN_CONTRAST, tone::MAX_CONTRAST),
            ..self
        }
    }
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            brightness_enabled: false,
            contrast_enabled: false,
            brightness: PipelineConfig::DEFAULT_BRIGHTNESS,
            contrast: PipelineConfig::DEFAULT_CONTRAST,
        }
    }
}

/// Blur stage parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Stage toggle.
    pub enabled: bool,
    /// Kernel half-width in `[1, 20]`.
    pub radius: u32,
    /// Weighted (Gaussian) or unweighted (box) kernel.
    pub method: BlurMethod,
}

impl BlurConfig {
    /// Full kernel width, always odd and at least 3 for a sanitized radius.
    #[must_use]
    pub const fn kernel_size(&self) -> u32 {
        blur::kernel_size(self.radius)
    }

    #[must_use]
    fn sanitized(self) -> Self {
        Self {
            radius: self.radius.clamp(blur::MIN_RADIUS, blur::MAX_RADIUS),
            ..self
        }
    }
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: PipelineConfig::DEFAULT_BLUR_RADIUS,
            method: BlurMethod::default(),
        }
    }
}

/// Threshold (binarization) stage parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Stage toggle.
    pub enabled: bool,
    /// Global, local-mean, or histogram-derived split.
    pub method: ThresholdMethod,
    /// Split level for [`ThresholdMethod::Binary`]; ignored otherwise.
    pub value: u8,
    /// Neighborhood width for [`ThresholdMethod::Adaptive`].
    ///
    /// Sanitizing clamps to `[3, 99]` and bumps even values to the next
    /// odd value.
    pub block_size: u32,
    /// Offset subtracted from the local mean, in `[-10, 10]`.
    pub constant: f32,
}

impl ThresholdConfig {
    /// The block size actually used by the adaptive method.
    #[must_use]
    pub const fn effective_block_size(&self) -> u32 {
        threshold::coerce_block_size(self.block_size)
    }

    #[must_use]
    fn sanitized(self) -> Self {
        Self {
            block_size: self.effective_block_size(),
            constant: finite_or(self.constant, PipelineConfig::DEFAULT_ADAPTIVE_CONSTANT)
                .clamp(threshold::MIN_CONSTANT, threshold::MAX_CONSTANT),
            ..self
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: ThresholdMethod::default(),
            value: PipelineConfig::DEFAULT_THRESHOLD_VALUE,
            block_size: PipelineConfig::DEFAULT_BLOCK_SIZE,
            constant: PipelineConfig::DEFAULT_ADAPTIVE_CONSTANT,
        }
    }
}

/// Edge detection stage parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Stage toggle.
    pub enabled: bool,
    /// Hysteresis (Canny) or gradient-magnitude (Sobel) detector.
    pub method: EdgeMethod,
    /// Lower threshold. Sobel binarizes at this value.
    pub lower: u8,
    /// Upper threshold. Only Canny uses it.
    pub upper: u8,
    /// Kernel parameter in `[1, 4]`, mapped to aperture `2k - 1`.
    pub kernel: u32,
    /// Blend the edges onto the working image instead of replacing it.
    pub overlay: bool,
}

impl EdgeConfig {
    /// Odd aperture derived from [`kernel`](Self::kernel).
    #[must_use]
    pub const fn aperture(&self) -> u32 {
        edge::aperture(self.kernel)
    }

    #[must_use]
    fn sanitized(self) -> Self {
        Self {
            kernel: self
                .kernel
                .clamp(edge::MIN_KERNEL_PARAM, edge::MAX_KERNEL_PARAM),
            ..self
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: EdgeMethod::default(),
            lower: PipelineConfig::DEFAULT_EDGE_LOWER,
            upper: PipelineConfig::DEFAULT_EDGE_UPPER,
            kernel: PipelineConfig::DEFAULT_EDGE_KERNEL,
            overlay: false,
        }
    }
}

/// Toggles and parameters for every stage of the pipeline.
///
/// The UI layer owns one of these, mutates it between frames, and hands
/// it to [`Pipeline::run`](crate::Pipeline::run) by reference. Stage
/// order is fixed and does not depend on the order in which toggles
/// were switched on.
///
/// Fields are public and unchecked. [`sanitized`](Self::sanitized) is
/// the single place that pulls values back into range; the pipeline
/// calls it on entry, so the filter stages themselves never validate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reduce to a single luma channel.
    pub grayscale: bool,
    /// Brightness/contrast stage.
    pub tone: ToneConfig,
    /// Blur stage.
    pub blur: BlurConfig,
    /// Threshold stage.
    pub threshold: ThresholdConfig,
    /// Edge detection stage (with optional overlay).
    pub edges: EdgeConfig,
}

impl PipelineConfig {
    /// Default brightness offset (no shift).
    pub const DEFAULT_BRIGHTNESS: f32 = 0.0;
    /// Default contrast gain (identity).
    pub const DEFAULT_CONTRAST: f32 = 1.0;
    /// Default blur radius (3x3 kernel).
    pub const DEFAULT_BLUR_RADIUS: u32 = 1;
    /// Default binary threshold level.
    pub const DEFAULT_THRESHOLD_VALUE: u8 = 127;
    /// Default adaptive neighborhood width.
    pub const DEFAULT_BLOCK_SIZE: u32 = 11;
    /// Default adaptive mean offset.
    pub const DEFAULT_ADAPTIVE_CONSTANT: f32 = 2.0;
    /// Default lower edge threshold.
    pub const DEFAULT_EDGE_LOWER: u8 = 100;
    /// Default upper edge threshold.
    pub const DEFAULT_EDGE_UPPER: u8 = 200;
    /// Default edge kernel parameter (aperture 1).
    pub const DEFAULT_EDGE_KERNEL: u32 = 1;

    /// Whether at least one stage toggle is on.
    #[must_use]
    pub const fn any_stage_enabled(&self) -> bool {
        self.grayscale
            || self.tone.is_enabled()
            || self.blur.enabled
            || self.threshold.enabled
            || self.edges.enabled
    }

    /// Return a copy with every parameter pulled into its valid range.
    ///
    /// Non-finite floats fall back to their defaults, integers are
    /// clamped, and an even adaptive block size is incremented to the
    /// next odd value. Toggles are left untouched.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            grayscale: self.grayscale,
            tone: self.tone.sanitized(),
            blur: self.blur.sanitized(),
            threshold: self.threshold.sanitized(),
            edges: self.edges.sanitized(),
        }
    }

    /// Parse a configuration from JSON. Missing fields take their
    /// defaults; values are not sanitized.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `json` is malformed
    /// or a field has the wrong type.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidConfig(e.to_string()))
    }
}

const fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

/// Errors that can occur while loading or normalizing image data.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A buffer declared a channel count other than 1, 3 or 4.
    #[error("unsupported channel count {channels} (expected 1, 3 or 4)")]
    UnsupportedChannelCount {
        /// The offending channel count.
        channels: u8,
    },

    /// Raw pixel data does not match `width * height * channels`.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch {
        /// Byte count implied by the declared shape.
        expected: usize,
        /// Byte count actually supplied.
        actual: usize,
    },

    /// Pipeline configuration could not be parsed.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
