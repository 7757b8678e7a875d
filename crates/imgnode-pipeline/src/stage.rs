//! The six filter stages behind one trait.
//!
//! [`FilterStage`] is the seam between the pipeline and the filters:
//! a stage declares which channel layout it wants to read and which
//! layout it hands back, and the pipeline performs the conversions
//! around [`apply`](FilterStage::apply). [`Stage`] is the closed set of
//! stages the pipeline knows how to schedule.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blur::{self, BlurMethod};
use crate::edge;
use crate::grayscale;
use crate::raster::{Channels, Raster};
use crate::threshold;
use crate::tone;
use crate::types::{EdgeConfig, GrayImage, ThresholdConfig};

/// A single filter step over a [`Raster`].
pub trait FilterStage {
    /// Which stage this is, for logging and diagnostics.
    fn kind(&self) -> StageKind;

    /// Layout the stage reads, given the working buffer's `current` one.
    ///
    /// Default: whatever the buffer already has.
    fn input_channels(&self, current: Channels) -> Channels {
        current
    }

    /// Layout of the working buffer after the stage, given its `prior`
    /// layout.
    ///
    /// Default: unchanged.
    fn output_channels(&self, prior: Channels) -> Channels {
        prior
    }

    /// Transform a buffer already in [`input_channels`](Self::input_channels)
    /// layout.
    fn apply(&self, raster: Raster) -> Raster;

    /// Convert to the input layout, apply, and reconcile the result to
    /// the output layout.
    fn run(&self, raster: Raster) -> Raster {
        let prior = raster.channels();
        let input = raster.into_channels(self.input_channels(prior));
        self.apply(input).into_channels(self.output_channels(prior))
    }
}

/// Identifies a stage without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Luma reduction.
    Grayscale,
    /// Joint brightness offset and contrast gain.
    BrightnessContrast,
    /// Gaussian or box blur.
    Blur,
    /// Binarization.
    Threshold,
    /// Canny or Sobel edge mask.
    EdgeDetection,
    /// Edge mask blended onto the working buffer.
    EdgeOverlayCompose,
}

impl StageKind {
    /// Every kind, in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::Grayscale,
        Self::BrightnessContrast,
        Self::Blur,
        Self::Threshold,
        Self::EdgeDetection,
        Self::EdgeOverlayCompose,
    ];

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale",
            Self::BrightnessContrast => "Brightness/Contrast",
            Self::Blur => "Blur",
            Self::Threshold => "Threshold",
            Self::EdgeDetection => "Edge Detection",
            Self::EdgeOverlayCompose => "Edge Overlay",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A filter stage together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Reduce to one luma channel.
    Grayscale,
    /// `out = in * contrast + brightness`, saturated.
    BrightnessContrast {
        /// Additive offset.
        brightness: f32,
        /// Multiplicative gain.
        contrast: f32,
    },
    /// Blur with a `2 * radius + 1` kernel.
    Blur {
        /// Kernel half-width.
        radius: u32,
        /// Kernel weighting.
        method: BlurMethod,
    },
    /// Binarize, then re-expand to the prior layout.
    Threshold(ThresholdConfig),
    /// Replace the buffer with an edge mask in the prior layout.
    EdgeDetection(EdgeConfig),
    /// Blend a precomputed edge mask onto the buffer.
    EdgeOverlayCompose {
        /// Binary mask with the buffer's dimensions.
        mask: GrayImage,
    },
}

impl FilterStage for Stage {
    fn kind(&self) -> StageKind {
        match self {
            Self::Grayscale => StageKind::Grayscale,
            Self::BrightnessContrast { .. } => StageKind::BrightnessContrast,
            Self::Blur { .. } => StageKind::Blur,
            Self::Threshold(_) => StageKind::Threshold,
            Self::EdgeDetection(_) => StageKind::EdgeDetection,
            Self::EdgeOverlayCompose { .. } => StageKind::EdgeOverlayCompose,
        }
    }

    fn input_channels(&self, current: Channels) -> Channels {
        match self {
            Self::Grayscale | Self::Threshold(_) | Self::EdgeDetection(_) => Channels::One,
            Self::BrightnessContrast { .. } | Self::Blur { .. } | Self::EdgeOverlayCompose { .. } => {
                current
            }
        }
    }

    fn output_channels(&self, prior: Channels) -> Channels {
        match self {
            Self::Grayscale => Channels::One,
            _ => prior,
        }
    }

    fn apply(&self, raster: Raster) -> Raster {
        match self {
            Self::Grayscale => grayscale::grayscale(raster),
            Self::BrightnessContrast {
                brightness,
                contrast,
            } => tone::brightness_contrast(raster, *brightness, *contrast),
            Self::Blur { radius, method } => blur::blur(&raster, *radius, *method),
            Self::Threshold(config) => {
                Raster::Gray(threshold::threshold(&raster.gray_view(), config))
            }
            Self::EdgeDetection(config) => {
                Raster::Gray(edge::detect_edges(&raster.gray_view(), config))
            }
            Self::EdgeOverlayCompose { mask } => edge::overlay(raster, mask),
        }
    }
}
