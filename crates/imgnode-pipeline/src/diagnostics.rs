//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! Every pipeline run collects diagnostics alongside the processed
//! buffer. [`Pipeline::run`](crate::Pipeline::run) discards them and
//! times nothing; callers that want durations go through
//! [`Pipeline::run_with_diagnostics`](crate::Pipeline::run_with_diagnostics)
//! with a [`Clock`] of their choosing.
//!
//! Duration measurements use [`std::time::Duration`]. The crate never
//! reads a clock itself: timestamps come from the caller's [`Clock`],
//! so the same code runs natively and on WASM.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blur::{self, BlurMethod};
use crate::edge::{self, EdgeMethod};
use crate::raster::{Channels, Raster};
use crate::stage::{Stage, StageKind};
use crate::threshold::ThresholdMethod;
use crate::types::Dimensions;

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A [`Clock`] that measures nothing; every duration is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Source image size.
    pub dimensions: Dimensions,
    /// Source channel layout.
    pub source_channels: Channels,
    /// Output channel layout.
    pub output_channels: Channels,
    /// Executed stages in execution order. Empty when no stage was enabled.
    pub stages: Vec<StageDiagnostics>,
    /// Wall-clock duration of the whole run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Which stage ran.
    pub stage: StageKind,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Layout of the buffer handed to the stage.
    pub input_channels: Channels,
    /// Layout of the buffer the stage produced.
    pub output_channels: Channels,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Luma reduction.
    Grayscale,
    /// Brightness/contrast parameters actually applied.
    BrightnessContrast {
        /// Additive offset.
        brightness: f32,
        /// Multiplicative gain.
        contrast: f32,
    },
    /// Blur kernel.
    Blur {
        /// Kernel weighting.
        method: BlurMethod,
        /// Full kernel width.
        kernel_size: u32,
    },
    /// Binarization result.
    Threshold {
        /// Method used.
        method: ThresholdMethod,
        /// Global split level (binary value or Otsu's choice); `None` for
        /// adaptive.
        level: Option<u8>,
        /// Effective neighborhood width; only for adaptive.
        block_size: Option<u32>,
        /// Pixels set to 255.
        foreground_pixels: u64,
        /// Pixel count of the image.
        total_pixels: u64,
    },
    /// Edge detection result.
    EdgeDetection {
        /// Detector used.
        method: EdgeMethod,
        /// Derived aperture.
        aperture: u32,
        /// Lower threshold.
        lower: u8,
        /// Upper threshold (unused by Sobel).
        upper: u8,
        /// Pixels marked as edges.
        edge_pixels: u64,
        /// Pixel count of the image.
        total_pixels: u64,
    },
    /// Edge overlay composition.
    EdgeOverlay {
        /// Pixels blended with the highlight color.
        highlighted_pixels: u64,
    },
}

impl StageMetrics {
    /// Metrics for `stage` after it produced `output`.
    ///
    /// `level` is the global threshold level computed before the stage ran.
    pub(crate) fn measure(stage: &Stage, level: Option<u8>, output: &Raster) -> Self {
        let total_pixels = output.dimensions().pixel_count();
        let set_pixels = || edge::count_edge_pixels(&output.gray_view());
        match stage {
            Stage::Grayscale => Self::Grayscale,
            Stage::BrightnessContrast {
                brightness,
                contrast,
            } => Self::BrightnessContrast {
                brightness: *brightness,
                contrast: *contrast,
            },
            Stage::Blur { radius, method } => Self::Blur {
                method: *method,
                kernel_size: blur::kernel_size(*radius),
            },
            Stage::Threshold(config) => Self::Threshold {
                method: config.method,
                level,
                block_size: (config.method == ThresholdMethod::Adaptive)
                    .then(|| config.effective_block_size()),
                foreground_pixels: set_pixels(),
                total_pixels,
            },
            Stage::EdgeDetection(config) => Self::EdgeDetection {
                method: config.method,
                aperture: config.aperture(),
                lower: config.lower,
                upper: config.upper,
                edge_pixels: set_pixels(),
                total_pixels,
            },
            Stage::EdgeOverlayCompose { mask } => Self::EdgeOverlay {
                highlighted_pixels: edge::count_edge_pixels(mask),
            },
        }
    }
}

impl PipelineDiagnostics {
    /// Diagnostics for `stage`, if it ran.
    #[must_use]
    pub fn stage(&self, stage: StageKind) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|d| d.stage == stage)
    }

    /// Kinds of the executed stages, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<StageKind> {
        self.stages.iter().map(|d| d.stage).collect()
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels), channels {} -> {}",
            self.dimensions.width,
            self.dimensions.height,
            self.dimensions.pixel_count(),
            self.source_channels,
            self.output_channels,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        if self.stages.is_empty() {
            lines.push("No stages enabled; output is the source image.".to_owned());
            return lines.join("\n");
        }

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format!(
                "{}ch -> {}ch  {}",
                diag.input_channels,
                diag.output_channels,
                format_metrics(&diag.metrics),
            );
            let name = diag.stage.name();
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale => String::new(),
        StageMetrics::BrightnessContrast {
            brightness,
            contrast,
        } => format!("brightness={brightness:.1} contrast={contrast:.2}"),
        StageMetrics::Blur {
            method,
            kernel_size,
        } => format!("{method:?} {kernel_size}x{kernel_size}"),
        StageMetrics::Threshold {
            method,
            level,
            block_size,
            foreground_pixels,
            total_pixels,
        } => {
            let param = match (level, block_size) {
                (Some(level), _) => format!("level={level}"),
                (None, Some(block)) => format!("block={block}"),
                (None, None) => String::new(),
            };
            format!(
                "{method:?} {param} set={foreground_pixels} ({:.1}%)",
                percent(*foreground_pixels, *total_pixels),
            )
        }
        StageMetrics::EdgeDetection {
            method,
            aperture,
            lower,
            upper,
            edge_pixels,
            total_pixels,
        } => format!(
            "{method:?} aperture={aperture} lower={lower} upper={upper} edges={edge_pixels} ({:.1}%)",
            percent(*edge_pixels, *total_pixels),
        ),
        StageMetrics::EdgeOverlay { highlighted_pixels } => {
            format!("highlighted={highlighted_pixels}")
        }
    }
}
