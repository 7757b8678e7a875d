//! Pipeline orchestration: source ownership and fixed stage order.
//!
//! ```rust
//! # use imgnode_pipeline::{Pipeline, PipelineConfig, PipelineError, Raster};
//! # fn run(png: &[u8]) -> Result<(), PipelineError> {
//! let mut pipeline = Pipeline::new();
//! pipeline.load(png)?;
//!
//! let mut config = PipelineConfig::default();
//! config.grayscale = true;
//! config.blur.enabled = true;
//!
//! let output: Option<Raster> = pipeline.run(&config);
//! # Ok(())
//! # }
//! ```
//!
//! Every run clones the source and applies the enabled stages in the
//! order Grayscale, BrightnessContrast, Blur, Threshold, EdgeDetection.
//! The order never depends on which toggles were switched on first.
//! The source itself is never mutated, so the histogram and any number
//! of runs may read it concurrently.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Clock, NoClock, PipelineDiagnostics, StageDiagnostics, StageMetrics};
use crate::histogram::Histogram;
use crate::raster::Raster;
use crate::stage::{FilterStage, Stage};
use crate::threshold;
use crate::types::{Dimensions, EdgeConfig, PipelineConfig, PipelineError};

/// Whether a run would do any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// No source image, or no stage enabled.
    Idle,
    /// A source image is present and at least one stage is enabled.
    Processing,
}

/// Owns the source image and runs the filter chain over it.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    source: Option<Raster>,
}

impl Pipeline {
    /// A pipeline with no source image.
    #[must_use]
    pub const fn new() -> Self {
        Self { source: None }
    }

    /// A pipeline over an already decoded source.
    #[must_use]
    pub const fn with_source(source: Raster) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Decode `bytes` and make the result the new source.
    ///
    /// On failure the previous source, if any, is kept.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if `bytes` is empty and
    /// [`PipelineError::ImageDecode`] if they cannot be decoded.
    pub fn load(&mut self, bytes: &[u8]) -> Result<Dimensions, PipelineError> {
        let raster = crate::grayscale::decode(bytes)?;
        let dimensions = raster.dimensions();
        log::info!(
            "loaded {}x{} source with {} channels",
            dimensions.width,
            dimensions.height,
            raster.channels(),
        );
        self.source = Some(raster);
        Ok(dimensions)
    }

    /// Replace the source, returning the previous one.
    pub fn set_source(&mut self, source: Raster) -> Option<Raster> {
        self.source.replace(source)
    }

    /// Drop the source, returning it.
    pub fn clear(&mut self) -> Option<Raster> {
        self.source.take()
    }

    /// The current source image.
    #[must_use]
    pub const fn source(&self) -> Option<&Raster> {
        self.source.as_ref()
    }

    /// Whether [`run`](Self::run) with `config` would process anything.
    #[must_use]
    pub const fn state(&self, config: &PipelineConfig) -> PipelineState {
        if self.source.is_some() && config.any_stage_enabled() {
            PipelineState::Processing
        } else {
            PipelineState::Idle
        }
    }

    /// Run the enabled stages over a copy of the source.
    ///
    /// Returns `None` when there is no source. With no stage enabled the
    /// result is an unmodified copy of the source.
    #[must_use]
    pub fn run(&self, config: &PipelineConfig) -> Option<Raster> {
        self.source
            .as_ref()
            .map(|source| process_with_diagnostics(source, config, &NoClock).0)
    }

    /// [`run`](Self::run), also returning per-stage diagnostics timed
    /// with `clock`.
    #[must_use]
    pub fn run_with_diagnostics<C: Clock>(
        &self,
        config: &PipelineConfig,
        clock: &C,
    ) -> Option<(Raster, PipelineDiagnostics)> {
        self.source
            .as_ref()
            .map(|source| process_with_diagnostics(source, config, clock))
    }

    /// Histogram of the source image (not the processed output).
    #[must_use]
    pub fn histogram(&self) -> Option<Histogram> {
        self.source.as_ref().map(Histogram::of)
    }
}

/// The enabled stages for `config`, in execution order.
///
/// Edge overlay is not listed: its mask depends on the buffer at the
/// time edge detection runs, so the pipeline builds that stage on the
/// fly.
#[must_use]
pub fn stages(config: &PipelineConfig) -> Vec<Stage> {
    let mut stages = Vec::new();
    if config.grayscale {
        stages.push(Stage::Grayscale);
    }
    if config.tone.is_enabled() {
        stages.push(Stage::BrightnessContrast {
            brightness: config.tone.brightness,
            contrast: config.tone.contrast,
        });
    }
    if config.blur.enabled {
        stages.push(Stage::Blur {
            radius: config.blur.radius,
            method: config.blur.method,
        });
    }
    if config.threshold.enabled {
        stages.push(Stage::Threshold(config.threshold));
    }
    if config.edges.enabled {
        stages.push(Stage::EdgeDetection(config.edges));
    }
    stages
}

/// Run the enabled stages over a copy of `source`.
#[must_use]
pub fn process(source: &Raster, config: &PipelineConfig) -> Raster {
    process_with_diagnostics(source, config, &NoClock).0
}

/// Run the enabled stages over a copy of `source`, collecting
/// diagnostics timed with `clock`.
///
/// `config` is sanitized first, so out-of-range parameters never reach
/// a stage.
#[must_use]
pub fn process_with_diagnostics<C: Clock>(
    source: &Raster,
    config: &PipelineConfig,
    clock: &C,
) -> (Raster, PipelineDiagnostics) {
    let start = clock.now();
    let config = config.sanitized();
    let mut records = Vec::new();
    let mut raster = source.clone();

    for stage in stages(&config) {
        raster = match stage {
            Stage::EdgeDetection(edges) if edges.overlay => {
                overlay_edges(raster, edges, clock, &mut records)
            }
            stage => run_stage(&stage, raster, clock, &mut records),
        };
    }

    let diagnostics = PipelineDiagnostics {
        dimensions: source.dimensions(),
        source_channels: source.channels(),
        output_channels: raster.channels(),
        stages: records,
        total_duration: clock.elapsed(&start),
    };
    (raster, diagnostics)
}

fn run_stage<C: Clock>(
    stage: &Stage,
    raster: Raster,
    clock: &C,
    records: &mut Vec<StageDiagnostics>,
) -> Raster {
    let input_channels = raster.channels();
    let level = match stage {
        Stage::Threshold(config) => threshold::global_level(&raster.gray_view(), config),
        _ => None,
    };

    let start = clock.now();
    let output = stage.run(raster);
    let duration = clock.elapsed(&start);

    log::debug!("{} took {duration:?}", stage.kind());
    records.push(StageDiagnostics {
        stage: stage.kind(),
        duration,
        input_channels,
        output_channels: output.channels(),
        metrics: StageMetrics::measure(stage, level, &output),
    });
    output
}

/// Detect edges on a gray copy of `raster`, then blend them onto
/// `raster` itself.
fn overlay_edges<C: Clock>(
    raster: Raster,
    edges: EdgeConfig,
    clock: &C,
    records: &mut Vec<StageDiagnostics>,
) -> Raster {
    let gray = Raster::Gray(raster.to_gray());
    let mask = match run_stage(&Stage::EdgeDetection(edges), gray, clock, records) {
        Raster::Gray(mask) => mask,
        other => other.to_gray(),
    };
    run_stage(&Stage::EdgeOverlayCompose { mask }, raster, clock, records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::blur::{self, BlurMethod};
    use crate::raster::Channels;
    use crate::stage::StageKind;
    use crate::threshold::ThresholdMethod;
    use crate::types::{GrayImage, RgbImage, RgbaImage};

    /// 16x16 RGB gradient with a bright square in the middle.
    fn source() -> Raster {
        Raster::Rgb(RgbImage::from_fn(16, 16, |x, y| {
            if (5..11).contains(&x) && (5..11).contains(&y) {
                image::Rgb([240, 230, 220])
            } else {
                let v = u8::try_from(x * 4 + y * 2).unwrap();
                image::Rgb([v, v / 2, 40])
            }
        }))
    }

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn everything_on() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.grayscale = true;
        config.tone.brightness_enabled = true;
        config.tone.contrast_enabled = true;
        config.blur.enabled = true;
        config.threshold.enabled = true;
        config.edges.enabled = true;
        config
    }

    #[test]
    fn no_source_yields_no_output() {
        let pipeline = Pipeline::new();
        assert_eq!(pipeline.run(&everything_on()), None);
        assert!(pipeline.run_with_diagnostics(&everything_on(), &NoClock).is_none());
        assert!(pipeline.histogram().is_none());
        assert_eq!(pipeline.state(&everything_on()), PipelineState::Idle);
    }

    #[test]
    fn all_toggles_off_returns_source_unmodified() {
        let source = source();
        let pipeline = Pipeline::with_source(source.clone());
        let config = PipelineConfig::default();
        assert_eq!(pipeline.state(&config), PipelineState::Idle);
        assert_eq!(pipeline.run(&config), Some(source));
    }

    #[test]
    fn any_toggle_means_processing() {
        let pipeline = Pipeline::with_source(source());
        let mut config = PipelineConfig::default();
        config.blur.enabled = true;
        assert_eq!(pipeline.state(&config), PipelineState::Processing);
    }

    #[test]
    fn parameters_without_toggles_do_nothing() {
        let source = source();
        let mut config = PipelineConfig::default();
        config.tone.brightness = 80.0;
        config.blur.radius = 7;
        config.threshold.method = ThresholdMethod::Otsu;
        config.edges.overlay = true;
        assert_eq!(process(&source, &config), source);
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let (_, diagnostics) = process_with_diagnostics(&source(), &everything_on(), &NoClock);
        assert_eq!(
            diagnostics.executed(),
            [
                StageKind::Grayscale,
                StageKind::BrightnessContrast,
                StageKind::Blur,
                StageKind::Threshold,
                StageKind::EdgeDetection,
            ]
        );
    }

    #[test]
    fn blur_runs_before_threshold() {
        let source = source();
        let mut config = PipelineConfig::default();
        config.blur.enabled = true;
        config.blur.radius = 2;
        config.threshold.enabled = true;

        let blurred = blur::blur(&source, 2, BlurMethod::Gaussian);
        let expected =
            Raster::Gray(threshold::binary(&blurred.to_gray(), config.threshold.value))
                .into_channels(Channels::Three);
        assert_eq!(process(&source, &config), expected);
    }

    #[test]
    fn contrast_toggle_alone_still_applies_brightness() {
        let source = Raster::Gray(GrayImage::from_pixel(4, 4, image::Luma([100])));
        let mut config = PipelineConfig::default();
        config.tone.contrast_enabled = true;
        config.tone.brightness = 50.0;
        config.tone.contrast = 1.0;
        let out = process(&source, &config);
        assert!(out.as_raw().iter().all(|&v| v == 150));
    }

    #[test]
    fn brightness_toggle_alone_still_applies_contrast() {
        let source = Raster::Gray(GrayImage::from_pixel(4, 4, image::Luma([100])));
        let mut config = PipelineConfig::default();
        config.tone.brightness_enabled = true;
        config.tone.brightness = 0.0;
        config.tone.contrast = 2.0;
        let out = process(&source, &config);
        assert!(out.as_raw().iter().all(|&v| v == 200));
    }

    #[test]
    fn threshold_keeps_color_layout() {
        let mut config = PipelineConfig::default();
        config.threshold.enabled = true;
        let out = process(&source(), &config);
        assert_eq!(out.channels(), Channels::Three);
        assert!(out.as_raw().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn grayscale_then_threshold_stays_single_channel() {
        let mut config = PipelineConfig::default();
        config.grayscale = true;
        config.threshold.enabled = true;
        assert_eq!(process(&source(), &config).channels(), Channels::One);
    }

    #[test]
    fn edges_without_overlay_replace_buffer() {
        let mut config = PipelineConfig::default();
        config.edges.enabled = true;
        config.edges.method = crate::edge::EdgeMethod::Sobel;
        config.edges.lower = 20;
        let out = process(&source(), &config);
        assert_eq!(out.channels(), Channels::Three);
        assert!(out.as_raw().iter().all(|&v| v == 0 || v == 255));
        assert!(out.as_raw().contains(&255));
    }

    #[test]
    fn overlay_tints_edges_and_keeps_the_rest() {
        let source = source();
        let mut config = PipelineConfig::default();
        config.edges.enabled = true;
        config.edges.method = crate::edge::EdgeMethod::Sobel;
        config.edges.lower = 20;
        config.edges.overlay = true;

        let (out, diagnostics) = process_with_diagnostics(&source, &config, &NoClock);
        assert_eq!(out.channels(), Channels::Three);
        assert_eq!(
            diagnostics.executed(),
            [StageKind::EdgeDetection, StageKind::EdgeOverlayCompose]
        );

        let (Raster::Rgb(before), Raster::Rgb(after)) = (&source, &out) else {
            unreachable!("fixture is RGB");
        };
        let mut tinted = 0;
        for (a, b) in before.pixels().zip(after.pixels()) {
            if a != b {
                tinted += 1;
                assert!(b.0[0] >= a.0[0], "red must not drop");
                assert!(b.0[1] <= a.0[1] && b.0[2] <= a.0[2]);
            }
        }
        assert!(tinted > 0);
        let Some(StageMetrics::EdgeOverlay { highlighted_pixels }) = diagnostics
            .stage(StageKind::EdgeOverlayCompose)
            .map(|d| d.metrics.clone())
        else {
            unreachable!("overlay ran");
        };
        assert!(highlighted_pixels >= tinted);
    }

    #[test]
    fn sobel_on_uniform_image_is_all_zero() {
        let source = Raster::Rgba(RgbaImage::from_pixel(12, 12, image::Rgba([90, 90, 90, 255])));
        let mut config = PipelineConfig::default();
        config.edges.enabled = true;
        config.edges.method = crate::edge::EdgeMethod::Sobel;
        for lower in [0, 50, 255] {
            config.edges.lower = lower;
            let out = process(&source, &config);
            assert_eq!(out.channels(), Channels::Four);
            let Raster::Rgba(img) = out else {
                unreachable!("layout preserved");
            };
            assert!(img.pixels().all(|p| p.0[..3] == [0, 0, 0]));
        }
    }

    #[test]
    fn source_is_not_mutated_by_runs() {
        let pipeline = Pipeline::with_source(source());
        let before = pipeline.source().cloned();
        let _ = pipeline.run(&everything_on());
        assert_eq!(pipeline.source().cloned(), before);
    }

    #[test]
    fn histogram_reads_the_source() {
        let pipeline = Pipeline::with_source(Raster::Gray(GrayImage::from_pixel(3, 3, image::Luma([42]))));
        let hist = pipeline.histogram().unwrap();
        assert_eq!(hist.counts()[42], 9);
        assert_eq!(hist.total(), 9);
    }

    #[test]
    fn load_replaces_source_and_keeps_it_on_failure() {
        let mut pipeline = Pipeline::new();
        let png = encode_png(&RgbaImage::from_pixel(5, 3, image::Rgba([1, 2, 3, 255])));
        let dims = pipeline.load(&png).unwrap();
        assert_eq!(dims, Dimensions { width: 5, height: 3 });

        assert!(matches!(pipeline.load(&[]), Err(PipelineError::EmptyInput)));
        assert!(matches!(
            pipeline.load(&[0xFF, 0x00]),
            Err(PipelineError::ImageDecode(_))
        ));
        assert_eq!(pipeline.source().map(Raster::dimensions), Some(dims));
    }

    #[test]
    fn set_source_and_clear() {
        let mut pipeline = Pipeline::new();
        assert!(pipeline.set_source(source()).is_none());
        assert!(pipeline.set_source(source()).is_some());
        assert!(pipeline.clear().is_some());
        assert!(pipeline.source().is_none());
    }

    #[test]
    fn out_of_range_parameters_are_sanitized() {
        let mut config = PipelineConfig::default();
        config.blur.enabled = true;
        config.blur.radius = 0;
        config.threshold.enabled = true;
        config.threshold.method = ThresholdMethod::Adaptive;
        config.threshold.block_size = 10;
        let (_, diagnostics) = process_with_diagnostics(&source(), &config, &NoClock);

        let blur = diagnostics.stage(StageKind::Blur).map(|d| d.metrics.clone());
        assert_eq!(
            blur,
            Some(StageMetrics::Blur {
                method: BlurMethod::Gaussian,
                kernel_size: 3
            })
        );
        let Some(StageMetrics::Threshold { block_size, level, .. }) =
            diagnostics.stage(StageKind::Threshold).map(|d| d.metrics.clone())
        else {
            unreachable!("threshold ran");
        };
        assert_eq!(block_size, Some(11));
        assert_eq!(level, None);
    }

    #[test]
    fn diagnostics_describe_the_run() {
        let source = source();
        let (out, diagnostics) = process_with_diagnostics(&source, &everything_on(), &NoClock);
        assert_eq!(diagnostics.dimensions, source.dimensions());
        assert_eq!(diagnostics.source_channels, Channels::Three);
        assert_eq!(diagnostics.output_channels, out.channels());
        let grayscale = diagnostics.stage(StageKind::Grayscale).unwrap();
        assert_eq!(grayscale.input_channels, Channels::Three);
        assert_eq!(grayscale.output_channels, Channels::One);
    }

    #[test]
    fn stages_lists_only_enabled() {
        let mut config = PipelineConfig::default();
        assert!(stages(&config).is_empty());
        config.edges.enabled = true;
        config.grayscale = true;
        let kinds: Vec<_> = stages(&config).iter().map(FilterStage::kind).collect();
        assert_eq!(kinds, [StageKind::Grayscale, StageKind::EdgeDetection]);
    }
}
