//! imgnode-pipeline: Sequential pixel filter pipeline (sans-IO).
//!
//! Applies a fixed chain of filters to a source image:
//! grayscale -> brightness/contrast -> blur -> threshold ->
//! edge detection (optionally overlaid on the working image).
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and rasters. Reading and writing files lives in
//! `imgnode-io`; encoding for export lives in `imgnode-export`.
//!
//! The entry points are [`Pipeline`], which owns a source image and
//! re-runs the chain for each [`PipelineConfig`] it is handed, and the
//! free function [`process`] for one-off runs over a borrowed [`Raster`].

pub mod blur;
mod canny;
mod convolve;
pub mod diagnostics;
pub mod edge;
pub mod grayscale;
pub mod histogram;
pub mod pipeline;
pub mod raster;
pub mod stage;
pub mod threshold;
pub mod tone;
pub mod types;

pub use blur::BlurMethod;
pub use diagnostics::{Clock, NoClock, PipelineDiagnostics, StageDiagnostics, StageMetrics};
pub use edge::EdgeMethod;
pub use histogram::Histogram;
pub use pipeline::{Pipeline, PipelineState, process, process_with_diagnostics};
pub use raster::{Channels, Raster, normalize_to_channels};
pub use stage::{FilterStage, Stage, StageKind};
pub use threshold::ThresholdMethod;
pub use types::{
    BlurConfig, Dimensions, EdgeConfig, PipelineConfig, PipelineError, ThresholdConfig, ToneConfig,
};
