//! imgnode: run the filter chain over an image from the command line.
//!
//! Loads an image, applies the enabled stages in their fixed order,
//! prints per-stage diagnostics, and optionally exports the result.
//! Useful for:
//!
//! - Previewing what a set of toggles does to an image
//! - Comparing threshold methods (`binary`, `adaptive`, `otsu`)
//! - Tuning Canny/Sobel thresholds and kernel sizes
//! - Measuring per-stage durations over repeated runs
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin imgnode -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use imgnode_export::ExportFormat;
use imgnode_pipeline::{
    BlurMethod, Clock, EdgeMethod, Histogram, Pipeline, PipelineConfig, PipelineDiagnostics,
    StageKind, ThresholdMethod,
};
use web_time::Instant;

/// Run the imgnode filter chain over an image.
///
/// Every stage is off unless its flag is given. Stages always run in
/// the order grayscale, brightness/contrast, blur, threshold, edges.
#[derive(Parser)]
#[command(name = "imgnode", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP).
    image_path: PathBuf,

    /// Reduce to a single luma channel.
    #[arg(long)]
    grayscale: bool,

    /// Enable brightness/contrast with this brightness offset (-100 to 100).
    #[arg(long, allow_negative_numbers = true)]
    brightness: Option<f32>,

    /// Enable brightness/contrast with this contrast gain (0 to 3).
    #[arg(long)]
    contrast: Option<f32>,

    /// Enable blur with this radius (1 to 20).
    #[arg(long)]
    blur: Option<u32>,

    /// Blur kernel.
    #[arg(long, value_enum, default_value_t = BlurKind::Gaussian)]
    blur_method: BlurKind,

    /// Enable thresholding with this method.
    #[arg(long, value_enum)]
    threshold: Option<ThresholdKind>,

    /// Split level for the binary method.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD_VALUE)]
    threshold_value: u8,

    /// Neighborhood width for the adaptive method (odd, 3 to 99).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLOCK_SIZE)]
    block_size: u32,

    /// Offset subtracted from the local mean for the adaptive method.
    #[arg(long, allow_negative_numbers = true, default_value_t = PipelineConfig::DEFAULT_ADAPTIVE_CONSTANT)]
    constant: f32,

    /// Enable edge detection with this detector.
    #[arg(long, value_enum)]
    edges: Option<EdgeKind>,

    /// Lower edge threshold (Sobel binarizes here).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_EDGE_LOWER)]
    edge_lower: u8,

    /// Upper edge threshold (Canny only).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_EDGE_UPPER)]
    edge_upper: u8,

    /// Edge kernel parameter (1 to 4, aperture 2k - 1).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_EDGE_KERNEL)]
    edge_kernel: u32,

    /// Blend detected edges onto the image instead of replacing it.
    #[arg(long)]
    overlay: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other stage flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Print a histogram of the source image.
    #[arg(long)]
    histogram: bool,

    /// Write the processed image to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Export format. Inferred from the output extension when omitted.
    #[arg(long, value_enum, requires = "output")]
    format: Option<FormatKind>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,
}

/// Blur kernel selection.
#[derive(Clone, Copy, ValueEnum)]
enum BlurKind {
    /// Gaussian-weighted kernel.
    Gaussian,
    /// Unweighted mean.
    Box,
}

/// Threshold method selection.
#[derive(Clone, Copy, ValueEnum)]
enum ThresholdKind {
    /// One fixed level (`--threshold-value`).
    Binary,
    /// Local mean minus `--constant` over `--block-size` neighborhoods.
    Adaptive,
    /// Level chosen from the histogram.
    Otsu,
}

/// Edge detector selection.
#[derive(Clone, Copy, ValueEnum)]
enum EdgeKind {
    /// Non-maximum suppression with hysteresis.
    Canny,
    /// Thresholded gradient magnitude.
    Sobel,
}

/// Export format selection.
#[derive(Clone, Copy, ValueEnum)]
enum FormatKind {
    /// Lossless PNG.
    Png,
    /// JPEG at fixed quality.
    Jpeg,
    /// Uncompressed BMP.
    Bmp,
}

impl From<FormatKind> for ExportFormat {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Png => Self::Png,
            FormatKind::Jpeg => Self::Jpeg,
            FormatKind::Bmp => Self::Bmp,
        }
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual stage flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return PipelineConfig::from_json(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let mut config = PipelineConfig {
        grayscale: cli.grayscale,
        ..PipelineConfig::default()
    };

    if let Some(brightness) = cli.brightness {
        config.tone.brightness_enabled = true;
        config.tone.brightness = brightness;
    }
    if let Some(contrast) = cli.contrast {
        config.tone.contrast_enabled = true;
        config.tone.contrast = contrast;
    }

    if let Some(radius) = cli.blur {
        config.blur.enabled = true;
        config.blur.radius = radius;
    }
    config.blur.method = match cli.blur_method {
        BlurKind::Gaussian => BlurMethod::Gaussian,
        BlurKind::Box => BlurMethod::Box,
    };

    if let Some(method) = cli.threshold {
        config.threshold.enabled = true;
        config.threshold.method = match method {
            ThresholdKind::Binary => ThresholdMethod::Binary,
            ThresholdKind::Adaptive => ThresholdMethod::Adaptive,
            ThresholdKind::Otsu => ThresholdMethod::Otsu,
        };
    }
    config.threshold.value = cli.threshold_value;
    config.threshold.block_size = cli.block_size;
    config.threshold.constant = cli.constant;

    if let Some(method) = cli.edges {
        config.edges.enabled = true;
        config.edges.method = match method {
            EdgeKind::Canny => EdgeMethod::Canny,
            EdgeKind::Sobel => EdgeMethod::Sobel,
        };
    }
    config.edges.lower = cli.edge_lower;
    config.edges.upper = cli.edge_upper;
    config.edges.kernel = cli.edge_kernel;
    config.edges.overlay = cli.overlay;

    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut pipeline = Pipeline::new();
    if let Err(e) = imgnode_io::load_into(&mut pipeline, &cli.image_path) {
        eprintln!("Error loading {}: {e}", cli.image_path.display());
        return ExitCode::FAILURE;
    }

    eprintln!("Image: {}", cli.image_path.display());
    eprintln!("Config: {config:#?}");
    eprintln!("State: {:?}", pipeline.state(&config));
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    if cli.histogram
        && let Some(histogram) = pipeline.histogram()
    {
        if cli.json {
            match serde_json::to_string_pretty(&histogram) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing histogram: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", histogram_summary(&histogram));
            println!();
        }
    }

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let Some((output, diagnostics)) = pipeline.run_with_diagnostics(&config, &WebClock) else {
            eprintln!("Pipeline has no source image");
            return ExitCode::FAILURE;
        };

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }

        // Export the first run only.
        if run == 0
            && let Some(ref path) = cli.output
        {
            let result = match cli.format {
                Some(kind) => {
                    let format = ExportFormat::from(kind);
                    imgnode_io::export_image(path, &output, format).map(|()| format)
                }
                None => imgnode_io::export_image_auto(path, &output),
            };
            match result {
                Ok(format) => eprintln!("{format} written to {}", path.display()),
                Err(e) => {
                    eprintln!("Error exporting to {}: {e}", path.display());
                    return ExitCode::FAILURE;
                }
            }
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`web_time::Instant`].
struct WebClock;

impl Clock for WebClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Sixteen-bucket text rendering of a histogram with summary statistics.
fn histogram_summary(histogram: &Histogram) -> String {
    const BUCKETS: usize = 16;
    const BAR_WIDTH: u64 = 40;

    let width = Histogram::BINS / BUCKETS;
    let buckets: Vec<u64> = histogram
        .counts()
        .chunks(width)
        .map(|chunk| chunk.iter().map(|&c| u64::from(c)).sum())
        .collect();
    let tallest = buckets.iter().copied().max().unwrap_or(0);

    let mut lines = vec![format!("Source Histogram\n{}", "=".repeat(60))];
    lines.push(format!("Pixels: {}", histogram.total()));
    if let Some((level, count)) = histogram.peak() {
        lines.push(format!("Peak: {level} ({count} pixels)"));
    }
    if let Some(mean) = histogram.mean() {
        lines.push(format!("Mean: {mean:.2}"));
    }
    lines.push(String::new());

    for (i, count) in buckets.into_iter().enumerate() {
        let low = i * width;
        let high = low + width - 1;
        let bar = if tallest == 0 {
            0
        } else {
            usize::try_from(count * BAR_WIDTH / tallest).unwrap_or(0)
        };
        lines.push(format!("{low:>3}-{high:<3} {:<40} {count}", "#".repeat(bar)));
    }

    lines.join("\n")
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for kind in StageKind::ALL {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage(kind))
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{:<24} {stage_mean:>10.3}ms", kind.name());
    }
}
