//! imgnode-io: Filesystem collaborator for the imgnode pipeline.
//!
//! Loads source images from paths, writes exports to paths, and runs
//! previews off the calling thread ([`PreviewWorker`]). All pixel work
//! is delegated to `imgnode-pipeline` and `imgnode-export`.

use std::path::{Path, PathBuf};

use imgnode_export::{EncodeError, ExportFormat};
use imgnode_pipeline::{Dimensions, Pipeline, PipelineError, Raster};

pub mod worker;

pub use worker::{PreviewResult, PreviewWorker};

/// Errors from filesystem load and export.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File that was being written.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The path has no extension to infer an export format from.
    #[error("cannot infer export format for {}: no file extension", path.display())]
    MissingExtension {
        /// Offending path.
        path: PathBuf,
    },

    /// The preview thread could not be started.
    #[error("failed to start preview worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The file contents could not be decoded.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The export could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Read and decode the image at `path`.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the file is absent or unreadable and
/// [`IoError::Pipeline`] if it cannot be decoded.
pub fn load_image(path: &Path) -> Result<Raster, IoError> {
    let bytes = std::fs::read(path).map_err(|source| IoError::Read {
        path: path.to_owned(),
        source,
    })?;
    let raster = imgnode_pipeline::grayscale::decode(&bytes)?;
    log::info!(
        "loaded {} ({}x{}, {} channels)",
        path.display(),
        raster.width(),
        raster.height(),
        raster.channels(),
    );
    Ok(raster)
}

/// Load the image at `path` as the source of `pipeline`.
///
/// On failure the pipeline keeps its previous source.
///
/// # Errors
///
/// Same as [`load_image`].
pub fn load_into(pipeline: &mut Pipeline, path: &Path) -> Result<Dimensions, IoError> {
    let raster = load_image(path)?;
    let dimensions = raster.dimensions();
    pipeline.set_source(raster);
    Ok(dimensions)
}

/// Export format implied by the extension of `path`.
///
/// # Errors
///
/// Returns [`IoError::MissingExtension`] if `path` has no extension and
/// [`IoError::Encode`] if the extension is not a supported format.
pub fn format_for_path(path: &Path) -> Result<ExportFormat, IoError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| IoError::MissingExtension {
            path: path.to_owned(),
        })?;
    Ok(ExportFormat::from_extension(extension)?)
}

/// Encode `raster` as `format` and write it to `path`.
///
/// # Errors
///
/// Returns [`IoError::Encode`] if encoding fails and [`IoError::Write`]
/// if the file cannot be written.
pub fn export_image(path: &Path, raster: &Raster, format: ExportFormat) -> Result<(), IoError> {
    let bytes = imgnode_export::encode(raster, format)?;
    std::fs::write(path, &bytes).map_err(|source| IoError::Write {
        path: path.to_owned(),
        source,
    })?;
    log::info!(
        "exported {} ({format}, {} bytes)",
        path.display(),
        bytes.len()
    );
    Ok(())
}

/// [`export_image`] with the format taken from the extension of `path`.
///
/// # Errors
///
/// Same as [`format_for_path`] and [`export_image`].
pub fn export_image_auto(path: &Path, raster: &Raster) -> Result<ExportFormat, IoError> {
    let format = format_for_path(path)?;
    export_image(path, raster, format)?;
    Ok(format)
}
