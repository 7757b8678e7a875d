//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP) and produces a
//! [`Raster`] in the nearest 1/3/4-channel layout. The grayscale stage
//! reduces any raster to a single luma channel.

use crate::raster::{Channels, Raster};
use crate::types::PipelineError;

/// Decode raw image bytes into a [`Raster`].
///
/// Supports whatever the `image` crate was built with (PNG, JPEG,
/// BMP). Decoded pixels keep RGB(A) channel order.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<Raster, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(Raster::from_dynamic(img))
}

/// Reduce to a single channel using `0.299*R + 0.587*G + 0.114*B`.
///
/// A raster that is already single-channel is returned unchanged.
#[must_use = "returns the grayscale raster"]
pub fn grayscale(raster: Raster) -> Raster {
    raster.into_channels(Channels::One)
}
