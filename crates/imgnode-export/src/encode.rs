//! Raster to PNG / JPEG / BMP bytes.
//!
//! Every format is written as 8-bit RGB. Single-channel rasters are
//! expanded by replicating the luma value; four-channel rasters lose
//! their alpha channel.

use std::fmt;

use image::ImageEncoder;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use imgnode_pipeline::Raster;
use imgnode_pipeline::types::RgbImage;

/// JPEG quality used for every export.
pub const JPEG_QUALITY: u8 = 95;

/// Errors that can occur while encoding an export.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The encoder rejected the image.
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    /// No export format matches this file extension.
    #[error("unsupported export extension {0:?} (expected png, jpg, jpeg or bmp)")]
    UnsupportedExtension(String),

    /// The image has no pixels.
    #[error("cannot encode an image with zero width or height")]
    EmptyImage,
}

/// A supported export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Lossless PNG.
    Png,
    /// Lossy JPEG at [`JPEG_QUALITY`].
    Jpeg,
    /// Uncompressed 24-bit BMP.
    Bmp,
}

impl ExportFormat {
    /// Every format, in the order a file picker would list them.
    pub const ALL: [Self; 3] = [Self::Png, Self::Jpeg, Self::Bmp];

    /// Pick a format from a file extension, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnsupportedExtension`] for anything other
    /// than `png`, `jpg`, `jpeg` or `bmp`.
    pub fn from_extension(extension: &str) -> Result<Self, EncodeError> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "bmp" => Ok(Self::Bmp),
            _ => Err(EncodeError::UnsupportedExtension(extension.to_owned())),
        }
    }

    /// Canonical file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
        }
    }

    /// MIME type for the encoded bytes.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Bmp => "image/bmp",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Bmp => "BMP",
        })
    }
}

/// The 3-channel image that [`encode`] writes.
#[must_use]
pub fn to_export_rgb(raster: &Raster) -> RgbImage {
    raster.to_rgb()
}

/// Encode `raster` as `format`.
///
/// # Errors
///
/// Returns [`EncodeError::EmptyImage`] for a zero-sized raster and
/// [`EncodeError::Encode`] if the encoder fails.
pub fn encode(raster: &Raster, format: ExportFormat) -> Result<Vec<u8>, EncodeError> {
    if raster.width() == 0 || raster.height() == 0 {
        return Err(EncodeError::EmptyImage);
    }
    let rgb = to_export_rgb(raster);
    let (w, h) = rgb.dimensions();
    let color = image::ExtendedColorType::Rgb8;

    let mut buf = Vec::new();
    match format {
        ExportFormat::Png => PngEncoder::new(&mut buf).write_image(rgb.as_raw(), w, h, color)?,
        ExportFormat::Jpeg => JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
            .write_image(rgb.as_raw(), w, h, color)?,
        ExportFormat::Bmp => BmpEncoder::new(&mut buf).write_image(rgb.as_raw(), w, h, color)?,
    }

    log::debug!("encoded {w}x{h} as {format} ({} bytes)", buf.len());
    Ok(buf)
}
