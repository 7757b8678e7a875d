//! imgnode-export: Pure image encoders (sans-IO)
//!
//! Reconciles a processed [`Raster`](imgnode_pipeline::Raster) to
//! 3-channel RGB and encodes it as PNG, JPEG or BMP bytes. Writing the
//! bytes anywhere is the caller's job.

pub mod encode;

pub use encode::{EncodeError, ExportFormat, JPEG_QUALITY, encode, to_export_rgb};
