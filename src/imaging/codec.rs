//! Raster codec port and shared edit types.
//!
//! The [`RasterCodec`] trait is the seam between the pure edit transforms and
//! actual pixel encoding. Everything above it (edit engine, compression
//! planner, collection controller) is codec-agnostic.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec). Tests use the recording
//! [`MockCodec`](tests::MockCodec), which returns encodes of a synthetic,
//! exactly controlled size.

use super::params::{OutputFormat, Quality};
use image::DynamicImage;
use thiserror::Error;

/// Failure of a single edit operation.
///
/// Each kind is distinct so callers can tell a bad source apart from a bad
/// request or a failed encode. None of them leave a record half-updated.
#[derive(Error, Debug)]
pub enum EditError {
    #[error("Failed to decode raster: {0}")]
    Decode(String),
    #[error("Failed to encode raster: {0}")]
    Encode(String),
    #[error("Crop rectangle covers no pixels of the {width}x{height} source")]
    ZeroAreaCrop { width: u32, height: u32 },
    #[error("Unsupported raster format: {0}")]
    UnsupportedFormat(String),
    #[error("No raster data available for {0}")]
    RasterMissing(String),
}

/// Encoded output of an edit: the bytes that become the record's current file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decode/encode port for rasters.
pub trait RasterCodec {
    /// Decode encoded bytes (any supported input format) at natural size.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, EditError>;

    /// Encode a raster to `format`. `quality` only affects lossy formats.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<EncodedImage, EditError>;
}
