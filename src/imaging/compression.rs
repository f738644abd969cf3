//! Compression planner.
//!
//! Two targets, see [`CompressTarget`]:
//!
//! - **Dimensions**: one resize into the bounding box, one encode.
//! - **File size**: iterative refinement. Each attempt encodes for real and
//!   only the actual encoded length decides acceptance:
//!
//!   1. encode at the current (width, height, quality)
//!   2. accept when `len <= budget`
//!   3. otherwise step quality down while it is above the floor
//!   4. at the floor, shrink both dimensions by `resize_step` and restart
//!      from the initial quality
//!   5. stop after `max_attempts` and return the smallest encode seen
//!
//! The bytes-per-pixel estimate in [`preview_compression`] is for UI text
//! only and never takes part in the loop.

use super::calculations::{
    calculate_bounded_dimensions, calculate_optimal_dimensions, dimensions_for_file_size,
    estimate_compressed_size, shrink_dimensions,
};
use super::codec::{EditError, EncodedImage, RasterCodec};
use super::edits::resize;
use super::params::{CompressTarget, CompressionSettings, OutputFormat, Quality};
use image::DynamicImage;
use std::borrow::Cow;

/// Outcome of a compression request.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub encoded: EncodedImage,
    /// Encodes performed, including the accepted one.
    pub attempts: u32,
    pub final_quality: Quality,
    /// Size of the record's current file before compressing.
    pub original_size: u64,
    pub original_dimensions: (u32, u32),
    /// `false` when the planner gave up and returned its best effort.
    pub within_budget: bool,
}

impl CompressionResult {
    pub fn final_size(&self) -> u64 {
        self.encoded.len()
    }

    pub fn final_dimensions(&self) -> (u32, u32) {
        (self.encoded.width, self.encoded.height)
    }

    pub fn dimensions_changed(&self) -> bool {
        self.final_dimensions() != self.original_dimensions
    }

    /// Percentage saved relative to the original size (0 when it grew).
    pub fn reduction_percent(&self) -> u32 {
        if self.original_size == 0 || self.final_size() >= self.original_size {
            return 0;
        }
        let saved = (self.original_size - self.final_size()) as f64;
        (saved / self.original_size as f64 * 100.0).round() as u32
    }
}

/// Advisory numbers for live feedback while the user tweaks parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPreview {
    pub width: u32,
    pub height: u32,
    pub estimated_bytes: u64,
}

/// Predict output dimensions and size without encoding anything.
pub fn preview_compression(
    source: (u32, u32),
    target: CompressTarget,
    quality: Quality,
    settings: &CompressionSettings,
) -> CompressionPreview {
    let (width, height) = match target {
        CompressTarget::Dimensions {
            max_width,
            max_height,
            maintain_aspect,
        } => target_dimensions(source, max_width, max_height, maintain_aspect),
        CompressTarget::FileSize { max_bytes } => {
            dimensions_for_file_size(source, max_bytes, quality.value(), settings.bytes_per_pixel)
        }
    };
    CompressionPreview {
        width,
        height,
        estimated_bytes: estimate_compressed_size(
            (width, height),
            quality.value(),
            settings.bytes_per_pixel,
        ),
    }
}

fn target_dimensions(
    source: (u32, u32),
    max_width: u32,
    max_height: u32,
    maintain_aspect: bool,
) -> (u32, u32) {
    if maintain_aspect {
        calculate_optimal_dimensions(source, (max_width, max_height))
    } else {
        calculate_bounded_dimensions(source, (max_width, max_height))
    }
}

/// Run a compression request against a decoded raster.
///
/// `original_size` is the byte length of the file the raster came from and is
/// only used for reporting.
pub fn compress(
    codec: &impl RasterCodec,
    image: &DynamicImage,
    original_size: u64,
    target: CompressTarget,
    quality: Quality,
    format: OutputFormat,
    settings: &CompressionSettings,
) -> Result<CompressionResult, EditError> {
    let source = (image.width(), image.height());
    match target {
        CompressTarget::Dimensions {
            max_width,
            max_height,
            maintain_aspect,
        } => {
            let (w, h) = target_dimensions(source, max_width, max_height, maintain_aspect);
            let encoded = codec.encode(&resize(image, w, h), format, quality)?;
            Ok(CompressionResult {
                encoded,
                attempts: 1,
                final_quality: quality,
                original_size,
                original_dimensions: source,
                within_budget: true,
            })
        }
        CompressTarget::FileSize { max_bytes } => compress_to_budget(
            codec,
            image,
            original_size,
            max_bytes,
            quality,
            format,
            settings,
        ),
    }
}

fn compress_to_budget(
    codec: &impl RasterCodec,
    image: &DynamicImage,
    original_size: u64,
    budget: u64,
    initial_quality: Quality,
    format: OutputFormat,
    settings: &CompressionSettings,
) -> Result<CompressionResult, EditError> {
    let source = (image.width(), image.height());
    let mut dims = source;
    let mut quality = initial_quality;
    let mut frame = Cow::Borrowed(image);
    let mut best: Option<(EncodedImage, Quality)> = None;
    let max_attempts = settings.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if (frame.width(), frame.height()) != dims {
            frame = Cow::Owned(resize(image, dims.0, dims.1));
        }
        let encoded = codec.encode(&frame, format, quality)?;
        log::debug!(
            "compress attempt {attempt}: {}x{} at {} → {} bytes (budget {budget})",
            dims.0,
            dims.1,
            quality,
            encoded.len()
        );

        if encoded.len() <= budget {
            return Ok(CompressionResult {
                encoded,
                attempts: attempt,
                final_quality: quality,
                original_size,
                original_dimensions: source,
                within_budget: true,
            });
        }

        if best
            .as_ref()
            .is_none_or(|(smallest, _)| encoded.len() < smallest.len())
        {
            best = Some((encoded, quality));
        }

        if quality.above(settings.min_quality) {
            quality = quality.step_down(settings.quality_step, settings.min_quality);
        } else {
            dims = shrink_dimensions(dims, settings.resize_step);
            quality = initial_quality;
        }
    }

    let (encoded, final_quality) = best.ok_or_else(|| EditError::Encode("no attempt ran".into()))?;
    log::warn!(
        "compression gave up after {max_attempts} attempts: {} bytes > budget {budget}",
        encoded.len()
    );
    Ok(CompressionResult {
        encoded,
        attempts: max_attempts,
        final_quality,
        original_size,
        original_dimensions: source,
        within_budget: false,
    })
}
