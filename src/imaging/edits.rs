//! Edit engine: pure raster transforms plus the decode → transform → encode
//! pipeline.
//!
//! Every transform works on the natural-pixel raster. On-screen inputs (crop
//! rectangles, rotation pivots) are converted with the display scale from
//! [`calculations`](super::calculations) before any sampling happens.
//!
//! Edits are destructive flattens: the encoded output of one edit becomes the
//! source of the next. There is no transform stack.

use super::calculations::{scale_crop_rect, to_natural_point};
use super::codec::{EditError, EncodedImage, RasterCodec};
use super::params::{CropRect, DisplayedSize, FlipAxis, OutputFormat, Quality, RotateParams};
use image::imageops::FilterType;
use image::{DynamicImage, Rgba};
use imageproc::geometric_transformations::{self as geometry, Interpolation};

/// A single edit request against a record's current raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditOp {
    Crop {
        rect: CropRect,
        displayed: DisplayedSize,
    },
    Rotate(RotateParams),
    Flip(FlipAxis),
    Resize {
        width: u32,
        height: u32,
    },
}

impl EditOp {
    pub fn name(&self) -> &'static str {
        match self {
            EditOp::Crop { .. } => "crop",
            EditOp::Rotate(_) => "rotate",
            EditOp::Flip(FlipAxis::Horizontal) => "flip-h",
            EditOp::Flip(FlipAxis::Vertical) => "flip-v",
            EditOp::Resize { .. } => "resize",
        }
    }
}

/// Crop using an on-screen rectangle.
///
/// The rectangle is converted to natural pixels and clamped to the source.
/// A rectangle with nothing left after clamping is [`EditError::ZeroAreaCrop`].
pub fn crop(
    image: &DynamicImage,
    rect: CropRect,
    displayed: DisplayedSize,
) -> Result<DynamicImage, EditError> {
    let natural = (image.width(), image.height());
    let px = scale_crop_rect(rect, natural, displayed).ok_or(EditError::ZeroAreaCrop {
        width: natural.0,
        height: natural.1,
    })?;
    Ok(image.crop_imm(px.x, px.y, px.width, px.height))
}

/// Rotate about an arbitrary on-screen pivot.
///
/// The canvas keeps the natural dimensions; content rotated outside the frame
/// is clipped and uncovered areas are transparent. Positive angles turn
/// clockwise on screen.
pub fn rotate(image: &DynamicImage, params: &RotateParams) -> DynamicImage {
    let natural = (image.width(), image.height());
    let (cx, cy) = to_natural_point(params.center, natural, params.displayed);
    let theta = params.angle_degrees.to_radians() as f32;
    DynamicImage::ImageRgba8(geometry::rotate(
        &image.to_rgba8(),
        (cx as f32, cy as f32),
        theta,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    ))
}

pub fn flip(image: &DynamicImage, axis: FlipAxis) -> DynamicImage {
    match axis {
        FlipAxis::Horizontal => image.fliph(),
        FlipAxis::Vertical => image.flipv(),
    }
}

/// Resize to exact dimensions (Lanczos3). Same-size requests return a copy.
pub fn resize(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if (image.width(), image.height()) == (width, height) {
        return image.clone();
    }
    image.resize_exact(width.max(1), height.max(1), FilterType::Lanczos3)
}

pub fn transform(image: &DynamicImage, op: &EditOp) -> Result<DynamicImage, EditError> {
    match op {
        EditOp::Crop { rect, displayed } => crop(image, *rect, *displayed),
        EditOp::Rotate(params) => Ok(rotate(image, params)),
        EditOp::Flip(axis) => Ok(flip(image, *axis)),
        EditOp::Resize { width, height } => Ok(resize(image, *width, *height)),
    }
}

/// Decode `source`, apply `op`, encode the result.
///
/// Any failure leaves nothing behind: the caller only sees an
/// [`EncodedImage`] when every step succeeded.
pub fn apply_edit(
    codec: &impl RasterCodec,
    source: &[u8],
    op: &EditOp,
    format: OutputFormat,
    quality: Quality,
) -> Result<EncodedImage, EditError> {
    let decoded = codec.decode(source)?;
    let edited = transform(&decoded, op)?;
    log::debug!(
        "{}: {}x{} → {}x{}",
        op.name(),
        decoded.width(),
        decoded.height(),
        edited.width(),
        edited.height()
    );
    codec.encode(&edited, format, quality)
}
