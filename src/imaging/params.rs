//! Parameter types for edit operations.
//!
//! These structs describe *what* to do to a raster, not *how*. The collection
//! controller builds them from interactive state (a crop box dragged over the
//! preview, a rotation handle) and hands them to [`edits`](super::edits) and
//! [`compression`](super::compression), which do the pixel work.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0.1–1.0, default 1.0). Clamped on construction.
//! - [`OutputFormat`]: Encoded raster format (AVIF by default).
//! - [`DisplayedSize`]: On-screen size of the image element the user manipulated.
//! - [`CropRect`]: Crop rectangle in on-screen coordinates.
//! - [`RotateParams`]: Angle plus an arbitrary on-screen pivot.
//! - [`FlipAxis`]: Mirror direction.
//! - [`CompressTarget`]: Compression by dimensions or by byte budget.
//! - [`CompressionSettings`]: Retry steps, floors and attempt limits of the planner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy encoding, in `[0.1, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub const MIN: f32 = 0.1;
    pub const MAX: f32 = 1.0;

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Encoder quality on the 1–100 scale used by the `image` codecs.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// Lower quality by `step`, never below `floor`.
    ///
    /// Rounded to hundredths so repeated stepping lands exactly on the floor.
    pub fn step_down(self, step: f32, floor: f32) -> Self {
        let next = ((self.0 - step) * 100.0).round() / 100.0;
        Self::new(next.max(floor))
    }

    /// Whether this quality is still above `floor` (hundredth precision).
    pub fn above(self, floor: f32) -> bool {
        (self.0 * 100.0).round() > (floor * 100.0).round()
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(1.0)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Encoded output format for edited rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Avif,
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Avif => "image/avif",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Avif => "avif",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    /// Whether the `quality` knob changes the encoded output.
    ///
    /// PNG and WebP are written losslessly by the `image` crate.
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Avif | OutputFormat::Jpeg)
    }

    /// Infer a format from a file extension (`"JPG"`, `"jpeg"`, `"avif"`, ...).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "avif" => Some(OutputFormat::Avif),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// On-screen size of the displayed image element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayedSize {
    pub width: f64,
    pub height: f64,
}

impl DisplayedSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The image displayed at its natural size (scale factor 1).
    pub fn natural(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
        }
    }
}

/// Crop rectangle relative to the top-left of the displayed image, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rotation about an on-screen pivot point.
///
/// `center` is relative to the top-left of the displayed image, so a pivot
/// outside the image is allowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateParams {
    pub angle_degrees: f64,
    pub center: (f64, f64),
    pub displayed: DisplayedSize,
}

impl RotateParams {
    /// Rotation about the middle of the displayed image.
    pub fn about_center(angle_degrees: f64, displayed: DisplayedSize) -> Self {
        Self {
            angle_degrees,
            center: (displayed.width / 2.0, displayed.height / 2.0),
            displayed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipAxis {
    /// Mirror about the vertical centerline (left ↔ right).
    Horizontal,
    /// Mirror about the horizontal centerline (top ↔ bottom).
    Vertical,
}

/// What a compression request aims for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressTarget {
    /// Fit inside `max_width` × `max_height` (0 = unbounded on that axis).
    Dimensions {
        max_width: u32,
        max_height: u32,
        maintain_aspect: bool,
    },
    /// Encoded output must not exceed `max_bytes`.
    FileSize { max_bytes: u64 },
}

/// Tunables of the iterative file-size planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionSettings {
    /// Quality decrement per failed attempt.
    pub quality_step: f32,
    /// Quality floor; once reached, dimensions shrink instead.
    pub min_quality: f32,
    /// Dimension multiplier applied when quality is exhausted.
    pub resize_step: f32,
    /// Hard cap on encode attempts.
    pub max_attempts: u32,
    /// Heuristic bytes per pixel for advisory size estimates.
    pub bytes_per_pixel: f64,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            quality_step: 0.1,
            min_quality: 0.1,
            resize_step: 0.9,
            max_attempts: 10,
            bytes_per_pixel: 1.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0.0).value(), 0.1);
        assert_eq!(Quality::new(0.5).value(), 0.5);
        assert_eq!(Quality::new(3.0).value(), 1.0);
        assert_eq!(Quality::new(f32::NAN), Quality::default());
    }

    #[test]
    fn quality_default_is_full() {
        assert_eq!(Quality::default().value(), 1.0);
        assert_eq!(Quality::default().percent(), 100);
    }

    #[test]
    fn quality_steps_land_on_floor() {
        let mut q = Quality::new(0.8);
        let mut steps = 0;
        while q.above(0.1) {
            q = q.step_down(0.1, 0.1);
            steps += 1;
        }
        assert_eq!(steps, 7);
        assert_eq!(q.percent(), 10);
    }

    #[test]
    fn quality_display_is_percent() {
        assert_eq!(Quality::new(0.8).to_string(), "80%");
    }

    #[test]
    fn format_extension_roundtrip() {
        for format in [
            OutputFormat::Avif,
            OutputFormat::Jpeg,
            OutputFormat::Png,
            OutputFormat::Webp,
        ] {
            assert_eq!(OutputFormat::from_extension(format.extension()), Some(format));
        }
        assert_eq!(OutputFormat::from_extension("JPEG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("gif"), None);
    }

    #[test]
    fn default_format_is_avif() {
        assert_eq!(OutputFormat::default().mime(), "image/avif");
        assert!(OutputFormat::default().is_lossy());
        assert!(!OutputFormat::Png.is_lossy());
    }

    #[test]
    fn compression_defaults() {
        let s = CompressionSettings::default();
        assert_eq!(s.quality_step, 0.1);
        assert_eq!(s.min_quality, 0.1);
        assert_eq!(s.resize_step, 0.9);
        assert_eq!(s.max_attempts, 10);
    }
}
