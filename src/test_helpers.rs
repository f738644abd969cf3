//! Shared test utilities.
//!
//! Synthetic rasters and source files, so tests never depend on fixture
//! files on disk.
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let file = png_file("cat.png", 8, 8);
//! assert_eq!(file.mime, "image/png");
//! ```

use crate::store::SourceFile;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

// =========================================================================
// Rasters
// =========================================================================

pub const TOP_LEFT: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const TOP_RIGHT: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const BOTTOM_LEFT: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const BOTTOM_RIGHT: Rgba<u8> = Rgba([255, 255, 0, 255]);

/// A `width`×`height` image with a distinct solid color per quadrant.
pub fn quadrant_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        match (x < width / 2, y < height / 2) {
            (true, true) => TOP_LEFT,
            (false, true) => TOP_RIGHT,
            (true, false) => BOTTOM_LEFT,
            (false, false) => BOTTOM_RIGHT,
        }
    });
    DynamicImage::ImageRgba8(img)
}

/// PNG encoding of [`quadrant_image`].
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    quadrant_image(width, height)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

// =========================================================================
// Source files
// =========================================================================

/// An `image/png` source file named `name`.
pub fn png_file(name: &str, width: u32, height: u32) -> SourceFile {
    SourceFile::new(name, "image/png", png_bytes(width, height))
}
