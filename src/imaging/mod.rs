//! Raster editing: pure Rust, no native libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Crop** | display-scale conversion + `DynamicImage::crop_imm` |
//! | **Rotate** | `imageproc::geometric_transformations::rotate` about a pivot |
//! | **Flip** | `DynamicImage::fliph` / `flipv` |
//! | **Resize** | `resize_exact` with `Lanczos3` |
//! | **Encode** | AVIF (rav1e), JPEG, PNG, WebP via `image` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry and size math (unit testable)
//! - **Parameters**: Data structures describing edit requests
//! - **Codec**: [`RasterCodec`] trait + [`RustCodec`]
//! - **Edits**: Transforms and the decode → transform → encode pipeline
//! - **Compression**: The dimension / file-size planner

pub mod calculations;
pub mod codec;
pub mod compression;
pub mod edits;
mod params;
pub mod rust_codec;

pub use codec::{EditError, EncodedImage, RasterCodec};
pub use compression::{CompressionPreview, CompressionResult, compress, preview_compression};
pub use edits::{EditOp, apply_edit};
pub use params::{
    CompressTarget, CompressionSettings, CropRect, DisplayedSize, FlipAxis, OutputFormat, Quality,
    RotateParams,
};
pub use rust_codec::RustCodec;
