//! Pure Rust raster codec built on the `image` crate ecosystem.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory_with_format` |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1 frame) + BT.601 YUV→RGB |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode → PNG | `image` PNG writer (lossless) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |

use super::codec::{EditError, EncodedImage, RasterCodec};
use super::params::{OutputFormat, Quality};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Input extensions the codec can decode, used to filter directory walks.
const INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp", "avif"];

pub fn supported_input_extensions() -> &'static [&'static str] {
    INPUT_EXTENSIONS
}

/// MIME type for a file extension, if it is a decodable image.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "tif" | "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

/// The `image` crate's `"avif"` feature only ships the rav1e encoder, so AVIF
/// input is detected up front and routed to [`decode_avif`].
fn is_avif(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && matches!(&bytes[8..12], b"avif" | b"avis")
}

impl RasterCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, EditError> {
        if bytes.is_empty() {
            return Err(EditError::Decode("empty input".into()));
        }
        if is_avif(bytes) {
            return decode_avif(bytes);
        }
        let format = image::guess_format(bytes)
            .map_err(|e| EditError::UnsupportedFormat(e.to_string()))?;
        image::load_from_memory_with_format(bytes, format)
            .map_err(|e| EditError::Decode(format!("{format:?}: {e}")))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<EncodedImage, EditError> {
        let mut bytes = Vec::new();
        let result = match format {
            OutputFormat::Avif => {
                let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                    &mut bytes,
                    6,
                    quality.percent(),
                );
                DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
            }
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel
                let encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.percent());
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
            }
            OutputFormat::Png => image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png),
            OutputFormat::Webp => {
                let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut bytes);
                DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
            }
        };
        result.map_err(|e| EditError::Encode(format!("{format}: {e}")))?;
        log::debug!(
            "encoded {}x{} {} at {} → {} bytes",
            image.width(),
            image.height(),
            format,
            quality,
            bytes.len()
        );
        Ok(EncodedImage {
            bytes,
            format,
            width: image.width(),
            height: image.height(),
        })
    }
}

/// Decode an in-memory AVIF using avif-parse (container) + rav1d (AV1 frame).
fn decode_avif(bytes: &[u8]) -> Result<DynamicImage, EditError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;
    use std::ptr::NonNull;

    let avif = avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| EditError::Decode(format!("AVIF container: {e:?}")))?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(EditError::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    let mut data = Dav1dData::default();
    let buf_ptr = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
    if buf_ptr.is_null() {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(EditError::Decode("rav1d data_create failed".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

    let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            dav1d::dav1d_data_unref(NonNull::new(&mut data));
            dav1d::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(EditError::Decode(format!("rav1d send_data failed ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(EditError::Decode(format!("rav1d get_picture failed ({})", rc.0)));
    }

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    let layout = pic.p.layout;

    let subsampling = match layout {
        DAV1D_PIXEL_LAYOUT_I400 => Some(None),
        DAV1D_PIXEL_LAYOUT_I420 => Some(Some((true, true))),
        DAV1D_PIXEL_LAYOUT_I422 => Some(Some((true, false))),
        DAV1D_PIXEL_LAYOUT_I444 => Some(Some((false, false))),
        _ => None,
    };

    let converted = match subsampling {
        None => Err(EditError::UnsupportedFormat(format!(
            "AVIF pixel layout {layout}"
        ))),
        Some(chroma) => {
            let sample_bytes = if bpc <= 8 { 1 } else { 2 };
            let luma = unsafe {
                Plane::from_raw(
                    pic.data[0].map(|p| p.as_ptr() as *const u8),
                    pic.stride[0],
                    width as usize * sample_bytes,
                    height as usize,
                )
            };
            let planes = match chroma {
                None => luma.map(|y| YuvFrame {
                    y,
                    chroma: None,
                    width,
                    height,
                    bpc,
                }),
                Some((ss_x, ss_y)) => {
                    let chroma_w = if ss_x { width.div_ceil(2) } else { width } as usize;
                    let chroma_h = if ss_y { height.div_ceil(2) } else { height } as usize;
                    let u = unsafe {
                        Plane::from_raw(
                            pic.data[1].map(|p| p.as_ptr() as *const u8),
                            pic.stride[1],
                            chroma_w * sample_bytes,
                            chroma_h,
                        )
                    };
                    let v = unsafe {
                        Plane::from_raw(
                            pic.data[2].map(|p| p.as_ptr() as *const u8),
                            pic.stride[1],
                            chroma_w * sample_bytes,
                            chroma_h,
                        )
                    };
                    match (luma, u, v) {
                        (Some(y), Some(u), Some(v)) => Some(YuvFrame {
                            y,
                            chroma: Some(Chroma { u, v, ss_x, ss_y }),
                            width,
                            height,
                            bpc,
                        }),
                        _ => None,
                    }
                }
            };
            planes
                .map(|frame| frame.to_rgb())
                .ok_or_else(|| EditError::Decode("rav1d returned incomplete planes".into()))
        }
    };

    unsafe {
        dav1d::dav1d_picture_unref(NonNull::new(&mut pic));
        dav1d::dav1d_close(NonNull::new(&mut ctx));
    }

    let rgb = converted?;
    image::RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| EditError::Decode("decoded AVIF buffer has wrong size".into()))
}

/// One decoded plane, borrowed from the rav1d picture.
struct Plane<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> Plane<'a> {
    /// # Safety
    /// `ptr` must point at `rows` rows of `stride` bytes that stay alive
    /// until the picture is unreferenced.
    unsafe fn from_raw(
        ptr: Option<*const u8>,
        stride: isize,
        row_bytes: usize,
        rows: usize,
    ) -> Option<Self> {
        let ptr = ptr?;
        let stride = usize::try_from(stride).ok()?;
        if rows == 0 || stride < row_bytes {
            return None;
        }
        let len = stride * (rows - 1) + row_bytes;
        Some(Self {
            data: unsafe { std::slice::from_raw_parts(ptr, len) },
            stride,
        })
    }

    /// Sample at (x, y); 10/12-bit content is stored as native-endian u16.
    fn sample(&self, x: usize, y: usize, bpc: u32) -> f32 {
        if bpc <= 8 {
            self.data[y * self.stride + x] as f32
        } else {
            let at = y * self.stride + x * 2;
            u16::from_ne_bytes([self.data[at], self.data[at + 1]]) as f32
        }
    }
}

struct Chroma<'a> {
    u: Plane<'a>,
    v: Plane<'a>,
    ss_x: bool,
    ss_y: bool,
}

struct YuvFrame<'a> {
    y: Plane<'a>,
    chroma: Option<Chroma<'a>>,
    width: u32,
    height: u32,
    bpc: u32,
}

impl YuvFrame<'_> {
    /// Interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;
        let (w, h) = (self.width as usize, self.height as usize);

        let mut rgb = Vec::with_capacity(w * h * 3);
        for row in 0..h {
            for col in 0..w {
                let luma = self.y.sample(col, row, self.bpc);
                let pixel = match &self.chroma {
                    None => {
                        let v = (luma * scale).clamp(0.0, 255.0);
                        [v, v, v]
                    }
                    Some(c) => {
                        let cx = if c.ss_x { col / 2 } else { col };
                        let cy = if c.ss_y { row / 2 } else { row };
                        let cb = c.u.sample(cx, cy, self.bpc) - center;
                        let cr = c.v.sample(cx, cy, self.bpc) - center;
                        [
                            ((luma + 1.402 * cr) * scale).clamp(0.0, 255.0),
                            ((luma - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                            ((luma + 1.772 * cb) * scale).clamp(0.0, 255.0),
                        ]
                    }
                };
                rgb.extend(pixel.map(|c| c as u8));
            }
        }
        rgb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        }))
    }

    #[test]
    fn supported_extensions_cover_avif() {
        for ext in ["jpg", "png", "webp", "avif"] {
            assert!(supported_input_extensions().contains(&ext));
            assert!(mime_for_extension(ext).is_some());
        }
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("txt"), None);
    }

    #[test]
    fn png_roundtrip_is_lossless() {
        let codec = RustCodec::new();
        let img = gradient(32, 16);
        let encoded = codec
            .encode(&img, OutputFormat::Png, Quality::default())
            .unwrap();
        assert_eq!(encoded.format, OutputFormat::Png);
        assert_eq!((encoded.width, encoded.height), (32, 16));

        let decoded = codec.decode(&encoded.bytes).unwrap();
        assert_eq!(decoded.to_rgba8(), img.to_rgba8());
    }

    #[test]
    fn jpeg_quality_changes_size() {
        let codec = RustCodec::new();
        let img = gradient(128, 128);
        let high = codec
            .encode(&img, OutputFormat::Jpeg, Quality::new(1.0))
            .unwrap();
        let low = codec
            .encode(&img, OutputFormat::Jpeg, Quality::new(0.1))
            .unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn webp_encodes_decodable_output() {
        let codec = RustCodec::new();
        let encoded = codec
            .encode(&gradient(20, 10), OutputFormat::Webp, Quality::default())
            .unwrap();
        let decoded = codec.decode(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[test]
    fn avif_encode_then_decode_keeps_dimensions() {
        let codec = RustCodec::new();
        let encoded = codec
            .encode(&gradient(64, 48), OutputFormat::Avif, Quality::new(0.85))
            .unwrap();
        assert!(is_avif(&encoded.bytes));

        let decoded = codec.decode(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn decode_empty_is_decode_error() {
        assert!(matches!(
            RustCodec::new().decode(&[]),
            Err(EditError::Decode(_))
        ));
    }

    #[test]
    fn decode_garbage_is_unsupported() {
        assert!(matches!(
            RustCodec::new().decode(b"definitely not pixels"),
            Err(EditError::UnsupportedFormat(_))
        ));
    }
}
