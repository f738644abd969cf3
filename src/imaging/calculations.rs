//! Pure calculation functions for edit geometry and size estimates.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{CropRect, DisplayedSize};

/// A crop region in natural pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Per-axis factor converting displayed coordinates into natural pixels.
///
/// # Returns
/// * `(scale_x, scale_y)`: `natural / displayed` on each axis; `1.0` when the
///   displayed size is degenerate
pub fn display_scale(natural: (u32, u32), displayed: DisplayedSize) -> (f64, f64) {
    let axis = |n: u32, d: f64| if d > 0.0 { n as f64 / d } else { 1.0 };
    (
        axis(natural.0, displayed.width),
        axis(natural.1, displayed.height),
    )
}

/// Map an on-screen point onto the natural pixel grid.
pub fn to_natural_point(
    point: (f64, f64),
    natural: (u32, u32),
    displayed: DisplayedSize,
) -> (f64, f64) {
    let (sx, sy) = display_scale(natural, displayed);
    (point.0 * sx, point.1 * sy)
}

/// Convert an on-screen crop rectangle into a natural-pixel region.
///
/// The rectangle is scaled per axis, rounded, then clamped to the source
/// bounds. Returns `None` when nothing of the rectangle overlaps the source.
///
/// # Examples
/// ```
/// # use image_craft::imaging::{calculations::scale_crop_rect, CropRect, DisplayedSize};
/// // 400x400 source shown at 200x200, crop the top-left quarter
/// let rect = CropRect { x: 0.0, y: 0.0, width: 100.0, height: 100.0 };
/// let px = scale_crop_rect(rect, (400, 400), DisplayedSize::new(200.0, 200.0)).unwrap();
/// assert_eq!((px.x, px.y, px.width, px.height), (0, 0, 200, 200));
/// ```
pub fn scale_crop_rect(
    rect: CropRect,
    natural: (u32, u32),
    displayed: DisplayedSize,
) -> Option<PixelRect> {
    let (sx, sy) = display_scale(natural, displayed);
    let (nat_w, nat_h) = (natural.0 as f64, natural.1 as f64);

    let left = (rect.x * sx).round().clamp(0.0, nat_w);
    let top = (rect.y * sy).round().clamp(0.0, nat_h);
    let right = ((rect.x + rect.width) * sx).round().clamp(0.0, nat_w);
    let bottom = ((rect.y + rect.height) * sy).round().clamp(0.0, nat_h);

    if right <= left || bottom <= top {
        return None;
    }

    Some(PixelRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

/// Largest dimensions inside `max` that keep the source aspect ratio.
///
/// A zero bound means "unbounded" on that axis. Never upscales: the uniform
/// scale is `min(max_w / src_w, max_h / src_h, 1)`.
///
/// # Examples
/// ```
/// # use image_craft::imaging::calculations::calculate_optimal_dimensions;
/// assert_eq!(calculate_optimal_dimensions((4000, 3000), (1920, 1080)), (1440, 1080));
/// assert_eq!(calculate_optimal_dimensions((800, 600), (1920, 1080)), (800, 600));
/// assert_eq!(calculate_optimal_dimensions((800, 600), (0, 0)), (800, 600));
/// ```
pub fn calculate_optimal_dimensions(source: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = max;

    if (max_w == 0 && max_h == 0) || src_w == 0 || src_h == 0 {
        return source;
    }

    let scale_x = if max_w > 0 {
        max_w as f64 / src_w as f64
    } else {
        1.0
    };
    let scale_y = if max_h > 0 {
        max_h as f64 / src_h as f64
    } else {
        1.0
    };
    let scale = scale_x.min(scale_y).min(1.0);

    (
        ((src_w as f64 * scale).round() as u32).max(1),
        ((src_h as f64 * scale).round() as u32).max(1),
    )
}

/// Independent per-axis bounds, used when aspect ratio is not maintained.
///
/// Each axis is capped at its bound (0 = unbounded) and never upscaled.
pub fn calculate_bounded_dimensions(source: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let axis = |src: u32, bound: u32| if bound > 0 { src.min(bound) } else { src };
    (axis(source.0, max.0).max(1), axis(source.1, max.1).max(1))
}

/// Shrink both dimensions by `ratio`, rounding and keeping at least 1px.
pub fn shrink_dimensions(dims: (u32, u32), ratio: f32) -> (u32, u32) {
    let scale = |v: u32| ((v as f64 * ratio as f64).round() as u32).max(1);
    (scale(dims.0), scale(dims.1))
}

/// Advisory size of an image at its current dimensions.
pub fn estimate_file_size(dims: (u32, u32), bytes_per_pixel: f64) -> u64 {
    (dims.0 as f64 * dims.1 as f64 * bytes_per_pixel).round() as u64
}

/// Advisory size of an encode at `dims` and `quality`.
///
/// Quality below 0.1 is treated as 0.1.
pub fn estimate_compressed_size(dims: (u32, u32), quality: f32, bytes_per_pixel: f64) -> u64 {
    let factor = (quality as f64).max(0.1);
    (dims.0 as f64 * dims.1 as f64 * bytes_per_pixel * factor).round() as u64
}

/// Dimensions the size heuristic predicts will land on `budget` bytes.
///
/// Keeps the source aspect ratio and never exceeds the source on either axis.
pub fn dimensions_for_file_size(
    source: (u32, u32),
    budget: u64,
    quality: f32,
    bytes_per_pixel: f64,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return source;
    }
    let aspect = src_w as f64 / src_h as f64;
    let per_pixel = bytes_per_pixel * (quality as f64).max(0.1);
    let target_pixels = budget as f64 / per_pixel;
    let width = (target_pixels * aspect).sqrt();
    let height = if width > 0.0 {
        target_pixels / width
    } else {
        0.0
    };
    (
        (width.round() as u32).clamp(1, src_w),
        (height.round() as u32).clamp(1, src_h),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // display_scale / to_natural_point
    // =========================================================================

    #[test]
    fn scale_is_natural_over_displayed() {
        let (sx, sy) = display_scale((400, 300), DisplayedSize::new(200.0, 100.0));
        assert_eq!((sx, sy), (2.0, 3.0));
    }

    #[test]
    fn scale_with_degenerate_display_is_identity() {
        assert_eq!(
            display_scale((400, 300), DisplayedSize::new(0.0, 0.0)),
            (1.0, 1.0)
        );
    }

    #[test]
    fn natural_point_scales_each_axis() {
        let p = to_natural_point((50.0, 10.0), (400, 300), DisplayedSize::new(200.0, 100.0));
        assert_eq!(p, (100.0, 30.0));
    }

    // =========================================================================
    // scale_crop_rect
    // =========================================================================

    #[test]
    fn crop_top_left_quarter_at_double_scale() {
        let rect = CropRect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let px = scale_crop_rect(rect, (400, 400), DisplayedSize::new(200.0, 200.0)).unwrap();
        assert_eq!(
            px,
            PixelRect {
                x: 0,
                y: 0,
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn crop_rounds_scaled_edges() {
        // 3x scale: 10.4 * 3 = 31.2 → 31, (10.4 + 20.3) * 3 = 92.1 → 92
        let rect = CropRect {
            x: 10.4,
            y: 0.0,
            width: 20.3,
            height: 10.0,
        };
        let px = scale_crop_rect(rect, (300, 300), DisplayedSize::new(100.0, 100.0)).unwrap();
        assert_eq!((px.x, px.width), (31, 61));
    }

    #[test]
    fn crop_partially_outside_is_clamped() {
        let rect = CropRect {
            x: 150.0,
            y: -20.0,
            width: 100.0,
            height: 100.0,
        };
        let px = scale_crop_rect(rect, (200, 200), DisplayedSize::natural(200, 200)).unwrap();
        assert_eq!(
            px,
            PixelRect {
                x: 150,
                y: 0,
                width: 50,
                height: 80
            }
        );
    }

    #[test]
    fn crop_fully_outside_is_none() {
        let rect = CropRect {
            x: 300.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
        };
        assert!(scale_crop_rect(rect, (200, 200), DisplayedSize::natural(200, 200)).is_none());
    }

    #[test]
    fn crop_zero_width_is_none() {
        let rect = CropRect {
            x: 10.0,
            y: 10.0,
            width: 0.0,
            height: 50.0,
        };
        assert!(scale_crop_rect(rect, (200, 200), DisplayedSize::natural(200, 200)).is_none());
    }

    // =========================================================================
    // calculate_optimal_dimensions / calculate_bounded_dimensions
    // =========================================================================

    #[test]
    fn optimal_fits_landscape_into_box() {
        // 4000x3000 into 1920x1080: height binds, scale = 0.36
        assert_eq!(
            calculate_optimal_dimensions((4000, 3000), (1920, 1080)),
            (1440, 1080)
        );
    }

    #[test]
    fn optimal_never_upscales() {
        assert_eq!(
            calculate_optimal_dimensions((640, 480), (1920, 1080)),
            (640, 480)
        );
    }

    #[test]
    fn optimal_single_bound() {
        assert_eq!(calculate_optimal_dimensions((1000, 500), (500, 0)), (500, 250));
        assert_eq!(calculate_optimal_dimensions((1000, 500), (0, 100)), (200, 100));
    }

    #[test]
    fn bounded_caps_each_axis_independently() {
        assert_eq!(
            calculate_bounded_dimensions((1000, 500), (400, 400)),
            (400, 400)
        );
        assert_eq!(calculate_bounded_dimensions((300, 500), (400, 0)), (300, 500));
    }

    // =========================================================================
    // shrink / estimates
    // =========================================================================

    #[test]
    fn shrink_by_ratio() {
        assert_eq!(shrink_dimensions((1000, 800), 0.9), (900, 720));
        assert_eq!(shrink_dimensions((1, 1), 0.5), (1, 1));
    }

    #[test]
    fn estimates_use_bytes_per_pixel() {
        assert_eq!(estimate_file_size((400, 1000), 1.2), 480_000);
        assert_eq!(estimate_compressed_size((400, 1000), 0.5, 1.2), 240_000);
        // Quality below the floor counts as 0.1
        assert_eq!(estimate_compressed_size((100, 100), 0.0, 1.2), 1_200);
    }

    #[test]
    fn dimensions_for_budget_keep_aspect() {
        // 1.2 * 0.5 = 0.6 bytes/px → 60_000 px → 300x200 at 3:2
        let (w, h) = dimensions_for_file_size((3000, 2000), 36_000, 0.5, 1.2);
        assert_eq!((w, h), (300, 200));
    }

    #[test]
    fn dimensions_for_budget_never_exceed_source() {
        let dims = dimensions_for_file_size((100, 100), 10_000_000, 1.0, 1.2);
        assert_eq!(dims, (100, 100));
    }
}
