//! Eyewear overlay compositor.
//!
//! Draws the selected asset over the captured still, anchored at the
//! midpoint of the two eye centers. With a trusted calibration the
//! overlay is sized from the asset's physical width; without one it is
//! sized from the inter-eye pixel spread. The branch is gated on the
//! calibration confidence tier, never on whether a numeric scale
//! happens to be present.

use image::{Rgba, RgbaImage};
use shared::calibration::CalibrationResult;
use shared::catalog::FrameAsset;
use shared::landmarks::LandmarkSet;
use thiserror::Error;

use crate::session::FrameAdjustment;

/// Heuristic overlay width as a multiple of the inter-eye spread.
const HEURISTIC_EYE_SPAN_FACTOR: f64 = 3.0;

/// Errors produced by the overlay compositor.
#[derive(Error, Debug)]
pub enum OverlayError {
    /// The asset image has a zero dimension and cannot be sampled.
    #[error("asset image {0} has zero dimensions")]
    EmptyAsset(String),

    /// The computed overlay width is not usable.
    #[error("degenerate overlay width: {0:.2} px")]
    DegenerateWidth(f64),
}

/// Overlay width in pixels for the given inputs.
///
/// High/Medium confidence sizes from the asset's physical width; Low
/// confidence sizes from the inter-eye spread.
pub fn target_width_px(
    landmarks: &LandmarkSet,
    image_width: usize,
    image_height: usize,
    asset: &FrameAsset,
    adjustment: &FrameAdjustment,
    calibration: &CalibrationResult,
) -> f64 {
    let size_factor = adjustment.size_percent as f64 / 100.0;
    match calibration.trusted_scale() {
        Some(ppmm) => asset.width_mm * size_factor * ppmm,
        None => {
            let (left, right) = landmarks.eye_centers_px(image_width, image_height);
            (right.x - left.x).abs() * HEURISTIC_EYE_SPAN_FACTOR * size_factor
        }
    }
}

/// Compose the eyewear overlay onto the captured still.
///
/// The asset is scaled to the target width (native aspect ratio
/// preserved), shifted by the vertical offset, rotated about the
/// shifted anchor, and alpha-blended over the photo. The input photo
/// is not modified.
pub fn render_overlay(
    photo: &RgbaImage,
    landmarks: &LandmarkSet,
    asset: &FrameAsset,
    adjustment: &FrameAdjustment,
    calibration: &CalibrationResult,
) -> Result<RgbaImage, OverlayError> {
    if asset.image.width() == 0 || asset.image.height() == 0 {
        return Err(OverlayError::EmptyAsset(asset.id.clone()));
    }

    let (img_w, img_h) = (photo.width() as usize, photo.height() as usize);
    let width_px = target_width_px(landmarks, img_w, img_h, asset, adjustment, calibration);
    if !width_px.is_finite() || width_px <= 0.0 {
        return Err(OverlayError::DegenerateWidth(width_px));
    }
    let height_px = width_px * asset.aspect_ratio();

    let (left, right) = landmarks.eye_centers_px(img_w, img_h);
    let anchor_x = (left.x + right.x) / 2.0;
    let anchor_y = (left.y + right.y) / 2.0 + adjustment.vertical_offset_px as f64;

    log::debug!(
        "overlay {}: {width_px:.1}x{height_px:.1} px at ({anchor_x:.1}, {anchor_y:.1}), {} deg",
        asset.id,
        adjustment.rotation_degrees
    );

    let theta = adjustment.rotation_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (half_w, half_h) = (width_px / 2.0, height_px / 2.0);

    // Axis-aligned bounds of the rotated overlay rectangle.
    let extent_x = (half_w * cos).abs() + (half_h * sin).abs();
    let extent_y = (half_w * sin).abs() + (half_h * cos).abs();
    let x_min = ((anchor_x - extent_x).floor().max(0.0)) as u32;
    let y_min = ((anchor_y - extent_y).floor().max(0.0)) as u32;
    let x_max = ((anchor_x + extent_x).ceil() as i64).clamp(0, photo.width() as i64) as u32;
    let y_max = ((anchor_y + extent_y).ceil() as i64).clamp(0, photo.height() as i64) as u32;

    let mut out = photo.clone();
    for y in y_min..y_max {
        for x in x_min..x_max {
            let dx = x as f64 + 0.5 - anchor_x;
            let dy = y as f64 + 0.5 - anchor_y;

            // Rotate back into the overlay's unrotated space.
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            if u.abs() > half_w || v.abs() > half_h {
                continue;
            }

            // Map into asset pixel coordinates.
            let sx = (u + half_w) / width_px * asset.image.width() as f64;
            let sy = (v + half_h) / height_px * asset.image.height() as f64;

            let src = sample_bilinear(&asset.image, sx, sy);
            if src[3] <= 0.0 {
                continue;
            }
            let dst = out.get_pixel(x, y).0;
            out.put_pixel(x, y, Rgba(blend_over(src, dst)));
        }
    }

    Ok(out)
}

/// Bilinear sample at fractional pixel coordinates, clamped to the
/// image edges. Returns RGBA channels as `f64`.
fn sample_bilinear(img: &RgbaImage, x: f64, y: f64) -> [f64; 4] {
    let max_x = (img.width() - 1) as f64;
    let max_y = (img.height() - 1) as f64;
    let x = (x - 0.5).clamp(0.0, max_x);
    let y = (y - 0.5).clamp(0.0, max_y);

    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let x1 = (x0 + 1.0).min(max_x);
    let y1 = (y0 + 1.0).min(max_y);

    let p = |px: f64, py: f64| img.get_pixel(px as u32, py as u32).0;
    let (p00, p10, p01, p11) = (p(x0, y0), p(x1, y0), p(x0, y1), p(x1, y1));

    let mut result = [0.0; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        result[c] = top * (1.0 - fy) + bottom * fy;
    }
    result
}

/// Source-over alpha blend of one sampled pixel onto a destination.
fn blend_over(src: [f64; 4], dst: [u8; 4]) -> [u8; 4] {
    let alpha = src[3] / 255.0;
    let mut out = [0u8; 4];
    for c in 0..3 {
        let blended = src[c] * alpha + dst[c] as f64 * (1.0 - alpha);
        out[c] = blended.round().clamp(0.0, 255.0) as u8;
    }
    let dst_alpha = dst[3] as f64 / 255.0;
    out[3] = ((alpha + dst_alpha * (1.0 - alpha)) * 255.0).round() as u8;
    out
}
