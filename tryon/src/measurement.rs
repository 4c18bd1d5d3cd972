//! Facial measurement engine.
//!
//! Derives optician-style measurements from the captured still's
//! landmark set. All distances are horizontal or vertical pixel spans
//! converted through the resolved pixel-to-millimeter scale; when no
//! trusted scale is available the scale is estimated from an assumed
//! average face width. The full set is recomputed wholesale whenever
//! the capture, the selected asset, the adjustment, or the calibration
//! changes.

use serde::{Deserialize, Serialize};
use shared::calibration::{CalibrationResult, Confidence, AVERAGE_FACE_WIDTH_MM};
use shared::catalog::FrameAsset;
use shared::frame::RgbaFrame;
use shared::landmarks::{
    LandmarkError, LandmarkSet, CHIN_BOTTOM, FOREHEAD_TOP, LEFT_CHEEK, NOSE_TIP, RIGHT_CHEEK,
};
use std::fmt;

use crate::session::FrameAdjustment;

/// Facial landmark detection seam.
///
/// Backed by an external face-mesh model in production and by mocks in
/// tests. A frame with no detectable face is `Ok(None)`, not an error.
pub trait LandmarkSource {
    /// Detect the landmark topology in one frame.
    fn detect(&mut self, frame: &RgbaFrame) -> Result<Option<LandmarkSet>, LandmarkError>;
}

/// Face shape class derived from the width:height ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceShape {
    Square,
    Round,
    Oval,
    LongOblong,
    HeartDiamond,
}

impl fmt::Display for FaceShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FaceShape::Square => "Square",
            FaceShape::Round => "Round",
            FaceShape::Oval => "Oval",
            FaceShape::LongOblong => "Long/Oblong",
            FaceShape::HeartDiamond => "Heart/Diamond",
        };
        write!(f, "{name}")
    }
}

/// Classify a face by its width-over-height ratio.
pub fn classify_face_shape(ratio: f64) -> FaceShape {
    if (0.95..=1.05).contains(&ratio) {
        FaceShape::Square
    } else if (0.85..0.95).contains(&ratio) {
        FaceShape::Round
    } else if (0.75..0.85).contains(&ratio) {
        FaceShape::Oval
    } else if ratio < 0.75 {
        FaceShape::LongOblong
    } else {
        FaceShape::HeartDiamond
    }
}

/// The full measurement set for one capture, all distances in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    /// Pupillary distance, eye center to eye center.
    pub pd_total_mm: f64,
    /// Left monocular PD, about the binocular midpoint.
    pub pd_left_mm: f64,
    /// Right monocular PD, about the binocular midpoint.
    pub pd_right_mm: f64,
    /// Nose tip to left eye center, horizontal.
    pub nose_offset_left_mm: f64,
    /// Nose tip to right eye center, horizontal.
    pub nose_offset_right_mm: f64,
    /// Sum of the two nose offsets.
    pub nose_offset_total_mm: f64,
    /// Eye center to lens bottom of the selected frame, adjusted.
    pub fitting_height_mm: f64,
    /// Cheek-to-cheek face width.
    pub face_width_mm: f64,
    /// Forehead-to-chin face height.
    pub face_height_mm: f64,
    /// Face width over height.
    pub face_ratio: f64,
    /// The scale the set was computed with.
    pub pixels_per_mm: f64,
    /// Trust tier of that scale.
    pub confidence: Confidence,
    /// Shape class derived from the ratio.
    pub face_shape: FaceShape,
}

/// Compute the measurement set for one capture.
///
/// Pure function of its inputs; callers rerun it wholesale after any
/// change rather than patching individual fields.
pub fn compute_measurements(
    landmarks: &LandmarkSet,
    image_width: usize,
    image_height: usize,
    calibration: &CalibrationResult,
    asset: &FrameAsset,
    adjustment: &FrameAdjustment,
) -> MeasurementSet {
    let (left_eye, right_eye) = landmarks.eye_centers_px(image_width, image_height);
    let nose = landmarks.point(NOSE_TIP).to_pixels(image_width, image_height);
    let left_cheek = landmarks.point(LEFT_CHEEK).to_pixels(image_width, image_height);
    let right_cheek = landmarks
        .point(RIGHT_CHEEK)
        .to_pixels(image_width, image_height);
    let forehead = landmarks
        .point(FOREHEAD_TOP)
        .to_pixels(image_width, image_height);
    let chin = landmarks
        .point(CHIN_BOTTOM)
        .to_pixels(image_width, image_height);

    let pd_total_px = (right_eye.x - left_eye.x).abs();
    let midpoint_x = (left_eye.x + right_eye.x) / 2.0;
    let pd_left_px = (midpoint_x - left_eye.x).abs();
    let pd_right_px = (right_eye.x - midpoint_x).abs();

    let nose_left_px = (nose.x - left_eye.x).abs();
    let nose_right_px = (right_eye.x - nose.x).abs();

    let face_width_px = (right_cheek.x - left_cheek.x).abs();
    let face_height_px = (chin.y - forehead.y).abs();

    let pixels_per_mm = calibration
        .pixels_per_mm
        .unwrap_or(face_width_px / AVERAGE_FACE_WIDTH_MM);

    // Lens bottom sits half the scaled frame height below the eye
    // line, shifted by the user's vertical offset.
    let frame_height_px =
        asset.height_mm * (adjustment.size_percent as f64 / 100.0) * pixels_per_mm;
    let fitting_height_px =
        (frame_height_px / 2.0 + adjustment.vertical_offset_px as f64).abs();

    let face_ratio = if face_height_px > 0.0 {
        face_width_px / face_height_px
    } else {
        0.0
    };

    let to_mm = |px: f64| px / pixels_per_mm;

    MeasurementSet {
        pd_total_mm: to_mm(pd_total_px),
        pd_left_mm: to_mm(pd_left_px),
        pd_right_mm: to_mm(pd_right_px),
        nose_offset_left_mm: to_mm(nose_left_px),
        nose_offset_right_mm: to_mm(nose_right_px),
        nose_offset_total_mm: to_mm(nose_left_px + nose_right_px),
        fitting_height_mm: to_mm(fitting_height_px),
        face_width_mm: to_mm(face_width_px),
        face_height_mm: to_mm(face_height_px),
        face_ratio,
        pixels_per_mm,
        confidence: calibration.confidence,
        face_shape: classify_face_shape(face_ratio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::RgbaImage;
    use shared::calibration::ScaleSource;
    use shared::landmarks::{
        NormalizedPoint, LEFT_EYE_BOTTOM, LEFT_EYE_INNER, LEFT_EYE_OUTER, LEFT_EYE_TOP,
        RIGHT_EYE_BOTTOM, RIGHT_EYE_INNER, RIGHT_EYE_OUTER, RIGHT_EYE_TOP, TOPOLOGY_LEN,
    };

    /// Face on a 1000x1000 image: eye centers at x 0.4/0.6, nose at
    /// 0.52, cheeks at 0.2/0.8, forehead y 0.2, chin y 0.95.
    fn test_landmarks() -> LandmarkSet {
        let mut points = vec![NormalizedPoint::new(0.5, 0.5); TOPOLOGY_LEN];
        for idx in [LEFT_EYE_OUTER, LEFT_EYE_INNER, LEFT_EYE_TOP, LEFT_EYE_BOTTOM] {
            points[idx] = NormalizedPoint::new(0.4, 0.45);
        }
        for idx in [
            RIGHT_EYE_OUTER,
            RIGHT_EYE_INNER,
            RIGHT_EYE_TOP,
            RIGHT_EYE_BOTTOM,
        ] {
            points[idx] = NormalizedPoint::new(0.6, 0.45);
        }
        points[NOSE_TIP] = NormalizedPoint::new(0.52, 0.6);
        points[LEFT_CHEEK] = NormalizedPoint::new(0.2, 0.55);
        points[RIGHT_CHEEK] = NormalizedPoint::new(0.8, 0.55);
        points[FOREHEAD_TOP] = NormalizedPoint::new(0.5, 0.2);
        points[CHIN_BOTTOM] = NormalizedPoint::new(0.5, 0.95);
        LandmarkSet::new(points).unwrap()
    }

    fn test_asset() -> FrameAsset {
        FrameAsset::from_image("f1", "Frame 1", RgbaImage::new(100, 40), 124.0, 40.0)
    }

    fn calibrated(ppmm: f64) -> CalibrationResult {
        CalibrationResult {
            pixels_per_mm: Some(ppmm),
            confidence: Confidence::High,
            source: ScaleSource::Stored,
        }
    }

    fn uncalibrated() -> CalibrationResult {
        CalibrationResult {
            pixels_per_mm: None,
            confidence: Confidence::Low,
            source: ScaleSource::Heuristic,
        }
    }

    #[test]
    fn test_calibrated_measurements() {
        let m = compute_measurements(
            &test_landmarks(),
            1000,
            1000,
            &calibrated(5.0),
            &test_asset(),
            &FrameAdjustment::default(),
        );

        // 200 px inter-eye spread at 5 px/mm.
        assert_relative_eq!(m.pd_total_mm, 40.0, epsilon = 1e-9);
        assert_relative_eq!(m.pd_left_mm, 20.0, epsilon = 1e-9);
        assert_relative_eq!(m.pd_right_mm, 20.0, epsilon = 1e-9);

        // Nose at x=520: 120 px to the left eye, 80 px to the right.
        assert_relative_eq!(m.nose_offset_left_mm, 24.0, epsilon = 1e-9);
        assert_relative_eq!(m.nose_offset_right_mm, 16.0, epsilon = 1e-9);
        assert_relative_eq!(m.nose_offset_total_mm, 40.0, epsilon = 1e-9);

        // Cheeks 600 px apart, forehead to chin 750 px.
        assert_relative_eq!(m.face_width_mm, 120.0, epsilon = 1e-9);
        assert_relative_eq!(m.face_height_mm, 150.0, epsilon = 1e-9);
        assert_relative_eq!(m.face_ratio, 0.8, epsilon = 1e-9);
        assert_eq!(m.face_shape, FaceShape::Oval);

        assert_eq!(m.confidence, Confidence::High);
        assert_relative_eq!(m.pixels_per_mm, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uncalibrated_falls_back_to_face_width_scale() {
        let m = compute_measurements(
            &test_landmarks(),
            1000,
            1000,
            &uncalibrated(),
            &test_asset(),
            &FrameAdjustment::default(),
        );

        // 600 px face width assumed to span 140 mm.
        assert_relative_eq!(m.pixels_per_mm, 600.0 / 140.0, epsilon = 1e-9);
        assert_relative_eq!(m.face_width_mm, 140.0, epsilon = 1e-9);
        assert_eq!(m.confidence, Confidence::Low);
    }

    #[test]
    fn test_fitting_height_follows_adjustment() {
        // Frame height 40 mm at 5 px/mm and 100% size: 200 px, half is
        // 100 px below the eye line.
        let base = compute_measurements(
            &test_landmarks(),
            1000,
            1000,
            &calibrated(5.0),
            &test_asset(),
            &FrameAdjustment::default(),
        );
        assert_relative_eq!(base.fitting_height_mm, 20.0, epsilon = 1e-9);

        let shifted = compute_measurements(
            &test_landmarks(),
            1000,
            1000,
            &calibrated(5.0),
            &test_asset(),
            &FrameAdjustment {
                vertical_offset_px: 10,
                ..Default::default()
            },
        );
        assert_relative_eq!(shifted.fitting_height_mm, 22.0, epsilon = 1e-9);

        let resized = compute_measurements(
            &test_landmarks(),
            1000,
            1000,
            &calibrated(5.0),
            &test_asset(),
            &FrameAdjustment {
                size_percent: 150,
                ..Default::default()
            },
        );
        assert_relative_eq!(resized.fitting_height_mm, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_face_shape_boundaries() {
        assert_eq!(classify_face_shape(1.0), FaceShape::Square);
        assert_eq!(classify_face_shape(0.95), FaceShape::Square);
        assert_eq!(classify_face_shape(0.90), FaceShape::Round);
        assert_eq!(classify_face_shape(0.85), FaceShape::Round);
        assert_eq!(classify_face_shape(0.80), FaceShape::Oval);
        assert_eq!(classify_face_shape(0.75), FaceShape::Oval);
        assert_eq!(classify_face_shape(0.70), FaceShape::LongOblong);
        assert_eq!(classify_face_shape(1.20), FaceShape::HeartDiamond);
    }

    #[test]
    fn test_face_shape_display() {
        assert_eq!(FaceShape::LongOblong.to_string(), "Long/Oblong");
        assert_eq!(FaceShape::HeartDiamond.to_string(), "Heart/Diamond");
    }
}
