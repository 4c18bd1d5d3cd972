//! Per-frame alignment quality analysis.
//!
//! Evaluates one raw frame for brightness, centering, and motion, and
//! optionally estimates the subject distance from the inter-eye pixel
//! distance when landmarks are available. The analyzer keeps a rolling
//! window of exactly one previous frame for motion comparison plus an
//! exponentially smoothed motion level; everything else is recomputed
//! per call.

use crate::frame::RgbaFrame;
use crate::landmarks::LandmarkSet;
use ndarray::Array3;

/// Widest the elliptical sampling region may get, in pixels.
const ROI_MAX_WIDTH_PX: f64 = 300.0;
/// Tallest the elliptical sampling region may get, in pixels.
const ROI_MAX_HEIGHT_PX: f64 = 350.0;
/// Ellipse width as a fraction of frame width.
const ROI_WIDTH_FRACTION: f64 = 0.45;
/// Ellipse height as a fraction of frame height.
const ROI_HEIGHT_FRACTION: f64 = 0.6;
/// Sample every Nth pixel row/column inside the ellipse.
const SAMPLE_STRIDE: usize = 5;

/// Carry-over weight of the previous smoothed motion level.
const MOTION_EMA_CARRY: f64 = 0.8;
/// Smoothed motion level above which the frame is rejected.
const MAX_MOTION_ALLOWED: f64 = 20.0;

/// Mean sampled brightness below which the frame is too dark.
const MIN_MEAN_BRIGHTNESS: f64 = 50.0;
/// Mean sampled brightness above which the frame is too bright.
const MAX_MEAN_BRIGHTNESS: f64 = 240.0;
/// Center-weighted brightness below which the face is off-center.
const MIN_CENTER_WEIGHT: f64 = 40.0;

/// Population-average pupillary distance in millimeters.
const AVERAGE_PD_MM: f64 = 63.0;
/// Nominal capture distance in centimeters.
const TARGET_DISTANCE_CM: f64 = 45.0;
/// Accepted distance window, exclusive bounds, in centimeters.
const DISTANCE_MIN_CM: f64 = 43.0;
const DISTANCE_MAX_CM: f64 = 47.0;

/// Pass/fail judgment on a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentVerdict {
    /// Frame passed brightness, centering, and motion checks.
    pub is_aligned: bool,
    /// Smoothed motion level exceeded the allowed maximum.
    pub has_motion: bool,
    /// Estimated subject distance fell inside the accepted window.
    pub distance_ok: bool,
    /// Estimated subject distance; `None` without landmarks.
    pub distance_cm: Option<f64>,
    /// Human-readable status mirroring the active condition.
    pub message: String,
}

impl AlignmentVerdict {
    fn rejected(has_motion: bool, message: &str) -> Self {
        Self {
            is_aligned: false,
            has_motion,
            distance_ok: false,
            distance_cm: None,
            message: message.to_string(),
        }
    }
}

/// Per-frame alignment analyzer.
///
/// Holds the one-frame motion window; the previous frame is replaced
/// on every call regardless of the verdict.
#[derive(Debug, Default)]
pub struct FrameAnalyzer {
    previous: Option<Array3<u8>>,
    motion_smoothed: Option<f64>,
}

impl FrameAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the motion window, e.g. when the camera restarts.
    pub fn reset(&mut self) {
        self.previous = None;
        self.motion_smoothed = None;
    }

    /// Evaluate one frame.
    ///
    /// `pixels_per_mm` is the currently trusted scale, if any; it only
    /// affects the distance estimate, never the alignment checks.
    pub fn analyze(
        &mut self,
        frame: &RgbaFrame,
        pixels_per_mm: Option<f64>,
        landmarks: Option<&LandmarkSet>,
    ) -> AlignmentVerdict {
        let motion_level = self.update_motion(frame);

        let Some(roi) = RoiSample::collect(frame) else {
            return AlignmentVerdict::rejected(false, "No face detected");
        };

        // Rejection priority: motion, then brightness, then centering.
        if motion_level > MAX_MOTION_ALLOWED {
            return AlignmentVerdict::rejected(true, "Too much movement - stay still");
        }
        if roi.mean_brightness < MIN_MEAN_BRIGHTNESS {
            return AlignmentVerdict::rejected(false, "Too dark");
        }
        if roi.mean_brightness > MAX_MEAN_BRIGHTNESS {
            return AlignmentVerdict::rejected(false, "Too bright");
        }
        if roi.center_weight < MIN_CENTER_WEIGHT {
            return AlignmentVerdict::rejected(false, "Center your face");
        }

        let distance_cm = landmarks.and_then(|lm| {
            estimate_distance_cm(lm, frame.width(), frame.height(), pixels_per_mm)
        });
        let distance_ok = distance_cm
            .map(|cm| cm > DISTANCE_MIN_CM && cm < DISTANCE_MAX_CM)
            .unwrap_or(false);

        let message = match distance_cm {
            Some(cm) if distance_ok => format!("Perfect distance ({cm:.1} cm)"),
            Some(cm) => format!("Distance: {cm:.1} cm - adjust"),
            None => "Perfect alignment".to_string(),
        };

        AlignmentVerdict {
            is_aligned: true,
            has_motion: false,
            distance_ok,
            distance_cm,
            message,
        }
    }

    /// Update the smoothed whole-frame motion level and store the
    /// current frame as the new comparison window.
    fn update_motion(&mut self, frame: &RgbaFrame) -> f64 {
        let data = frame.data();
        let level = match &self.previous {
            Some(prev) if prev.dim() == data.dim() => {
                let mut diff_sum: u64 = 0;
                for (a, b) in data.iter().zip(prev.iter()) {
                    diff_sum += a.abs_diff(*b) as u64;
                }
                // Alpha channel is constant in camera frames; normalize
                // over the three color channels only.
                let total_channels = (frame.width() * frame.height() * 3) as f64;
                let raw = diff_sum as f64 / total_channels;

                let smoothed = match self.motion_smoothed {
                    Some(prev_smoothed) => {
                        prev_smoothed * MOTION_EMA_CARRY + raw * (1.0 - MOTION_EMA_CARRY)
                    }
                    None => raw,
                };
                self.motion_smoothed = Some(smoothed);
                smoothed
            }
            Some(_) => {
                log::debug!("frame dimensions changed, restarting motion window");
                self.motion_smoothed = None;
                0.0
            }
            None => 0.0,
        };

        self.previous = Some(data.to_owned());
        level
    }
}

struct RoiSample {
    mean_brightness: f64,
    center_weight: f64,
}

impl RoiSample {
    /// Sample brightness over the elliptical region of interest.
    ///
    /// Returns `None` when the ellipse is degenerate and no pixels
    /// could be sampled.
    fn collect(frame: &RgbaFrame) -> Option<Self> {
        let width = frame.width();
        let height = frame.height();
        let center_x = width as f64 / 2.0;
        let center_y = height as f64 / 2.0;
        let rx = ROI_MAX_WIDTH_PX.min(width as f64 * ROI_WIDTH_FRACTION) / 2.0;
        let ry = ROI_MAX_HEIGHT_PX.min(height as f64 * ROI_HEIGHT_FRACTION) / 2.0;

        let y_start = (center_y - ry).max(0.0) as usize;
        let y_end = ((center_y + ry).ceil() as usize).min(height);
        let x_start = (center_x - rx).max(0.0) as usize;
        let x_end = ((center_x + rx).ceil() as usize).min(width);

        let mut brightness_sum = 0.0;
        let mut center_weight_sum = 0.0;
        let mut sampled = 0usize;

        for y in (y_start..y_end).step_by(SAMPLE_STRIDE) {
            for x in (x_start..x_end).step_by(SAMPLE_STRIDE) {
                let dx = (x as f64 - center_x) / rx;
                let dy = (y as f64 - center_y) / ry;
                if dx * dx + dy * dy > 1.0 {
                    continue;
                }

                let [r, g, b, _] = frame.pixel(x, y);
                let brightness = (r as f64 + g as f64 + b as f64) / 3.0;
                brightness_sum += brightness;

                let dist_from_center = (dx * dx + dy * dy).sqrt();
                center_weight_sum += (1.0 - dist_from_center) * brightness;
                sampled += 1;
            }
        }

        if sampled == 0 {
            return None;
        }

        Some(Self {
            mean_brightness: brightness_sum / sampled as f64,
            center_weight: center_weight_sum / sampled as f64,
        })
    }
}

/// Estimate the subject distance from the inter-eye pixel distance.
///
/// Calibrated branch: the apparent inter-eye length in millimeters,
/// measured against the population-average pupillary distance, gives
/// the factor by which the nominal 45 cm target has shifted. The
/// uncalibrated fallback algebraically reduces to a constant 6.3 cm;
/// it is retained to match the deployed estimator (see DESIGN.md).
pub fn estimate_distance_cm(
    landmarks: &LandmarkSet,
    width: usize,
    height: usize,
    pixels_per_mm: Option<f64>,
) -> Option<f64> {
    let eye_dist_px = landmarks.inter_eye_corner_distance_px(width, height);
    if !(eye_dist_px > 0.0) {
        return None;
    }

    match pixels_per_mm {
        Some(ppmm) if ppmm > 0.0 => {
            let eye_mm = eye_dist_px / ppmm;
            let scale = eye_mm / AVERAGE_PD_MM;
            Some(TARGET_DISTANCE_CM / scale)
        }
        _ => {
            let mm_per_px = AVERAGE_PD_MM / eye_dist_px;
            Some(eye_dist_px * mm_per_px / 10.0)
        }
    }
}
