//! Test and demo harness for the try-on pipeline.
//!
//! Provides synthetic frames, a deterministic landmark geometry, and
//! mock implementations of the external collaborator seams (camera,
//! landmark model, glasses detector) so the full pipeline can run
//! without hardware or a network.

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::catalog::FrameAsset;
use shared::frame::{FrameResult, FrameSource, RgbaFrame, Timestamp};
use shared::landmarks::{
    LandmarkError, LandmarkSet, NormalizedPoint, CHIN_BOTTOM, FOREHEAD_TOP, LEFT_CHEEK,
    LEFT_EYE_BOTTOM, LEFT_EYE_INNER, LEFT_EYE_OUTER, LEFT_EYE_TOP, NOSE_TIP, RIGHT_CHEEK,
    RIGHT_EYE_BOTTOM, RIGHT_EYE_INNER, RIGHT_EYE_OUTER, RIGHT_EYE_TOP, TOPOLOGY_LEN,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tryon::measurement::LandmarkSource;

use aligner::glasses::{GlassesDetector, GlassesResponse};

/// Uniform gray frame at the given brightness level.
pub fn uniform_frame(width: usize, height: usize, level: u8, timestamp: Timestamp) -> RgbaFrame {
    RgbaFrame::filled(width, height, [level, level, level, 255], timestamp)
}

/// Uniform frame with seeded per-pixel noise, for motion scenarios.
pub fn noisy_frame(
    width: usize,
    height: usize,
    level: u8,
    amplitude: u8,
    seed: u64,
    timestamp: Timestamp,
) -> RgbaFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise: Vec<i16> = (0..width * height)
        .map(|_| rng.gen_range(-(amplitude as i16)..=amplitude as i16))
        .collect();
    RgbaFrame::from_fn(width, height, timestamp, |x, y| {
        let v = (level as i16 + noise[y * width + x]).clamp(0, 255) as u8;
        [v, v, v, 255]
    })
}

/// Landmark set for a plausible centered face.
///
/// Eye centers at x 0.4/0.6, nose between them, cheeks at 0.2/0.8,
/// forehead and chin spanning y 0.2 to 0.95.
pub fn centered_face_landmarks() -> LandmarkSet {
    face_landmarks_with_eyes((0.4, 0.45), (0.6, 0.45))
}

/// Landmark set with the given normalized eye-center positions; all
/// four per-eye landmarks collapse onto the center so the averaged
/// center is exact.
pub fn face_landmarks_with_eyes(left: (f64, f64), right: (f64, f64)) -> LandmarkSet {
    let mut points = vec![NormalizedPoint::new(0.5, 0.5); TOPOLOGY_LEN];
    for idx in [LEFT_EYE_OUTER, LEFT_EYE_INNER, LEFT_EYE_TOP, LEFT_EYE_BOTTOM] {
        points[idx] = NormalizedPoint::new(left.0, left.1);
    }
    for idx in [
        RIGHT_EYE_OUTER,
        RIGHT_EYE_INNER,
        RIGHT_EYE_TOP,
        RIGHT_EYE_BOTTOM,
    ] {
        points[idx] = NormalizedPoint::new(right.0, right.1);
    }
    points[NOSE_TIP] = NormalizedPoint::new((left.0 + right.0) / 2.0, 0.6);
    points[LEFT_CHEEK] = NormalizedPoint::new(0.2, 0.55);
    points[RIGHT_CHEEK] = NormalizedPoint::new(0.8, 0.55);
    points[FOREHEAD_TOP] = NormalizedPoint::new(0.5, 0.2);
    points[CHIN_BOTTOM] = NormalizedPoint::new(0.5, 0.95);
    LandmarkSet::new(points).expect("topology length")
}

/// Small synthetic eyewear catalog for demos and tests.
pub fn synthetic_catalog() -> Vec<FrameAsset> {
    vec![
        FrameAsset::from_image(
            "aviator",
            "Aviator",
            RgbaImage::from_pixel(240, 80, Rgba([30, 30, 30, 220])),
            130.0,
            50.0,
        ),
        FrameAsset::from_image(
            "wayfarer",
            "Wayfarer",
            RgbaImage::from_pixel(240, 72, Rgba([60, 40, 20, 220])),
            124.0,
            41.0,
        ),
    ]
}

/// Frame source replaying a fixed sequence, cycling at the end.
pub struct MockFrameSource {
    frames: Vec<RgbaFrame>,
    index: usize,
}

impl MockFrameSource {
    pub fn new(frames: Vec<RgbaFrame>) -> Self {
        assert!(!frames.is_empty(), "mock source needs at least one frame");
        Self { frames, index: 0 }
    }

    /// Source producing the same static frame forever.
    pub fn steady(width: usize, height: usize, level: u8) -> Self {
        Self::new(vec![uniform_frame(width, height, level, Timestamp::new(0, 0))])
    }
}

impl FrameSource for MockFrameSource {
    fn capture_frame(&mut self) -> FrameResult<RgbaFrame> {
        let frame = self.frames[self.index % self.frames.len()].clone();
        self.index += 1;
        Ok(frame)
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.frames[0].width(), self.frames[0].height())
    }
}

/// Landmark source returning a fixed answer and counting calls.
pub struct MockLandmarkSource {
    result: Option<LandmarkSet>,
    calls: usize,
}

impl MockLandmarkSource {
    pub fn new(result: Option<LandmarkSet>) -> Self {
        Self { result, calls: 0 }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl LandmarkSource for MockLandmarkSource {
    fn detect(&mut self, _frame: &RgbaFrame) -> Result<Option<LandmarkSet>, LandmarkError> {
        self.calls += 1;
        Ok(self.result.clone())
    }
}

/// Glasses detector returning a fixed answer and counting calls.
pub struct MockGlassesDetector {
    answer: GlassesResponse,
    calls: AtomicUsize,
}

impl MockGlassesDetector {
    pub fn new(answer: GlassesResponse) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GlassesDetector for MockGlassesDetector {
    fn detect(&self, _frame: &RgbaFrame) -> GlassesResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}
