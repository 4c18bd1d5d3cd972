//! End-to-end pipeline tests over synthetic frames: alignment through
//! capture, measurement, overlay composition, and export.

use aligner::glasses::{GlassesMonitor, GlassesResponse};
use aligner::{AlignerConfig, AlignerEvent, AlignerInput, CaptureAligner, CapturePhase};
use approx::assert_relative_eq;
use shared::calibration::{CalibrationEngine, Confidence, REFERENCE_CARD_MM};
use shared::frame::{FrameSource, Timestamp};
use shared::frame_analyzer::FrameAnalyzer;
use std::sync::Arc;
use std::time::Duration;
use tryon::measurement::LandmarkSource;
use tryon::session::{FrameAdjustment, TryOnSession};
use tryon_harness::{
    centered_face_landmarks, synthetic_catalog, uniform_frame, MockFrameSource,
    MockGlassesDetector, MockLandmarkSource,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Drive the aligner with steady synthetic frames until the still is
/// requested; returns all events and the verdict count consumed.
fn run_to_still_request(
    camera: &mut MockFrameSource,
    analyzer: &mut FrameAnalyzer,
    aligner: &mut CaptureAligner,
    landmark_model: &mut MockLandmarkSource,
) -> Vec<AlignerEvent> {
    let config = aligner.config().clone();
    let mut events = Vec::new();
    let mut now = Timestamp::new(0, 0);

    for _ in 0..600 {
        now = now.advanced_by(config.poll_interval);
        let frame = camera.capture_frame().unwrap();

        let produced = if aligner.phase().is_polling() {
            let landmarks = landmark_model.detect(&frame).unwrap();
            let verdict = analyzer.analyze(&frame, None, landmarks.as_ref());
            aligner.process(AlignerInput::Verdict(&verdict, now))
        } else {
            aligner.process(AlignerInput::Tick(now))
        };

        let done = produced.contains(&AlignerEvent::StillRequested);
        events.extend(produced);
        if done {
            return events;
        }
    }
    panic!("alignment never reached the still request");
}

#[test]
fn test_full_capture_pipeline() {
    init_logs();

    let mut camera = MockFrameSource::steady(640, 480, 180);
    let mut analyzer = FrameAnalyzer::new();
    let mut aligner = CaptureAligner::new(AlignerConfig::default()).unwrap();
    let mut landmark_model = MockLandmarkSource::new(Some(centered_face_landmarks()));

    aligner.process(AlignerInput::Start);
    let events = run_to_still_request(&mut camera, &mut analyzer, &mut aligner, &mut landmark_model);

    // The whole sequence appears in order: Aligned display, countdown
    // from 3, progress, one still request.
    assert!(events
        .iter()
        .any(|e| matches!(e, AlignerEvent::PhaseChanged(CapturePhase::Aligned { counter: 5 }))));
    assert!(events.contains(&AlignerEvent::CountdownTick(3)));
    assert!(events.contains(&AlignerEvent::CountdownTick(1)));
    let stills = events
        .iter()
        .filter(|e| matches!(e, AlignerEvent::StillRequested))
        .count();
    assert_eq!(stills, 1);

    // Hand off to the try-on stage.
    let still = camera.capture_frame().unwrap();
    aligner.process(AlignerInput::StillCaptured);
    assert_eq!(aligner.phase(), &CapturePhase::Done);

    let landmarks = landmark_model.detect(&still).unwrap().unwrap();
    let mut session = TryOnSession::new(CalibrationEngine::new(), synthetic_catalog()).unwrap();
    session.attach_capture(still.to_rgba_image(), landmarks);

    let m = session.measurements().unwrap();
    assert_eq!(m.confidence, Confidence::Low);
    // Cheeks span 0.6 of 640 px, assumed 140 mm.
    assert_relative_eq!(m.pixels_per_mm, 384.0 / 140.0, epsilon = 1e-9);

    let composite = session.render().unwrap();
    assert_eq!(composite.dimensions(), (640, 480));

    let dir = std::env::temp_dir().join(format!(
        "pipeline_test_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let path = tryon::export::save_composite(&composite, &dir).unwrap();
    assert!(path.exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_motion_spike_resets_alignment_progress() {
    init_logs();

    let mut analyzer = FrameAnalyzer::new();
    let mut aligner = CaptureAligner::new(AlignerConfig::default()).unwrap();
    let landmarks = centered_face_landmarks();
    aligner.process(AlignerInput::Start);

    // Ten identical bright frames accumulate alignment.
    let steady = uniform_frame(640, 480, 180, Timestamp::new(0, 0));
    for i in 1..=10u64 {
        let verdict = analyzer.analyze(&steady, None, Some(&landmarks));
        aligner.process(AlignerInput::Verdict(&verdict, Timestamp::from_millis(i * 100)));
    }
    assert_eq!(aligner.phase().counter(), 10);

    // A sudden dark frame reads as motion and zeroes the counter; the
    // phase falls back to Detecting, never Idle.
    let dark = uniform_frame(640, 480, 30, Timestamp::new(0, 0));
    let verdict = analyzer.analyze(&dark, None, Some(&landmarks));
    assert!(!verdict.is_aligned);
    aligner.process(AlignerInput::Verdict(&verdict, Timestamp::from_millis(1100)));
    assert_eq!(aligner.phase(), &CapturePhase::Detecting { counter: 0 });
}

#[tokio::test]
async fn test_glasses_advisory_resets_counter() {
    init_logs();

    let mut analyzer = FrameAnalyzer::new();
    let mut aligner = CaptureAligner::new(AlignerConfig::default()).unwrap();
    let landmarks = centered_face_landmarks();
    aligner.process(AlignerInput::Start);

    let detector = Arc::new(MockGlassesDetector::new(GlassesResponse::detected(true)));
    let mut monitor =
        GlassesMonitor::new(Arc::clone(&detector) as _, Duration::from_millis(1200));

    let frame = uniform_frame(640, 480, 180, Timestamp::new(0, 0));
    for i in 1..=8u64 {
        let verdict = analyzer.analyze(&frame, None, Some(&landmarks));
        aligner.process(AlignerInput::Verdict(&verdict, Timestamp::from_millis(i * 100)));
    }
    assert_eq!(aligner.phase().counter(), 8);

    // The advisory completes off the poll loop; its positive answer
    // zeroes the counter on the next poll.
    let handle = monitor
        .maybe_submit(&frame, Timestamp::from_millis(800))
        .unwrap();
    handle.await.unwrap();
    assert_eq!(detector.calls(), 1);

    let signal = monitor.take_latest().unwrap();
    let events = aligner.process(AlignerInput::GlassesSignal(signal));
    assert!(events.contains(&AlignerEvent::RemoveGlasses));
    assert_eq!(aligner.phase(), &CapturePhase::Detecting { counter: 0 });
}

#[test]
fn test_calibration_switches_overlay_to_physical_sizing() {
    init_logs();

    let landmarks = centered_face_landmarks();
    let photo = uniform_frame(640, 480, 180, Timestamp::new(0, 0)).to_rgba_image();

    let mut session = TryOnSession::new(CalibrationEngine::new(), synthetic_catalog()).unwrap();
    session.attach_capture(photo, landmarks.clone());

    // Uncalibrated: sized from the 128 px inter-eye spread.
    let heuristic_width = tryon::overlay::target_width_px(
        &landmarks,
        640,
        480,
        session.selected_asset(),
        &FrameAdjustment::default(),
        &session.calibration(),
    );
    assert_relative_eq!(heuristic_width, 128.0 * 3.0, epsilon = 1e-9);

    // Card calibration at 2 px/mm switches to physical sizing.
    session
        .calibrate_from_line(2.0 * REFERENCE_CARD_MM, REFERENCE_CARD_MM)
        .unwrap();
    let physical_width = tryon::overlay::target_width_px(
        &landmarks,
        640,
        480,
        session.selected_asset(),
        &FrameAdjustment::default(),
        &session.calibration(),
    );
    assert_relative_eq!(
        physical_width,
        session.selected_asset().width_mm * 2.0,
        epsilon = 1e-9
    );

    let m = session.measurements().unwrap();
    assert_eq!(m.confidence, Confidence::High);
    assert_relative_eq!(m.pixels_per_mm, 2.0, epsilon = 1e-9);
}

#[test]
fn test_no_face_frame_never_accumulates() {
    init_logs();

    // A 2x2 frame has a degenerate sampling ellipse: no face signal.
    let mut analyzer = FrameAnalyzer::new();
    let tiny = uniform_frame(2, 2, 180, Timestamp::new(0, 0));
    let verdict = analyzer.analyze(&tiny, None, None);
    assert!(!verdict.is_aligned);
    assert_eq!(verdict.message, "No face detected");

    let mut aligner = CaptureAligner::new(AlignerConfig::default()).unwrap();
    aligner.process(AlignerInput::Start);
    aligner.process(AlignerInput::Verdict(&verdict, Timestamp::from_millis(100)));
    assert_eq!(aligner.phase(), &CapturePhase::Detecting { counter: 0 });
}
