use aligner::glasses::{GlassesMonitor, GlassesResponse};
use aligner::{AlignerConfig, AlignerEvent, AlignerInput, CaptureAligner, CapturePhase};
use clap::Parser;
use shared::calibration::{CalibrationEngine, REFERENCE_CARD_MM};
use shared::frame::{FrameSource, Timestamp};
use shared::frame_analyzer::FrameAnalyzer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tryon::measurement::LandmarkSource;
use tryon::session::{FrameAdjustment, TryOnSession};
use tryon_harness::{
    centered_face_landmarks, synthetic_catalog, MockFrameSource, MockGlassesDetector,
    MockLandmarkSource,
};

/// Command line arguments for the try-on demo
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "End-to-end virtual try-on pipeline over synthetic frames"
)]
struct Args {
    /// Synthetic frame width in pixels
    #[arg(long, default_value_t = 640)]
    width: usize,

    /// Synthetic frame height in pixels
    #[arg(long, default_value_t = 480)]
    height: usize,

    /// Brightness level of the synthetic face frames (0-255)
    #[arg(long, default_value_t = 180)]
    brightness: u8,

    /// Reference-line length in pixels for card calibration; omit to
    /// run uncalibrated
    #[arg(long)]
    card_line_px: Option<f64>,

    /// Eyewear asset to try on (aviator, wayfarer)
    #[arg(short, long, default_value = "aviator")]
    asset: String,

    /// Overlay size percent
    #[arg(long, default_value_t = 100)]
    size_percent: u32,

    /// Overlay vertical offset in pixels
    #[arg(long, default_value_t = 0)]
    vertical_offset: i32,

    /// Overlay rotation in degrees
    #[arg(long, default_value_t = 0.0)]
    rotation: f64,

    /// Directory for the exported composite
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Virtual Try-On Demo");
    println!("===================");
    println!("Frame size: {}x{}", args.width, args.height);

    let mut camera = MockFrameSource::steady(args.width, args.height, args.brightness);
    let mut landmark_model = MockLandmarkSource::new(Some(centered_face_landmarks()));

    let mut calibration = CalibrationEngine::new();
    if let Some(line_px) = args.card_line_px {
        let ppmm = calibration.calibrate_from_line(line_px, REFERENCE_CARD_MM)?;
        println!("Card calibration: {ppmm:.3} px/mm");
    } else {
        println!("Running uncalibrated (face-width heuristic)");
    }

    let config = AlignerConfig::default();
    let mut analyzer = FrameAnalyzer::new();
    let mut aligner = CaptureAligner::new(config.clone())?;
    let detector = Arc::new(MockGlassesDetector::new(GlassesResponse::detected(false)));
    let mut glasses = GlassesMonitor::new(detector, config.glasses_check_interval);

    aligner.process(AlignerInput::Start);

    // Poll loop at the configured cadence over synthetic time.
    println!("\nAligning...");
    let pixels_per_mm = calibration.resolve().pixels_per_mm;
    let mut now = Timestamp::new(0, 0);
    let mut still_requested = false;
    for _ in 0..600 {
        now = now.advanced_by(config.poll_interval);
        let frame = camera.capture_frame()?;

        if aligner.phase().is_polling() {
            let landmarks = landmark_model.detect(&frame)?;
            let verdict = analyzer.analyze(&frame, pixels_per_mm, landmarks.as_ref());
            report(&aligner.process(AlignerInput::Verdict(&verdict, now)));
            glasses.maybe_submit(&frame, now);
            if let Some(true) = glasses.take_latest() {
                report(&aligner.process(AlignerInput::GlassesSignal(true)));
            }
        } else {
            let events = aligner.process(AlignerInput::Tick(now));
            still_requested = events.contains(&AlignerEvent::StillRequested);
            report(&events);
        }

        if still_requested {
            break;
        }
    }
    anyhow::ensure!(still_requested, "alignment never reached capture");

    // Take the still and hand off to the try-on session.
    let still = camera.capture_frame()?;
    aligner.process(AlignerInput::StillCaptured);
    anyhow::ensure!(matches!(aligner.phase(), CapturePhase::Done));

    let landmarks = landmark_model
        .detect(&still)?
        .ok_or_else(|| anyhow::anyhow!("no face in the captured still"))?;

    let mut session = TryOnSession::new(calibration, synthetic_catalog())?;
    session.attach_capture(still.to_rgba_image(), landmarks);
    session.select_asset(&args.asset)?;
    session.set_adjustment(FrameAdjustment {
        vertical_offset_px: args.vertical_offset,
        size_percent: args.size_percent,
        rotation_degrees: args.rotation,
    })?;

    let m = session.measurements().expect("capture attached");
    println!("\nMeasurements ({:?} confidence):", m.confidence);
    println!("  PD:             {:.1} mm ({:.1} / {:.1})", m.pd_total_mm, m.pd_left_mm, m.pd_right_mm);
    println!("  Fitting height: {:.1} mm", m.fitting_height_mm);
    println!("  Face:           {:.1} x {:.1} mm ({})", m.face_width_mm, m.face_height_mm, m.face_shape);

    let composite = session.render()?;
    let path = tryon::export::save_composite(&composite, &args.output_dir)?;
    println!("\nComposite saved to {}", path.display());

    // Give any in-flight glasses check a moment to settle before exit.
    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok(())
}

fn report(events: &[AlignerEvent]) {
    for event in events {
        match event {
            AlignerEvent::Status(msg) => println!("  status: {msg}"),
            AlignerEvent::CountdownTick(step) => println!("  countdown: {step}"),
            AlignerEvent::CaptureProgress(pct) => println!("  capture: {pct}%"),
            AlignerEvent::PhaseChanged(phase) => log::info!("phase -> {phase:?}"),
            _ => {}
        }
    }
}
