use serde::{Deserialize, Serialize};
use shared::frame::Timestamp;

/// Capture alignment phases.
///
/// Linear progression with one backward edge: a misaligned verdict in
/// `Detecting` or `Aligned` returns to `Detecting` (the camera stays
/// live; `Idle` is only reached by an explicit retake or before start).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CapturePhase {
    /// Waiting for the capture loop to start
    Idle,
    /// Polling verdicts, accumulating consecutive good frames
    Detecting { counter: u32 },
    /// Sustained good alignment, still accumulating toward capture
    Aligned { counter: u32 },
    /// Capture sequence running; verdict polling is halted
    Capturing(CaptureStage),
    /// Still captured; polling disabled until retake
    Done,
}

impl CapturePhase {
    /// The consecutive-good-frame counter, zero outside the counting
    /// phases.
    pub fn counter(&self) -> u32 {
        match self {
            CapturePhase::Detecting { counter } | CapturePhase::Aligned { counter } => *counter,
            _ => 0,
        }
    }

    /// Whether verdict polling is active in this phase.
    pub fn is_polling(&self) -> bool {
        matches!(
            self,
            CapturePhase::Detecting { .. } | CapturePhase::Aligned { .. }
        )
    }
}

/// Stages within the `Capturing` phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CaptureStage {
    /// Countdown display, one step per configured interval
    Countdown { step: u8, next_tick: Timestamp },
    /// Fixed-duration progress phase before the still is taken
    Progress { started: Timestamp },
    /// Progress elapsed; the still capture has been requested
    AwaitingStill,
}

/// Inputs that drive the aligner state machine.
#[derive(Debug, Clone)]
pub enum AlignerInput<'a> {
    /// Begin the capture loop (`Idle -> Detecting`)
    Start,
    /// One alignment verdict from the poll cadence
    Verdict(&'a shared::frame_analyzer::AlignmentVerdict, Timestamp),
    /// Wall-clock tick advancing the capture sequence
    Tick(Timestamp),
    /// Latest completed glasses-presence signal (true = glasses seen)
    GlassesSignal(bool),
    /// The still has been captured (`Capturing -> Done`)
    StillCaptured,
    /// Discard the session's capture and return to `Idle`
    Retake,
}

/// Events emitted toward the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AlignerEvent {
    /// The phase changed; drives the guide display
    PhaseChanged(CapturePhase),
    /// Transient guidance line mirroring the active condition
    Status(String),
    /// Percent progress toward the capture threshold while counting
    AlignmentProgress(u8),
    /// Countdown step display (3, 2, 1)
    CountdownTick(u8),
    /// Percent progress through the capture progress phase
    CaptureProgress(u8),
    /// Take the still now; fires exactly once per capture sequence
    StillRequested,
    /// Glasses detected; the user must remove them
    RemoveGlasses,
}
