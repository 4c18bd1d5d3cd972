//! Capture alignment state machine.
//!
//! Consumes a stream of per-frame alignment verdicts at a fixed poll
//! cadence and decides when sustained good alignment warrants
//! triggering the still capture. Phases run
//! `Idle -> Detecting -> Aligned -> Capturing -> Done`, with one
//! backward edge: any misaligned verdict while counting returns to
//! `Detecting`. A concurrent glasses-presence advisory can force the
//! counter back to zero but never blocks the poll loop.

pub mod config;
pub mod error;
pub mod glasses;
pub mod state;

pub use crate::config::AlignerConfig;
pub use crate::error::AlignerError;
pub use crate::state::{AlignerEvent, AlignerInput, CapturePhase, CaptureStage};

use shared::frame::Timestamp;
use shared::frame_analyzer::AlignmentVerdict;

/// Capture alignment state machine.
pub struct CaptureAligner {
    phase: CapturePhase,
    config: AlignerConfig,
}

impl CaptureAligner {
    /// Create an aligner with a validated configuration.
    pub fn new(config: AlignerConfig) -> Result<Self, AlignerError> {
        config.validate()?;
        Ok(Self {
            phase: CapturePhase::Idle,
            config,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> &CapturePhase {
        &self.phase
    }

    /// Configuration in effect.
    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Process one input and return the events it produced.
    ///
    /// Inputs that are not meaningful in the current phase are logged
    /// and ignored; the machine never panics on out-of-order input.
    pub fn process(&mut self, input: AlignerInput<'_>) -> Vec<AlignerEvent> {
        use CapturePhase::*;

        let (new_phase, events) = match (self.phase, input) {
            (Idle, AlignerInput::Start) => {
                log::info!("capture loop started, entering Detecting");
                (
                    Detecting { counter: 0 },
                    vec![
                        AlignerEvent::PhaseChanged(Detecting { counter: 0 }),
                        AlignerEvent::Status("Position your face in the oval".to_string()),
                    ],
                )
            }

            (Detecting { counter } | Aligned { counter }, AlignerInput::Verdict(verdict, now)) => {
                self.handle_verdict(counter, verdict, now)
            }

            (Detecting { .. } | Aligned { .. }, AlignerInput::GlassesSignal(true)) => {
                log::info!("glasses detected, resetting alignment counter");
                (
                    Detecting { counter: 0 },
                    vec![
                        AlignerEvent::RemoveGlasses,
                        AlignerEvent::PhaseChanged(Detecting { counter: 0 }),
                        AlignerEvent::Status("Please remove your glasses".to_string()),
                    ],
                )
            }
            (phase, AlignerInput::GlassesSignal(_)) => (phase, vec![]),

            (Capturing(stage), AlignerInput::Tick(now)) => self.handle_capture_tick(stage, now),
            (phase @ (Detecting { .. } | Aligned { .. } | Idle | Done), AlignerInput::Tick(_)) => {
                (phase, vec![])
            }

            (Capturing(CaptureStage::AwaitingStill), AlignerInput::StillCaptured) => {
                log::info!("still captured, entering Done");
                (Done, vec![AlignerEvent::PhaseChanged(Done)])
            }

            (_, AlignerInput::Retake) => {
                log::info!("retake requested, returning to Idle");
                (Idle, vec![AlignerEvent::PhaseChanged(Idle)])
            }

            (phase, input) => {
                log::warn!("ignoring {input:?} in phase {phase:?}");
                (phase, vec![])
            }
        };

        self.phase = new_phase;
        events
    }

    /// Handle one verdict while in a counting phase.
    fn handle_verdict(
        &self,
        counter: u32,
        verdict: &AlignmentVerdict,
        now: Timestamp,
    ) -> (CapturePhase, Vec<AlignerEvent>) {
        use CapturePhase::*;

        if verdict.is_aligned && !verdict.has_motion {
            let counter = counter + 1;

            if counter >= self.config.capture_threshold {
                log::info!("alignment sustained for {counter} frames, starting capture sequence");
                let stage = CaptureStage::Countdown {
                    step: self.config.countdown_steps,
                    next_tick: now.advanced_by(self.config.countdown_step),
                };
                return (
                    Capturing(stage),
                    vec![
                        AlignerEvent::PhaseChanged(Capturing(stage)),
                        AlignerEvent::Status("Get ready for capture".to_string()),
                        AlignerEvent::CountdownTick(self.config.countdown_steps),
                    ],
                );
            }

            if counter == self.config.aligned_threshold {
                return (
                    Aligned { counter },
                    vec![
                        AlignerEvent::PhaseChanged(Aligned { counter }),
                        AlignerEvent::Status("Good, hold your position".to_string()),
                    ],
                );
            }

            if counter > self.config.aligned_threshold {
                let pct = (counter * 100 / self.config.capture_threshold).min(100) as u8;
                return (
                    Aligned { counter },
                    vec![AlignerEvent::AlignmentProgress(pct)],
                );
            }

            return (Detecting { counter }, vec![]);
        }

        // Misaligned: zero the counter and stay live in Detecting.
        let mut events = Vec::new();
        if counter > 0 {
            events.push(AlignerEvent::PhaseChanged(Detecting { counter: 0 }));
        }
        events.push(AlignerEvent::Status(verdict.message.clone()));
        (Detecting { counter: 0 }, events)
    }

    /// Advance the capture sequence on a wall-clock tick.
    fn handle_capture_tick(
        &self,
        stage: CaptureStage,
        now: Timestamp,
    ) -> (CapturePhase, Vec<AlignerEvent>) {
        use CapturePhase::Capturing;

        match stage {
            CaptureStage::Countdown { step, next_tick } if now >= next_tick => {
                let remaining = step.saturating_sub(1);
                if remaining == 0 {
                    let stage = CaptureStage::Progress { started: now };
                    (
                        Capturing(stage),
                        vec![
                            AlignerEvent::Status("Capturing, hold perfectly still".to_string()),
                            AlignerEvent::CaptureProgress(0),
                        ],
                    )
                } else {
                    let stage = CaptureStage::Countdown {
                        step: remaining,
                        next_tick: next_tick.advanced_by(self.config.countdown_step),
                    };
                    (Capturing(stage), vec![AlignerEvent::CountdownTick(remaining)])
                }
            }
            CaptureStage::Countdown { .. } => (Capturing(stage), vec![]),

            CaptureStage::Progress { started } => {
                let elapsed = now.duration_since(started);
                if elapsed >= self.config.capture_progress {
                    log::info!("capture progress complete, requesting still");
                    (
                        Capturing(CaptureStage::AwaitingStill),
                        vec![
                            AlignerEvent::CaptureProgress(100),
                            AlignerEvent::StillRequested,
                        ],
                    )
                } else {
                    let pct = (elapsed.as_millis() * 100
                        / self.config.capture_progress.as_millis().max(1))
                        as u8;
                    (Capturing(stage), vec![AlignerEvent::CaptureProgress(pct)])
                }
            }

            CaptureStage::AwaitingStill => (Capturing(stage), vec![]),
        }
    }
}
