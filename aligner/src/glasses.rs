//! Background glasses-presence checks.
//!
//! Detection is slow relative to the poll cadence, so checks run as
//! fire-and-forget tasks off the capture loop. The monitor rate-limits
//! submissions, keeps only the most recent completed answer, and
//! absorbs detector failures so a flaky detector can never stall
//! alignment.

use serde::{Deserialize, Serialize};
use shared::frame::{RgbaFrame, Timestamp};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Detector answer for a single frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlassesResponse {
    /// Whether the detector produced an answer at all
    pub success: bool,
    /// The answer, present only on success
    pub glasses: Option<bool>,
    /// Failure description, present only on failure
    pub error: Option<String>,
}

impl GlassesResponse {
    /// A successful answer.
    pub fn detected(glasses: bool) -> Self {
        Self {
            success: true,
            glasses: Some(glasses),
            error: None,
        }
    }

    /// A failed check.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            glasses: None,
            error: Some(error.into()),
        }
    }
}

/// Glasses-presence detector seam.
///
/// Backed by a remote inference service in production and by mocks in
/// tests. Calls may block; the monitor runs them on the blocking pool.
pub trait GlassesDetector: Send + Sync + 'static {
    /// Check one frame for glasses.
    fn detect(&self, frame: &RgbaFrame) -> GlassesResponse;
}

/// Rate-limited background runner for glasses checks.
///
/// Results land in a single shared slot tagged with a submission
/// generation; a stale task completing after a newer one can never
/// overwrite the newer answer.
pub struct GlassesMonitor {
    detector: Arc<dyn GlassesDetector>,
    interval: Duration,
    last_submitted: Option<Timestamp>,
    latest: Arc<Mutex<Option<(u64, bool)>>>,
    next_generation: u64,
}

impl GlassesMonitor {
    /// Create a monitor with the given minimum interval between checks.
    pub fn new(detector: Arc<dyn GlassesDetector>, interval: Duration) -> Self {
        Self {
            detector,
            interval,
            last_submitted: None,
            latest: Arc::new(Mutex::new(None)),
            next_generation: 0,
        }
    }

    /// Submit a frame for checking if the rate limit allows.
    ///
    /// Returns the spawned task handle when a check was submitted, so
    /// callers that need determinism can await completion. The capture
    /// loop ignores the handle.
    pub fn maybe_submit(&mut self, frame: &RgbaFrame, now: Timestamp) -> Option<JoinHandle<()>> {
        if let Some(last) = self.last_submitted {
            if now.duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_submitted = Some(now);

        let generation = self.next_generation;
        self.next_generation += 1;

        let detector = Arc::clone(&self.detector);
        let slot = Arc::clone(&self.latest);
        let frame = frame.clone();

        Some(tokio::spawn(async move {
            let response =
                match tokio::task::spawn_blocking(move || detector.detect(&frame)).await {
                    Ok(response) => response,
                    Err(err) => {
                        log::warn!("glasses check task failed: {err}");
                        return;
                    }
                };

            match response.glasses {
                Some(glasses) if response.success => {
                    let mut latest = slot.lock().expect("glasses slot poisoned");
                    // Only a newer submission may replace the slot.
                    if latest.map_or(true, |(gen, _)| gen < generation) {
                        *latest = Some((generation, glasses));
                    }
                }
                _ => {
                    let reason = response.error.unwrap_or_else(|| "no answer".to_string());
                    log::warn!("glasses check returned no result: {reason}");
                }
            }
        }))
    }

    /// Take the most recent completed answer, if any arrived since the
    /// last call.
    pub fn take_latest(&mut self) -> Option<bool> {
        self.latest
            .lock()
            .expect("glasses slot poisoned")
            .take()
            .map(|(_, glasses)| glasses)
    }
}
