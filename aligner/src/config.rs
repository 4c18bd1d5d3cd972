use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AlignerError;

/// Configuration for the capture aligner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignerConfig {
    /// Verdict poll cadence
    pub poll_interval: Duration,
    /// Consecutive good frames before the display shows `Aligned`
    pub aligned_threshold: u32,
    /// Consecutive good frames that trigger the capture sequence
    pub capture_threshold: u32,
    /// Number of countdown steps shown before the progress phase
    pub countdown_steps: u8,
    /// Duration of each countdown step
    pub countdown_step: Duration,
    /// Duration of the progress phase before the still is taken
    pub capture_progress: Duration,
    /// Minimum interval between glasses-presence checks
    pub glasses_check_interval: Duration,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            aligned_threshold: 5,
            capture_threshold: 15,
            countdown_steps: 3,
            countdown_step: Duration::from_secs(1),
            capture_progress: Duration::from_millis(3000),
            glasses_check_interval: Duration::from_millis(1200),
        }
    }
}

impl AlignerConfig {
    /// Validate threshold and cadence relationships.
    pub fn validate(&self) -> Result<(), AlignerError> {
        if self.capture_threshold == 0 {
            return Err(AlignerError::InvalidConfig(
                "capture threshold must be positive".to_string(),
            ));
        }
        if self.aligned_threshold >= self.capture_threshold {
            return Err(AlignerError::InvalidConfig(format!(
                "aligned threshold {} must be below capture threshold {}",
                self.aligned_threshold, self.capture_threshold
            )));
        }
        if self.countdown_steps == 0 {
            return Err(AlignerError::InvalidConfig(
                "countdown must have at least one step".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(AlignerError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
