//! Try-on session context.
//!
//! One session owns the captured still, its landmark set, the derived
//! measurements, the selected asset, the user's adjustment, and the
//! calibration engine. All shared state is threaded through this
//! context explicitly. Any change to an input recomputes the
//! measurement set wholesale; a retake discards the capture but keeps
//! the calibration.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use shared::calibration::{CalibrationEngine, CalibrationError, CalibrationResult};
use shared::catalog::FrameAsset;
use shared::landmarks::LandmarkSet;
use thiserror::Error;

use crate::measurement::{compute_measurements, MeasurementSet};
use crate::overlay::{render_overlay, OverlayError};

/// User-controlled placement adjustment for the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameAdjustment {
    /// Shift of the overlay anchor below the eye line, in pixels.
    pub vertical_offset_px: i32,
    /// Overlay size as a percentage of the computed width.
    pub size_percent: u32,
    /// Rotation about the shifted anchor, in degrees.
    pub rotation_degrees: f64,
}

impl Default for FrameAdjustment {
    fn default() -> Self {
        Self {
            vertical_offset_px: 0,
            size_percent: 100,
            rotation_degrees: 0.0,
        }
    }
}

impl FrameAdjustment {
    /// Restore the neutral adjustment.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Errors produced by the session context.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No eyewear assets survived catalog loading.
    #[error("eyewear catalog is empty")]
    EmptyCatalog,

    /// The requested asset id is not in the catalog.
    #[error("unknown eyewear asset: {0}")]
    UnknownAsset(String),

    /// The adjustment's size percentage is unusable.
    #[error("invalid size percent: {0}")]
    InvalidSizePercent(u32),

    /// An overlay was requested before a capture was attached.
    #[error("no capture attached to the session")]
    NoCapture,

    /// Overlay composition failed.
    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

/// Explicit context for one try-on session.
pub struct TryOnSession {
    calibration: CalibrationEngine,
    catalog: Vec<FrameAsset>,
    selected: usize,
    adjustment: FrameAdjustment,
    capture: Option<(RgbaImage, LandmarkSet)>,
    measurements: Option<MeasurementSet>,
}

impl TryOnSession {
    /// Open a session over a non-empty asset catalog. The first asset
    /// is selected initially.
    pub fn new(
        calibration: CalibrationEngine,
        catalog: Vec<FrameAsset>,
    ) -> Result<Self, SessionError> {
        if catalog.is_empty() {
            return Err(SessionError::EmptyCatalog);
        }
        Ok(Self {
            calibration,
            catalog,
            selected: 0,
            adjustment: FrameAdjustment::default(),
            capture: None,
            measurements: None,
        })
    }

    /// The currently selected eyewear asset.
    pub fn selected_asset(&self) -> &FrameAsset {
        &self.catalog[self.selected]
    }

    /// All loaded assets.
    pub fn catalog(&self) -> &[FrameAsset] {
        &self.catalog
    }

    /// The current adjustment.
    pub fn adjustment(&self) -> FrameAdjustment {
        self.adjustment
    }

    /// Measurements for the attached capture, if any.
    pub fn measurements(&self) -> Option<&MeasurementSet> {
        self.measurements.as_ref()
    }

    /// The calibration currently in effect.
    pub fn calibration(&self) -> CalibrationResult {
        self.calibration.resolve()
    }

    /// Attach the captured still and its landmarks, computing the
    /// measurement set.
    pub fn attach_capture(&mut self, photo: RgbaImage, landmarks: LandmarkSet) {
        log::info!("capture attached: {}x{}", photo.width(), photo.height());
        self.capture = Some((photo, landmarks));
        self.recompute();
    }

    /// Select a different asset by id.
    pub fn select_asset(&mut self, id: &str) -> Result<(), SessionError> {
        let index = self
            .catalog
            .iter()
            .position(|asset| asset.id == id)
            .ok_or_else(|| SessionError::UnknownAsset(id.to_string()))?;
        self.selected = index;
        self.recompute();
        Ok(())
    }

    /// Replace the adjustment.
    pub fn set_adjustment(&mut self, adjustment: FrameAdjustment) -> Result<(), SessionError> {
        if adjustment.size_percent == 0 {
            return Err(SessionError::InvalidSizePercent(adjustment.size_percent));
        }
        self.adjustment = adjustment;
        self.recompute();
        Ok(())
    }

    /// Record a reference-object calibration and rescale everything.
    pub fn calibrate_from_line(
        &mut self,
        length_px: f64,
        known_mm: f64,
    ) -> Result<f64, CalibrationError> {
        let ppmm = self.calibration.calibrate_from_line(length_px, known_mm)?;
        self.recompute();
        Ok(ppmm)
    }

    /// Compose the overlay over the attached capture.
    pub fn render(&self) -> Result<RgbaImage, SessionError> {
        let (photo, landmarks) = self.capture.as_ref().ok_or(SessionError::NoCapture)?;
        Ok(render_overlay(
            photo,
            landmarks,
            self.selected_asset(),
            &self.adjustment,
            &self.calibration.resolve(),
        )?)
    }

    /// Discard the capture and its measurements and reset the
    /// adjustment. The calibration survives so the retaken photo keeps
    /// the same scale.
    pub fn retake(&mut self) {
        log::info!("retake: discarding capture, keeping calibration");
        self.capture = None;
        self.measurements = None;
        self.adjustment.reset();
    }

    /// End the session, dropping the stored calibration.
    pub fn close(&mut self) {
        self.calibration.clear_stored();
        self.retake();
    }

    fn recompute(&mut self) {
        self.measurements = self.capture.as_ref().map(|(photo, landmarks)| {
            compute_measurements(
                landmarks,
                photo.width() as usize,
                photo.height() as usize,
                &self.calibration.resolve(),
                &self.catalog[self.selected],
                &self.adjustment,
            )
        });
    }
}
