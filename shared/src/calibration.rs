//! Pixel-to-millimeter calibration with tiered confidence.
//!
//! The scale is resolved from an explicit prioritized provider list:
//! a session-stored reference-object calibration (high confidence), a
//! known-device lookup table (medium), and finally no resolvable scale
//! (low), in which case callers derive an ad-hoc scale from an assumed
//! average adult face width. A user calibration measures a drawn line
//! over an object of known physical size, by default a payment card.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Physical width of the default reference object (payment card).
pub const REFERENCE_CARD_MM: f64 = 85.6;
/// Assumed average adult face width for the heuristic fallback.
pub const AVERAGE_FACE_WIDTH_MM: f64 = 140.0;

/// Trust tier attached to a resolved scale, ordered low to high.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Provenance of a resolved scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleSource {
    /// User calibration stored earlier in this session.
    Stored,
    /// Pre-measured entry from the known-device table.
    DeviceTable,
    /// No trusted scale; callers fall back to the face-width estimate.
    Heuristic,
}

/// A resolved pixel-to-millimeter scale with its trust tier.
///
/// `pixels_per_mm` is always positive when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub pixels_per_mm: Option<f64>,
    pub confidence: Confidence,
    pub source: ScaleSource,
}

impl CalibrationResult {
    /// The scale, but only when its confidence makes it trustworthy
    /// for physical sizing. Low-confidence values are withheld even
    /// when numerically present; the confidence tier, not a null
    /// check, selects the sizing formula downstream.
    pub fn trusted_scale(&self) -> Option<f64> {
        match self.confidence {
            Confidence::High | Confidence::Medium => self.pixels_per_mm,
            Confidence::Low => None,
        }
    }
}

/// Errors produced by the calibration engine.
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// The drawn reference line has no usable length.
    #[error("degenerate reference line: {0:.2} px")]
    DegenerateLine(f64),

    /// The reference object length is not a positive number.
    #[error("invalid reference length: {0:.2} mm")]
    InvalidReference(f64),

    /// The device table file could not be read or parsed.
    #[error("failed to load device table: {0}")]
    DeviceTable(#[from] std::io::Error),
}

/// A line drawn by the user over the reference object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLine {
    pub start: (f64, f64),
    pub end: (f64, f64),
}

impl ReferenceLine {
    pub fn new(start: (f64, f64), end: (f64, f64)) -> Self {
        Self { start, end }
    }

    /// Drawn length in pixels.
    pub fn length_px(&self) -> f64 {
        let dx = self.end.0 - self.start.0;
        let dy = self.end.1 - self.start.1;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Session-scoped store holding the last calibrated scale.
///
/// The value is kept as a decimal string, mirroring the single-key
/// session storage the scale is exchanged through; it survives
/// retakes and is cleared at session end.
#[derive(Debug, Default, Clone)]
pub struct SessionScaleStore {
    value: Option<String>,
}

impl SessionScaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the stored scale. Unparseable or non-positive content is
    /// treated as absent.
    pub fn get(&self) -> Option<f64> {
        self.value
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| *v > 0.0)
    }

    pub fn set(&mut self, pixels_per_mm: f64) {
        self.value = Some(pixels_per_mm.to_string());
    }

    pub fn clear(&mut self) {
        self.value = None;
    }
}

/// Known-device scale table: device identifier fragment to px/mm.
pub type DeviceScaleTable = HashMap<String, f64>;

/// Load a device table from a JSON file of `{"identifier": px_per_mm}`.
pub fn load_device_table(path: &Path) -> Result<DeviceScaleTable, CalibrationError> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
}

/// Resolves the pixel-to-millimeter scale for the current session.
#[derive(Debug, Default, Clone)]
pub struct CalibrationEngine {
    store: SessionScaleStore,
    device_table: DeviceScaleTable,
    device_id: Option<String>,
}

impl CalibrationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with an operator-populated device table and the current
    /// device identifier. Table keys match by substring, so partial
    /// identifiers keep working across firmware revisions.
    pub fn with_device_table(device_table: DeviceScaleTable, device_id: impl Into<String>) -> Self {
        Self {
            store: SessionScaleStore::new(),
            device_table,
            device_id: Some(device_id.into()),
        }
    }

    /// Resolve the current scale. Providers are consulted in priority
    /// order; the first hit wins.
    pub fn resolve(&self) -> CalibrationResult {
        self.stored_scale()
            .or_else(|| self.device_scale())
            .unwrap_or(CalibrationResult {
                pixels_per_mm: None,
                confidence: Confidence::Low,
                source: ScaleSource::Heuristic,
            })
    }

    fn stored_scale(&self) -> Option<CalibrationResult> {
        self.store.get().map(|ppmm| CalibrationResult {
            pixels_per_mm: Some(ppmm),
            confidence: Confidence::High,
            source: ScaleSource::Stored,
        })
    }

    fn device_scale(&self) -> Option<CalibrationResult> {
        let device_id = self.device_id.as_deref()?;
        self.device_table
            .iter()
            .find(|(fragment, _)| device_id.contains(fragment.as_str()))
            .map(|(fragment, ppmm)| {
                log::debug!("device table hit: {fragment} -> {ppmm} px/mm");
                CalibrationResult {
                    pixels_per_mm: Some(*ppmm),
                    confidence: Confidence::Medium,
                    source: ScaleSource::DeviceTable,
                }
            })
    }

    /// Record a reference-object calibration from a drawn line.
    ///
    /// On success the new scale is persisted to the session store and
    /// supersedes any lower-confidence value; the previous stored
    /// state is untouched on failure.
    pub fn calibrate_from_line(
        &mut self,
        length_px: f64,
        known_mm: f64,
    ) -> Result<f64, CalibrationError> {
        if !length_px.is_finite() || length_px <= 0.0 {
            return Err(CalibrationError::DegenerateLine(length_px));
        }
        if !known_mm.is_finite() || known_mm <= 0.0 {
            return Err(CalibrationError::InvalidReference(known_mm));
        }

        let pixels_per_mm = length_px / known_mm;
        self.store.set(pixels_per_mm);
        log::info!("calibration saved: {pixels_per_mm:.3} px/mm over {known_mm} mm reference");
        Ok(pixels_per_mm)
    }

    /// Drop the session-stored calibration (session teardown).
    pub fn clear_stored(&mut self) {
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_confidence_total_order() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert!(Confidence::High > Confidence::Low);
    }

    #[test]
    fn test_card_calibration_round_trip() {
        let mut engine = CalibrationEngine::new();
        let ppmm = engine.calibrate_from_line(428.0, REFERENCE_CARD_MM).unwrap();
        assert_relative_eq!(ppmm, 5.0, epsilon = 1e-3);

        let resolved = engine.resolve();
        assert_eq!(resolved.confidence, Confidence::High);
        assert_eq!(resolved.source, ScaleSource::Stored);
        assert_relative_eq!(resolved.pixels_per_mm.unwrap(), ppmm, epsilon = 1e-12);

        // Re-resolving within the same session yields the same value.
        let again = engine.resolve();
        assert_eq!(again, resolved);
    }

    #[test]
    fn test_degenerate_line_rejected_and_state_unchanged() {
        let mut engine = CalibrationEngine::new();
        engine.calibrate_from_line(100.0, REFERENCE_CARD_MM).unwrap();
        let before = engine.resolve();

        assert!(matches!(
            engine.calibrate_from_line(0.0, REFERENCE_CARD_MM),
            Err(CalibrationError::DegenerateLine(_))
        ));
        assert!(matches!(
            engine.calibrate_from_line(-5.0, REFERENCE_CARD_MM),
            Err(CalibrationError::DegenerateLine(_))
        ));
        assert_eq!(engine.resolve(), before);
    }

    #[test]
    fn test_provider_priority() {
        let mut table = DeviceScaleTable::new();
        table.insert("Pixel 7".to_string(), 3.2);
        let mut engine = CalibrationEngine::with_device_table(table, "Pixel 7 Pro build XQ1A");

        // Device table answers when nothing is stored.
        let resolved = engine.resolve();
        assert_eq!(resolved.confidence, Confidence::Medium);
        assert_eq!(resolved.source, ScaleSource::DeviceTable);
        assert_relative_eq!(resolved.pixels_per_mm.unwrap(), 3.2, epsilon = 1e-12);

        // A stored calibration supersedes it.
        engine.calibrate_from_line(428.0, REFERENCE_CARD_MM).unwrap();
        let resolved = engine.resolve();
        assert_eq!(resolved.confidence, Confidence::High);
        assert_eq!(resolved.source, ScaleSource::Stored);

        // Clearing falls back to the device table again.
        engine.clear_stored();
        assert_eq!(engine.resolve().source, ScaleSource::DeviceTable);
    }

    #[test]
    fn test_unknown_device_resolves_low() {
        let mut table = DeviceScaleTable::new();
        table.insert("Pixel 7".to_string(), 3.2);
        let engine = CalibrationEngine::with_device_table(table, "UnlistedPhone 12");

        let resolved = engine.resolve();
        assert_eq!(resolved.pixels_per_mm, None);
        assert_eq!(resolved.confidence, Confidence::Low);
        assert_eq!(resolved.source, ScaleSource::Heuristic);
    }

    #[test]
    fn test_trusted_scale_gated_by_confidence() {
        let stale_low = CalibrationResult {
            pixels_per_mm: Some(4.1),
            confidence: Confidence::Low,
            source: ScaleSource::Heuristic,
        };
        assert_eq!(stale_low.trusted_scale(), None);

        let medium = CalibrationResult {
            pixels_per_mm: Some(3.2),
            confidence: Confidence::Medium,
            source: ScaleSource::DeviceTable,
        };
        assert_eq!(medium.trusted_scale(), Some(3.2));
    }

    #[test]
    fn test_reference_line_length() {
        let line = ReferenceLine::new((10.0, 10.0), (13.0, 14.0));
        assert_relative_eq!(line.length_px(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_store_roundtrips_decimal_string() {
        let mut store = SessionScaleStore::new();
        assert_eq!(store.get(), None);
        store.set(5.0);
        assert_relative_eq!(store.get().unwrap(), 5.0, epsilon = 1e-12);
        store.clear();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_load_device_table_file() {
        let path = std::env::temp_dir().join(format!(
            "device_table_test_{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, r#"{"Pixel 7": 3.2, "iPhone 12": 4.0}"#).unwrap();

        let table = load_device_table(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_relative_eq!(table["Pixel 7"], 3.2, epsilon = 1e-12);

        std::fs::remove_file(&path).ok();
    }
}
