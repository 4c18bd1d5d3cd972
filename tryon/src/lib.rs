//! Post-capture stage: facial measurements, eyewear overlay
//! compositing, session context, and composed-image export.
//!
//! Everything here operates on the single still produced by the
//! capture aligner. Measurements and the overlay are pure functions of
//! the captured photo, its landmark set, the selected eyewear asset,
//! the user's adjustment, and the resolved calibration; the session
//! context threads that state and recomputes wholesale on any change.

pub mod export;
pub mod measurement;
pub mod overlay;
pub mod session;
