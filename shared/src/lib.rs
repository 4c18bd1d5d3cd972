//! Shared components for the try-on measurement pipeline.
//!
//! This crate holds the leaf types and algorithms used by the capture
//! aligner and the try-on stage: the RGBA frame type and frame-source
//! seam, the facial landmark set, the per-frame alignment analyzer,
//! the pixel-to-millimeter calibration engine, and the eyewear asset
//! catalog.

pub mod calibration;
pub mod catalog;
pub mod frame;
pub mod frame_analyzer;
pub mod landmarks;
