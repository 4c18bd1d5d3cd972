//! Composed-image export.
//!
//! The final still is saved as a timestamped PNG. Filenames carry the
//! capture's unix milliseconds; a numeric suffix resolves collisions
//! when two exports land in the same millisecond.

use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors produced while saving the composite.
#[derive(Error, Debug)]
pub enum ExportError {
    /// PNG encoding failed.
    #[error("failed to encode composite: {0}")]
    Encode(#[from] image::ImageError),

    /// The target directory could not be written.
    #[error("failed to write composite: {0}")]
    Io(#[from] std::io::Error),
}

/// Save the composed still as `virtual_tryon_<unix_millis>.png` in
/// `dir`, returning the path written.
pub fn save_composite(image: &RgbaImage, dir: &Path) -> Result<PathBuf, ExportError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let path = composite_path(dir, millis as u64);
    image.save(&path)?;
    log::info!("composite exported to {}", path.display());
    Ok(path)
}

/// Collision-free export path for the given capture milliseconds.
fn composite_path(dir: &Path, millis: u64) -> PathBuf {
    let base = dir.join(format!("virtual_tryon_{millis}.png"));
    if !base.exists() {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("virtual_tryon_{millis}_{n}.png"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
