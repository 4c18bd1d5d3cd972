//! Eyewear asset catalog.
//!
//! Static list of eyewear frames available for try-on, each with its
//! physical dimensions in millimeters. Assets are decoded once before
//! capture begins; entries that fail to decode are excluded from
//! selection but never abort the session.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One catalog entry before its image has been decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub id: String,
    pub display_name: String,
    pub path: PathBuf,
    /// Physical frame width in millimeters.
    pub width_mm: f64,
    /// Physical frame height in millimeters.
    pub height_mm: f64,
}

/// A loaded, ready-to-composite eyewear asset.
#[derive(Debug, Clone)]
pub struct FrameAsset {
    pub id: String,
    pub display_name: String,
    pub image: RgbaImage,
    pub width_mm: f64,
    pub height_mm: f64,
}

impl FrameAsset {
    /// Build an asset from an already decoded image, e.g. in tests.
    pub fn from_image(
        id: impl Into<String>,
        display_name: impl Into<String>,
        image: RgbaImage,
        width_mm: f64,
        height_mm: f64,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            image,
            width_mm,
            height_mm,
        }
    }

    /// Native height-over-width ratio of the asset image.
    pub fn aspect_ratio(&self) -> f64 {
        self.image.height() as f64 / self.image.width() as f64
    }
}

/// Decode every descriptor, skipping entries whose image cannot be
/// loaded.
pub fn load_catalog(descriptors: &[AssetDescriptor]) -> Vec<FrameAsset> {
    let mut assets = Vec::with_capacity(descriptors.len());
    for desc in descriptors {
        match image::open(&desc.path) {
            Ok(img) => {
                log::info!("loaded eyewear asset {} from {}", desc.id, desc.path.display());
                assets.push(FrameAsset {
                    id: desc.id.clone(),
                    display_name: desc.display_name.clone(),
                    image: img.to_rgba8(),
                    width_mm: desc.width_mm,
                    height_mm: desc.height_mm,
                });
            }
            Err(e) => {
                log::warn!(
                    "skipping eyewear asset {}: failed to load {}: {e}",
                    desc.id,
                    desc.path.display()
                );
            }
        }
    }
    assets
}
