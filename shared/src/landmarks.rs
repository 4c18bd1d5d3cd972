//! Facial landmark set with fixed semantic indexing.
//!
//! Landmarks arrive from an external detection model as an ordered
//! sequence of points normalized to `[0, 1]` relative to the image
//! that produced them. The indices below follow the detector's fixed
//! topology; the measurement engine depends on these positions and the
//! set is immutable once attached to a capture.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Left eye outer corner
pub const LEFT_EYE_OUTER: usize = 33;
/// Left eye inner corner
pub const LEFT_EYE_INNER: usize = 133;
/// Left eye upper lid
pub const LEFT_EYE_TOP: usize = 159;
/// Left eye lower lid
pub const LEFT_EYE_BOTTOM: usize = 145;
/// Right eye outer corner
pub const RIGHT_EYE_OUTER: usize = 263;
/// Right eye inner corner
pub const RIGHT_EYE_INNER: usize = 362;
/// Right eye upper lid
pub const RIGHT_EYE_TOP: usize = 386;
/// Right eye lower lid
pub const RIGHT_EYE_BOTTOM: usize = 374;
/// Nose tip
pub const NOSE_TIP: usize = 1;
/// Left cheek edge
pub const LEFT_CHEEK: usize = 234;
/// Right cheek edge
pub const RIGHT_CHEEK: usize = 454;
/// Top of forehead
pub const FOREHEAD_TOP: usize = 10;
/// Bottom of chin
pub const CHIN_BOTTOM: usize = 152;

/// Number of points in the detector's landmark topology.
pub const TOPOLOGY_LEN: usize = 468;

/// A 2D point normalized to `[0, 1]` relative to its source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale into pixel coordinates for an image of the given size.
    pub fn to_pixels(&self, width: usize, height: usize) -> PixelPoint {
        PixelPoint {
            x: self.x * width as f64,
            y: self.y * height as f64,
        }
    }
}

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Error type for landmark set construction.
#[derive(Error, Debug)]
pub enum LandmarkError {
    /// The point sequence does not cover the fixed topology.
    #[error("landmark set has {got} points, topology requires {required}")]
    IncompleteTopology { got: usize, required: usize },
}

/// Ordered, immutable set of normalized facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<NormalizedPoint>,
}

impl LandmarkSet {
    /// Build a landmark set from the detector's ordered point sequence.
    pub fn new(points: Vec<NormalizedPoint>) -> Result<Self, LandmarkError> {
        if points.len() < TOPOLOGY_LEN {
            return Err(LandmarkError::IncompleteTopology {
                got: points.len(),
                required: TOPOLOGY_LEN,
            });
        }
        Ok(Self { points })
    }

    /// Point at a topology index.
    pub fn point(&self, index: usize) -> NormalizedPoint {
        self.points[index]
    }

    /// Left eye center: mean of the four left-eye landmarks.
    pub fn left_eye_center(&self) -> NormalizedPoint {
        self.eye_center([
            LEFT_EYE_OUTER,
            LEFT_EYE_INNER,
            LEFT_EYE_TOP,
            LEFT_EYE_BOTTOM,
        ])
    }

    /// Right eye center: mean of the four right-eye landmarks.
    pub fn right_eye_center(&self) -> NormalizedPoint {
        self.eye_center([
            RIGHT_EYE_OUTER,
            RIGHT_EYE_INNER,
            RIGHT_EYE_TOP,
            RIGHT_EYE_BOTTOM,
        ])
    }

    fn eye_center(&self, indices: [usize; 4]) -> NormalizedPoint {
        let (mut x, mut y) = (0.0, 0.0);
        for idx in indices {
            x += self.points[idx].x;
            y += self.points[idx].y;
        }
        NormalizedPoint::new(x / 4.0, y / 4.0)
    }

    /// Both eye centers in pixel coordinates as `(left, right)`.
    pub fn eye_centers_px(&self, width: usize, height: usize) -> (PixelPoint, PixelPoint) {
        (
            self.left_eye_center().to_pixels(width, height),
            self.right_eye_center().to_pixels(width, height),
        )
    }

    /// Euclidean pixel distance between the two eye outer corners.
    ///
    /// This is the distance the alignment analyzer's subject-distance
    /// estimate is based on; the overlay compositor uses the horizontal
    /// eye-center spread instead.
    pub fn inter_eye_corner_distance_px(&self, width: usize, height: usize) -> f64 {
        let left = self.points[LEFT_EYE_OUTER].to_pixels(width, height);
        let right = self.points[RIGHT_EYE_OUTER].to_pixels(width, height);
        let dx = right.x - left.x;
        let dy = right.y - left.y;
        (dx * dx + dy * dy).sqrt()
    }
}
