//! RGBA frame type and the frame-source abstraction.
//!
//! Frames are stored as ndarray `Array3<u8>` with shape
//! `(height, width, 4)` in RGBA channel order. Conversions to and from
//! the image crate's `RgbaImage` are provided for asset compositing
//! and PNG export.

use image::RgbaImage;
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Timestamp represented as seconds and nanoseconds since an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds component
    pub seconds: u64,
    /// Nanoseconds component (0-999,999,999)
    pub nanos: u64,
}

impl Timestamp {
    /// Create a new timestamp
    pub fn new(seconds: u64, nanos: u64) -> Self {
        Self { seconds, nanos }
    }

    /// Create a timestamp from a Duration since epoch
    pub fn from_duration(duration: Duration) -> Self {
        let total_nanos = duration.as_nanos();
        let seconds = (total_nanos / 1_000_000_000) as u64;
        let nanos = (total_nanos % 1_000_000_000) as u64;
        Self { seconds, nanos }
    }

    /// Create a timestamp from milliseconds since epoch
    pub fn from_millis(millis: u64) -> Self {
        Self::from_duration(Duration::from_millis(millis))
    }

    /// Convert to Duration
    pub fn to_duration(&self) -> Duration {
        Duration::new(self.seconds, self.nanos as u32)
    }

    /// Elapsed time since an earlier timestamp, saturating at zero.
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        self.to_duration().saturating_sub(earlier.to_duration())
    }

    /// Timestamp offset forward by a duration.
    pub fn advanced_by(&self, offset: Duration) -> Timestamp {
        Self::from_duration(self.to_duration() + offset)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Error type for frame construction and acquisition.
#[derive(Error, Debug)]
pub enum FrameSourceError {
    /// Camera permission was denied by the platform or user.
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    /// Camera device is missing or busy.
    #[error("camera unavailable: {0}")]
    Unavailable(String),

    /// A frame could not be read from the device.
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),

    /// Pixel buffer does not have RGBA layout.
    #[error("invalid frame layout: expected 4 channels, got {0}")]
    InvalidLayout(usize),
}

/// Result type for frame operations
pub type FrameResult<T> = Result<T, FrameSourceError>;

/// A raw RGBA pixel frame with its capture timestamp.
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    data: Array3<u8>,
    /// Timestamp when the frame was captured
    pub timestamp: Timestamp,
}

impl RgbaFrame {
    /// Create a frame from raw pixel data with shape `(height, width, 4)`.
    pub fn new(data: Array3<u8>, timestamp: Timestamp) -> FrameResult<Self> {
        let channels = data.dim().2;
        if channels != 4 {
            return Err(FrameSourceError::InvalidLayout(channels));
        }
        Ok(Self { data, timestamp })
    }

    /// Create a frame by evaluating a pixel function at every `(x, y)`.
    pub fn from_fn<F>(width: usize, height: usize, timestamp: Timestamp, f: F) -> Self
    where
        F: Fn(usize, usize) -> [u8; 4],
    {
        let data = Array3::from_shape_fn((height, width, 4), |(y, x, c)| f(x, y)[c]);
        Self { data, timestamp }
    }

    /// Create a uniformly filled frame.
    pub fn filled(width: usize, height: usize, rgba: [u8; 4], timestamp: Timestamp) -> Self {
        Self::from_fn(width, height, timestamp, |_, _| rgba)
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    /// RGBA value at pixel `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        [
            self.data[[y, x, 0]],
            self.data[[y, x, 1]],
            self.data[[y, x, 2]],
            self.data[[y, x, 3]],
        ]
    }

    /// View of the underlying pixel array, shape `(height, width, 4)`.
    pub fn data(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// Convert an image crate RGBA buffer into a frame.
    pub fn from_rgba_image(img: &RgbaImage, timestamp: Timestamp) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let data = Array3::from_shape_fn((height, width, 4), |(y, x, c)| {
            img.get_pixel(x as u32, y as u32).0[c]
        });
        Self { data, timestamp }
    }

    /// Convert to an image crate RGBA buffer for compositing or I/O.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let (height, width, _) = self.data.dim();
        let mut img = RgbaImage::new(width as u32, height as u32);
        for y in 0..height {
            for x in 0..width {
                img.put_pixel(x as u32, y as u32, image::Rgba(self.pixel(x, y)));
            }
        }
        img
    }
}

/// Source of live frames for the capture loop.
///
/// Camera acquisition is an external collaborator; the pipeline only
/// consumes frames through this seam. Backed by real hardware in
/// production and by synthetic frames in tests.
pub trait FrameSource {
    /// Capture the next frame.
    fn capture_frame(&mut self) -> FrameResult<RgbaFrame>;

    /// Sensor dimensions as `(width, height)` in pixels.
    fn dimensions(&self) -> (usize, usize);
}
