//! Frames and detected face regions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single frame from the frame source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number, starting at 0.
    pub index: u64,
    /// Capture time.
    pub captured_at: DateTime<Utc>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw image bytes. Empty for recordings that carry pre-extracted features.
    pub data: Vec<u8>,
}

impl Frame {
    /// Creates a frame without pixel data.
    #[must_use]
    pub const fn empty(index: u64, captured_at: DateTime<Utc>, width: u32, height: u32) -> Self {
        Self {
            index,
            captured_at,
            width,
            height,
            data: Vec::new(),
        }
    }
}

/// Bounding box of a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceRegion {
    /// Position of the region within its frame's detection list.
    #[serde(default)]
    pub id: usize,
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FaceRegion {
    /// Creates a new region.
    #[must_use]
    pub const fn new(id: usize, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true if the region lies entirely within the frame.
    #[must_use]
    pub const fn fits_within(&self, frame: &Frame) -> bool {
        self.x.saturating_add(self.width) <= frame.width
            && self.y.saturating_add(self.height) <= frame.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_fits_within_frame() {
        let frame = Frame::empty(0, Utc::now(), 640, 480);
        assert!(FaceRegion::new(0, 10, 10, 100, 100).fits_within(&frame));
        assert!(FaceRegion::new(0, 540, 380, 100, 100).fits_within(&frame));
        assert!(!FaceRegion::new(0, 600, 10, 100, 100).fits_within(&frame));
        assert!(!FaceRegion::new(0, u32::MAX, 0, 1, 1).fits_within(&frame));
    }
}
