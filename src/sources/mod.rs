//! Frame, detection, extraction and vitals collaborators.
//!
//! The monitoring loop only talks to these traits. Two implementations ship
//! with the crate:
//!
//! - [`replay`]: a JSON Lines recording that backs all four traits at once
//! - [`simulated`]: random vitals in the style of a bench simulator

pub mod replay;
pub mod simulated;

pub use replay::{Replay, ReplayDetector, ReplayExtractor, ReplayFrameSource, ReplayVitals};
pub use simulated::SimulatedVitalsSource;

use crate::Result;
use crate::models::{FaceEncoding, FaceRegion, Frame, VitalReading};

/// Produces frames in capture order.
pub trait FrameSource: Send {
    /// Returns the next frame, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if this frame could not be read. Later calls may still
    /// succeed.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Finds face regions in a frame.
pub trait FaceDetector: Send {
    /// Returns the face regions in `frame`, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns an error if detection fails for the frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>>;
}

/// Computes an identity encoding for a face region.
pub trait FeatureExtractor: Send {
    /// Extracts the encoding of `region` in `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ExtractionFailed`] if no encoding can be computed.
    fn extract(&mut self, frame: &Frame, region: &FaceRegion) -> Result<FaceEncoding>;
}

/// Reads vital signs for a face region.
pub trait VitalsSource: Send {
    /// Reads the vitals of the person in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::VitalsUnavailable`] if no reading is available.
    fn read(&mut self, region: &FaceRegion, frame: &Frame) -> Result<VitalReading>;
}
