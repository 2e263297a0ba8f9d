//! Data models for vitalwatch.
//!
//! Everything here is plain data passed by value between pipeline stages.
//! The only long-lived records are [`EnrolledIdentity`] values, which are owned
//! by the gallery.

mod dispatch;
mod frame;
mod identity;
mod vitals;

pub use dispatch::{AlertEvent, DispatchOutcome, NotDispatchedReason};
pub use frame::{FaceRegion, Frame};
pub use identity::{EnrolledIdentity, FaceEncoding, FaceObservation, ResolutionResult};
pub use vitals::{RangeStatus, Verdict, VitalAssessment, VitalReading};
