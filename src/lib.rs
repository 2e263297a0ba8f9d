//! # Vitalwatch
//!
//! Identity-bound vital-sign monitoring with rate-limited emergency alerts.
//!
//! Vitalwatch watches a stream of frames, resolves each detected face against an
//! enrolled gallery, classifies the vital signs observed for that face, and sends
//! an emergency notification to the identity's contact when the vitals turn
//! critical. Repeated alerts for the same person are suppressed for a cooldown
//! window.
//!
//! ## Pipeline
//!
//! ```text
//! FrameSource -> FaceDetector -> FeatureExtractor -> IdentityResolver
//!                            \-> VitalsSource ----> classify -> AlertDispatcher
//!                                                                  |
//!                                                 CooldownTracker <-+-> NotificationTransport
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use vitalwatch::services::{AlertDispatcher, CooldownTracker, IdentityGallery, IdentityResolver};
//! use vitalwatch::storage::SqliteIdentityStore;
//!
//! let store = SqliteIdentityStore::open("faces.db")?;
//! let gallery = Arc::new(IdentityGallery::load(Box::new(store), 128)?);
//! let resolver = IdentityResolver::new(Arc::clone(&gallery), ResolverConfig::default());
//! let dispatcher = AlertDispatcher::new(transport, CooldownTracker::new(Duration::from_secs(60)));
//!
//! let resolution = resolver.resolve(Some(&observation));
//! let outcome = dispatcher.evaluate(&resolution, &reading, now).await;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod sources;
pub mod storage;
pub mod transport;

pub use config::VitalwatchConfig;
pub use models::{
    AlertEvent, DispatchOutcome, EnrolledIdentity, FaceEncoding, FaceObservation,
    NotDispatchedReason, ResolutionResult, Verdict, VitalReading,
};
pub use services::{
    AlertDispatcher, CooldownTracker, IdentityGallery, IdentityResolver, MonitoringLoop, classify,
};
pub use storage::{IdentityStore, InMemoryIdentityStore, SqliteIdentityStore};
pub use transport::NotificationTransport;

/// Error type for vitalwatch operations.
///
/// | Variant | Raised When | Fatal |
/// |---------|-------------|-------|
/// | `InvalidInput` | Bad CLI arguments, invalid config values, wrong encoding length on enroll | no |
/// | `OperationFailed` | I/O and database failures after startup | no |
/// | `EnrollmentMalformed` | A stored identity record cannot be decoded | no, record skipped |
/// | `ExtractionFailed` | The feature extractor cannot encode a face region | no, face is unknown |
/// | `VitalsUnavailable` | The vitals source has no reading for a face | no, face skipped |
/// | `Transport` | A notification could not be delivered | no, retried next cycle |
/// | `StoreUnavailable` | The identity store cannot be opened or read at startup | yes |
/// | `FrameSourceUnavailable` | The frame source cannot be opened at startup | yes |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A stored identity record is malformed.
    #[error("malformed enrollment for '{name}': {reason}")]
    EnrollmentMalformed {
        /// Name of the identity whose record is malformed.
        name: String,
        /// Why the record was rejected.
        reason: String,
    },

    /// Feature extraction failed for a face region.
    #[error("feature extraction failed: {0}")]
    ExtractionFailed(String),

    /// No vital reading is available for a face region.
    #[error("vitals unavailable: {0}")]
    VitalsUnavailable(String),

    /// The notification transport failed to deliver a message.
    #[error("transport '{transport}' failed: {cause}")]
    Transport {
        /// Name of the transport.
        transport: String,
        /// The underlying cause.
        cause: String,
    },

    /// The identity store could not be acquired.
    #[error("identity store unavailable: {0}")]
    StoreUnavailable(String),

    /// The frame source could not be acquired.
    #[error("frame source unavailable: {0}")]
    FrameSourceUnavailable(String),
}

impl Error {
    /// Returns true for errors that must stop the process before monitoring starts.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::FrameSourceUnavailable(_)
        )
    }
}

/// Result type alias for vitalwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::EnrollmentMalformed {
            name: "Bob".to_string(),
            reason: "expected 128 dimensions, found 3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed enrollment for 'Bob': expected 128 dimensions, found 3"
        );

        let err = Error::Transport {
            transport: "twilio".to_string(),
            cause: "HTTP 503 response".to_string(),
        };
        assert_eq!(err.to_string(), "transport 'twilio' failed: HTTP 503 response");
    }

    #[test]
    fn test_only_startup_acquisition_is_fatal() {
        assert!(Error::StoreUnavailable("locked".to_string()).is_fatal());
        assert!(Error::FrameSourceUnavailable("missing".to_string()).is_fatal());
        assert!(!Error::ExtractionFailed("blurry".to_string()).is_fatal());
        assert!(!Error::VitalsUnavailable("no sensor".to_string()).is_fatal());
        assert!(
            !Error::Transport {
                transport: "log".to_string(),
                cause: "x".to_string()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_current_timestamp_is_after_epoch() {
        assert!(current_timestamp() > 0);
    }
}
