//! Identity types: encodings, enrolled identities and resolution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-length face feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceEncoding(Vec<f64>);

impl FaceEncoding {
    /// Creates a new encoding from raw values.
    #[must_use]
    pub const fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    /// Returns the values as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Returns true if every component is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Consumes the encoding and returns the raw values.
    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FaceEncoding {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// A person enrolled in the gallery.
///
/// `name` is the unique key. An empty contact string is normalized to `None`
/// so that "no contact" has a single representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledIdentity {
    /// Unique name.
    pub name: String,
    /// Reference face encoding.
    pub encoding: FaceEncoding,
    /// Emergency contact address (phone number, URL, ...).
    pub emergency_contact: Option<String>,
    /// When the identity was enrolled, if the store recorded it.
    pub enrolled_at: Option<DateTime<Utc>>,
}

impl EnrolledIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        encoding: impl Into<FaceEncoding>,
        emergency_contact: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            encoding: encoding.into(),
            emergency_contact: normalize_contact(emergency_contact),
            enrolled_at: None,
        }
    }

    /// Sets the enrollment timestamp.
    #[must_use]
    pub const fn with_enrolled_at(mut self, enrolled_at: DateTime<Utc>) -> Self {
        self.enrolled_at = Some(enrolled_at);
        self
    }

    /// Returns the contact if one is set and non-blank.
    #[must_use]
    pub fn contact(&self) -> Option<&str> {
        self.emergency_contact
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

fn normalize_contact(contact: Option<String>) -> Option<String> {
    contact
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Encoding extracted from a face region in a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    /// Extracted encoding.
    pub encoding: FaceEncoding,
    /// Capture time of the frame the face was seen in.
    pub frame_timestamp: DateTime<Utc>,
}

impl FaceObservation {
    /// Creates a new observation.
    #[must_use]
    pub fn new(encoding: impl Into<FaceEncoding>, frame_timestamp: DateTime<Utc>) -> Self {
        Self {
            encoding: encoding.into(),
            frame_timestamp,
        }
    }
}

/// Outcome of matching an observation against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    /// The observation matched an enrolled identity.
    Identified {
        /// The matched identity.
        identity: EnrolledIdentity,
        /// Distance between the observation and the identity's encoding.
        distance: f64,
    },
    /// No identity cleared the acceptance threshold.
    Unknown,
}

impl ResolutionResult {
    /// Returns the identity if one was matched.
    #[must_use]
    pub const fn identity(&self) -> Option<&EnrolledIdentity> {
        match self {
            Self::Identified { identity, .. } => Some(identity),
            Self::Unknown => None,
        }
    }

    /// Returns the matched name, or `"Unknown"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.identity().map_or("Unknown", |i| i.name.as_str())
    }

    /// Returns true if no identity was matched.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for ResolutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identified { identity, distance } => {
                write!(f, "{} (distance {distance:.4})", identity.name)
            },
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_contact_is_absent() {
        let identity = EnrolledIdentity::new("Bob", vec![0.0], Some("   ".to_string()));
        assert_eq!(identity.emergency_contact, None);
        assert_eq!(identity.contact(), None);

        let identity = EnrolledIdentity::new("Bob", vec![0.0], Some(" +15551234567 ".to_string()));
        assert_eq!(identity.contact(), Some("+15551234567"));
    }

    #[test]
    fn test_encoding_finiteness() {
        assert!(FaceEncoding::new(vec![0.1, -2.0]).is_finite());
        assert!(!FaceEncoding::new(vec![0.1, f64::NAN]).is_finite());
        assert!(!FaceEncoding::new(vec![f64::INFINITY]).is_finite());
    }

    #[test]
    fn test_resolution_display_name() {
        let identity = EnrolledIdentity::new("Alice", vec![1.0], None);
        let resolved = ResolutionResult::Identified {
            identity,
            distance: 0.0,
        };
        assert_eq!(resolved.display_name(), "Alice");
        assert!(!resolved.is_unknown());
        assert_eq!(ResolutionResult::Unknown.display_name(), "Unknown");
        assert_eq!(resolved.to_string(), "Alice (distance 0.0000)");
    }
}
