//! Vital-sign readings and their classification results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A heart-rate and breathing-rate sample for one face in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalReading {
    /// Heart rate in beats per minute.
    pub heart_rate: u32,
    /// Breathing rate in breaths per minute.
    pub breathing_rate: u32,
    /// When the reading was taken.
    pub observed_at: DateTime<Utc>,
}

impl VitalReading {
    /// Creates a new reading.
    #[must_use]
    pub const fn new(heart_rate: u32, breathing_rate: u32, observed_at: DateTime<Utc>) -> Self {
        Self {
            heart_rate,
            breathing_rate,
            observed_at,
        }
    }
}

/// Normal/critical classification of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Both dimensions are within their acceptable ranges.
    Normal,
    /// At least one dimension is out of range.
    Critical,
}

impl Verdict {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Critical => "critical",
        }
    }

    /// Returns true for [`Verdict::Critical`].
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a single value sits relative to its acceptable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeStatus {
    /// Below the lower bound.
    Low,
    /// Within the closed range.
    InRange,
    /// Above the upper bound.
    High,
}

impl RangeStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::InRange => "in range",
            Self::High => "high",
        }
    }
}

/// Per-dimension breakdown behind a [`Verdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalAssessment {
    /// Overall verdict.
    pub verdict: Verdict,
    /// Heart-rate position.
    pub heart_rate: RangeStatus,
    /// Breathing-rate position.
    pub breathing_rate: RangeStatus,
}
