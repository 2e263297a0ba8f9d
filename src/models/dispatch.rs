//! Alert dispatch results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record of an alert that was handed to the transport successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Name of the identity the alert is about.
    pub identity: String,
    /// Contact the alert was sent to.
    pub contact: String,
    /// Heart rate that triggered the alert.
    pub heart_rate: u32,
    /// Breathing rate that triggered the alert.
    pub breathing_rate: u32,
    /// Dispatch time (the evaluation's `now`).
    pub dispatched_at: DateTime<Utc>,
}

/// Why an evaluation did not send an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotDispatchedReason {
    /// The face was not resolved to an enrolled identity.
    NoIdentity,
    /// The identity has no emergency contact.
    NoContact,
    /// The vitals were normal.
    VitalsNormal,
    /// An alert was sent for this identity within the cooldown window.
    Suppressed,
    /// The transport failed to deliver the alert.
    TransportError,
}

impl NotDispatchedReason {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoIdentity => "no_identity",
            Self::NoContact => "no_contact",
            Self::VitalsNormal => "vitals_normal",
            Self::Suppressed => "suppressed",
            Self::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for NotDispatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of evaluating one (identity, reading) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The alert was delivered and the cooldown recorded.
    Dispatched(AlertEvent),
    /// No alert was delivered.
    NotDispatched(NotDispatchedReason),
}

impl DispatchOutcome {
    /// Returns true if an alert was delivered.
    #[must_use]
    pub const fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched(_))
    }

    /// Returns the reason if no alert was delivered.
    #[must_use]
    pub const fn reason(&self) -> Option<NotDispatchedReason> {
        match self {
            Self::Dispatched(_) => None,
            Self::NotDispatched(reason) => Some(*reason),
        }
    }

    /// Label used for metrics and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Dispatched(_) => "dispatched",
            Self::NotDispatched(reason) => reason.as_str(),
        }
    }
}
