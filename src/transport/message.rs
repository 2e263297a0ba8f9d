//! Alert message content.

use crate::models::AlertEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a message is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Critical vitals for a monitored identity.
    Emergency,
    /// Operator-initiated check of the delivery path.
    Test,
}

/// Message handed to a [`NotificationTransport`](super::NotificationTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    /// Unique id, sent to HTTP endpoints for idempotency.
    pub id: String,
    /// Message kind.
    pub kind: MessageKind,
    /// Name of the identity the alert is about.
    pub identity: String,
    /// Heart rate in BPM.
    pub heart_rate: u32,
    /// Breathing rate in breaths per minute.
    pub breathing_rate: u32,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

impl AlertMessage {
    /// Creates an emergency message for a dispatch decision.
    #[must_use]
    pub fn emergency(event: &AlertEvent) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            kind: MessageKind::Emergency,
            identity: event.identity.clone(),
            heart_rate: event.heart_rate,
            breathing_rate: event.breathing_rate,
            raised_at: event.dispatched_at,
        }
    }

    /// Creates a test message for `identity`.
    #[must_use]
    pub fn test(identity: impl Into<String>, raised_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            kind: MessageKind::Test,
            identity: identity.into(),
            heart_rate: 0,
            breathing_rate: 0,
            raised_at,
        }
    }

    /// Renders the human-readable text.
    #[must_use]
    pub fn body(&self) -> String {
        match self.kind {
            MessageKind::Emergency => format!(
                "EMERGENCY ALERT\n\n{} is in critical condition!\n\nVital Signs:\n\
                 - Heart Rate: {} BPM\n- Breathing Rate: {} BPM\n\n\
                 Immediate medical attention required. Please call emergency services.",
                self.identity, self.heart_rate, self.breathing_rate
            ),
            MessageKind::Test => format!(
                "Vitalwatch test alert for {}. This contact will receive emergency \
                 notifications if their vital signs become critical. No action is needed.",
                self.identity
            ),
        }
    }
}
