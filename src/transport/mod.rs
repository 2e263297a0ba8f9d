//! Notification transports.
//!
//! A [`NotificationTransport`] delivers one [`AlertMessage`] to one contact.
//! Sends are blocking; the dispatcher runs them on the blocking thread pool.
//!
//! | Transport | Contact | Notes |
//! |-----------|---------|-------|
//! | [`LogTransport`] | anything | default, never delivers |
//! | [`TwilioTransport`] | E.164 phone number | SMS |
//! | [`WebhookTransport`] | passed through in the payload | JSON POST, optional HMAC |
//! | [`RecordingTransport`] | anything | test double |

mod log;
mod message;
mod recording;
pub mod retry;
mod twilio;
mod webhook;

pub use log::LogTransport;
pub use message::{AlertMessage, MessageKind};
pub use recording::{RecordingTransport, SentMessage};
pub use retry::RetryPolicy;
pub use twilio::{DEFAULT_API_BASE, TwilioSettings, TwilioTransport};
pub use webhook::{WebhookSettings, WebhookTransport, compute_signature};

use crate::Result;
use crate::config::{TransportConfig, TransportKind};
use std::sync::Arc;

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Name of the transport that delivered the message.
    pub transport: &'static str,
    /// Number of attempts made.
    pub attempts: u32,
    /// Total time spent, including retries.
    pub duration_ms: u64,
    /// Provider reference (message SID, HTTP status, ...).
    pub reference: Option<String>,
}

/// Delivers alert messages to contacts.
pub trait NotificationTransport: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Sends `message` to `contact`, blocking until delivered or failed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] if the message could not be delivered.
    fn send(&self, contact: &str, message: &AlertMessage) -> Result<DeliveryReceipt>;
}

/// Builds the transport selected by configuration.
///
/// # Errors
///
/// Returns an error if the selected transport is missing required settings.
pub fn from_config(config: &TransportConfig) -> Result<Arc<dyn NotificationTransport>> {
    let retry = config.retry;
    let transport: Arc<dyn NotificationTransport> = match config.kind {
        TransportKind::Log => Arc::new(LogTransport),
        TransportKind::Twilio => Arc::new(TwilioTransport::new(config.twilio_settings()?, retry)?),
        TransportKind::Webhook => {
            Arc::new(WebhookTransport::new(config.webhook_settings()?, retry)?)
        },
    };
    tracing::debug!(transport = transport.name(), "notification transport ready");
    Ok(transport)
}
