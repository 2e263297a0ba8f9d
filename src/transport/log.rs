//! Transport that only logs.

use super::{AlertMessage, DeliveryReceipt, NotificationTransport};
use crate::Result;

/// Writes alerts to the log instead of delivering them.
///
/// This is the default transport, so an unconfigured install never contacts
/// anyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl NotificationTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send(&self, contact: &str, message: &AlertMessage) -> Result<DeliveryReceipt> {
        tracing::warn!(
            target: "vitalwatch::alert",
            contact,
            identity = %message.identity,
            heart_rate = message.heart_rate,
            breathing_rate = message.breathing_rate,
            message_id = %message.id,
            body = %message.body(),
            "alert (log transport, not delivered)"
        );
        Ok(DeliveryReceipt {
            transport: self.name(),
            attempts: 1,
            duration_ms: 0,
            reference: Some(message.id.clone()),
        })
    }
}
