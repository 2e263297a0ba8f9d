//! Transport double that records calls.

use super::{AlertMessage, DeliveryReceipt, NotificationTransport};
use crate::storage::sqlite::acquire_lock;
use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A message captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Contact the message was addressed to.
    pub contact: String,
    /// The message.
    pub message: AlertMessage,
}

/// Records every send and fails on demand.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<VecDeque<String>>,
    delay: Option<Duration>,
}

impl RecordingTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send block for `delay` before completing.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes the next send fail with `cause`. Queued failures are consumed in order.
    pub fn fail_next(&self, cause: impl Into<String>) {
        acquire_lock(&self.failures).push_back(cause.into());
    }

    /// Returns every attempted send, including failed ones.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        acquire_lock(&self.sent).clone()
    }

    /// Returns the number of attempted sends.
    #[must_use]
    pub fn send_count(&self) -> usize {
        acquire_lock(&self.sent).len()
    }
}

impl NotificationTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn send(&self, contact: &str, message: &AlertMessage) -> Result<DeliveryReceipt> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        acquire_lock(&self.sent).push(SentMessage {
            contact: contact.to_string(),
            message: message.clone(),
        });

        if let Some(cause) = acquire_lock(&self.failures).pop_front() {
            return Err(Error::Transport {
                transport: self.name().to_string(),
                cause,
            });
        }

        Ok(DeliveryReceipt {
            transport: self.name(),
            attempts: 1,
            duration_ms: 0,
            reference: None,
        })
    }
}
