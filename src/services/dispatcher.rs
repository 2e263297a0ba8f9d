//! Alert dispatch.
//!
//! Decides whether an (identity, reading) pair warrants a notification and, if
//! so, sends it and records the cooldown. The decision rule, in order:
//!
//! 1. Unknown face: `NoIdentity`
//! 2. Identity without a contact: `NoContact`
//! 3. Normal vitals: `VitalsNormal`
//! 4. Alerted within the cooldown window: `Suppressed`
//! 5. Send. Success records the dispatch; failure returns `TransportError`
//!    and leaves the cooldown untouched, so the next critical reading retries.
//!
//! # Per-identity gate
//!
//! Steps 4 and 5 run while holding a per-identity async mutex. A second
//! evaluation for the same identity waits until the first has either recorded
//! its dispatch or failed, so it can never observe a stale cooldown and send a
//! duplicate. Evaluations for different identities do not contend.

use crate::models::{
    AlertEvent, DispatchOutcome, NotDispatchedReason, ResolutionResult, VitalReading,
};
use crate::services::{CooldownTracker, classify};
use crate::storage::sqlite::acquire_lock;
use crate::transport::{AlertMessage, NotificationTransport};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;

/// Orchestrates classification, cooldown and transport for each evaluation.
pub struct AlertDispatcher {
    transport: Arc<dyn NotificationTransport>,
    cooldown: Arc<CooldownTracker>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// An alert that passed steps 1 to 4 and holds its identity's gate.
///
/// Dropping it without calling [`deliver`](Self::deliver) releases the gate
/// without sending or recording anything.
#[must_use = "dropping a pending dispatch abandons the alert"]
pub struct PendingDispatch {
    event: AlertEvent,
    transport: Arc<dyn NotificationTransport>,
    cooldown: Arc<CooldownTracker>,
    _gate: OwnedMutexGuard<()>,
}

impl AlertDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(transport: Arc<dyn NotificationTransport>, cooldown: CooldownTracker) -> Self {
        Self {
            transport,
            cooldown: Arc::new(cooldown),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cooldown tracker.
    #[must_use]
    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// Returns the transport name.
    #[must_use]
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Evaluates one pair and, if warranted, sends the alert.
    ///
    /// The send runs on the blocking thread pool; this future completes once
    /// the send and the cooldown update have finished.
    pub async fn evaluate(
        &self,
        resolution: &ResolutionResult,
        reading: &VitalReading,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        let pending = match self.prepare(resolution, reading, now).await {
            Ok(pending) => pending,
            Err(reason) => return DispatchOutcome::NotDispatched(reason),
        };

        match tokio::task::spawn_blocking(move || pending.deliver()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "dispatch task failed");
                record_outcome_metric(NotDispatchedReason::TransportError.as_str());
                DispatchOutcome::NotDispatched(NotDispatchedReason::TransportError)
            },
        }
    }

    /// Runs steps 1 to 4 and acquires the identity's gate.
    ///
    /// Waits if another dispatch for the same identity is in flight.
    ///
    /// # Errors
    ///
    /// Returns the reason no alert should be sent.
    pub async fn prepare(
        &self,
        resolution: &ResolutionResult,
        reading: &VitalReading,
        now: DateTime<Utc>,
    ) -> Result<PendingDispatch, NotDispatchedReason> {
        let result = self.check(resolution, reading, now).await;
        if let Err(reason) = &result {
            record_outcome_metric(reason.as_str());
            tracing::debug!(
                identity = resolution.display_name(),
                reason = %reason,
                "alert not dispatched"
            );
        }
        result
    }

    async fn check(
        &self,
        resolution: &ResolutionResult,
        reading: &VitalReading,
        now: DateTime<Utc>,
    ) -> Result<PendingDispatch, NotDispatchedReason> {
        let identity = resolution
            .identity()
            .ok_or(NotDispatchedReason::NoIdentity)?;
        let contact = identity.contact().ok_or(NotDispatchedReason::NoContact)?;

        if !classify(reading).is_critical() {
            return Err(NotDispatchedReason::VitalsNormal);
        }

        let gate = self.gate_for(&identity.name).lock_owned().await;

        if self.cooldown.should_suppress(&identity.name, now) {
            return Err(NotDispatchedReason::Suppressed);
        }

        Ok(PendingDispatch {
            event: AlertEvent {
                identity: identity.name.clone(),
                contact: contact.to_string(),
                heart_rate: reading.heart_rate,
                breathing_rate: reading.breathing_rate,
                dispatched_at: now,
            },
            transport: Arc::clone(&self.transport),
            cooldown: Arc::clone(&self.cooldown),
            _gate: gate,
        })
    }

    fn gate_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = acquire_lock(&self.gates);
        Arc::clone(gates.entry(name.to_string()).or_default())
    }
}

impl PendingDispatch {
    /// The alert this dispatch will send.
    #[must_use]
    pub const fn event(&self) -> &AlertEvent {
        &self.event
    }

    /// Sends the alert and records the cooldown on success. Blocks.
    pub fn deliver(self) -> DispatchOutcome {
        let message = AlertMessage::emergency(&self.event);
        let start = Instant::now();
        let result = self.transport.send(&self.event.contact, &message);

        let transport = self.transport.name();
        metrics::histogram!(
            "vitalwatch_transport_duration_ms",
            "transport" => transport
        )
        .record(start.elapsed().as_secs_f64() * 1000.0);

        let outcome = match result {
            Ok(receipt) => {
                self.cooldown
                    .record_dispatch(&self.event.identity, self.event.dispatched_at);
                tracing::info!(
                    identity = %self.event.identity,
                    contact = %self.event.contact,
                    heart_rate = self.event.heart_rate,
                    breathing_rate = self.event.breathing_rate,
                    transport,
                    attempts = receipt.attempts,
                    reference = ?receipt.reference,
                    "emergency alert dispatched"
                );
                DispatchOutcome::Dispatched(self.event)
            },
            Err(e) => {
                tracing::warn!(
                    identity = %self.event.identity,
                    transport,
                    error = %e,
                    "emergency alert failed, cooldown not recorded"
                );
                DispatchOutcome::NotDispatched(NotDispatchedReason::TransportError)
            },
        };

        record_outcome_metric(outcome.label());
        outcome
    }
}

fn record_outcome_metric(outcome: &'static str) {
    metrics::counter!("vitalwatch_dispatch_total", "outcome" => outcome).increment(1);
}
