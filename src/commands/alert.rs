//! Test alerts and transport construction.
//!
//! HTTP transports use blocking clients, which must not be created or driven
//! on an async worker thread.

use super::open_gallery;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use vitalwatch::config::{TransportConfig, VitalwatchConfig};
use vitalwatch::transport::{self, AlertMessage, NotificationTransport};

/// Builds the configured transport on the blocking pool.
pub(super) async fn build_transport(
    config: &TransportConfig,
) -> anyhow::Result<Arc<dyn NotificationTransport>> {
    let config = config.clone();
    let transport = tokio::task::spawn_blocking(move || transport::from_config(&config))
        .await
        .context("transport setup task failed")??;
    Ok(transport)
}

/// Test-alert command.
pub async fn cmd_test_alert(config: VitalwatchConfig, name: String) -> anyhow::Result<()> {
    let gallery = open_gallery(&config)?;
    let identity = gallery.lookup(&name);
    gallery.close()?;

    let identity = identity.with_context(|| format!("no identity named '{name}' is enrolled"))?;
    let contact = identity
        .contact()
        .map(str::to_string)
        .with_context(|| format!("'{name}' has no emergency contact"))?;

    let transport = build_transport(&config.transport).await?;
    let message = AlertMessage::test(identity.name, Utc::now());
    let target = contact.clone();
    let receipt = tokio::task::spawn_blocking(move || transport.send(&target, &message))
        .await
        .context("send task failed")??;

    println!(
        "Test alert sent to {contact} via {} ({} attempt(s), {} ms){}",
        receipt.transport,
        receipt.attempts,
        receipt.duration_ms,
        receipt
            .reference
            .map_or_else(String::new, |r| format!(", reference {r}"))
    );
    Ok(())
}
