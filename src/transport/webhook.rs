//! HTTP webhook transport.
//!
//! Posts a JSON document per alert. When an HMAC secret is configured the raw
//! body is signed and the signature sent as
//! `X-Vitalwatch-Signature: sha256=<hex>`.

use super::retry::{AttemptError, RetryPolicy, send_with_retry};
use super::{AlertMessage, DeliveryReceipt, NotificationTransport};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;

const NAME: &str = "webhook";

/// Endpoint settings for [`WebhookTransport`].
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Endpoint URL.
    pub url: String,
    /// Optional `Authorization: Bearer` token.
    pub bearer_token: Option<SecretString>,
    /// Optional HMAC-SHA256 signing secret.
    pub hmac_secret: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    id: &'a str,
    kind: super::MessageKind,
    contact: &'a str,
    identity: &'a str,
    heart_rate: u32,
    breathing_rate: u32,
    message: String,
    dispatched_at: DateTime<Utc>,
}

/// Computes the `sha256=<hex>` HMAC signature of `payload`.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the MAC cannot be keyed.
pub fn compute_signature(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|e| Error::OperationFailed {
            operation: "hmac_key".to_string(),
            cause: e.to_string(),
        })?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Posts alerts to an HTTP endpoint.
pub struct WebhookTransport {
    client: reqwest::blocking::Client,
    settings: WebhookSettings,
    retry: RetryPolicy,
}

impl WebhookTransport {
    /// Creates a transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the URL is not http(s), or
    /// [`Error::OperationFailed`] if the HTTP client cannot be built.
    pub fn new(settings: WebhookSettings, retry: RetryPolicy) -> Result<Self> {
        if !(settings.url.starts_with("http://") || settings.url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "webhook url must be http or https: '{}'",
                settings.url
            )));
        }

        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("vitalwatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(retry.timeout())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "build_webhook_client".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self {
            client,
            settings,
            retry,
        })
    }

    fn render(contact: &str, message: &AlertMessage) -> Result<Vec<u8>> {
        let payload = AlertPayload {
            id: &message.id,
            kind: message.kind,
            contact,
            identity: &message.identity,
            heart_rate: message.heart_rate,
            breathing_rate: message.breathing_rate,
            message: message.body(),
            dispatched_at: message.raised_at,
        };
        serde_json::to_vec(&payload).map_err(|e| Error::OperationFailed {
            operation: "serialize_webhook_payload".to_string(),
            cause: e.to_string(),
        })
    }

    fn attempt(
        &self,
        message_id: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> std::result::Result<String, AttemptError> {
        let mut request = self
            .client
            .post(&self.settings.url)
            .header("Content-Type", "application/json")
            .header("X-Vitalwatch-Delivery-Id", message_id);

        if let Some(token) = &self.settings.bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token.expose_secret()));
        }
        if let Some(signature) = signature {
            request = request.header("X-Vitalwatch-Signature", signature);
        }

        let response = request
            .body(body.to_vec())
            .send()
            .map_err(|e| AttemptError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16().to_string())
        } else {
            Err(AttemptError::Status(status.as_u16()))
        }
    }
}

impl NotificationTransport for WebhookTransport {
    fn name(&self) -> &'static str {
        NAME
    }

    fn send(&self, contact: &str, message: &AlertMessage) -> Result<DeliveryReceipt> {
        let body = Self::render(contact, message)?;
        let signature = self
            .settings
            .hmac_secret
            .as_ref()
            .map(|secret| compute_signature(secret.expose_secret(), &body))
            .transpose()?;

        send_with_retry(NAME, &self.retry, || {
            self.attempt(&message.id, &body, signature.as_deref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_format() {
        let signature = compute_signature("secret", b"{}").unwrap();
        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), "sha256=".len() + 64);
        assert_eq!(signature, compute_signature("secret", b"{}").unwrap());
        assert_ne!(signature, compute_signature("other", b"{}").unwrap());
    }

    #[test]
    fn test_payload_fields() {
        let message = AlertMessage::test("Alice", Utc::now());
        let body = WebhookTransport::render("https://pager.example/alice", &message).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["identity"], "Alice");
        assert_eq!(json["contact"], "https://pager.example/alice");
        assert_eq!(json["kind"], "test");
        assert!(json["message"].as_str().unwrap().contains("Alice"));
        assert!(json["dispatched_at"].is_string());
    }

    #[test]
    fn test_rejects_non_http_url() {
        let settings = WebhookSettings {
            url: "ftp://example".to_string(),
            bearer_token: None,
            hmac_secret: None,
        };
        assert!(matches!(
            WebhookTransport::new(settings, RetryPolicy::default()),
            Err(Error::InvalidInput(_))
        ));
    }
}
