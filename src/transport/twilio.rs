//! Twilio SMS transport.

use super::retry::{AttemptError, RetryPolicy, send_with_retry};
use super::{AlertMessage, DeliveryReceipt, NotificationTransport};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

const NAME: &str = "twilio";

/// Default REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// Account settings for [`TwilioTransport`].
#[derive(Debug, Clone)]
pub struct TwilioSettings {
    /// Account SID, also the basic-auth user.
    pub account_sid: String,
    /// Auth token, the basic-auth password.
    pub auth_token: SecretString,
    /// Sending phone number in E.164 form.
    pub from_number: String,
    /// API base URL, overridable for testing against a stub server.
    pub api_base: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

/// Sends alerts as SMS through the Twilio Messages API.
pub struct TwilioTransport {
    client: reqwest::blocking::Client,
    settings: TwilioSettings,
    retry: RetryPolicy,
}

impl TwilioTransport {
    /// Creates a transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a required setting is empty, or
    /// [`Error::OperationFailed`] if the HTTP client cannot be built.
    pub fn new(settings: TwilioSettings, retry: RetryPolicy) -> Result<Self> {
        if settings.account_sid.is_empty()
            || settings.from_number.is_empty()
            || settings.auth_token.expose_secret().is_empty()
        {
            return Err(Error::InvalidInput(
                "twilio transport requires account_sid, auth_token and from_number".to_string(),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("vitalwatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(retry.timeout())
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "build_twilio_client".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self {
            client,
            settings,
            retry,
        })
    }

    /// URL of the account's Messages resource.
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_sid
        )
    }

    fn attempt(&self, contact: &str, body: &str) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.settings.account_sid,
                Some(self.settings.auth_token.expose_secret()),
            )
            .form(&[
                ("To", contact),
                ("From", self.settings.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .map_err(|e| AttemptError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        // A 2xx without a parseable body still means the message was accepted.
        let sid = response
            .json::<MessageResource>()
            .ok()
            .and_then(|resource| resource.sid);
        Ok(sid.unwrap_or_else(|| status.as_u16().to_string()))
    }
}

impl NotificationTransport for TwilioTransport {
    fn name(&self) -> &'static str {
        NAME
    }

    fn send(&self, contact: &str, message: &AlertMessage) -> Result<DeliveryReceipt> {
        let body = message.body();
        send_with_retry(NAME, &self.retry, || self.attempt(contact, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TwilioSettings {
        TwilioSettings {
            account_sid: "AC123".to_string(),
            auth_token: SecretString::from("token".to_string()),
            from_number: "+15550000000".to_string(),
            api_base: "https://example.test/".to_string(),
        }
    }

    #[test]
    fn test_messages_url() {
        let transport = TwilioTransport::new(settings(), RetryPolicy::default()).unwrap();
        assert_eq!(
            transport.messages_url(),
            "https://example.test/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(transport.name(), "twilio");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let mut incomplete = settings();
        incomplete.auth_token = SecretString::from(String::new());
        assert!(matches!(
            TwilioTransport::new(incomplete, RetryPolicy::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unreachable_api_is_transport_error() {
        let mut unreachable = settings();
        unreachable.api_base = "http://127.0.0.1:1".to_string();
        let transport = TwilioTransport::new(
            unreachable,
            RetryPolicy {
                max_retries: 0,
                base_delay_ms: 0,
                timeout_secs: 1,
            },
        )
        .unwrap();
        let message = AlertMessage::test("Bob", chrono::Utc::now());
        let err = transport.send("+15551234567", &message).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
