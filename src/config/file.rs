//! On-disk configuration format.
//!
//! Every field is optional; anything left out keeps its default.
//!
//! ```toml
//! data_dir = "/var/lib/vitalwatch"
//!
//! [gallery]
//! encoding_dimensions = 128
//!
//! [resolver]
//! metric = "euclidean"
//! threshold = 0.6
//!
//! [alerts]
//! cooldown_secs = 60
//!
//! [transport]
//! kind = "twilio"
//! account_sid = "AC..."
//! auth_token = "${TWILIO_AUTH_TOKEN}"
//! from_number = "+15550100"
//! ```

use super::TransportKind;
use crate::observability::LogFormat;
use crate::services::DistanceMetric;
use serde::{Deserialize, Serialize};

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Gallery section.
    pub gallery: Option<ConfigFileGallery>,
    /// Resolver section.
    pub resolver: Option<ConfigFileResolver>,
    /// Alerts section.
    pub alerts: Option<ConfigFileAlerts>,
    /// Monitor section.
    pub monitor: Option<ConfigFileMonitor>,
    /// Transport section.
    pub transport: Option<ConfigFileTransport>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// `[gallery]` section.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileGallery {
    /// Identity database path.
    pub db_path: Option<String>,
    /// Length of every face encoding.
    pub encoding_dimensions: Option<usize>,
}

/// `[resolver]` section.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileResolver {
    /// Distance metric.
    pub metric: Option<DistanceMetric>,
    /// Acceptance threshold.
    pub threshold: Option<f64>,
    /// Tie tolerance.
    pub tie_tolerance: Option<f64>,
}

/// `[alerts]` section.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileAlerts {
    /// Cooldown window in seconds.
    pub cooldown_secs: Option<u64>,
    /// Run sends off the monitoring loop.
    pub background_dispatch: Option<bool>,
    /// Grace period for in-flight sends at shutdown.
    pub shutdown_grace_secs: Option<u64>,
}

/// `[monitor]` section.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileMonitor {
    /// Target frame rate.
    pub fps: Option<u32>,
    /// Consecutive frame errors tolerated.
    pub max_consecutive_frame_errors: Option<u32>,
}

/// `[transport]` section.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileTransport {
    /// Transport kind.
    pub kind: Option<TransportKind>,
    /// Twilio account SID.
    pub account_sid: Option<String>,
    /// Twilio auth token.
    pub auth_token: Option<String>,
    /// Twilio sending number.
    pub from_number: Option<String>,
    /// Twilio API base URL.
    pub api_base: Option<String>,
    /// Webhook URL.
    pub url: Option<String>,
    /// Webhook bearer token.
    pub bearer_token: Option<String>,
    /// Webhook HMAC secret.
    pub hmac_secret: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: Option<u64>,
    /// Retries after the first attempt.
    pub max_retries: Option<u32>,
    /// First retry delay.
    pub base_delay_ms: Option<u64>,
}

/// `[logging]` section.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<LogFormat>,
    /// Append logs to this file instead of stderr.
    pub file: Option<String>,
    /// Filter directive.
    pub level: Option<String>,
}

/// `[metrics]` section.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileMetrics {
    /// Install the Prometheus exporter.
    pub enabled: Option<bool>,
    /// Exporter listen port.
    pub port: Option<u16>,
}
