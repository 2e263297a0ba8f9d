//! Configuration management.
//!
//! Configuration is resolved in this order, later sources winning:
//!
//! 1. Built-in defaults
//! 2. The TOML file named by `--config`, else `VITALWATCH_CONFIG_PATH`, else
//!    `<config_dir>/vitalwatch/config.toml` if it exists
//! 3. `VITALWATCH_*` environment overrides
//!
//! Transport strings may reference environment variables as `${NAME}`. They are
//! expanded when the transport is built, so a secret never has to be written to
//! the file itself.

mod file;

pub use file::{
    ConfigFile, ConfigFileAlerts, ConfigFileGallery, ConfigFileLogging, ConfigFileMetrics,
    ConfigFileMonitor, ConfigFileResolver, ConfigFileTransport,
};

use crate::observability::LogFormat;
use crate::services::{DistanceMetric, MonitorConfig, ResolverConfig};
use crate::transport::{DEFAULT_API_BASE, RetryPolicy, TwilioSettings, WebhookSettings};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "VITALWATCH_CONFIG_PATH";

const REDACTED: &str = "***REDACTED***";

/// Main configuration for vitalwatch.
#[derive(Debug, Clone)]
pub struct VitalwatchConfig {
    /// Directory for the identity database and other state.
    pub data_dir: PathBuf,
    /// Identity gallery settings.
    pub gallery: GalleryConfig,
    /// Matching parameters.
    pub resolver: ResolverConfig,
    /// Alert dispatch settings.
    pub alerts: AlertsConfig,
    /// Monitoring loop settings.
    pub monitor: MonitorSettings,
    /// Notification transport settings.
    pub transport: TransportConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
    /// File the configuration was loaded from, if any.
    pub source: Option<PathBuf>,
}

/// Identity gallery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryConfig {
    /// `SQLite` identity database.
    pub db_path: PathBuf,
    /// Length every encoding must have.
    pub encoding_dimensions: usize,
}

/// Alert dispatch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertsConfig {
    /// Minimum time between two alerts for the same person.
    pub cooldown: Duration,
    /// Run sends off the monitoring loop.
    pub background_dispatch: bool,
    /// How long to wait for in-flight sends at shutdown.
    pub shutdown_grace: Duration,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown: crate::services::DEFAULT_COOLDOWN,
            background_dispatch: false,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Monitoring loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Target frame rate; 0 is unpaced.
    pub fps: u32,
    /// Consecutive frame errors tolerated before stopping.
    pub max_consecutive_frame_errors: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            fps: 0,
            max_consecutive_frame_errors: 30,
        }
    }
}

/// Which notification transport to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Log alerts only.
    #[default]
    Log,
    /// Twilio SMS.
    Twilio,
    /// HTTP webhook.
    Webhook,
}

impl TransportKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Twilio => "twilio",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification transport settings.
///
/// Only the fields of the selected [`TransportKind`] are required.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Selected transport.
    pub kind: TransportKind,
    /// Twilio account SID.
    pub account_sid: Option<String>,
    /// Twilio auth token.
    pub auth_token: Option<SecretString>,
    /// Twilio sending number.
    pub from_number: Option<String>,
    /// Twilio API base URL.
    pub api_base: String,
    /// Webhook endpoint.
    pub url: Option<String>,
    /// Webhook bearer token.
    pub bearer_token: Option<SecretString>,
    /// Webhook HMAC secret.
    pub hmac_secret: Option<SecretString>,
    /// Retry and timeout policy for HTTP transports.
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base: DEFAULT_API_BASE.to_string(),
            url: None,
            bearer_token: None,
            hmac_secret: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Builds Twilio settings, expanding `${VAR}` references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a required field is missing or
    /// references an unset variable.
    pub fn twilio_settings(&self) -> Result<TwilioSettings> {
        let account_sid = required("transport.account_sid", self.account_sid.as_deref())?;
        let auth_token = required_secret("transport.auth_token", self.auth_token.as_ref())?;
        let from_number = required("transport.from_number", self.from_number.as_deref())?;
        Ok(TwilioSettings {
            account_sid,
            auth_token,
            from_number,
            api_base: expand_env(&self.api_base)?,
        })
    }

    /// Builds webhook settings, expanding `${VAR}` references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the URL is missing or a field
    /// references an unset variable.
    pub fn webhook_settings(&self) -> Result<WebhookSettings> {
        Ok(WebhookSettings {
            url: required("transport.url", self.url.as_deref())?,
            bearer_token: optional_secret(self.bearer_token.as_ref())?,
            hmac_secret: optional_secret(self.hmac_secret.as_ref())?,
        })
    }

    fn validate(&self) -> Result<()> {
        match self.kind {
            TransportKind::Log => Ok(()),
            TransportKind::Twilio => self.twilio_settings().map(|_| ()),
            TransportKind::Webhook => self.webhook_settings().map(|_| ()),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// Filter directive used when no environment filter is set.
    pub level: Option<String>,
}

/// Metrics settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Install the Prometheus exporter.
    pub enabled: bool,
    /// Exporter listen port.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Default for VitalwatchConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            gallery: GalleryConfig {
                db_path: data_dir.join("faces.db"),
                encoding_dimensions: 128,
            },
            data_dir,
            resolver: ResolverConfig::default(),
            alerts: AlertsConfig::default(),
            monitor: MonitorSettings::default(),
            transport: TransportConfig::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
            source: None,
        }
    }
}

impl VitalwatchConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads, overrides and validates the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file cannot be read or parsed, an override
    /// does not parse, or the result fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default()?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let mut config = Self::from_config_file(file);
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir first, then `~/.config/vitalwatch/`.
    /// Returns defaults if neither holds a `config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Self> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };

        let candidates = [
            base_dirs.config_dir().join("vitalwatch").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("vitalwatch")
                .join("config.toml"),
        ];
        match candidates.iter().find(|path| path.exists()) {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Converts a `ConfigFile` to `VitalwatchConfig`.
    #[must_use]
    pub fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        config.gallery.db_path = config.data_dir.join("faces.db");

        if let Some(gallery) = file.gallery {
            if let Some(db_path) = gallery.db_path {
                config.gallery.db_path = PathBuf::from(db_path);
            }
            if let Some(dimensions) = gallery.encoding_dimensions {
                config.gallery.encoding_dimensions = dimensions;
            }
        }

        if let Some(resolver) = file.resolver {
            let metric = resolver.metric.unwrap_or_default();
            config.resolver = ResolverConfig::for_metric(metric);
            if let Some(threshold) = resolver.threshold {
                config.resolver.threshold = threshold;
            }
            if let Some(tolerance) = resolver.tie_tolerance {
                config.resolver.tie_tolerance = tolerance;
            }
        }

        if let Some(alerts) = file.alerts {
            if let Some(secs) = alerts.cooldown_secs {
                config.alerts.cooldown = Duration::from_secs(secs);
            }
            if let Some(v) = alerts.background_dispatch {
                config.alerts.background_dispatch = v;
            }
            if let Some(secs) = alerts.shutdown_grace_secs {
                config.alerts.shutdown_grace = Duration::from_secs(secs);
            }
        }

        if let Some(monitor) = file.monitor {
            if let Some(fps) = monitor.fps {
                config.monitor.fps = fps;
            }
            if let Some(max) = monitor.max_consecutive_frame_errors {
                config.monitor.max_consecutive_frame_errors = max;
            }
        }

        if let Some(transport) = file.transport {
            let t = &mut config.transport;
            if let Some(kind) = transport.kind {
                t.kind = kind;
            }
            t.account_sid = transport.account_sid;
            t.auth_token = transport.auth_token.map(SecretString::from);
            t.from_number = transport.from_number;
            if let Some(api_base) = transport.api_base {
                t.api_base = api_base;
            }
            t.url = transport.url;
            t.bearer_token = transport.bearer_token.map(SecretString::from);
            t.hmac_secret = transport.hmac_secret.map(SecretString::from);
            if let Some(v) = transport.timeout_secs {
                t.retry.timeout_secs = v;
            }
            if let Some(v) = transport.max_retries {
                t.retry.max_retries = v;
            }
            if let Some(v) = transport.base_delay_ms {
                t.retry.base_delay_ms = v;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = format;
            }
            config.logging.file = logging.file.map(PathBuf::from);
            config.logging.level = logging.level;
        }

        if let Some(metrics) = file.metrics {
            if let Some(enabled) = metrics.enabled {
                config.metrics.enabled = enabled;
            }
            if let Some(port) = metrics.port {
                config.metrics.port = port;
            }
        }

        config
    }

    /// Applies `VITALWATCH_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a numeric or boolean override does not parse.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("VITALWATCH_COOLDOWN_SECS") {
            let secs = parse_env::<u64>("VITALWATCH_COOLDOWN_SECS", &value)?;
            self.alerts.cooldown = Duration::from_secs(secs);
        }
        if let Some(value) = lookup("VITALWATCH_MATCH_THRESHOLD") {
            self.resolver.threshold = parse_env::<f64>("VITALWATCH_MATCH_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("VITALWATCH_TWILIO_ACCOUNT_SID") {
            self.transport.account_sid = Some(value);
        }
        if let Some(value) = lookup("VITALWATCH_TWILIO_AUTH_TOKEN") {
            self.transport.auth_token = Some(SecretString::from(value));
        }
        if let Some(value) = lookup("VITALWATCH_TWILIO_FROM") {
            self.transport.from_number = Some(value);
        }
        if let Some(value) = lookup("VITALWATCH_METRICS_ENABLED") {
            self.metrics.enabled = parse_bool("VITALWATCH_METRICS_ENABLED", &value)?;
        }
        Ok(())
    }

    /// Checks the configuration for values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.gallery.encoding_dimensions == 0 {
            return Err(invalid("gallery.encoding_dimensions must be greater than 0"));
        }
        let threshold = self.resolver.threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(invalid(&format!(
                "resolver.threshold must be finite and positive, got {threshold}"
            )));
        }
        let tolerance = self.resolver.tie_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(invalid(&format!(
                "resolver.tie_tolerance must be finite and non-negative, got {tolerance}"
            )));
        }
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port must be set when metrics are enabled"));
        }
        self.transport.validate()
    }

    /// Monitoring loop parameters.
    #[must_use]
    pub const fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            fps: self.monitor.fps,
            max_consecutive_frame_errors: self.monitor.max_consecutive_frame_errors,
            background_dispatch: self.alerts.background_dispatch,
            shutdown_grace: self.alerts.shutdown_grace,
        }
    }

    /// Renders the effective configuration as TOML with secrets replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if serialization fails.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let redact = |secret: Option<&SecretString>| secret.map(|_| REDACTED.to_string());
        let t = &self.transport;
        let file = ConfigFile {
            data_dir: Some(self.data_dir.display().to_string()),
            gallery: Some(ConfigFileGallery {
                db_path: Some(self.gallery.db_path.display().to_string()),
                encoding_dimensions: Some(self.gallery.encoding_dimensions),
            }),
            resolver: Some(ConfigFileResolver {
                metric: Some(self.resolver.metric),
                threshold: Some(self.resolver.threshold),
                tie_tolerance: Some(self.resolver.tie_tolerance),
            }),
            alerts: Some(ConfigFileAlerts {
                cooldown_secs: Some(self.alerts.cooldown.as_secs()),
                background_dispatch: Some(self.alerts.background_dispatch),
                shutdown_grace_secs: Some(self.alerts.shutdown_grace.as_secs()),
            }),
            monitor: Some(ConfigFileMonitor {
                fps: Some(self.monitor.fps),
                max_consecutive_frame_errors: Some(self.monitor.max_consecutive_frame_errors),
            }),
            transport: Some(ConfigFileTransport {
                kind: Some(t.kind),
                account_sid: t.account_sid.clone(),
                auth_token: redact(t.auth_token.as_ref()),
                from_number: t.from_number.clone(),
                api_base: Some(t.api_base.clone()),
                url: t.url.clone(),
                bearer_token: redact(t.bearer_token.as_ref()),
                hmac_secret: redact(t.hmac_secret.as_ref()),
                timeout_secs: Some(t.retry.timeout_secs),
                max_retries: Some(t.retry.max_retries),
                base_delay_ms: Some(t.retry.base_delay_ms),
            }),
            logging: Some(ConfigFileLogging {
                format: Some(self.logging.format),
                file: self.logging.file.as_ref().map(|p| p.display().to_string()),
                level: self.logging.level.clone(),
            }),
            metrics: Some(ConfigFileMetrics {
                enabled: Some(self.metrics.enabled),
                port: Some(self.metrics.port),
            }),
        };
        toml::to_string_pretty(&file).map_err(|e| Error::OperationFailed {
            operation: "serialize_config".to_string(),
            cause: e.to_string(),
        })
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".vitalwatch"),
        |dirs| dirs.data_dir().join("vitalwatch"),
    )
}

fn invalid(message: &str) -> Error {
    Error::InvalidInput(message.to_string())
}

fn required(field: &str, value: Option<&str>) -> Result<String> {
    let value = value.map(expand_env).transpose()?.unwrap_or_default();
    if value.trim().is_empty() {
        return Err(invalid(&format!("{field} is required for the selected transport")));
    }
    Ok(value)
}

fn required_secret(field: &str, value: Option<&SecretString>) -> Result<SecretString> {
    optional_secret(value)?
        .filter(|secret| !secret.expose_secret().trim().is_empty())
        .ok_or_else(|| invalid(&format!("{field} is required for the selected transport")))
}

fn optional_secret(value: Option<&SecretString>) -> Result<Option<SecretString>> {
    value
        .map(|secret| expand_env(secret.expose_secret()).map(SecretString::from))
        .transpose()
}

fn expand_env(value: &str) -> Result<String> {
    expand_env_with(value, |name| std::env::var(name).ok())
}

/// Replaces every `${NAME}` in `value` with the result of `lookup(NAME)`.
///
/// An unterminated `${` is kept literally.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a referenced variable is not set.
pub fn expand_env_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        let name = &rest[start + 2..start + 2 + len];
        let replacement = lookup(name).ok_or_else(|| {
            invalid(&format!(
                "environment variable {name} referenced in configuration is not set"
            ))
        })?;
        out.push_str(&rest[..start]);
        out.push_str(&replacement);
        rest = &rest[start + 3 + len..];
    }
    out.push_str(rest);
    Ok(out)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| invalid(&format!("{key}={value}: {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(&format!("{key}={value}: expected a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use test_case::test_case;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn parse(toml: &str) -> VitalwatchConfig {
        VitalwatchConfig::from_config_file(toml::from_str(toml).unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = VitalwatchConfig::default();
        assert_eq!(config.gallery.encoding_dimensions, 128);
        assert_eq!(config.gallery.db_path, config.data_dir.join("faces.db"));
        assert_eq!(config.alerts.cooldown, Duration::from_secs(60));
        assert_eq!(config.resolver.metric, DistanceMetric::Euclidean);
        assert!((config.resolver.threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.transport.kind, TransportKind::Log);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = parse(
            r#"
            data_dir = "/srv/vw"

            [resolver]
            metric = "cosine"

            [alerts]
            cooldown_secs = 120
            background_dispatch = true

            [monitor]
            fps = 15

            [logging]
            format = "json"
            "#,
        );
        assert_eq!(config.gallery.db_path, PathBuf::from("/srv/vw/faces.db"));
        assert_eq!(config.resolver.metric, DistanceMetric::Cosine);
        assert!((config.resolver.threshold - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.alerts.cooldown, Duration::from_secs(120));
        assert!(config.monitor_config().background_dispatch);
        assert_eq!(config.monitor_config().fps, 15);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gallery]\nencoding_dimensions = 4").unwrap();
        let config = VitalwatchConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.gallery.encoding_dimensions, 4);
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gallery\n").unwrap();
        let err = VitalwatchConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "parse_config_file"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = VitalwatchConfig::default();
        config
            .apply_env_overrides(lookup(&[
                ("VITALWATCH_COOLDOWN_SECS", "5"),
                ("VITALWATCH_MATCH_THRESHOLD", "0.45"),
                ("VITALWATCH_METRICS_ENABLED", "yes"),
                ("VITALWATCH_TWILIO_FROM", "+15550100"),
            ]))
            .unwrap();
        assert_eq!(config.alerts.cooldown, Duration::from_secs(5));
        assert!((config.resolver.threshold - 0.45).abs() < f64::EPSILON);
        assert!(config.metrics.enabled);
        assert_eq!(config.transport.from_number.as_deref(), Some("+15550100"));
    }

    #[test_case("VITALWATCH_COOLDOWN_SECS", "soon" ; "cooldown")]
    #[test_case("VITALWATCH_MATCH_THRESHOLD", "close" ; "threshold")]
    #[test_case("VITALWATCH_METRICS_ENABLED", "maybe" ; "metrics")]
    fn test_bad_env_override(key: &str, value: &str) {
        let mut config = VitalwatchConfig::default();
        let result = config.apply_env_overrides(lookup(&[(key, value)]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(-0.5 ; "negative")]
    #[test_case(f64::NAN ; "nan")]
    #[test_case(f64::INFINITY ; "infinite")]
    fn test_invalid_threshold(threshold: f64) {
        let mut config = VitalwatchConfig::default();
        config.resolver.threshold = threshold;
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut config = VitalwatchConfig::default();
        config.gallery.encoding_dimensions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_twilio_requires_credentials() {
        let mut config = parse("[transport]\nkind = \"twilio\"\naccount_sid = \"AC1\"");
        assert!(config.validate().is_err());

        config
            .apply_env_overrides(lookup(&[
                ("VITALWATCH_TWILIO_AUTH_TOKEN", "token"),
                ("VITALWATCH_TWILIO_FROM", "+15550100"),
            ]))
            .unwrap();
        assert!(config.validate().is_ok());
        let settings = config.transport.twilio_settings().unwrap();
        assert_eq!(settings.account_sid, "AC1");
        assert_eq!(settings.auth_token.expose_secret(), "token");
    }

    #[test]
    fn test_webhook_requires_url() {
        let config = parse("[transport]\nkind = \"webhook\"");
        assert!(config.validate().is_err());
        let config = parse("[transport]\nkind = \"webhook\"\nurl = \"https://hooks.example.com/a\"");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_env() {
        let vars = lookup(&[("TOKEN", "s3cret"), ("HOST", "example.com")]);
        assert_eq!(
            expand_env_with("https://${HOST}/x?t=${TOKEN}", &vars).unwrap(),
            "https://example.com/x?t=s3cret"
        );
        assert_eq!(expand_env_with("plain", &vars).unwrap(), "plain");
        assert_eq!(expand_env_with("open ${TOKEN", &vars).unwrap(), "open ${TOKEN");
        assert!(expand_env_with("${MISSING}", &vars).is_err());
    }

    #[test]
    fn test_redacted_toml_hides_secrets() {
        let config = parse(
            "[transport]\nkind = \"webhook\"\nurl = \"https://h.example.com\"\nhmac_secret = \"topsecret\"",
        );
        let rendered = config.to_redacted_toml().unwrap();
        assert!(rendered.contains(REDACTED));
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("https://h.example.com"));

        let reparsed: ConfigFile = toml::from_str(&rendered).unwrap();
        assert_eq!(
            reparsed.transport.and_then(|t| t.kind),
            Some(TransportKind::Webhook)
        );
    }
}
