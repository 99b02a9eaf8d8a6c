//! Configuration management for infralog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting YAML or TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "infralog";

/// Environment variable naming the configuration file.
pub const CONFIG_FILE_ENV: &str = "INFRALOG_CONFIG_FILE";

/// Prefix for nested environment overrides, e.g. `INFRALOG__POLLING__INTERVAL`.
const NESTED_ENV_PREFIX: &str = "INFRALOG__";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. The `INFRALOG_*` environment variables listed in [`EnvOverride`]
/// 2. Nested environment variables (`INFRALOG__SECTION__KEY`)
/// 3. The config file (YAML when the extension is `.yaml`/`.yml`, TOML otherwise)
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the Terraform state lives.
    pub tfstate: TfStateConfig,
    /// Polling schedule.
    pub polling: PollingConfig,
    /// Notification targets.
    pub target: TargetConfig,
    /// Resource type and output name filters.
    pub filter: FilterConfig,
    /// Last-state persistence.
    pub persistence: PersistenceConfig,
    /// Prometheus endpoint.
    pub metrics: MetricsConfig,
    /// Redaction of sensitive values in notifications.
    pub redact: RedactConfig,
}

/// State backend configuration. Exactly one backend is used; `local` wins
/// when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfStateConfig {
    /// S3 object holding the state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
    /// Local state file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalConfig>,
}

/// S3 backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// Object key of the state file.
    pub key: String,
    /// AWS region; the SDK default chain is used when empty.
    pub region: String,
    /// Custom endpoint for S3-compatible stores (path-style addressing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Local file backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Path to the `.tfstate` file.
    pub path: PathBuf,
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between polls.
    pub interval: u64,
}

/// Notification target configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Generic JSON webhook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
    /// Slack incoming webhook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackConfig>,
    /// Standard output.
    pub stdout: StdoutConfig,
}

/// Webhook target configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Endpoint URL; the target is disabled when empty.
    pub url: String,
    /// HTTP method, `POST` or `PUT`; empty means `POST`.
    pub method: String,
    /// Retry policy.
    pub retry: RetryConfig,
}

/// Retry policy for the webhook target. Zero values mean "use the default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound for the backoff delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Response status codes that trigger a retry.
    pub retry_on_status: Vec<u16>,
}

/// Slack target configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Incoming webhook URL; the target is disabled when empty.
    pub webhook_url: String,
    /// Channel override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Bot username override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Bot icon override, e.g. `:terraform:`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
}

/// Stdout target configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StdoutConfig {
    /// Whether the target is enabled.
    pub enabled: bool,
    /// `text` or `json`; anything else is treated as `text`.
    pub format: String,
}

/// Filters applied before diffing.
///
/// An absent list matches everything; an empty list matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Resource types to watch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<String>>,
    /// Output names to watch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
}

/// Persistence of the last seen state across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// JSON file holding the last state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    /// SQLite database holding the last state and the change history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

/// Prometheus metrics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve `/metrics`.
    pub enabled: bool,
    /// Listen address; `:9090` binds all interfaces.
    pub address: String,
}

/// Redaction of sensitive values before notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactConfig {
    /// Apply redaction at all.
    pub enabled: bool,
    /// Redact outputs Terraform marks as sensitive.
    pub sensitive_outputs: bool,
    /// Extra attribute-name patterns (regex), in addition to the built-ins.
    pub patterns: Vec<String>,
    /// Replacement for redacted values.
    pub placeholder: String,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval: 60 }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            retry_on_status: vec![500, 502, 503, 504],
        }
    }
}

impl Default for StdoutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: "text".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitive_outputs: true,
            patterns: Vec::new(),
            placeholder: "(sensitive)".to_string(),
        }
    }
}

impl RetryConfig {
    /// Replace zero values with the defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.max_attempts == 0 {
            self.max_attempts = defaults.max_attempts;
        }
        if self.initial_delay_ms == 0 {
            self.initial_delay_ms = defaults.initial_delay_ms;
        }
        if self.max_delay_ms == 0 {
            self.max_delay_ms = defaults.max_delay_ms;
        }
        self
    }
}

impl WebhookConfig {
    /// The configured method, upper-cased, with `POST` for empty.
    #[must_use]
    pub fn normalized_method(&self) -> String {
        let method = self.method.trim().to_ascii_uppercase();
        if method.is_empty() {
            "POST".to_string()
        } else {
            method
        }
    }
}

impl FilterConfig {
    /// Whether a resource of this type should be compared.
    #[must_use]
    pub fn matches_resource_type(&self, resource_type: &str) -> bool {
        matches_list(self.resource_types.as_deref(), resource_type)
    }

    /// Whether an output with this name should be compared.
    #[must_use]
    pub fn matches_output(&self, name: &str) -> bool {
        matches_list(self.outputs.as_deref(), name)
    }
}

fn matches_list(list: Option<&[String]>, value: &str) -> bool {
    match list {
        None => true,
        Some(items) => items.iter().any(|item| item == value),
    }
}

impl MetricsConfig {
    /// The address to bind, expanding the `:port` shorthand.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid socket address.
    pub fn listen_address(&self) -> Result<SocketAddr> {
        let address = if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        };
        address
            .parse()
            .map_err(|_| Error::config(format!("invalid metrics address: {}", self.address)))
    }
}

/// Legacy flat environment variables and the setting each one overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvOverride {
    /// `INFRALOG_TARGET_WEBHOOK_URL`
    WebhookUrl,
    /// `INFRALOG_TARGET_WEBHOOK_METHOD`
    WebhookMethod,
    /// `INFRALOG_TARGET_WEBHOOK_RETRY_MAX_ATTEMPTS`
    WebhookRetryMaxAttempts,
    /// `INFRALOG_TARGET_WEBHOOK_RETRY_INITIAL_DELAY_MS`
    WebhookRetryInitialDelay,
    /// `INFRALOG_TARGET_WEBHOOK_RETRY_MAX_DELAY_MS`
    WebhookRetryMaxDelay,
    /// `INFRALOG_TARGET_WEBHOOK_RETRY_RETRY_ON_STATUS`
    WebhookRetryOnStatus,
    /// `INFRALOG_TARGET_SLACK_WEBHOOK_URL`
    SlackWebhookUrl,
    /// `INFRALOG_TARGET_SLACK_CHANNEL`
    SlackChannel,
    /// `INFRALOG_TARGET_SLACK_USERNAME`
    SlackUsername,
    /// `INFRALOG_TARGET_SLACK_ICON_EMOJI`
    SlackIconEmoji,
    /// `INFRALOG_FILTER_RESOURCE_TYPES`
    FilterResourceTypes,
    /// `INFRALOG_FILTER_OUTPUTS`
    FilterOutputs,
}

impl EnvOverride {
    /// Every override, in application order.
    pub const ALL: [Self; 12] = [
        Self::WebhookUrl,
        Self::WebhookMethod,
        Self::WebhookRetryMaxAttempts,
        Self::WebhookRetryInitialDelay,
        Self::WebhookRetryMaxDelay,
        Self::WebhookRetryOnStatus,
        Self::SlackWebhookUrl,
        Self::SlackChannel,
        Self::SlackUsername,
        Self::SlackIconEmoji,
        Self::FilterResourceTypes,
        Self::FilterOutputs,
    ];

    /// The environment variable name.
    #[must_use]
    pub fn var(self) -> &'static str {
        match self {
            Self::WebhookUrl => "INFRALOG_TARGET_WEBHOOK_URL",
            Self::WebhookMethod => "INFRALOG_TARGET_WEBHOOK_METHOD",
            Self::WebhookRetryMaxAttempts => "INFRALOG_TARGET_WEBHOOK_RETRY_MAX_ATTEMPTS",
            Self::WebhookRetryInitialDelay => "INFRALOG_TARGET_WEBHOOK_RETRY_INITIAL_DELAY_MS",
            Self::WebhookRetryMaxDelay => "INFRALOG_TARGET_WEBHOOK_RETRY_MAX_DELAY_MS",
            Self::WebhookRetryOnStatus => "INFRALOG_TARGET_WEBHOOK_RETRY_RETRY_ON_STATUS",
            Self::SlackWebhookUrl => "INFRALOG_TARGET_SLACK_WEBHOOK_URL",
            Self::SlackChannel => "INFRALOG_TARGET_SLACK_CHANNEL",
            Self::SlackUsername => "INFRALOG_TARGET_SLACK_USERNAME",
            Self::SlackIconEmoji => "INFRALOG_TARGET_SLACK_ICON_EMOJI",
            Self::FilterResourceTypes => "INFRALOG_FILTER_RESOURCE_TYPES",
            Self::FilterOutputs => "INFRALOG_FILTER_OUTPUTS",
        }
    }

    /// Apply a raw value. Values that do not parse are ignored.
    fn apply(self, config: &mut Config, value: &str) {
        match self {
            Self::WebhookUrl => config.webhook_mut().url = value.to_string(),
            Self::WebhookMethod => config.webhook_mut().method = value.to_string(),
            Self::WebhookRetryMaxAttempts => {
                if let Ok(n) = value.trim().parse() {
                    config.webhook_mut().retry.max_attempts = n;
                }
            }
            Self::WebhookRetryInitialDelay => {
                if let Ok(n) = value.trim().parse() {
                    config.webhook_mut().retry.initial_delay_ms = n;
                }
            }
            Self::WebhookRetryMaxDelay => {
                if let Ok(n) = value.trim().parse() {
                    config.webhook_mut().retry.max_delay_ms = n;
                }
            }
            Self::WebhookRetryOnStatus => {
                let codes: Vec<u16> = split_list(value)
                    .filter_map(|part| part.parse().ok())
                    .collect();
                if !codes.is_empty() {
                    config.webhook_mut().retry.retry_on_status = codes;
                }
            }
            Self::SlackWebhookUrl => config.slack_mut().webhook_url = value.to_string(),
            Self::SlackChannel => config.slack_mut().channel = Some(value.to_string()),
            Self::SlackUsername => config.slack_mut().username = Some(value.to_string()),
            Self::SlackIconEmoji => config.slack_mut().icon_emoji = Some(value.to_string()),
            Self::FilterResourceTypes => {
                if let Some(list) = non_empty_list(value) {
                    config.filter.resource_types = Some(list);
                }
            }
            Self::FilterOutputs => {
                if let Some(list) = non_empty_list(value) {
                    config.filter.outputs = Some(list);
                }
            }
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|part| !part.is_empty())
}

fn non_empty_list(value: &str) -> Option<Vec<String>> {
    let list: Vec<String> = split_list(value).map(str::to_string).collect();
    (!list.is_empty()).then_some(list)
}

impl Config {
    /// Load configuration from the default file location.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults and environment apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let mut config = Self::figment(&config_file).extract::<Config>()?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// The layered figment for a config file, without the flat overrides.
    fn figment(config_file: &Path) -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if is_yaml(config_file) {
            figment.merge(Yaml::file(config_file))
        } else {
            figment.merge(Toml::file(config_file))
        };
        figment.merge(Env::prefixed(NESTED_ENV_PREFIX).split("__"))
    }

    /// Overlay the flat `INFRALOG_*` variables using the given lookup.
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for over in EnvOverride::ALL {
            if let Some(value) = lookup(over.var()).filter(|v| !v.is_empty()) {
                over.apply(self, &value);
            }
        }
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval == 0 {
            return Err(Error::config("polling.interval must be greater than 0"));
        }

        if let Some(s3) = &self.tfstate.s3 {
            if s3.bucket.is_empty() || s3.key.is_empty() {
                return Err(Error::config("tfstate.s3 requires both bucket and key"));
            }
        }

        if let Some(webhook) = self.target.webhook.as_ref().filter(|w| !w.url.is_empty()) {
            let method = webhook.normalized_method();
            if method != "POST" && method != "PUT" {
                return Err(Error::config(format!(
                    "invalid webhook method: {}. Method must be POST or PUT",
                    webhook.method
                )));
            }
        }

        if self.persistence.state_file.is_some() && self.persistence.database.is_some() {
            return Err(Error::config(
                "persistence.state_file and persistence.database are mutually exclusive",
            ));
        }

        if self.metrics.enabled {
            self.metrics.listen_address()?;
        }

        for pattern in &self.redact.patterns {
            if regex::Regex::new(pattern).is_err() {
                return Err(Error::config(format!("invalid regex pattern: {pattern}")));
            }
        }

        Ok(())
    }

    /// Get the polling interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval)
    }

    fn webhook_mut(&mut self) -> &mut WebhookConfig {
        self.target.webhook.get_or_insert_with(WebhookConfig::default)
    }

    fn slack_mut(&mut self) -> &mut SlackConfig {
        self.target.slack.get_or_insert_with(SlackConfig::default)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}
