//! Notification targets.
//!
//! Every configured target receives the same [`Payload`]. Targets are
//! independent: the poller keeps notifying the remaining ones when one fails.

mod payload;
mod slack;
mod stdout;
mod webhook;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::{StdoutConfig, TargetConfig};
use crate::error::Result;

pub use payload::{Payload, PayloadKind, PayloadMetadata};
pub use slack::SlackTarget;
pub use stdout::{OutputFormat, StdoutTarget};
pub use webhook::WebhookTarget;

/// A destination for change notifications.
#[async_trait]
pub trait Target: Send + Sync {
    /// Short target name, used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Deliver the payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be delivered.
    async fn write(&self, payload: &Payload) -> Result<()>;
}

/// Build the configured targets.
///
/// Webhook and Slack are enabled by a non-empty URL, stdout by its flag.
/// With nothing configured, changes are printed to stdout as text.
///
/// # Errors
///
/// Returns an error if a target's configuration is invalid.
pub fn build_targets(config: &TargetConfig) -> Result<Vec<Box<dyn Target>>> {
    let mut targets: Vec<Box<dyn Target>> = Vec::new();

    if let Some(webhook) = config.webhook.as_ref().filter(|w| !w.url.is_empty()) {
        targets.push(Box::new(WebhookTarget::new(webhook)?));
    }
    if let Some(slack) = config.slack.as_ref().filter(|s| !s.webhook_url.is_empty()) {
        targets.push(Box::new(SlackTarget::new(slack)?));
    }
    if config.stdout.enabled {
        targets.push(Box::new(StdoutTarget::new(&config.stdout)));
    }

    if targets.is_empty() {
        info!("no targets configured, printing changes to stdout");
        targets.push(Box::new(StdoutTarget::new(&StdoutConfig::default())));
    }

    Ok(targets)
}

/// Render a value for humans: strings without quotes, `(none)` when absent.
pub(crate) fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "(none)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Serve `app` on an ephemeral local port, returning its base URL.
#[cfg(test)]
pub(crate) async fn spawn_test_server(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
