use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, warn};

use super::{Payload, Target};
use crate::config::{RetryConfig, WebhookConfig};
use crate::error::{Error, Result};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends the payload as JSON to an HTTP endpoint, retrying with backoff.
#[derive(Debug)]
pub struct WebhookTarget {
    client: Client,
    url: String,
    method: Method,
    retry: RetryConfig,
}

impl WebhookTarget {
    /// Create a webhook target.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is not `POST` or `PUT`, or the HTTP
    /// client cannot be built.
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let method = match config.normalized_method().as_str() {
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            _ => {
                return Err(Error::config(format!(
                    "invalid method: {}. Method must be POST or PUT",
                    config.method
                )))
            }
        };

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            method,
            retry: config.retry.clone().with_defaults(),
        })
    }

    /// The HTTP method used for requests.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    fn should_retry(&self, status: StatusCode) -> bool {
        self.retry.retry_on_status.contains(&status.as_u16())
    }

    /// Backoff before the attempt after `attempt`: `initial * 2^(attempt-1)`,
    /// capped at the maximum, with ±25% jitter.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let backoff = (self.retry.initial_delay_ms as f64 * 2f64.powi(exponent))
            .min(self.retry.max_delay_ms as f64);
        let jitter = backoff * 0.25 * rand::rng().random_range(-1.0..=1.0);
        Duration::from_millis((backoff + jitter).max(0.0) as u64)
    }

    async fn send(&self, body: &[u8]) -> std::result::Result<StatusCode, String> {
        self.client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map(|response| response.status())
            .map_err(|e| format!("error making webhook request: {e}"))
    }
}

#[async_trait]
impl Target for WebhookTarget {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn write(&self, payload: &Payload) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let max_attempts = self.retry.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.send(&body).await {
                Ok(status) if status.is_success() => {
                    debug!(attempt, status = status.as_u16(), "webhook delivered");
                    return Ok(());
                }
                Ok(status) => {
                    last_error = format!("request failed with status code: {}", status.as_u16());
                    if !self.should_retry(status) {
                        return Err(Error::target("webhook", last_error));
                    }
                }
                Err(e) => last_error = e,
            }

            if attempt < max_attempts {
                let delay = self.calculate_delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %last_error,
                    "webhook attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(Error::target(
            "webhook",
            format!("request failed after {max_attempts} attempts: {last_error}"),
        ))
    }
}
