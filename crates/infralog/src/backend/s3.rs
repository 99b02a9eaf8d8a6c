use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{Backend, Source};
use crate::config::S3Config;
use crate::error::{Error, Result};

/// Upper bound for one state download.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads the state from an S3 object.
///
/// The SDK client is built on first use and reused for later polls.
#[derive(Debug)]
pub struct S3Backend {
    config: S3Config,
    client: OnceCell<Client>,
}

impl S3Backend {
    /// Create a backend for the given bucket and key.
    #[must_use]
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client.get_or_init(|| self.build_client()).await
    }

    async fn build_client(&self) -> Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if !self.config.region.is_empty() {
            loader = loader.region(aws_config::Region::new(self.config.region.clone()));
        }
        if let Some(endpoint) = &self.config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        // S3-compatible stores behind a custom endpoint need path-style URLs.
        if self.config.endpoint.is_some() {
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build();
            return Client::from_conf(s3_config);
        }

        Client::new(&sdk_config)
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let output = self
            .client()
            .await
            .get_object()
            .bucket(&self.config.bucket)
            .key(&self.config.key)
            .send()
            .await
            .map_err(|e| {
                Error::backend("s3", format!("failed to download state: {}", error_chain(&e)))
            })?;

        let body = output.body.collect().await.map_err(|e| {
            Error::backend("s3", format!("failed to read state body: {}", error_chain(&e)))
        })?;

        Ok(body.into_bytes().to_vec())
    }
}

#[async_trait]
impl Backend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn source(&self) -> Source {
        Source::S3 {
            bucket: self.config.bucket.clone(),
            key: self.config.key.clone(),
            region: self.config.region.clone(),
        }
    }

    async fn fetch_state(&self) -> Result<Vec<u8>> {
        debug!(bucket = %self.config.bucket, key = %self.config.key, "downloading state");
        tokio::time::timeout(FETCH_TIMEOUT, self.download())
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("download of s3://{}/{}", self.config.bucket, self.config.key),
            })?
    }
}

/// Walk the error source chain and join all messages.
fn error_chain(err: &dyn StdError) -> String {
    let mut msgs = vec![err.to_string()];
    let mut source = err.source();
    while let Some(s) = source {
        msgs.push(s.to_string());
        source = s.source();
    }
    msgs.join(": ")
}
