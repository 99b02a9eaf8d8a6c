//! Terraform state backends.
//!
//! A backend fetches the raw bytes of the current state document. Exactly
//! one backend is active; see [`from_config`].

mod local;
mod s3;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TfStateConfig;
use crate::error::{Error, Result};

pub use local::LocalBackend;
pub use s3::S3Backend;

/// Where a state or plan came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    /// An S3 object.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Region, empty when taken from the environment.
        region: String,
    },
    /// A state file on disk.
    Local {
        /// Path to the file.
        path: PathBuf,
    },
    /// A plan file passed to `infralog plan`.
    Plan {
        /// Path to the file.
        path: PathBuf,
    },
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 { bucket, key, .. } => write!(f, "s3://{bucket}/{key}"),
            Self::Local { path } | Self::Plan { path } => write!(f, "file://{}", path.display()),
        }
    }
}

/// A source of Terraform state.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Where the state is read from.
    fn source(&self) -> Source;

    /// Fetch the raw state document.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be retrieved.
    async fn fetch_state(&self) -> Result<Vec<u8>>;
}

/// Build the configured backend. A local backend wins over S3.
///
/// # Errors
///
/// Returns a configuration error when no backend is configured.
pub fn from_config(config: &TfStateConfig) -> Result<Box<dyn Backend>> {
    if let Some(local) = config.local.as_ref().filter(|l| !l.path.as_os_str().is_empty()) {
        return Ok(Box::new(LocalBackend::new(local.path.clone())));
    }
    if let Some(s3) = config.s3.as_ref().filter(|s| !s.bucket.is_empty()) {
        return Ok(Box::new(S3Backend::new(s3.clone())));
    }
    Err(Error::config(
        "no backend configured. Configure either tfstate.s3 or tfstate.local",
    ))
}
