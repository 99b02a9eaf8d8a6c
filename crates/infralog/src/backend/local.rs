use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{Backend, Source};
use crate::error::{Error, Result};

/// Reads the state from a file on disk.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    /// Create a backend for the given state file.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn source(&self) -> Source {
        Source::Local {
            path: self.path.clone(),
        }
    }

    async fn fetch_state(&self) -> Result<Vec<u8>> {
        debug!(path = %self.path.display(), "reading state file");
        tokio::fs::read(&self.path).await.map_err(|e| {
            Error::backend(
                "local",
                format!("failed to read state file {}: {e}", self.path.display()),
            )
        })
    }
}
