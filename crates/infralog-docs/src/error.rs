//! Error types for loading sidebars and documentation trees.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading sidebar definitions or documentation sources.
#[derive(Error, Debug)]
pub enum DocsError {
    /// The documentation directory could not be read.
    #[error("failed to read documentation directory {path}: {source}")]
    ReadDir {
        /// Directory being scanned.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A sidebar definition was not valid JSON for the sidebar schema.
    #[error("invalid sidebar definition: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for documentation operations.
pub type Result<T> = std::result::Result<T, DocsError>;
