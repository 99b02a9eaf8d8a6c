//! Error types for infralog.
//!
//! This module defines all error types used throughout the infralog crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for infralog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === State and Plan Errors ===
    /// A Terraform state document could not be parsed.
    #[error("failed to parse state: {0}")]
    StateParse(#[source] serde_json::Error),

    /// A Terraform plan document could not be parsed or is incomplete.
    #[error("failed to parse plan: {message}")]
    PlanParse {
        /// Description of what went wrong.
        message: String,
    },

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path of the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Backend Errors ===
    /// A state backend failed to produce the state.
    #[error("{name} backend failed: {message}")]
    Backend {
        /// Name of the backend.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === Target Errors ===
    /// A notification target could not be built or failed to deliver.
    #[error("{name} target failed: {message}")]
    Target {
        /// Name of the target.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// An HTTP request could not be sent.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // === Persistence Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The persisted state file could not be read or written.
    #[error("state persistence failed for {path}: {message}")]
    Persistence {
        /// Path of the state file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Metrics Errors ===
    /// The metrics endpoint could not be bound.
    #[error("failed to start metrics server on {address}: {source}")]
    MetricsServer {
        /// Address the server tried to bind.
        address: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Documentation Errors ===
    /// The documentation tree could not be scanned.
    #[error("documentation error: {0}")]
    Docs(#[from] infralog_docs::DocsError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for infralog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a plan parsing error.
    #[must_use]
    pub fn plan(message: impl Into<String>) -> Self {
        Self::PlanParse {
            message: message.into(),
        }
    }

    /// Create a backend error.
    #[must_use]
    pub fn backend(name: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            name,
            message: message.into(),
        }
    }

    /// Create a target error.
    #[must_use]
    pub fn target(name: &'static str, message: impl Into<String>) -> Self {
        Self::Target {
            name,
            message: message.into(),
        }
    }

    /// Create a persistence error for the given state file.
    #[must_use]
    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a configuration problem.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad(_) | Self::ConfigValidation { .. })
    }

    /// Check if retrying the operation could succeed.
    ///
    /// Transport failures and timeouts are transient; malformed documents and
    /// configuration problems are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            Self::Timeout { .. } | Self::Backend { .. } => true,
            _ => false,
        }
    }
}
