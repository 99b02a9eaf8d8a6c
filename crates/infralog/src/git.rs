//! Git context for plan notifications.
//!
//! When `infralog plan` runs inside a CI checkout, the commit that produced
//! the plan is attached to the notification. Every failure here is silent:
//! no git binary or no repository simply means no metadata.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Length of the abbreviated commit SHA shown in messages.
const SHORT_SHA_LEN: usize = 8;

/// Commit information of the working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitMetadata {
    /// `git config user.name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<String>,
    /// Full SHA of `HEAD`.
    pub commit_sha: String,
    /// Current branch name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// URL of the `origin` remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

impl GitMetadata {
    /// Collect metadata for the current directory.
    #[must_use]
    pub fn extract() -> Option<Self> {
        Self::extract_in(Path::new("."))
    }

    /// Collect metadata for the repository containing `dir`.
    ///
    /// Returns `None` when git is not installed or `dir` is not inside a
    /// repository with at least one commit.
    #[must_use]
    pub fn extract_in(dir: &Path) -> Option<Self> {
        let commit_sha = run_git(dir, &["rev-parse", "HEAD"])?;
        Some(Self {
            committer: run_git(dir, &["config", "user.name"]),
            commit_sha,
            branch: run_git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]),
            repo_url: run_git(dir, &["config", "--get", "remote.origin.url"]),
        })
    }

    /// The first eight characters of the commit SHA.
    #[must_use]
    pub fn short_sha(&self) -> &str {
        self.commit_sha
            .get(..SHORT_SHA_LEN)
            .unwrap_or(&self.commit_sha)
    }
}

/// Run a git command, returning trimmed stdout on success.
fn run_git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| debug!(error = %e, "git not available"))
        .ok()?;

    if !output.status.success() {
        debug!(?args, "git command failed");
        return None;
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_short_sha() {
        let meta = GitMetadata {
            commit_sha: "0123456789abcdef0123456789abcdef01234567".to_string(),
            ..GitMetadata::default()
        };
        assert_eq!(meta.short_sha(), "01234567");
    }

    #[test]
    fn test_short_sha_shorter_than_prefix() {
        let meta = GitMetadata {
            commit_sha: "abc".to_string(),
            ..GitMetadata::default()
        };
        assert_eq!(meta.short_sha(), "abc");
    }

    #[test]
    fn test_outside_repository_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(GitMetadata::extract_in(dir.path()).is_none());
    }

    #[test]
    fn test_serialize_skips_missing_fields() {
        let meta = GitMetadata {
            commit_sha: "abc123".to_string(),
            branch: Some("main".to_string()),
            ..GitMetadata::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"commit_sha": "abc123", "branch": "main"}));
    }
}
