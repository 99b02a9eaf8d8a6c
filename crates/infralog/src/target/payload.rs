use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::Source;
use crate::config::TfStateConfig;
use crate::git::GitMetadata;
use crate::tfstate::StateDiff;

/// Whether changes come from polling state or from a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Drift between two state snapshots.
    #[default]
    State,
    /// Changes proposed by `terraform plan`.
    Plan,
}

/// Context sent along with the changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    /// State or plan.
    pub kind: PayloadKind,
    /// Where the changes were read from.
    pub source: Source,
    /// Backend configuration for state payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfstate: Option<TfStateConfig>,
    /// When the changes were detected.
    pub timestamp: DateTime<Utc>,
    /// Commit that produced a plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitMetadata>,
}

/// What every target receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// The detected changes.
    pub diffs: StateDiff,
    /// Context about the changes.
    pub metadata: PayloadMetadata,
}

impl Payload {
    /// Payload for drift detected by polling.
    #[must_use]
    pub fn state(diffs: StateDiff, source: Source, tfstate: TfStateConfig) -> Self {
        Self {
            diffs,
            metadata: PayloadMetadata {
                kind: PayloadKind::State,
                source,
                tfstate: Some(tfstate),
                timestamp: Utc::now(),
                git: None,
            },
        }
    }

    /// Payload for changes from a plan file.
    #[must_use]
    pub fn plan(diffs: StateDiff, source: Source, git: Option<GitMetadata>) -> Self {
        Self {
            diffs,
            metadata: PayloadMetadata {
                kind: PayloadKind::Plan,
                source,
                tfstate: None,
                timestamp: Utc::now(),
                git,
            },
        }
    }

    /// Replace the detection time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.metadata.timestamp = timestamp;
        self
    }

    /// Detection time as `2006-01-02 15:04:05 UTC`.
    #[must_use]
    pub fn formatted_time(&self) -> String {
        self.metadata
            .timestamp
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
    }
}
