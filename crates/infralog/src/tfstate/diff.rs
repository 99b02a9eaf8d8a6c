use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a resource or output differs between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    /// Present only in the newer snapshot.
    Added,
    /// Present only in the older snapshot.
    Removed,
    /// Present in both with different values.
    Changed,
    /// Destroyed and recreated. Only plans report this.
    Replaced,
}

impl DiffStatus {
    /// Lowercase name, as used in payloads and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
            Self::Replaced => "replaced",
        }
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Old and new value of an attribute or output. A missing side is omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueDiff {
    /// Value in the older snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    /// Value in the newer snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

impl ValueDiff {
    /// Build a diff, treating JSON `null` as absent.
    #[must_use]
    pub fn new(before: Option<&Value>, after: Option<&Value>) -> Self {
        Self {
            before: before.filter(|v| !v.is_null()).cloned(),
            after: after.filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Whether both sides are absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

/// A change to one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Full resource address.
    pub address: String,
    /// Resource type.
    pub resource_type: String,
    /// Resource name.
    pub resource_name: String,
    /// Kind of change.
    pub status: DiffStatus,
    /// Changed attributes, keyed by attribute name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attribute_diffs: BTreeMap<String, ValueDiff>,
}

/// A change to one root module output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDiff {
    /// Output name.
    pub output_name: String,
    /// Kind of change.
    pub status: DiffStatus,
    /// Old and new value; empty for additions and removals.
    #[serde(default)]
    pub value_diff: ValueDiff,
    /// Whether either snapshot marks the output as sensitive.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

/// Everything that differs between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    /// Resource changes ordered by address.
    #[serde(default)]
    pub resource_diffs: Vec<ResourceDiff>,
    /// Output changes ordered by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_diffs: Vec<OutputDiff>,
}

impl StateDiff {
    /// Whether anything changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.resource_diffs.is_empty() || !self.output_diffs.is_empty()
    }

    /// Number of resource and output changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resource_diffs.len() + self.output_diffs.len()
    }

    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_changes()
    }
}
