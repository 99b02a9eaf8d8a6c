use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::tfstate::{DiffStatus, OutputDiff, ResourceDiff, ResourceMode, StateDiff, ValueDiff};

/// Shown in place of values Terraform only learns during apply.
const UNKNOWN_VALUE: &str = "(known after apply)";

/// Shown in place of values Terraform marks as sensitive.
const SENSITIVE_VALUE: &str = "(sensitive value)";

/// A Terraform plan in the JSON output format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// JSON output format version; required.
    #[serde(default)]
    pub format_version: String,
    /// Terraform version that produced the plan.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub terraform_version: String,
    /// Proposed resource changes, in plan order.
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
    /// Proposed root output changes.
    #[serde(default)]
    pub output_changes: BTreeMap<String, OutputChange>,
    /// Configuration snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
    /// Options the plan was created with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_options: Option<Value>,
}

/// A proposed change to one resource instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Full instance address.
    pub address: String,
    /// Managed resource or data source.
    #[serde(default)]
    pub mode: ResourceMode,
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name.
    pub name: String,
    /// Provider source address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider_name: String,
    /// Module path for non-root resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_address: Option<String>,
    /// The change itself.
    pub change: Change,
    /// Why Terraform chose this action, e.g. `replace_because_cannot_update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_reason: Option<String>,
}

/// A proposed change to one root output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputChange {
    /// The change itself.
    pub change: Change,
}

/// Actions plus before/after values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Planned actions, e.g. `["delete", "create"]` for a replacement.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Value before the change.
    #[serde(default)]
    pub before: Option<Value>,
    /// Value after the change, where known.
    #[serde(default)]
    pub after: Option<Value>,
    /// Mirrors `after`, with `true` where the value is unknown until apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_unknown: Option<Value>,
    /// Mirrors `before`, with `true` where the value is sensitive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_sensitive: Option<Value>,
    /// Mirrors `after`, with `true` where the value is sensitive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_sensitive: Option<Value>,
}

/// A planned action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Nothing to do.
    NoOp,
    /// Create the object.
    Create,
    /// Read a data source.
    Read,
    /// Update in place.
    Update,
    /// Destroy the object.
    Delete,
    /// An action this version does not know.
    #[serde(other)]
    Unknown,
}

/// Map a list of planned actions to a diff status.
///
/// `create` is an addition, `delete` a removal and `update` a change. A
/// `create`/`delete` pair in either order is a replacement. Anything else is
/// reported as a change.
#[must_use]
pub fn actions_to_status(actions: &[Action]) -> DiffStatus {
    let set: BTreeSet<Action> = actions.iter().copied().collect();
    match (actions.len(), set.iter().copied().collect::<Vec<_>>().as_slice()) {
        (1, [Action::Create]) => DiffStatus::Added,
        (1, [Action::Delete]) => DiffStatus::Removed,
        (2, [Action::Create, Action::Delete]) => DiffStatus::Replaced,
        _ => DiffStatus::Changed,
    }
}

impl Plan {
    /// Parse a plan document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or `format_version` is missing.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let plan: Plan = serde_json::from_slice(data)
            .map_err(|e| Error::plan(format!("invalid plan JSON: {e}")))?;
        if plan.format_version.is_empty() {
            return Err(Error::plan("missing required field 'format_version'"));
        }
        Ok(plan)
    }

    /// Read and parse a plan file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&data)
    }

    /// Whether the plan proposes any change.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.resource_changes.is_empty() || !self.output_changes.is_empty()
    }

    /// Convert the proposed changes into a diff.
    ///
    /// Resources keep plan order; outputs are ordered by name. Attribute
    /// diffs are computed for changes and replacements only. Values unknown
    /// until apply or marked sensitive are replaced by a marker string.
    #[must_use]
    pub fn to_diff(&self) -> StateDiff {
        let resource_diffs = self
            .resource_changes
            .iter()
            .map(|rc| {
                let status = actions_to_status(&rc.change.actions);
                let attribute_diffs = match status {
                    DiffStatus::Changed | DiffStatus::Replaced => attribute_diffs(&rc.change),
                    DiffStatus::Added | DiffStatus::Removed => BTreeMap::new(),
                };
                ResourceDiff {
                    address: rc.address.clone(),
                    resource_type: rc.resource_type.clone(),
                    resource_name: rc.name.clone(),
                    status,
                    attribute_diffs,
                }
            })
            .collect();

        let output_diffs = self
            .output_changes
            .iter()
            .map(|(name, oc)| {
                let status = actions_to_status(&oc.change.actions);
                let sensitive = is_marked(oc.change.before_sensitive.as_ref())
                    || is_marked(oc.change.after_sensitive.as_ref());
                let value_diff = match status {
                    DiffStatus::Changed | DiffStatus::Replaced => {
                        let after = if is_marked(oc.change.after_unknown.as_ref()) {
                            Some(Value::String(UNKNOWN_VALUE.to_string()))
                        } else {
                            oc.change.after.clone()
                        };
                        ValueDiff::new(oc.change.before.as_ref(), after.as_ref())
                    }
                    DiffStatus::Added | DiffStatus::Removed => ValueDiff::default(),
                };
                OutputDiff {
                    output_name: name.clone(),
                    status,
                    value_diff,
                    sensitive,
                }
            })
            .collect();

        StateDiff {
            resource_diffs,
            output_diffs,
        }
    }
}

fn is_marked(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn marked_key(marks: Option<&Value>, key: &str) -> bool {
    marks
        .and_then(Value::as_object)
        .is_some_and(|m| is_marked(m.get(key)))
}

fn attribute_diffs(change: &Change) -> BTreeMap<String, ValueDiff> {
    let empty = serde_json::Map::new();
    let before = change.before.as_ref().and_then(Value::as_object).unwrap_or(&empty);
    let after = change.after.as_ref().and_then(Value::as_object).unwrap_or(&empty);

    let unknown_keys = change
        .after_unknown
        .as_ref()
        .and_then(Value::as_object)
        .map(|m| m.keys().collect::<Vec<_>>())
        .unwrap_or_default();

    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).chain(unknown_keys).collect();

    let mut diffs = BTreeMap::new();
    for key in keys {
        let unknown = marked_key(change.after_unknown.as_ref(), key);
        let old = before.get(key);
        let new = if unknown {
            Some(Value::String(UNKNOWN_VALUE.to_string()))
        } else {
            after.get(key).cloned()
        };
        if !unknown && old == new.as_ref() {
            continue;
        }

        let mut diff = ValueDiff::new(old, new.as_ref());
        if marked_key(change.before_sensitive.as_ref(), key) && diff.before.is_some() {
            diff.before = Some(Value::String(SENSITIVE_VALUE.to_string()));
        }
        if marked_key(change.after_sensitive.as_ref(), key) && diff.after.is_some() {
            diff.after = Some(Value::String(SENSITIVE_VALUE.to_string()));
        }
        if !diff.is_empty() {
            diffs.insert(key.clone(), diff);
        }
    }
    diffs
}
