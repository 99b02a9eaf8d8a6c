use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;

use super::diff::{DiffStatus, OutputDiff, ResourceDiff, StateDiff, ValueDiff};
use super::resource::ResourceAddress;
use super::state::{Output, Resource, ResourceInstance, State};
use crate::config::FilterConfig;

/// Compare two snapshots.
///
/// Resources are matched by address and filtered by type; outputs are
/// matched and filtered by name. Unchanged entries are omitted. Resource
/// diffs are ordered by address and output diffs by name.
#[must_use]
pub fn compare(old: &State, new: &State, filter: &FilterConfig) -> StateDiff {
    let old_resources = map_resources(&old.resources, filter);
    let new_resources = map_resources(&new.resources, filter);

    let addresses: BTreeSet<&ResourceAddress> =
        old_resources.keys().chain(new_resources.keys()).collect();

    let mut resource_diffs = Vec::new();
    for address in addresses {
        let (status, attribute_diffs) = match (old_resources.get(address), new_resources.get(address))
        {
            (None, Some(_)) => (DiffStatus::Added, BTreeMap::new()),
            (Some(_), None) => (DiffStatus::Removed, BTreeMap::new()),
            (Some(before), Some(after)) => {
                let attrs = compare_instances(&before.instances, &after.instances);
                if attrs.is_empty() {
                    continue;
                }
                (DiffStatus::Changed, attrs)
            }
            (None, None) => continue,
        };

        resource_diffs.push(ResourceDiff {
            address: address.to_string(),
            resource_type: address.resource_type().to_string(),
            resource_name: address.name().to_string(),
            status,
            attribute_diffs,
        });
    }

    let old_outputs = filter_outputs(&old.outputs, filter);
    let new_outputs = filter_outputs(&new.outputs, filter);

    StateDiff {
        resource_diffs,
        output_diffs: compare_outputs(&old_outputs, &new_outputs),
    }
}

fn map_resources<'a>(
    resources: &'a [Resource],
    filter: &FilterConfig,
) -> BTreeMap<ResourceAddress, &'a Resource> {
    resources
        .iter()
        .filter(|r| filter.matches_resource_type(&r.resource_type))
        .map(|r| (r.address(), r))
        .collect()
}

fn filter_outputs<'a>(
    outputs: &'a BTreeMap<String, Output>,
    filter: &FilterConfig,
) -> BTreeMap<&'a str, &'a Output> {
    outputs
        .iter()
        .filter(|(name, _)| filter.matches_output(name))
        .map(|(name, output)| (name.as_str(), output))
        .collect()
}

/// Instance identity within a resource, ordered numerically for `count`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum InstanceKey {
    Number(i64),
    Text(String),
}

impl InstanceKey {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Number(0),
            Some(Value::Number(n)) => n
                .as_i64()
                .map_or_else(|| Self::Text(n.to_string()), Self::Number),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "[{n}]"),
            Self::Text(s) => write!(f, "[{s:?}]"),
        }
    }
}

fn is_single(instances: &[ResourceInstance]) -> bool {
    match instances {
        [] => true,
        [only] => matches!(only.index_key, None | Some(Value::Null)),
        _ => false,
    }
}

/// Attribute differences between two instance lists.
///
/// Single-instance resources are compared attribute by attribute. Resources
/// using `count` or `for_each` are matched by index key; attribute keys are
/// prefixed with the index (`[0].ami`), and an instance present on only one
/// side is reported under the bare index (`["blue"]`).
fn compare_instances(
    old: &[ResourceInstance],
    new: &[ResourceInstance],
) -> BTreeMap<String, ValueDiff> {
    if is_single(old) && is_single(new) {
        return match (old.first(), new.first()) {
            (Some(before), Some(after)) => {
                compare_attributes(&before.attributes, &after.attributes, "")
            }
            _ => BTreeMap::new(),
        };
    }

    fn index(instances: &[ResourceInstance]) -> BTreeMap<InstanceKey, &ResourceInstance> {
        instances
            .iter()
            .map(|i| (InstanceKey::from_value(i.index_key.as_ref()), i))
            .collect()
    }

    let old_by_key = index(old);
    let new_by_key = index(new);

    let keys: BTreeSet<&InstanceKey> = old_by_key.keys().chain(new_by_key.keys()).collect();

    let mut diffs = BTreeMap::new();
    for key in keys {
        match (old_by_key.get(key), new_by_key.get(key)) {
            (Some(before), Some(after)) => {
                let prefix = format!("{key}.");
                diffs.extend(compare_attributes(&before.attributes, &after.attributes, &prefix));
            }
            (Some(before), None) => {
                diffs.insert(
                    key.to_string(),
                    ValueDiff {
                        before: Some(attributes_value(&before.attributes)),
                        after: None,
                    },
                );
            }
            (None, Some(after)) => {
                diffs.insert(
                    key.to_string(),
                    ValueDiff {
                        before: None,
                        after: Some(attributes_value(&after.attributes)),
                    },
                );
            }
            (None, None) => {}
        }
    }
    diffs
}

fn attributes_value(attributes: &BTreeMap<String, Value>) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

fn compare_attributes(
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
    prefix: &str,
) -> BTreeMap<String, ValueDiff> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let before = old.get(key);
            let after = new.get(key);
            if before == after {
                return None;
            }
            let diff = ValueDiff::new(before, after);
            (!diff.is_empty()).then(|| (format!("{prefix}{key}"), diff))
        })
        .collect()
}

fn compare_outputs(
    old: &BTreeMap<&str, &Output>,
    new: &BTreeMap<&str, &Output>,
) -> Vec<OutputDiff> {
    let names: BTreeSet<&str> = old.keys().chain(new.keys()).copied().collect();

    names
        .into_iter()
        .filter_map(|name| {
            let before = old.get(name);
            let after = new.get(name);
            let sensitive = before.is_some_and(|o| o.sensitive) || after.is_some_and(|o| o.sensitive);

            let (status, value_diff) = match (before, after) {
                (None, Some(_)) => (DiffStatus::Added, ValueDiff::default()),
                (Some(_), None) => (DiffStatus::Removed, ValueDiff::default()),
                (Some(b), Some(a)) if b.value != a.value => (
                    DiffStatus::Changed,
                    ValueDiff::new(Some(&b.value), Some(&a.value)),
                ),
                _ => return None,
            };

            Some(OutputDiff {
                output_name: name.to_string(),
                status,
                value_diff,
                sensitive,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfstate::ResourceMode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn instance(attrs: Value) -> ResourceInstance {
        ResourceInstance {
            attributes: serde_json::from_value(attrs).unwrap(),
            ..ResourceInstance::default()
        }
    }

    fn keyed(key: Value, attrs: Value) -> ResourceInstance {
        ResourceInstance {
            index_key: Some(key),
            ..instance(attrs)
        }
    }

    fn resource(module: &str, rtype: &str, name: &str, instances: Vec<ResourceInstance>) -> Resource {
        Resource {
            module: module.to_string(),
            mode: ResourceMode::Managed,
            resource_type: rtype.to_string(),
            name: name.to_string(),
            provider: String::new(),
            instances,
        }
    }

    fn output(value: Value) -> Output {
        Output {
            value,
            output_type: None,
            sensitive: false,
        }
    }

    fn state(resources: Vec<Resource>, outputs: Vec<(&str, Output)>) -> State {
        State {
            version: 4,
            resources,
            outputs: outputs
                .into_iter()
                .map(|(name, o)| (name.to_string(), o))
                .collect(),
            ..State::default()
        }
    }

    #[test]
    fn test_identical_instances() {
        let a = [instance(json!({"id": "i-123456", "type": "t2.micro"}))];
        let b = [instance(json!({"id": "i-123456", "type": "t2.micro"}))];
        assert!(compare_instances(&a, &b).is_empty());
    }

    #[test]
    fn test_changed_attribute() {
        let a = [instance(json!({"id": "i-123456", "type": "t2.micro"}))];
        let b = [instance(json!({"id": "i-123456", "type": "t2.small"}))];
        let diffs = compare_instances(&a, &b);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs["type"].before, Some(json!("t2.micro")));
        assert_eq!(diffs["type"].after, Some(json!("t2.small")));
    }

    #[test]
    fn test_added_and_removed_attribute() {
        let a = [instance(json!({"id": "i-1", "old": true}))];
        let b = [instance(json!({"id": "i-1", "new": 1}))];
        let diffs = compare_instances(&a, &b);
        assert_eq!(diffs["new"], ValueDiff::new(None, Some(&json!(1))));
        assert_eq!(diffs["old"], ValueDiff::new(Some(&json!(true)), None));
    }

    #[test]
    fn test_null_attribute_is_not_a_change() {
        let a = [instance(json!({"ami": "ami-1"}))];
        let b = [instance(json!({"ami": "ami-1", "new_provider_attr": null}))];
        assert!(compare_instances(&a, &b).is_empty());

        let old = state(vec![resource("", "aws_instance", "web", a.to_vec())], vec![]);
        let new = state(vec![resource("", "aws_instance", "web", b.to_vec())], vec![]);
        assert!(!compare(&old, &new, &FilterConfig::default()).has_changes());
    }

    #[test]
    fn test_no_instances() {
        assert!(compare_instances(&[], &[]).is_empty());
    }

    #[test]
    fn test_count_instances_matched_by_index() {
        let a = [
            keyed(json!(0), json!({"ami": "ami-1"})),
            keyed(json!(1), json!({"ami": "ami-1"})),
        ];
        let b = [
            keyed(json!(0), json!({"ami": "ami-1"})),
            keyed(json!(1), json!({"ami": "ami-2"})),
            keyed(json!(2), json!({"ami": "ami-2"})),
        ];
        let diffs = compare_instances(&a, &b);
        assert_eq!(
            diffs.keys().cloned().collect::<Vec<_>>(),
            vec!["[1].ami".to_string(), "[2]".to_string()]
        );
        assert_eq!(diffs["[2]"].after, Some(json!({"ami": "ami-2"})));
        assert!(diffs["[2]"].before.is_none());
    }

    #[test]
    fn test_for_each_instance_removed() {
        let a = [
            keyed(json!("blue"), json!({"size": 1})),
            keyed(json!("green"), json!({"size": 1})),
        ];
        let b = [keyed(json!("blue"), json!({"size": 1}))];
        let diffs = compare_instances(&a, &b);
        assert_eq!(diffs.keys().collect::<Vec<_>>(), vec!["[\"green\"]"]);
    }

    #[test]
    fn test_compare_resources_added_removed_changed() {
        let old = state(
            vec![
                resource("", "aws_instance", "web", vec![instance(json!({"type": "t2.micro"}))]),
                resource("", "aws_s3_bucket", "logs", vec![instance(json!({"acl": "private"}))]),
                resource("", "aws_vpc", "main", vec![instance(json!({"cidr": "10.0.0.0/16"}))]),
            ],
            vec![],
        );
        let new = state(
            vec![
                resource("", "aws_instance", "web", vec![instance(json!({"type": "t2.small"}))]),
                resource("", "aws_vpc", "main", vec![instance(json!({"cidr": "10.0.0.0/16"}))]),
                resource(
                    "module.network",
                    "aws_subnet",
                    "public",
                    vec![instance(json!({"cidr": "10.0.1.0/24"}))],
                ),
            ],
            vec![],
        );

        let diff = compare(&old, &new, &FilterConfig::default());
        let summary: Vec<(String, DiffStatus)> = diff
            .resource_diffs
            .iter()
            .map(|d| (d.address.clone(), d.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("aws_instance.web".to_string(), DiffStatus::Changed),
                ("aws_s3_bucket.logs".to_string(), DiffStatus::Removed),
                ("module.network.aws_subnet.public".to_string(), DiffStatus::Added),
            ]
        );
        assert_eq!(diff.resource_diffs[2].resource_type, "aws_subnet");
        assert_eq!(diff.resource_diffs[2].resource_name, "public");
        assert!(diff.resource_diffs[1].attribute_diffs.is_empty());
    }

    #[test]
    fn test_compare_filters_resource_types() {
        let old = state(vec![], vec![]);
        let new = state(
            vec![
                resource("", "aws_instance", "web", vec![]),
                resource("", "aws_s3_bucket", "logs", vec![]),
            ],
            vec![],
        );
        let filter = FilterConfig {
            resource_types: Some(vec!["aws_s3_bucket".to_string()]),
            outputs: None,
        };
        let diff = compare(&old, &new, &filter);
        assert_eq!(diff.resource_diffs.len(), 1);
        assert_eq!(diff.resource_diffs[0].resource_type, "aws_s3_bucket");
    }

    #[test]
    fn test_compare_empty_filter_matches_nothing() {
        let old = state(vec![], vec![("a", output(json!(1)))]);
        let new = state(
            vec![resource("", "aws_instance", "web", vec![])],
            vec![("a", output(json!(2)))],
        );
        let filter = FilterConfig {
            resource_types: Some(Vec::new()),
            outputs: Some(Vec::new()),
        };
        assert!(!compare(&old, &new, &filter).has_changes());
    }

    #[test]
    fn test_compare_outputs() {
        let old = state(
            vec![],
            vec![
                ("vpc_id", output(json!("vpc-123456"))),
                ("removed", output(json!("x"))),
                ("same", output(json!([1, 2]))),
            ],
        );
        let new = state(
            vec![],
            vec![
                ("vpc_id", output(json!("vpc-654321"))),
                ("added", output(json!("y"))),
                ("same", output(json!([1, 2]))),
            ],
        );
        let diff = compare(&old, &new, &FilterConfig::default());
        assert_eq!(
            diff.output_diffs,
            vec![
                OutputDiff {
                    output_name: "added".to_string(),
                    status: DiffStatus::Added,
                    value_diff: ValueDiff::default(),
                    sensitive: false,
                },
                OutputDiff {
                    output_name: "removed".to_string(),
                    status: DiffStatus::Removed,
                    value_diff: ValueDiff::default(),
                    sensitive: false,
                },
                OutputDiff {
                    output_name: "vpc_id".to_string(),
                    status: DiffStatus::Changed,
                    value_diff: ValueDiff::new(Some(&json!("vpc-123456")), Some(&json!("vpc-654321"))),
                    sensitive: false,
                },
            ]
        );
    }

    #[test]
    fn test_compare_output_sensitivity_propagates() {
        let mut secret = output(json!("new"));
        secret.sensitive = true;
        let old = state(vec![], vec![("db_password", output(json!("old")))]);
        let new = state(vec![], vec![("db_password", secret)]);
        let diff = compare(&old, &new, &FilterConfig::default());
        assert!(diff.output_diffs[0].sensitive);
    }

    #[test]
    fn test_compare_identical_states() {
        let s = state(
            vec![resource("", "aws_instance", "web", vec![instance(json!({"id": "i-1"}))])],
            vec![("ip", output(json!("10.0.0.1")))],
        );
        assert!(!compare(&s, &s, &FilterConfig::default()).has_changes());
    }

    #[test]
    fn test_compare_fixture_states() {
        let old = State::parse(include_bytes!("../../testdata/state_v1.json")).unwrap();
        let new = State::parse(include_bytes!("../../testdata/state_v2.json")).unwrap();
        let diff = compare(&old, &new, &FilterConfig::default());

        let web = diff
            .resource_diffs
            .iter()
            .find(|d| d.address == "aws_instance.web")
            .unwrap();
        assert_eq!(web.status, DiffStatus::Changed);
        assert_eq!(
            web.attribute_diffs["instance_type"],
            ValueDiff::new(Some(&json!("t3.micro")), Some(&json!("t3.small")))
        );
        assert!(diff
            .resource_diffs
            .iter()
            .any(|d| d.address == "aws_s3_bucket.assets" && d.status == DiffStatus::Added));
        assert!(diff
            .output_diffs
            .iter()
            .any(|d| d.output_name == "instance_ip" && d.status == DiffStatus::Changed));
    }
}
