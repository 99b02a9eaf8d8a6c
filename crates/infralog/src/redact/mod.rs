//! Redaction of sensitive values before notification.
//!
//! Diffs can carry secrets: Terraform keeps database passwords, generated
//! tokens and private keys in state in plain text. The [`Redactor`] replaces
//! such values with a placeholder before a payload leaves the process.
//!
//! A value is redacted when:
//!
//! - it belongs to an output Terraform marks as `sensitive`;
//! - its attribute name (or a nested object key) matches a built-in or
//!   configured attribute pattern;
//! - it is a string matching a built-in value pattern, such as a PEM key.
//!
//! # Example
//!
//! ```
//! use infralog::config::RedactConfig;
//! use infralog::redact::Redactor;
//!
//! let redactor = Redactor::new(&RedactConfig::default()).unwrap();
//! assert!(redactor.is_sensitive_attribute("master_password"));
//! assert!(!redactor.is_sensitive_attribute("instance_type"));
//! ```

mod patterns;

use serde_json::Value;
use tracing::debug;

use crate::config::RedactConfig;
use crate::error::{Error, Result};
use crate::tfstate::{StateDiff, ValueDiff};

pub use patterns::{builtin_attribute_patterns, builtin_value_patterns, RedactPattern};

/// Replaces sensitive values in diffs.
#[derive(Debug, Clone)]
pub struct Redactor {
    enabled: bool,
    sensitive_outputs: bool,
    attribute_patterns: Vec<RedactPattern>,
    value_patterns: Vec<RedactPattern>,
    placeholder: String,
}

impl Redactor {
    /// Build a redactor from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a custom pattern is not a valid regex.
    pub fn new(config: &RedactConfig) -> Result<Self> {
        let mut attribute_patterns = builtin_attribute_patterns();
        for (i, pattern) in config.patterns.iter().enumerate() {
            let compiled = RedactPattern::new(format!("custom_{i}"), "Configured pattern", pattern)
                .map_err(|e| Error::config(format!("invalid redact pattern {pattern:?}: {e}")))?;
            attribute_patterns.push(compiled);
        }

        Ok(Self {
            enabled: config.enabled,
            sensitive_outputs: config.sensitive_outputs,
            attribute_patterns,
            value_patterns: builtin_value_patterns(),
            placeholder: config.placeholder.clone(),
        })
    }

    /// A redactor that passes everything through.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sensitive_outputs: false,
            attribute_patterns: Vec::new(),
            value_patterns: Vec::new(),
            placeholder: String::new(),
        }
    }

    /// Check if redaction is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check if an attribute name is considered sensitive.
    #[must_use]
    pub fn is_sensitive_attribute(&self, name: &str) -> bool {
        self.matching_pattern(name).is_some()
    }

    /// The first attribute pattern matching `name`.
    #[must_use]
    pub fn matching_pattern(&self, name: &str) -> Option<&RedactPattern> {
        self.attribute_patterns.iter().find(|p| p.matches(name))
    }

    /// Return a copy of `diff` with sensitive values replaced.
    #[must_use]
    pub fn redact(&self, diff: &StateDiff) -> StateDiff {
        let mut out = diff.clone();
        if !self.enabled {
            return out;
        }

        for resource in &mut out.resource_diffs {
            for (name, value_diff) in &mut resource.attribute_diffs {
                if let Some(pattern) = self.matching_pattern(name) {
                    debug!(
                        address = %resource.address,
                        attribute = %name,
                        pattern = %pattern.name,
                        "redacting attribute"
                    );
                    self.mask(value_diff);
                } else {
                    self.scrub(value_diff);
                }
            }
        }

        for output in &mut out.output_diffs {
            if self.sensitive_outputs && output.sensitive {
                debug!(output = %output.output_name, "redacting sensitive output");
                self.mask(&mut output.value_diff);
            } else {
                self.scrub(&mut output.value_diff);
            }
        }

        out
    }

    fn placeholder(&self) -> Value {
        Value::String(self.placeholder.clone())
    }

    /// Replace both present sides with the placeholder.
    fn mask(&self, diff: &mut ValueDiff) {
        for side in [&mut diff.before, &mut diff.after] {
            if side.is_some() {
                *side = Some(self.placeholder());
            }
        }
    }

    /// Redact sensitive parts nested inside both sides.
    fn scrub(&self, diff: &mut ValueDiff) {
        for value in [diff.before.as_mut(), diff.after.as_mut()].into_iter().flatten() {
            self.scrub_value(value);
        }
    }

    fn scrub_value(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                if self.value_patterns.iter().any(|p| p.matches(s)) {
                    *value = self.placeholder();
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|v| self.scrub_value(v)),
            Value::Object(map) => {
                for (key, v) in map.iter_mut() {
                    if v.is_null() {
                        continue;
                    }
                    if self.is_sensitive_attribute(key) {
                        *v = self.placeholder();
                    } else {
                        self.scrub_value(v);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfstate::{DiffStatus, OutputDiff, ResourceDiff};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn resource(attrs: &[(&str, Option<Value>, Option<Value>)]) -> ResourceDiff {
        ResourceDiff {
            address: "aws_db_instance.main".to_string(),
            resource_type: "aws_db_instance".to_string(),
            resource_name: "main".to_string(),
            status: DiffStatus::Changed,
            attribute_diffs: attrs
                .iter()
                .map(|(k, b, a)| {
                    (
                        (*k).to_string(),
                        ValueDiff {
                            before: b.clone(),
                            after: a.clone(),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn output(name: &str, sensitive: bool) -> OutputDiff {
        OutputDiff {
            output_name: name.to_string(),
            status: DiffStatus::Changed,
            value_diff: ValueDiff {
                before: Some(json!("old")),
                after: Some(json!("new")),
            },
            sensitive,
        }
    }

    #[test]
    fn test_redacts_sensitive_attribute_names() {
        let redactor = Redactor::new(&RedactConfig::default()).unwrap();
        let diff = StateDiff {
            resource_diffs: vec![resource(&[
                ("password", Some(json!("hunter2")), Some(json!("hunter3"))),
                ("instance_class", Some(json!("db.t3.micro")), Some(json!("db.t3.small"))),
            ])],
            output_diffs: vec![],
        };

        let redacted = redactor.redact(&diff);
        let attrs = &redacted.resource_diffs[0].attribute_diffs;
        assert_eq!(attrs["password"].before, Some(json!("(sensitive)")));
        assert_eq!(attrs["password"].after, Some(json!("(sensitive)")));
        assert_eq!(attrs["instance_class"].after, Some(json!("db.t3.small")));
    }

    #[test]
    fn test_absent_side_stays_absent() {
        let redactor = Redactor::new(&RedactConfig::default()).unwrap();
        let diff = StateDiff {
            resource_diffs: vec![resource(&[("api_token", None, Some(json!("abc")))])],
            output_diffs: vec![],
        };
        let redacted = redactor.redact(&diff);
        let token = &redacted.resource_diffs[0].attribute_diffs["api_token"];
        assert_eq!(token.before, None);
        assert_eq!(token.after, Some(json!("(sensitive)")));
    }

    #[test]
    fn test_redacts_nested_keys_and_values() {
        let redactor = Redactor::new(&RedactConfig::default()).unwrap();
        let diff = StateDiff {
            resource_diffs: vec![resource(&[(
                "[0]",
                None,
                Some(json!({
                    "name": "worker",
                    "client_secret": "s3cr3t",
                    "url": "postgres://app:pw@db:5432/app",
                    "tags": {"Name": "worker"}
                })),
            )])],
            output_diffs: vec![],
        };
        let redacted = redactor.redact(&diff);
        assert_eq!(
            redacted.resource_diffs[0].attribute_diffs["[0]"].after,
            Some(json!({
                "name": "worker",
                "client_secret": "(sensitive)",
                "url": "(sensitive)",
                "tags": {"Name": "worker"}
            }))
        );
    }

    #[test]
    fn test_sensitive_outputs() {
        let redactor = Redactor::new(&RedactConfig::default()).unwrap();
        let diff = StateDiff {
            resource_diffs: vec![],
            output_diffs: vec![output("db_password", true), output("instance_ip", false)],
        };
        let redacted = redactor.redact(&diff);
        assert_eq!(redacted.output_diffs[0].value_diff.after, Some(json!("(sensitive)")));
        assert_eq!(redacted.output_diffs[1].value_diff.after, Some(json!("new")));
    }

    #[test]
    fn test_sensitive_outputs_can_be_disabled() {
        let config = RedactConfig {
            sensitive_outputs: false,
            ..RedactConfig::default()
        };
        let redactor = Redactor::new(&config).unwrap();
        let diff = StateDiff {
            resource_diffs: vec![],
            output_diffs: vec![output("db_password", true)],
        };
        assert_eq!(redactor.redact(&diff), diff);
    }

    #[test]
    fn test_custom_patterns_and_placeholder() {
        let config = RedactConfig {
            patterns: vec!["^user_data$".to_string()],
            placeholder: "***".to_string(),
            ..RedactConfig::default()
        };
        let redactor = Redactor::new(&config).unwrap();
        assert!(redactor.is_sensitive_attribute("user_data"));
        assert_eq!(redactor.matching_pattern("user_data").unwrap().name, "custom_0");

        let diff = StateDiff {
            resource_diffs: vec![resource(&[("user_data", Some(json!("a")), Some(json!("b")))])],
            output_diffs: vec![],
        };
        let redacted = redactor.redact(&diff);
        assert_eq!(
            redacted.resource_diffs[0].attribute_diffs["user_data"].after,
            Some(json!("***"))
        );
    }

    #[test]
    fn test_invalid_custom_pattern() {
        let config = RedactConfig {
            patterns: vec!["(".to_string()],
            ..RedactConfig::default()
        };
        let err = Redactor::new(&config).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_disabled_passes_through() {
        let config = RedactConfig {
            enabled: false,
            ..RedactConfig::default()
        };
        let redactor = Redactor::new(&config).unwrap();
        assert!(!redactor.is_enabled());
        let diff = StateDiff {
            resource_diffs: vec![resource(&[("password", Some(json!("a")), Some(json!("b")))])],
            output_diffs: vec![output("db_password", true)],
        };
        assert_eq!(redactor.redact(&diff), diff);
        assert_eq!(Redactor::disabled().redact(&diff), diff);
    }
}
