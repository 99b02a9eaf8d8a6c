use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{ResourceAddress, ResourceMode};
use crate::error::{Error, Result};

/// A Terraform state snapshot (format version 4).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// State format version.
    #[serde(default)]
    pub version: u32,
    /// Terraform version that wrote the state.
    #[serde(default)]
    pub terraform_version: String,
    /// Incremented on every write.
    #[serde(default)]
    pub serial: u64,
    /// Identifier shared by all snapshots of one state.
    #[serde(default)]
    pub lineage: String,
    /// Managed resources and data sources.
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Root module outputs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

/// A resource block, possibly expanded into several instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Module path, e.g. `module.network`; empty for the root module.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,
    /// Managed resource or data source.
    #[serde(default)]
    pub mode: ResourceMode,
    /// Resource type, e.g. `aws_instance`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name.
    pub name: String,
    /// Provider address.
    #[serde(default)]
    pub provider: String,
    /// Instances; more than one when `count` or `for_each` is used.
    #[serde(default)]
    pub instances: Vec<ResourceInstance>,
}

/// One instance of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    /// `count` index or `for_each` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_key: Option<Value>,
    /// Provider schema version.
    #[serde(default)]
    pub schema_version: u64,
    /// Attribute values.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Opaque provider data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,
}

/// A root module output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Output value.
    pub value: Value,
    /// Type constraint as Terraform encodes it.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<Value>,
    /// Whether Terraform marks the output as sensitive.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

impl State {
    /// Parse a state document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid state JSON.
    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(Error::StateParse)
    }

    /// Read and parse a state file.
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
}

impl Resource {
    /// The resource's address.
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(
            (!self.module.is_empty()).then(|| self.module.clone()),
            self.mode,
            &self.resource_type,
            &self.name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const STATE: &str = r#"{
        "version": 4,
        "terraform_version": "1.5.0",
        "serial": 42,
        "lineage": "test-lineage",
        "resources": [
            {
                "mode": "managed",
                "type": "aws_instance",
                "name": "web",
                "provider": "provider[\"registry.terraform.io/hashicorp/aws\"]",
                "instances": [
                    {
                        "schema_version": 1,
                        "attributes": {"id": "i-123456", "instance_type": "t2.micro"},
                        "sensitive_attributes": []
                    }
                ]
            },
            {
                "module": "module.network",
                "mode": "data",
                "type": "aws_ami",
                "name": "ubuntu",
                "instances": []
            }
        ],
        "outputs": {
            "instance_ip": {"value": "10.0.0.1", "type": "string"},
            "db_password": {"value": "hunter2", "type": "string", "sensitive": true}
        }
    }"#;

    #[test]
    fn test_parse_state() {
        let state = State::parse(STATE.as_bytes()).unwrap();
        assert_eq!(state.version, 4);
        assert_eq!(state.serial, 42);
        assert_eq!(state.resources.len(), 2);
        assert_eq!(state.resources[0].instances[0].attributes["id"], json!("i-123456"));
        assert!(state.outputs["db_password"].sensitive);
        assert!(!state.outputs["instance_ip"].sensitive);
    }

    #[test]
    fn test_resource_addresses() {
        let state = State::parse(STATE.as_bytes()).unwrap();
        assert_eq!(state.resources[0].address().to_string(), "aws_instance.web");
        assert_eq!(
            state.resources[1].address().to_string(),
            "module.network.data.aws_ami.ubuntu"
        );
    }

    #[test]
    fn test_parse_invalid() {
        let err = State::parse(b"not json").unwrap_err();
        assert!(matches!(err, Error::StateParse(_)));
    }

    #[test]
    fn test_parse_minimal() {
        let state = State::parse(b"{}").unwrap();
        assert_eq!(state, State::default());
    }

    #[test]
    fn test_serialize_round_trip_keeps_fields() {
        let state = State::parse(STATE.as_bytes()).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(State::parse(json.as_bytes()).unwrap(), state);
    }

    #[test]
    fn test_from_file_missing() {
        let err = State::from_file(Path::new("/nonexistent/terraform.tfstate")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
