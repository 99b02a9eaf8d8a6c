use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a resource is managed by Terraform or only read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    /// A `resource` block.
    #[default]
    Managed,
    /// A `data` block.
    Data,
}

/// The address of a resource: `[module.<name>.]...[data.]<type>.<name>`.
///
/// Addresses order by their rendered form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    module: Option<String>,
    mode: ResourceMode,
    resource_type: String,
    name: String,
}

impl ResourceAddress {
    /// Build an address from its parts.
    #[must_use]
    pub fn new(
        module: Option<String>,
        mode: ResourceMode,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            module,
            mode,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Parse a rendered address.
    ///
    /// Returns `None` when the address has fewer than two segments or a
    /// prefix that is neither a module path nor `data`.
    #[must_use]
    pub fn parse(address: &str) -> Option<Self> {
        let segments: Vec<&str> = address.split('.').collect();
        let (name, rest) = segments.split_last()?;
        let (resource_type, mut prefix) = rest.split_last()?;

        let mut mode = ResourceMode::Managed;
        if prefix.last() == Some(&"data") {
            mode = ResourceMode::Data;
            prefix = &prefix[..prefix.len() - 1];
        }

        let module = match prefix {
            [] => None,
            ["module", ..] if prefix.len() % 2 == 0 => Some(prefix.join(".")),
            _ => return None,
        };

        Some(Self::new(module, mode, *resource_type, *name))
    }

    /// Module path, if the resource is not in the root module.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Resource mode.
    #[must_use]
    pub fn mode(&self) -> ResourceMode {
        self.mode
    }

    /// Resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            write!(f, "{module}.")?;
        }
        if self.mode == ResourceMode::Data {
            f.write_str("data.")?;
        }
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

impl Ord for ResourceAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl PartialOrd for ResourceAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_address() {
        let addr = ResourceAddress::new(None, ResourceMode::Managed, "aws_instance", "web");
        assert_eq!(addr.to_string(), "aws_instance.web");
    }

    #[test]
    fn test_module_address() {
        let addr = ResourceAddress::new(
            Some("module.network".to_string()),
            ResourceMode::Managed,
            "aws_vpc",
            "main",
        );
        assert_eq!(addr.to_string(), "module.network.aws_vpc.main");
    }

    #[test]
    fn test_data_address() {
        let addr = ResourceAddress::new(None, ResourceMode::Data, "aws_ami", "ubuntu");
        assert_eq!(addr.to_string(), "data.aws_ami.ubuntu");
    }

    #[test]
    fn test_parse_simple() {
        let addr = ResourceAddress::parse("aws_instance.web").unwrap();
        assert_eq!(addr.module(), None);
        assert_eq!(addr.resource_type(), "aws_instance");
        assert_eq!(addr.name(), "web");
    }

    #[test]
    fn test_parse_nested_module() {
        let addr = ResourceAddress::parse("module.network.module.subnets.aws_subnet.public").unwrap();
        assert_eq!(addr.module(), Some("module.network.module.subnets"));
        assert_eq!(addr.resource_type(), "aws_subnet");
        assert_eq!(addr.name(), "public");
    }

    #[test]
    fn test_parse_data_in_module() {
        let addr = ResourceAddress::parse("module.network.data.aws_ami.ubuntu").unwrap();
        assert_eq!(addr.module(), Some("module.network"));
        assert_eq!(addr.mode(), ResourceMode::Data);
        assert_eq!(addr.to_string(), "module.network.data.aws_ami.ubuntu");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ResourceAddress::parse("invalid").is_none());
        assert!(ResourceAddress::parse("foo.aws_instance.web").is_none());
    }

    #[test]
    fn test_ordering_is_lexical() {
        let mut addrs = vec![
            ResourceAddress::parse("module.a.aws_vpc.main").unwrap(),
            ResourceAddress::parse("aws_vpc.main").unwrap(),
            ResourceAddress::parse("aws_instance.web").unwrap(),
        ];
        addrs.sort();
        let rendered: Vec<String> = addrs.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["aws_instance.web", "aws_vpc.main", "module.a.aws_vpc.main"]
        );
    }
}
