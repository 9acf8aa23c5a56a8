//! Namespaced container names.

use crate::constants::{DEFAULT_NAMESPACE, MAX_CONTAINER_NAME_LEN, MAX_NAMESPACE_LEN};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A container name scoped to a namespace.
///
/// Rendered as `namespace.name`. The namespace isolates the containers of
/// one manifest from every other manifest on the same host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerName {
    namespace: String,
    name: String,
}

impl ContainerName {
    /// Creates a validated name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();
        validate_segment(&namespace, MAX_NAMESPACE_LEN, &namespace, &name)?;
        validate_segment(&name, MAX_CONTAINER_NAME_LEN, &namespace, &name)?;
        Ok(Self { namespace, name })
    }

    /// Parses `namespace.name`, or a bare `name` placed in `default_namespace`.
    pub fn parse(s: &str, default_namespace: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((namespace, name)) => Self::new(namespace, name),
            None => Self::new(default_namespace, s),
        }
    }

    /// Namespace part.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Local name within the namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this name belongs to `namespace`.
    #[must_use]
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }
}

fn validate_segment(segment: &str, max_len: usize, namespace: &str, name: &str) -> Result<()> {
    let invalid = |reason: String| Error::InvalidContainerName {
        name: format!("{namespace}.{name}"),
        reason,
    };

    if segment.is_empty() {
        return Err(invalid("namespace and name cannot be empty".to_string()));
    }
    if segment.len() > max_len {
        return Err(invalid(format!(
            "'{segment}' exceeds maximum length of {max_len}"
        )));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(format!(
            "'{segment}' must contain only alphanumeric characters, '-' or '_'"
        )));
    }
    if !segment.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid(format!(
            "'{segment}' must start with an alphanumeric character"
        )));
    }
    Ok(())
}

impl std::fmt::Display for ContainerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl std::str::FromStr for ContainerName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, DEFAULT_NAMESPACE)
    }
}

impl TryFrom<String> for ContainerName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ContainerName> for String {
    fn from(name: ContainerName) -> Self {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified_and_bare() {
        let qualified = ContainerName::parse("shop.web", "other").unwrap();
        assert_eq!(qualified.namespace(), "shop");
        assert_eq!(qualified.name(), "web");

        let bare = ContainerName::parse("db", "shop").unwrap();
        assert_eq!(bare.to_string(), "shop.db");
    }

    #[test]
    fn test_rejects_bad_segments() {
        assert!(ContainerName::new("", "web").is_err());
        assert!(ContainerName::new("shop", "-web").is_err());
        assert!(ContainerName::new("shop", "we b").is_err());
        assert!(ContainerName::parse("a.b.c", "x").is_err());
    }
}
