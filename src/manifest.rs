//! Manifest loading.
//!
//! A manifest declares the desired containers of one namespace:
//!
//! ```yaml
//! namespace: shop
//! containers:
//!   db:
//!     image: postgres:16
//!     env:
//!       POSTGRES_PASSWORD: secret
//!     volumes: ["/srv/db:/var/lib/postgresql/data"]
//!   api:
//!     image: registry.local:5000/shop/api:1.4
//!     cmd: ["serve", "--port", "8080"]
//!     links: ["db:database"]
//!     ports: ["8080:8080"]
//!     restart: unless-stopped
//!   migrate:
//!     image: registry.local:5000/shop/api:1.4
//!     state: stopped
//!     wait_for: [db]
//! ```
//!
//! - **Namespace**: defaults to `default`.
//! - **References**: `links`, `volumes_from` and `wait_for` accept bare
//!   names (resolved in the manifest namespace) or `namespace.name`.
//!   A link may carry an alias as `name:alias`.
//! - **Ports**: `[host_ip:]host_port:container_port[/proto]` or
//!   `container_port[/proto]`.
//! - **Env**: map values may be any scalar; they are stored as strings.
//!   A list of `KEY=VALUE` strings is accepted too.
//!
//! Parsing goes through `serde_yaml::Value` so every field can be checked
//! against the limits in [`crate::constants`] with a precise message.

use crate::constants::{
    DEFAULT_NAMESPACE, MAX_CONTAINERS_PER_MANIFEST, MAX_DEPENDENCIES_PER_CONTAINER,
    MAX_ENV_VARS_PER_CONTAINER, MAX_MANIFEST_SIZE,
};
use crate::container::{
    ContainerConfig, ContainerName, ContainerSpec, DesiredState, ImageRef, Link, PortBinding,
    RestartPolicy,
};
use crate::error::{Error, Result};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// Manifest
// =============================================================================

/// Parsed and validated manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    namespace: String,
    containers: Vec<ContainerSpec>,
}

impl Manifest {
    /// Creates a manifest from already-built specs.
    ///
    /// Specs must belong to `namespace`; names must be unique.
    pub fn new(namespace: impl Into<String>, containers: Vec<ContainerSpec>) -> Result<Self> {
        let namespace = namespace.into();
        // Validates the namespace segment.
        ContainerName::new(namespace.as_str(), "probe")?;

        if containers.len() > MAX_CONTAINERS_PER_MANIFEST {
            return Err(Error::InvalidInput(format!(
                "too many containers: {} (max {})",
                containers.len(),
                MAX_CONTAINERS_PER_MANIFEST
            )));
        }

        let mut seen = BTreeSet::new();
        for spec in &containers {
            if !spec.name.in_namespace(&namespace) {
                return Err(Error::InvalidInput(format!(
                    "container {} is outside namespace '{}'",
                    spec.name, namespace
                )));
            }
            if !seen.insert(&spec.name) {
                return Err(Error::DuplicateContainer(spec.name.to_string()));
            }
        }

        Ok(Self {
            namespace,
            containers,
        })
    }

    /// Parses a manifest from YAML bytes.
    ///
    /// # Errors
    ///
    /// - Size exceeds `MAX_MANIFEST_SIZE`
    /// - YAML parsing fails
    /// - Validation errors for names, references, counts, etc.
    pub fn from_yaml(yaml: &[u8]) -> Result<Self> {
        if yaml.len() > MAX_MANIFEST_SIZE {
            return Err(Error::InvalidInput(format!(
                "manifest size {} exceeds limit of {}",
                yaml.len(),
                MAX_MANIFEST_SIZE
            )));
        }

        let doc: Value = serde_yaml::from_slice(yaml)?;
        Self::from_value(&doc)
    }

    /// Reads and parses a manifest file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        if size > MAX_MANIFEST_SIZE as u64 {
            return Err(Error::InvalidInput(format!(
                "manifest {} is {} bytes (limit {})",
                path.display(),
                size,
                MAX_MANIFEST_SIZE
            )));
        }
        let bytes = std::fs::read(path)?;
        Self::from_yaml(&bytes)
    }

    /// Parses a manifest from a `serde_yaml::Value`.
    pub fn from_value(doc: &Value) -> Result<Self> {
        if !doc.is_mapping() {
            return Err(Error::InvalidInput(
                "manifest must be a mapping".to_string(),
            ));
        }

        let namespace = match doc.get("namespace") {
            None | Some(Value::Null) => DEFAULT_NAMESPACE.to_string(),
            Some(value) => value
                .as_str()
                .ok_or_else(|| Error::InvalidInput("namespace must be a string".to_string()))?
                .to_string(),
        };

        let Some(entries) = doc.get("containers").and_then(Value::as_mapping) else {
            return Self::new(namespace, Vec::new());
        };

        if entries.len() > MAX_CONTAINERS_PER_MANIFEST {
            return Err(Error::InvalidInput(format!(
                "too many containers: {} (max {})",
                entries.len(),
                MAX_CONTAINERS_PER_MANIFEST
            )));
        }

        let mut containers = Vec::with_capacity(entries.len());
        for (key, body) in entries {
            let local = key
                .as_str()
                .ok_or_else(|| Error::InvalidInput("container name must be a string".to_string()))?;
            let name = ContainerName::new(namespace.as_str(), local)?;
            let config = parse_config(body, &name)?;
            containers.push(ContainerSpec::new(name, config));
        }

        Self::new(namespace, containers)
    }

    /// Namespace the manifest manages.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Declared containers, in declaration order.
    #[must_use]
    pub fn containers(&self) -> &[ContainerSpec] {
        &self.containers
    }

    /// Distinct normalized images referenced by the manifest, sorted.
    #[must_use]
    pub fn images(&self) -> Vec<ImageRef> {
        let images: BTreeSet<ImageRef> = self
            .containers
            .iter()
            .map(|c| c.config.image.normalized())
            .collect();
        images.into_iter().collect()
    }
}

// =============================================================================
// Container Parsing
// =============================================================================

fn parse_config(body: &Value, name: &ContainerName) -> Result<ContainerConfig> {
    let field_error = |field: &str, reason: &str| {
        Error::InvalidInput(format!("container {name}: {field} {reason}"))
    };

    if !body.is_mapping() {
        return Err(field_error("definition", "must be a mapping"));
    }

    let image = body
        .get("image")
        .and_then(Value::as_str)
        .ok_or_else(|| field_error("image", "is required"))?;
    let mut config = ContainerConfig::new(ImageRef::parse(image)?);

    if let Some(state) = body.get("state") {
        config.state = match state.as_str() {
            Some("running") => DesiredState::Running,
            Some("stopped") | Some("created") => DesiredState::Stopped,
            _ => return Err(field_error("state", "must be 'running' or 'stopped'")),
        };
    }

    config.command = string_list(first_of(body, &["command", "cmd"]), "command", name)?;
    config.entrypoint = string_list(body.get("entrypoint"), "entrypoint", name)?;
    config.env = parse_env(body.get("env"), name)?;
    config.labels = parse_labels(body.get("labels"), name)?;
    config.volumes = string_list(body.get("volumes"), "volumes", name)?;

    config.volumes_from = string_list(body.get("volumes_from"), "volumes_from", name)?
        .iter()
        .map(|r| ContainerName::parse(r, name.namespace()))
        .collect::<Result<_>>()?;
    config.wait_for = string_list(body.get("wait_for"), "wait_for", name)?
        .iter()
        .map(|r| ContainerName::parse(r, name.namespace()))
        .collect::<Result<_>>()?;
    config.links = string_list(body.get("links"), "links", name)?
        .iter()
        .map(|r| parse_link(r, name.namespace()))
        .collect::<Result<_>>()?;

    if config.dependencies().len() > MAX_DEPENDENCIES_PER_CONTAINER {
        return Err(Error::InvalidInput(format!(
            "container {name}: too many dependencies (max {MAX_DEPENDENCIES_PER_CONTAINER})"
        )));
    }
    if config.dependencies().contains(name) {
        return Err(Error::DependencyCycle(name.to_string()));
    }

    config.ports = string_list(body.get("ports"), "ports", name)?
        .iter()
        .map(|p| parse_port(p).ok_or_else(|| field_error("port", &format!("'{p}' is malformed"))))
        .collect::<Result<_>>()?;

    if let Some(restart) = body.get("restart") {
        config.restart = match restart.as_str() {
            Some("no") | Some("never") => RestartPolicy::No,
            Some("always") => RestartPolicy::Always,
            Some("on-failure") => RestartPolicy::OnFailure,
            Some("unless-stopped") => RestartPolicy::UnlessStopped,
            _ => {
                return Err(field_error(
                    "restart",
                    "must be one of no, always, on-failure, unless-stopped",
                ));
            }
        };
    }

    config.user = optional_string(body.get("user"), "user", name)?;
    config.working_dir = optional_string(
        first_of(body, &["working_dir", "workdir"]),
        "working_dir",
        name,
    )?;
    config.network_mode = optional_string(
        first_of(body, &["network_mode", "net"]),
        "network_mode",
        name,
    )?;

    if let Some(memory) = body.get("memory") {
        let bytes = parse_memory(memory)
            .ok_or_else(|| field_error("memory", "must be bytes or a size like 512m"))?;
        config.memory_bytes = Some(bytes);
    }
    if let Some(shares) = body.get("cpu_shares") {
        let shares = shares
            .as_u64()
            .ok_or_else(|| field_error("cpu_shares", "must be a positive integer"))?;
        config.cpu_shares = Some(shares);
    }

    Ok(config)
}

fn first_of<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| body.get(*k))
}

/// Renders a YAML scalar as a string.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn optional_string(
    value: Option<&Value>,
    field: &str,
    name: &ContainerName,
) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar(v).map(Some).ok_or_else(|| {
            Error::InvalidInput(format!("container {name}: {field} must be a string"))
        }),
    }
}

/// Accepts a sequence of scalars, or a single string.
fn string_list(value: Option<&Value>, field: &str, name: &ContainerName) -> Result<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Sequence(seq)) => seq
            .iter()
            .map(|v| {
                scalar(v).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "container {name}: {field} entries must be strings"
                    ))
                })
            })
            .collect(),
        Some(_) => Err(Error::InvalidInput(format!(
            "container {name}: {field} must be a list"
        ))),
    }
}

fn parse_env(value: Option<&Value>, name: &ContainerName) -> Result<BTreeMap<String, String>> {
    let env = match value {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Mapping(mapping)) => {
            let mut env = BTreeMap::new();
            for (k, v) in mapping {
                let key = k.as_str().ok_or_else(|| {
                    Error::InvalidInput(format!("container {name}: env key must be a string"))
                })?;
                let val = match v {
                    Value::Null => String::new(),
                    other => scalar(other).ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "container {name}: env value for '{key}' must be a scalar"
                        ))
                    })?,
                };
                env.insert(key.to_string(), val);
            }
            env
        }
        Some(other) => string_list(Some(other), "env", name)?
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (entry, String::new()),
            })
            .collect(),
    };

    if env.len() > MAX_ENV_VARS_PER_CONTAINER {
        return Err(Error::InvalidInput(format!(
            "container {name}: too many env vars: {} (max {})",
            env.len(),
            MAX_ENV_VARS_PER_CONTAINER
        )));
    }
    if env.keys().any(String::is_empty) {
        return Err(Error::InvalidInput(format!(
            "container {name}: env var name cannot be empty"
        )));
    }
    Ok(env)
}

fn parse_labels(value: Option<&Value>, name: &ContainerName) -> Result<BTreeMap<String, String>> {
    let Some(mapping) = value.and_then(Value::as_mapping) else {
        return Ok(BTreeMap::new());
    };

    let mut labels = BTreeMap::new();
    for (k, v) in mapping {
        let (Some(key), Some(val)) = (k.as_str(), scalar(v)) else {
            return Err(Error::InvalidInput(format!(
                "container {name}: labels must map strings to scalars"
            )));
        };
        labels.insert(key.to_string(), val);
    }
    Ok(labels)
}

/// Parses `name[:alias]`.
fn parse_link(s: &str, namespace: &str) -> Result<Link> {
    let (target, alias) = match s.split_once(':') {
        Some((target, alias)) if !alias.is_empty() => (target, Some(alias.to_string())),
        Some(_) => {
            return Err(Error::InvalidInput(format!("link '{s}' has an empty alias")));
        }
        None => (s, None),
    };
    Ok(Link {
        target: ContainerName::parse(target, namespace)?,
        alias,
    })
}

/// Parses `[host_ip:]host_port:container_port[/proto]` or `container_port[/proto]`.
fn parse_port(s: &str) -> Option<PortBinding> {
    let (spec, protocol) = match s.split_once('/') {
        Some((spec, proto @ ("tcp" | "udp"))) => (spec, proto.to_string()),
        Some(_) => return None,
        None => (s, "tcp".to_string()),
    };

    let parts: Vec<&str> = spec.rsplitn(3, ':').collect();
    let container_port: u16 = parts.first()?.parse().ok()?;
    let host_port = match parts.get(1) {
        Some(p) => Some(p.parse::<u16>().ok()?),
        None => None,
    };
    let host_ip = parts.get(2).map(|ip| (*ip).to_string());

    if container_port == 0 || host_port == Some(0) {
        return None;
    }

    Some(PortBinding {
        container_port,
        protocol,
        host_ip,
        host_port,
    })
}

/// Parses a byte count, optionally suffixed with `k`, `m` or `g`.
fn parse_memory(value: &Value) -> Option<u64> {
    if let Some(bytes) = value.as_u64() {
        return Some(bytes);
    }
    let s = value.as_str()?.trim().to_ascii_lowercase();
    let s = s.strip_suffix('b').unwrap_or(&s);
    let (digits, multiplier) = match s.chars().last()? {
        'k' => (&s[..s.len() - 1], 1024),
        'm' => (&s[..s.len() - 1], 1024 * 1024),
        'g' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_forms() {
        let p = parse_port("8080").unwrap();
        assert_eq!(p.container_port, 8080);
        assert_eq!(p.host_port, None);
        assert_eq!(p.protocol, "tcp");

        let p = parse_port("127.0.0.1:80:8080/udp").unwrap();
        assert_eq!(p.host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(p.host_port, Some(80));
        assert_eq!(p.container_port, 8080);
        assert_eq!(p.protocol, "udp");

        assert!(parse_port("0").is_none());
        assert!(parse_port("80/sctp").is_none());
        assert!(parse_port("http").is_none());
    }

    #[test]
    fn test_parse_memory_suffixes() {
        assert_eq!(parse_memory(&Value::from(1024u64)), Some(1024));
        assert_eq!(parse_memory(&Value::from("512m")), Some(512 * 1024 * 1024));
        assert_eq!(parse_memory(&Value::from("1G")), Some(1024 * 1024 * 1024));
        assert_eq!(parse_memory(&Value::from("64kb")), Some(64 * 1024));
        assert_eq!(parse_memory(&Value::from("lots")), None);
    }

    #[test]
    fn test_parse_link_alias() {
        let link = parse_link("db:database", "shop").unwrap();
        assert_eq!(link.target.to_string(), "shop.db");
        assert_eq!(link.alias.as_deref(), Some("database"));

        let link = parse_link("infra.cache", "shop").unwrap();
        assert_eq!(link.target.to_string(), "infra.cache");
        assert!(link.alias.is_none());

        assert!(parse_link("db:", "shop").is_err());
    }
}
