//! Declared container configuration and its kind signature.
//!
//! # Kind Signature
//!
//! Two configurations are the *same kind* when they would produce the same
//! container if created now. The signature is a SHA-256 digest over a
//! canonical JSON rendering of exactly these fields:
//!
//! | Included | Excluded |
//! |----------|----------|
//! | image (default tag filled in) | declared `state` |
//! | command, entrypoint | `wait_for` (ordering only) |
//! | env, user labels | labels under `magikcompose.` |
//! | volumes, volumes_from (as set), links (as set) | runtime id, timestamps, status |
//! | ports, restart, user, working_dir, network_mode | |
//! | memory_bytes, cpu_shares | |
//!
//! Maps are `BTreeMap`s and relation lists are sorted before hashing, so
//! the signature is stable across processes and declaration order.

use super::image::ImageRef;
use super::name::ContainerName;
use crate::constants::RESERVED_LABEL_PREFIX;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// Supporting Types
// =============================================================================

/// Declared lifecycle intent of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// Container should be running.
    #[default]
    Running,
    /// Container should exist but not run.
    Stopped,
}

impl DesiredState {
    /// Returns true for [`DesiredState::Running`].
    #[must_use]
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Restart policy handed to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart.
    #[default]
    No,
    /// Always restart.
    Always,
    /// Restart on non-zero exit.
    OnFailure,
    /// Restart unless explicitly stopped.
    UnlessStopped,
}

/// Link to another container, optionally under an alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    /// Linked container.
    pub target: ContainerName,
    /// Hostname the target is reachable under (defaults to its name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Published port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortBinding {
    /// Port inside the container.
    pub container_port: u16,
    /// `tcp` or `udp`.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Host interface to bind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Host port to publish on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

// =============================================================================
// Container Configuration
// =============================================================================

/// Runtime-relevant configuration of a container.
///
/// Collections default to empty so that "absent" and "empty" are the same
/// value, both for equality and for the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image reference.
    pub image: ImageRef,
    /// Declared lifecycle intent.
    #[serde(default)]
    pub state: DesiredState,
    /// Command (arguments to the entrypoint).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Entrypoint override.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Volume specs (`/host:/container[:ro]` or `/container`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Containers whose volumes are mounted into this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<ContainerName>,
    /// Linked containers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    /// Containers that must be up before this one starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wait_for: Vec<ContainerName>,
    /// Published ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortBinding>,
    /// Restart policy.
    #[serde(default)]
    pub restart: RestartPolicy,
    /// User to run as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Network mode (`bridge`, `host`, `container:<name>`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// Memory limit in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
    /// CPU shares.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_shares: Option<u64>,
}

impl ContainerConfig {
    /// Creates a configuration with only an image set.
    #[must_use]
    pub fn new(image: ImageRef) -> Self {
        Self {
            image,
            state: DesiredState::default(),
            command: Vec::new(),
            entrypoint: Vec::new(),
            env: BTreeMap::new(),
            labels: BTreeMap::new(),
            volumes: Vec::new(),
            volumes_from: Vec::new(),
            links: Vec::new(),
            wait_for: Vec::new(),
            ports: Vec::new(),
            restart: RestartPolicy::default(),
            user: None,
            working_dir: None,
            network_mode: None,
            memory_bytes: None,
            cpu_shares: None,
        }
    }

    /// Every container this one depends on, de-duplicated and sorted.
    #[must_use]
    pub fn dependencies(&self) -> Vec<ContainerName> {
        let mut deps: BTreeSet<ContainerName> = self.binding_dependencies().into_iter().collect();
        deps.extend(self.wait_for.iter().cloned());
        deps.into_iter().collect()
    }

    /// Dependencies resolved when the container is created (links and
    /// volumes_from). Recreating one of these forces a recreate of this
    /// container too.
    #[must_use]
    pub fn binding_dependencies(&self) -> Vec<ContainerName> {
        let deps: BTreeSet<ContainerName> = self
            .volumes_from
            .iter()
            .cloned()
            .chain(self.links.iter().map(|l| l.target.clone()))
            .collect();
        deps.into_iter().collect()
    }

    /// Computes the kind signature.
    #[must_use]
    pub fn signature(&self) -> KindSignature {
        let mut volumes_from: Vec<&ContainerName> = self.volumes_from.iter().collect();
        volumes_from.sort();
        volumes_from.dedup();
        let mut links: Vec<&Link> = self.links.iter().collect();
        links.sort();
        links.dedup();

        let view = SignatureView {
            image: self.image.normalized().to_string(),
            command: &self.command,
            entrypoint: &self.entrypoint,
            env: &self.env,
            labels: self
                .labels
                .iter()
                .filter(|(k, _)| !k.starts_with(RESERVED_LABEL_PREFIX))
                .collect(),
            volumes: &self.volumes,
            volumes_from,
            links,
            ports: &self.ports,
            restart: self.restart,
            user: self.user.as_deref(),
            working_dir: self.working_dir.as_deref(),
            network_mode: self.network_mode.as_deref(),
            memory_bytes: self.memory_bytes,
            cpu_shares: self.cpu_shares,
        };

        // Serializing borrowed strings, maps and integers cannot fail.
        let canonical = serde_json::to_vec(&view).unwrap_or_default();
        KindSignature(hex::encode(Sha256::digest(&canonical)))
    }

    /// Encodes this configuration for the [`CONFIG_LABEL`] label.
    ///
    /// [`CONFIG_LABEL`]: crate::constants::CONFIG_LABEL
    pub fn to_label_value(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a configuration written by [`to_label_value`](Self::to_label_value).
    pub fn from_label_value(value: &str) -> Result<Self> {
        Ok(serde_json::from_str(value)?)
    }
}

#[derive(Serialize)]
struct SignatureView<'a> {
    image: String,
    command: &'a [String],
    entrypoint: &'a [String],
    env: &'a BTreeMap<String, String>,
    labels: BTreeMap<&'a String, &'a String>,
    volumes: &'a [String],
    volumes_from: Vec<&'a ContainerName>,
    links: Vec<&'a Link>,
    ports: &'a [PortBinding],
    restart: RestartPolicy,
    user: Option<&'a str>,
    working_dir: Option<&'a str>,
    network_mode: Option<&'a str>,
    memory_bytes: Option<u64>,
    cpu_shares: Option<u64>,
}

// =============================================================================
// Kind Signature
// =============================================================================

/// Hex-encoded SHA-256 over the semantically significant configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindSignature(String);

impl KindSignature {
    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KindSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}
