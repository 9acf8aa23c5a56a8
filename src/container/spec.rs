//! Desired and observed containers.

use super::config::{ContainerConfig, KindSignature};
use super::name::ContainerName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Desired Container
// =============================================================================

/// A container as the manifest wants it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Namespaced name, unique within its namespace.
    pub name: ContainerName,
    /// Declared configuration.
    pub config: ContainerConfig,
    /// Runtime id of the same-kind container already running, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ContainerSpec {
    /// Creates a spec with no runtime identity yet.
    #[must_use]
    pub fn new(name: ContainerName, config: ContainerConfig) -> Self {
        Self {
            name,
            config,
            id: None,
        }
    }

    /// Kind signature of the declared configuration.
    #[must_use]
    pub fn signature(&self) -> KindSignature {
        self.config.signature()
    }

    /// Returns true if the container should be running.
    #[must_use]
    pub fn wants_running(&self) -> bool {
        self.config.state.is_running()
    }
}

// =============================================================================
// Observed Container
// =============================================================================

/// Runtime status as reported by the container engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    /// Created but never started.
    Created,
    /// Running.
    Running,
    /// Frozen.
    Paused,
    /// Being restarted by the engine.
    Restarting,
    /// Main process exited.
    Exited,
    /// Removal failed half-way.
    Dead,
}

impl RuntimeStatus {
    /// Statuses in which the engine reports the container as running.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::Restarting)
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

/// A container as the runtime reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedContainer {
    /// Opaque runtime-assigned identifier.
    pub id: String,
    /// Namespaced name.
    pub name: ContainerName,
    /// Current runtime status.
    pub status: RuntimeStatus,
    /// Exit code of the last run, if it exited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Configuration the container was created with.
    pub config: ContainerConfig,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ObservedContainer {
    /// Returns true if the runtime reports this container as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Kind signature of the configuration the container runs with.
    #[must_use]
    pub fn signature(&self) -> KindSignature {
        self.config.signature()
    }

    /// Synthesizes the expected spec used by `recover`.
    ///
    /// The declared state recorded at creation becomes the desired state,
    /// so a container that should run but exited is started again.
    #[must_use]
    pub fn to_recovery_spec(&self) -> ContainerSpec {
        ContainerSpec {
            name: self.name.clone(),
            config: self.config.clone(),
            id: Some(self.id.clone()),
        }
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Returns true if `observed` is what creating `desired` now would produce.
#[must_use]
pub fn matches_kind(desired: &ContainerSpec, observed: &ObservedContainer) -> bool {
    desired.name == observed.name && desired.signature() == observed.signature()
}

/// Carries runtime ids of same-kind actual containers onto expected specs.
///
/// Specs without a same-kind counterpart keep (or get) no id.
pub fn assign_identity(expected: &mut [ContainerSpec], actual: &[ObservedContainer]) {
    for spec in expected.iter_mut() {
        if let Some(found) = actual.iter().find(|a| matches_kind(spec, a)) {
            tracing::debug!(container = %spec.name, id = %found.id, "matched running container");
            spec.id = Some(found.id.clone());
        }
    }
}
