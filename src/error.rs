//! Error types for the reconciliation engine.

use std::time::Duration;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Phase of a compose verb in which an error surfaced.
///
/// Every verb on [`crate::Compose`] wraps its terminal error in
/// [`Error::Phase`] so callers can pick the right remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Listing containers from the runtime.
    List,
    /// Explicit image pull (`pull` verb or `--pull`).
    Pull,
    /// Fetching missing images before any create runs.
    Fetch,
    /// Diff and plan construction.
    Plan,
    /// Plan execution.
    Execute,
    /// Attaching to container output.
    Attach,
    /// Removing old images.
    Clean,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Pull => write!(f, "pull"),
            Self::Fetch => write!(f, "fetch"),
            Self::Plan => write!(f, "plan"),
            Self::Execute => write!(f, "execute"),
            Self::Attach => write!(f, "attach"),
            Self::Clean => write!(f, "clean"),
        }
    }
}

/// Errors that can occur while planning or executing a reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Planning Errors
    // =========================================================================
    /// Two expected containers share a name.
    #[error("duplicate container name in manifest: {0}")]
    DuplicateContainer(String),

    /// A container references a dependency that is not in the expected set.
    #[error("container '{container}' depends on '{dependency}', which is not defined")]
    MissingDependency {
        container: String,
        dependency: String,
    },

    /// Dependency edges form a cycle.
    #[error("dependency cycle detected between: {0}")]
    DependencyCycle(String),

    /// Container name failed validation.
    #[error("invalid container name '{name}': {reason}")]
    InvalidContainerName { name: String, reason: String },

    /// Failed to parse image reference.
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidImageReference { reference: String, reason: String },

    /// Invalid manifest or argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Container not found.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Container create failed.
    #[error("failed to create container '{name}': {reason}")]
    CreateFailed { name: String, reason: String },

    /// Container start failed.
    #[error("failed to start container '{id}': {reason}")]
    StartFailed { id: String, reason: String },

    /// Container stop failed.
    #[error("failed to stop container '{id}': {reason}")]
    StopFailed { id: String, reason: String },

    /// Container remove failed.
    #[error("failed to remove container '{id}': {reason}")]
    RemoveFailed { id: String, reason: String },

    /// Image pull failed.
    #[error("failed to pull image '{reference}': {reason}")]
    ImagePullFailed { reference: String, reason: String },

    /// Image not present locally.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// Attaching to container output failed.
    #[error("failed to attach to container '{name}': {reason}")]
    AttachFailed { name: String, reason: String },

    // =========================================================================
    // Execution Errors
    // =========================================================================
    /// Operation timed out.
    #[error("operation timed out after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// A worker finished without reporting its outcome.
    #[error("worker exited without reporting an outcome")]
    WorkerLost,

    /// Terminal error of a compose verb, tagged with the failing phase.
    #[error("{phase} failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse error.
    #[error("manifest parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wraps this error with the phase it surfaced in.
    ///
    /// Already-tagged errors keep their original phase.
    #[must_use]
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            Self::Phase { .. } => self,
            other => Self::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Returns the phase this error was tagged with, if any.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Returns the underlying error, looking through a phase tag.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Self::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if this error (or the error it wraps) is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout { .. })
    }

    /// Returns true for errors raised while validating a plan.
    #[must_use]
    pub fn is_planning(&self) -> bool {
        matches!(
            self.root(),
            Self::DuplicateContainer(_)
                | Self::MissingDependency { .. }
                | Self::DependencyCycle(_)
                | Self::InvalidContainerName { .. }
                | Self::InvalidInput(_)
        )
    }
}
