//! # Reconciliation Constants
//!
//! Defaults, limits and label keys for the reconciliation engine. These
//! constants are the **single source of truth** for bounds used by the
//! manifest loader, the planner and the runners.
//!
//! ## Cross-References
//!
//! - [`crate::manifest`]: Uses size and count limits
//! - [`crate::container`]: Uses label keys and the reserved label prefix
//! - [`crate::runner`]: Uses timeouts
//! - [`crate::compose`]: Uses image retention defaults

use std::time::Duration;

// =============================================================================
// Manifest Limits
// =============================================================================

/// Maximum manifest size (1 MiB).
///
/// Manifests describe a handful of containers; anything near this size is
/// malformed or hostile.
pub const MAX_MANIFEST_SIZE: usize = 1024 * 1024;

/// Maximum number of containers per manifest.
pub const MAX_CONTAINERS_PER_MANIFEST: usize = 256;

/// Maximum length of a namespace.
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Maximum length of a container's local name.
pub const MAX_CONTAINER_NAME_LEN: usize = 63;

/// Maximum image reference length in bytes.
pub const MAX_IMAGE_REF_LEN: usize = 512;

/// Maximum number of environment variables per container.
pub const MAX_ENV_VARS_PER_CONTAINER: usize = 256;

/// Maximum number of dependencies (links + volumes_from + wait_for) per container.
pub const MAX_DEPENDENCIES_PER_CONTAINER: usize = 64;

/// Namespace used when a manifest does not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

// =============================================================================
// Timeouts
// =============================================================================

/// Default grace period between stop (SIGTERM) and force kill.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Default upper bound on a single action (create, remove, pull, ...).
///
/// Workers are cancelled at this deadline so a timed-out tier never leaves
/// workers running indefinitely.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Extra slack added to the action timeout when deriving a tier deadline.
pub const TIER_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

// =============================================================================
// Image Retention
// =============================================================================

/// Number of most recent tags kept per repository by `clean`.
pub const DEFAULT_KEEP_IMAGES: usize = 5;

/// Tag assumed when an image reference has none.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

// =============================================================================
// Labels
// =============================================================================
//
// Concrete runtime clients record ownership and the declared configuration
// on every container they create. Keys under the reserved prefix are never
// part of a kind signature.
// =============================================================================

/// Prefix reserved for labels written by this crate.
pub const RESERVED_LABEL_PREFIX: &str = "magikcompose.";

/// Label holding the owning namespace.
pub const NAMESPACE_LABEL: &str = "magikcompose.namespace";

/// Label holding the JSON-encoded declared configuration.
pub const CONFIG_LABEL: &str = "magikcompose.config";
