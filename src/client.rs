//! Runtime client capability consumed by the reconciliation engine.
//!
//! The engine never talks to a container engine directly. Everything it
//! needs (listing, pulling, creating, stopping, removing) goes through the
//! [`RuntimeClient`] trait, so the transport (Docker API, CRI socket, an
//! OCI runtime, or the in-memory backend) is the implementor's concern.
//!
//! # Concurrency Contract
//!
//! Runners call a single client from many tasks at once. Implementations
//! must be `Send + Sync` and safe for concurrent use.
//!
//! # Ownership Labels
//!
//! Clients that persist containers should record
//! [`NAMESPACE_LABEL`](crate::constants::NAMESPACE_LABEL) and
//! [`CONFIG_LABEL`](crate::constants::CONFIG_LABEL) on create and rebuild
//! [`ObservedContainer::config`] from the latter. Comparing against the
//! declared configuration, not the engine's normalized view, keeps
//! engine-filled defaults from looking like drift.

use crate::container::{ContainerSpec, ImageRef, ObservedContainer};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Registry Authentication
// =============================================================================

/// Credentials passed through to image pulls.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistryAuth {
    /// No credentials.
    #[default]
    Anonymous,
    /// Username and password (or token).
    Basic {
        username: String,
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server: Option<String>,
    },
}

// =============================================================================
// Image Info
// =============================================================================

/// A locally stored image, as listed for cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Tagged reference.
    pub reference: ImageRef,
    /// Content id.
    pub id: String,
    /// When the image was built or pulled.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Runtime Client Trait
// =============================================================================

/// Capability-style client to a container engine.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Returns the backend name (for logs).
    fn name(&self) -> &str;

    // =========================================================================
    // Containers
    // =========================================================================

    /// Lists containers, restricted to `namespace` when given.
    async fn list_containers(&self, namespace: Option<&str>) -> Result<Vec<ObservedContainer>>;

    /// Creates a container from `spec` and returns its runtime id.
    ///
    /// The container is created stopped; [`start_container`](Self::start_container)
    /// starts it.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Starts a created or exited container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stops a container, force-killing it after `grace`.
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()>;

    /// Deletes a stopped container.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Streams the output of `containers` until they exit.
    async fn attach(&self, containers: &[ContainerSpec]) -> Result<()>;

    // =========================================================================
    // Images
    // =========================================================================

    /// Returns true if the image is present locally.
    async fn image_exists(&self, image: &ImageRef) -> Result<bool>;

    /// Pulls an image from its registry.
    async fn pull_image(&self, image: &ImageRef, auth: Option<&RegistryAuth>) -> Result<()>;

    /// Lists local images of `repository` (as returned by [`ImageRef::repository`]).
    async fn list_images(&self, repository: &str) -> Result<Vec<ImageInfo>>;

    /// Removes a local image.
    async fn remove_image(&self, image: &ImageRef) -> Result<()>;
}
