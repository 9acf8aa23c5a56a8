//! The closed set of reconciliation actions.
//!
//! Every action can [`describe`](Action::describe) itself (dry run) and
//! [`apply`](Action::apply) itself against a [`RuntimeClient`] (real run).
//! Runners pick one of the two; the variant set is fixed.

use crate::client::{RegistryAuth, RuntimeClient};
use crate::constants::DEFAULT_STOP_GRACE;
use crate::container::{ContainerName, ContainerSpec, ImageRef, ObservedContainer};
use crate::error::Result;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

// =============================================================================
// Apply Options
// =============================================================================

/// Settings shared by every action in a real run.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Time between a graceful stop and a forced kill.
    pub grace: Duration,
    /// Credentials for image pulls.
    pub auth: Option<RegistryAuth>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            grace: DEFAULT_STOP_GRACE,
            auth: None,
        }
    }
}

// =============================================================================
// Action
// =============================================================================

/// One step of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Create (and start, if declared running) a new container.
    Create(ContainerSpec),
    /// Stop and delete an existing container.
    Remove(ObservedContainer),
    /// Container already matches; nothing to do.
    Noop(ContainerSpec),
    /// Make sure an image is present locally.
    PullImage {
        image: ImageRef,
        /// Pull even if the image is already present.
        force: bool,
    },
    /// Start or stop a same-kind container whose runtime state differs
    /// from its declared state.
    EnsureState {
        container: ObservedContainer,
        running: bool,
    },
}

impl Action {
    /// Container this action targets, if any.
    #[must_use]
    pub fn target(&self) -> Option<&ContainerName> {
        match self {
            Self::Create(spec) | Self::Noop(spec) => Some(&spec.name),
            Self::Remove(container) | Self::EnsureState { container, .. } => {
                Some(&container.name)
            }
            Self::PullImage { .. } => None,
        }
    }

    /// Returns true for [`Action::Noop`].
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop(_))
    }

    /// Returns true for [`Action::Create`].
    #[must_use]
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }

    /// Returns true for [`Action::Remove`].
    #[must_use]
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove(_))
    }

    /// Human-readable description of the intended effect.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Create(spec) => {
                let mut text =
                    format!("create container {} from {}", spec.name, spec.config.image);
                if !spec.wants_running() {
                    text.push_str(" (not started)");
                }
                text
            }
            Self::Remove(container) => format!(
                "remove container {} (id {}, {})",
                container.name,
                short_id(&container.id),
                container.status
            ),
            Self::Noop(spec) => format!("container {} is up to date", spec.name),
            Self::PullImage { image, force: true } => format!("pull image {image}"),
            Self::PullImage { image, force: false } => format!("pull image {image} if missing"),
            Self::EnsureState {
                container,
                running: true,
            } => format!(
                "start container {} (id {})",
                container.name,
                short_id(&container.id)
            ),
            Self::EnsureState {
                container,
                running: false,
            } => format!(
                "stop container {} (id {})",
                container.name,
                short_id(&container.id)
            ),
        }
    }

    /// Executes this action against the runtime.
    ///
    /// Each side effect is pushed to `effects` as soon as it lands, so an
    /// action that fails midway still leaves its completed steps on record.
    pub async fn apply(
        &self,
        client: &dyn RuntimeClient,
        options: &ApplyOptions,
        effects: &mut Vec<ActionOutcome>,
    ) -> Result<()> {
        match self {
            Self::Create(spec) => {
                ensure_image(client, &spec.config.image, false, options, effects).await?;
                let id = client.create_container(spec).await?;
                info!(container = %spec.name, id = %short_id(&id), "created container");
                effects.push(ActionOutcome::Created {
                    id: id.clone(),
                    name: spec.name.clone(),
                });
                if spec.wants_running() {
                    client.start_container(&id).await?;
                    info!(container = %spec.name, "started container");
                }
            }
            Self::Remove(container) => {
                if container.is_running() {
                    client.stop_container(&container.id, options.grace).await?;
                    debug!(container = %container.name, "stopped container");
                    effects.push(ActionOutcome::Stopped {
                        id: container.id.clone(),
                        name: container.name.clone(),
                    });
                }
                client.remove_container(&container.id).await?;
                info!(
                    container = %container.name,
                    id = %short_id(&container.id),
                    "removed container"
                );
                effects.push(ActionOutcome::Removed {
                    id: container.id.clone(),
                    name: container.name.clone(),
                });
            }
            Self::Noop(spec) => {
                debug!(container = %spec.name, "up to date");
            }
            Self::PullImage { image, force } => {
                ensure_image(client, image, *force, options, effects).await?;
            }
            Self::EnsureState { container, running } => {
                let id = container.id.clone();
                let name = container.name.clone();
                if *running {
                    client.start_container(&container.id).await?;
                    info!(container = %container.name, "started container");
                    effects.push(ActionOutcome::Started { id, name });
                } else {
                    client.stop_container(&container.id, options.grace).await?;
                    info!(container = %container.name, "stopped container");
                    effects.push(ActionOutcome::Stopped { id, name });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Pulls `image` when forced or missing.
async fn ensure_image(
    client: &dyn RuntimeClient,
    image: &ImageRef,
    force: bool,
    options: &ApplyOptions,
    effects: &mut Vec<ActionOutcome>,
) -> Result<()> {
    if !force && client.image_exists(image).await? {
        debug!(image = %image, "image present");
        return Ok(());
    }
    info!(image = %image, "pulling image");
    client.pull_image(image, options.auth.as_ref()).await?;
    effects.push(ActionOutcome::Pulled(image.clone()));
    Ok(())
}

/// First 12 characters of a runtime id.
fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

// =============================================================================
// Action Outcome
// =============================================================================

/// One side effect an action had on the runtime.
///
/// Workers return the effects of their action, including those of a failed
/// one, and the runner merges them after each tier barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// A container was created.
    Created { id: String, name: ContainerName },
    /// A container was removed.
    Removed { id: String, name: ContainerName },
    /// An existing container was started.
    Started { id: String, name: ContainerName },
    /// A container was stopped.
    Stopped { id: String, name: ContainerName },
    /// An image was pulled.
    Pulled(ImageRef),
}
