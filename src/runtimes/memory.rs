//! In-memory runtime backend.
//!
//! Keeps containers and images in process memory. It behaves like a real
//! engine where that matters to reconciliation:
//!
//! - container names are unique, so a create before the matching remove fails
//! - running containers cannot be removed without a stop
//! - creates need the image to be present locally
//! - the declared configuration round-trips through [`CONFIG_LABEL`]
//!
//! Failure injection, artificial latency and a call log make it the test
//! double for runner and compose tests; loaded from a JSON snapshot it
//! backs the `plan` preview command.

use crate::client::{ImageInfo, RegistryAuth, RuntimeClient};
use crate::constants::{CONFIG_LABEL, NAMESPACE_LABEL};
use crate::container::{
    ContainerConfig, ContainerName, ContainerSpec, ImageRef, ObservedContainer, RuntimeStatus,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// A call received by [`MemoryRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    List,
    Create(ContainerName),
    Start(String),
    Stop(String),
    Remove(String),
    Attach(Vec<ContainerName>),
    Pull(ImageRef),
    RemoveImage(ImageRef),
}

impl RuntimeCall {
    /// Returns true for calls that change runtime state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List | Self::Attach(_))
    }
}

/// Internal record of a stored container.
struct StoredContainer {
    name: ContainerName,
    status: RuntimeStatus,
    exit_code: Option<i32>,
    labels: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    containers: BTreeMap<String, StoredContainer>,
    images: BTreeMap<ImageRef, ImageInfo>,
    calls: Vec<RuntimeCall>,
    fail_create: BTreeSet<ContainerName>,
    fail_start: BTreeSet<ContainerName>,
    fail_remove: BTreeSet<ContainerName>,
    fail_pull: BTreeSet<ImageRef>,
    slow_create: BTreeMap<ContainerName, Duration>,
}

/// Runtime backend that keeps everything in memory.
#[derive(Default)]
pub struct MemoryRuntime {
    state: RwLock<MemoryState>,
    latency: Duration,
}

impl MemoryRuntime {
    /// Creates an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed delay to every mutating call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Creates a runtime pre-populated from observed containers.
    ///
    /// Images referenced by the containers are registered as present.
    pub fn from_snapshot(containers: Vec<ObservedContainer>) -> Result<Self> {
        let runtime = Self::new();
        for container in containers {
            runtime.insert_container(container)?;
        }
        Ok(runtime)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|e| Error::Internal(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| Error::Internal(format!("lock poisoned: {}", e)))
    }

    async fn delay(&self, extra: Duration) {
        let total = self.latency + extra;
        if !total.is_zero() {
            tokio::time::sleep(total).await;
        }
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Stores an observed container as-is (and marks its image present).
    pub fn insert_container(&self, container: ObservedContainer) -> Result<()> {
        let labels = ownership_labels(&container.name, &container.config)?;
        let mut state = self.write()?;
        insert_image_locked(&mut state, &container.config.image, Utc::now());
        state.containers.insert(
            container.id,
            StoredContainer {
                name: container.name,
                status: container.status,
                exit_code: container.exit_code,
                labels,
                created_at: container.created_at.unwrap_or_else(Utc::now),
            },
        );
        Ok(())
    }

    /// Marks an image as present locally.
    pub fn insert_image(&self, image: &ImageRef, created_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.write()?;
        insert_image_locked(&mut state, image, created_at);
        Ok(())
    }

    /// Overrides a container's status (e.g. to simulate a crash).
    pub fn set_status(&self, id: &str, status: RuntimeStatus) -> Result<()> {
        let mut state = self.write()?;
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::ContainerNotFound(id.to_string()))?;
        container.status = status;
        Ok(())
    }

    // =========================================================================
    // Failure Injection
    // =========================================================================

    /// Makes creating `name` fail.
    pub fn fail_create(&self, name: &ContainerName) -> Result<()> {
        self.write()?.fail_create.insert(name.clone());
        Ok(())
    }

    /// Makes starting `name` fail.
    pub fn fail_start(&self, name: &ContainerName) -> Result<()> {
        self.write()?.fail_start.insert(name.clone());
        Ok(())
    }

    /// Makes removing `name` fail.
    pub fn fail_remove(&self, name: &ContainerName) -> Result<()> {
        self.write()?.fail_remove.insert(name.clone());
        Ok(())
    }

    /// Makes pulling `image` fail.
    pub fn fail_pull(&self, image: &ImageRef) -> Result<()> {
        self.write()?.fail_pull.insert(image.normalized());
        Ok(())
    }

    /// Delays creating `name` by `delay`.
    pub fn slow_create(&self, name: &ContainerName, delay: Duration) -> Result<()> {
        self.write()?.slow_create.insert(name.clone(), delay);
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every call received so far.
    pub fn calls(&self) -> Result<Vec<RuntimeCall>> {
        Ok(self.read()?.calls.clone())
    }

    /// Number of state-changing calls received so far.
    pub fn mutation_count(&self) -> Result<usize> {
        Ok(self.read()?.calls.iter().filter(|c| c.is_mutation()).count())
    }

    /// Forgets the call log.
    pub fn clear_calls(&self) -> Result<()> {
        self.write()?.calls.clear();
        Ok(())
    }

    /// Snapshot of every container, across namespaces.
    pub fn snapshot(&self) -> Result<Vec<ObservedContainer>> {
        let state = self.read()?;
        state
            .containers
            .iter()
            .map(|(id, stored)| observe(id, stored))
            .collect()
    }

    /// Images present locally.
    pub fn images(&self) -> Result<Vec<ImageRef>> {
        Ok(self.read()?.images.keys().cloned().collect())
    }

    fn find_by_name<'a>(state: &'a MemoryState, name: &ContainerName) -> Option<&'a str> {
        state
            .containers
            .iter()
            .find(|(_, c)| &c.name == name)
            .map(|(id, _)| id.as_str())
    }
}

fn ownership_labels(
    name: &ContainerName,
    config: &ContainerConfig,
) -> Result<BTreeMap<String, String>> {
    let mut labels = config.labels.clone();
    labels.insert(NAMESPACE_LABEL.to_string(), name.namespace().to_string());
    labels.insert(CONFIG_LABEL.to_string(), config.to_label_value()?);
    Ok(labels)
}

fn insert_image_locked(state: &mut MemoryState, image: &ImageRef, created_at: DateTime<Utc>) {
    let reference = image.normalized();
    let id = format!("sha256:{}", uuid::Uuid::new_v4().simple());
    state.images.insert(
        reference.clone(),
        ImageInfo {
            reference,
            id,
            created_at,
        },
    );
}

fn observe(id: &str, stored: &StoredContainer) -> Result<ObservedContainer> {
    let raw = stored.labels.get(CONFIG_LABEL).ok_or_else(|| {
        Error::Internal(format!("container {id} has no {CONFIG_LABEL} label"))
    })?;
    Ok(ObservedContainer {
        id: id.to_string(),
        name: stored.name.clone(),
        status: stored.status,
        exit_code: stored.exit_code,
        config: ContainerConfig::from_label_value(raw)?,
        created_at: Some(stored.created_at),
    })
}

#[async_trait]
impl RuntimeClient for MemoryRuntime {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_containers(&self, namespace: Option<&str>) -> Result<Vec<ObservedContainer>> {
        let mut state = self.write()?;
        state.calls.push(RuntimeCall::List);
        state
            .containers
            .iter()
            .filter(|(_, c)| namespace.is_none_or(|ns| c.name.in_namespace(ns)))
            .map(|(id, stored)| observe(id, stored))
            .collect()
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let extra = self.read()?.slow_create.get(&spec.name).copied().unwrap_or_default();
        self.delay(extra).await;

        let labels = ownership_labels(&spec.name, &spec.config)?;
        let mut state = self.write()?;
        state.calls.push(RuntimeCall::Create(spec.name.clone()));

        let fail = |reason: &str| Error::CreateFailed {
            name: spec.name.to_string(),
            reason: reason.to_string(),
        };
        if state.fail_create.contains(&spec.name) {
            return Err(fail("injected failure"));
        }
        if Self::find_by_name(&state, &spec.name).is_some() {
            return Err(fail("name already in use"));
        }
        if !state.images.contains_key(&spec.config.image.normalized()) {
            return Err(Error::ImageNotFound(spec.config.image.to_string()));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        state.containers.insert(
            id.clone(),
            StoredContainer {
                name: spec.name.clone(),
                status: RuntimeStatus::Created,
                exit_code: None,
                labels,
                created_at: Utc::now(),
            },
        );
        debug!(container = %spec.name, id = %id, "memory runtime created container");
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.delay(Duration::ZERO).await;
        let mut state = self.write()?;
        state.calls.push(RuntimeCall::Start(id.to_string()));

        let fail_start = state.fail_start.clone();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::ContainerNotFound(id.to_string()))?;
        if fail_start.contains(&container.name) {
            return Err(Error::StartFailed {
                id: id.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        container.status = RuntimeStatus::Running;
        container.exit_code = None;
        Ok(())
    }

    async fn stop_container(&self, id: &str, _grace: Duration) -> Result<()> {
        self.delay(Duration::ZERO).await;
        let mut state = self.write()?;
        state.calls.push(RuntimeCall::Stop(id.to_string()));

        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::ContainerNotFound(id.to_string()))?;
        if container.status.is_running() {
            container.status = RuntimeStatus::Exited;
            container.exit_code = Some(0);
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.delay(Duration::ZERO).await;
        let mut state = self.write()?;
        state.calls.push(RuntimeCall::Remove(id.to_string()));

        let container = state
            .containers
            .get(id)
            .ok_or_else(|| Error::ContainerNotFound(id.to_string()))?;
        let fail = |reason: &str| Error::RemoveFailed {
            id: id.to_string(),
            reason: reason.to_string(),
        };
        if state.fail_remove.contains(&container.name) {
            return Err(fail("injected failure"));
        }
        if container.status.is_running() {
            return Err(fail("container is running"));
        }
        state.containers.remove(id);
        Ok(())
    }

    async fn attach(&self, containers: &[ContainerSpec]) -> Result<()> {
        let mut state = self.write()?;
        state
            .calls
            .push(RuntimeCall::Attach(containers.iter().map(|c| c.name.clone()).collect()));
        Ok(())
    }

    async fn image_exists(&self, image: &ImageRef) -> Result<bool> {
        Ok(self.read()?.images.contains_key(&image.normalized()))
    }

    async fn pull_image(&self, image: &ImageRef, _auth: Option<&RegistryAuth>) -> Result<()> {
        self.delay(Duration::ZERO).await;
        let mut state = self.write()?;
        state.calls.push(RuntimeCall::Pull(image.clone()));

        if state.fail_pull.contains(&image.normalized()) {
            return Err(Error::ImagePullFailed {
                reference: image.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        insert_image_locked(&mut state, image, Utc::now());
        Ok(())
    }

    async fn list_images(&self, repository: &str) -> Result<Vec<ImageInfo>> {
        Ok(self
            .read()?
            .images
            .values()
            .filter(|info| info.reference.repository() == repository)
            .cloned()
            .collect())
    }

    async fn remove_image(&self, image: &ImageRef) -> Result<()> {
        let mut state = self.write()?;
        state.calls.push(RuntimeCall::RemoveImage(image.clone()));
        state
            .images
            .remove(&image.normalized())
            .map(|_| ())
            .ok_or_else(|| Error::ImageNotFound(image.to_string()))
    }
}
