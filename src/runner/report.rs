//! Side-effect bookkeeping of a run.

use crate::container::{ContainerName, ImageRef};
use crate::plan::ActionOutcome;
use serde::Serialize;

/// A container reference as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRef {
    /// Runtime id (empty when unknown, e.g. in a dry run).
    pub id: String,
    /// `namespace.name`.
    pub name: String,
}

impl ContainerRef {
    /// Creates a reference from a runtime id and a container name.
    #[must_use]
    pub fn new(id: &str, name: &ContainerName) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// What a runner did (or, in a dry run, described).
///
/// Built from per-worker [`ActionOutcome`]s merged after each tier
/// barrier; workers never share it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Containers created, in completion order.
    pub created: Vec<ContainerRef>,
    /// Containers removed, in completion order.
    pub removed: Vec<ContainerRef>,
    /// Existing containers started.
    pub started: Vec<ContainerRef>,
    /// Containers stopped, including running containers stopped before removal.
    pub stopped: Vec<ContainerRef>,
    /// Images pulled.
    pub pulled_images: Vec<ImageRef>,
    /// Images removed by cleanup.
    pub removed_images: Vec<ImageRef>,
    /// Descriptions of the actions a dry run walked through.
    pub descriptions: Vec<String>,
}

impl RunReport {
    /// Records one worker's outcome.
    pub fn record(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Created { id, name } => {
                self.created.push(ContainerRef::new(&id, &name));
            }
            ActionOutcome::Removed { id, name } => {
                self.removed.push(ContainerRef::new(&id, &name));
            }
            ActionOutcome::Started { id, name } => {
                self.started.push(ContainerRef::new(&id, &name));
            }
            ActionOutcome::Stopped { id, name } => {
                self.stopped.push(ContainerRef::new(&id, &name));
            }
            ActionOutcome::Pulled(image) => self.record_pull(image),
        }
    }

    fn record_pull(&mut self, image: ImageRef) {
        if !self.pulled_images.contains(&image) {
            self.pulled_images.push(image);
        }
    }

    /// Appends everything from `other`.
    pub fn merge(&mut self, other: RunReport) {
        self.created.extend(other.created);
        self.removed.extend(other.removed);
        self.started.extend(other.started);
        self.stopped.extend(other.stopped);
        for image in other.pulled_images {
            self.record_pull(image);
        }
        self.removed_images.extend(other.removed_images);
        self.descriptions.extend(other.descriptions);
    }

    /// Runtime id of the container created under `name`, if any.
    #[must_use]
    pub fn created_id(&self, name: &ContainerName) -> Option<&str> {
        let name = name.to_string();
        self.created
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.id.as_str())
    }

    /// Returns true if nothing was changed.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.created.is_empty()
            && self.removed.is_empty()
            && self.started.is_empty()
            && self.stopped.is_empty()
            && self.pulled_images.is_empty()
            && self.removed_images.is_empty()
    }
}
