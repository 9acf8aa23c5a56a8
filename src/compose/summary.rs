//! Machine-readable result of a compose run.

use crate::runner::ContainerRef;
use serde::Serialize;

/// What a compose run changed.
///
/// Serialized as the JSON result handed to provisioning tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Containers removed.
    pub removed: Vec<ContainerRef>,
    /// Containers created.
    pub created: Vec<ContainerRef>,
    /// Images pulled.
    pub pulled: Vec<String>,
    /// Images removed by `clean`.
    pub cleaned: Vec<String>,
    /// True if any of the lists above is non-empty.
    ///
    /// Starting or stopping an existing container does not count; those
    /// live in [`RunReport::started`](crate::RunReport::started) and
    /// [`RunReport::stopped`](crate::RunReport::stopped).
    pub changed: bool,
}

impl RunSummary {
    /// Builds a summary, deriving `changed`.
    #[must_use]
    pub fn new(
        removed: Vec<ContainerRef>,
        created: Vec<ContainerRef>,
        pulled: Vec<String>,
        cleaned: Vec<String>,
    ) -> Self {
        let changed =
            !(removed.is_empty() && created.is_empty() && pulled.is_empty() && cleaned.is_empty());
        Self {
            removed,
            created,
            pulled,
            cleaned,
            changed,
        }
    }
}
