//! Compose configuration.

use crate::client::RegistryAuth;
use crate::constants::{
    DEFAULT_ACTION_TIMEOUT, DEFAULT_KEEP_IMAGES, DEFAULT_STOP_GRACE, TIER_TIMEOUT_SLACK,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Already-validated settings for a [`Compose`](super::Compose) instance.
///
/// Missing fields fall back to [`ComposeConfig::default`] when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Describe actions instead of applying them.
    pub dry_run: bool,
    /// Attach to container output after `run`.
    pub attach: bool,
    /// Force-pull every manifest image before `run`.
    pub pull: bool,
    /// Treat the expected set as empty: remove everything in the namespace.
    pub remove_all: bool,
    /// `execute` runs `recover` instead of `run`.
    pub recover: bool,
    /// Grace period between stop and force kill.
    pub wait: Duration,
    /// Upper bound on a single action.
    pub action_timeout: Duration,
    /// Tier barrier deadline; `None` waits until every action reports.
    pub tier_timeout: Option<Duration>,
    /// Number of recent tags kept per repository by `clean`.
    pub keep_images: usize,
    /// Registry credentials for pulls.
    pub auth: Option<RegistryAuth>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            attach: false,
            pull: false,
            remove_all: false,
            recover: false,
            wait: DEFAULT_STOP_GRACE,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            tier_timeout: Some(DEFAULT_ACTION_TIMEOUT + TIER_TIMEOUT_SLACK),
            keep_images: DEFAULT_KEEP_IMAGES,
            auth: None,
        }
    }
}

impl ComposeConfig {
    /// Sets the dry-run flag.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets both the action deadline and a tier deadline derived from it.
    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self.tier_timeout = Some(timeout + TIER_TIMEOUT_SLACK);
        self
    }
}
