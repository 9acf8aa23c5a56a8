//! Real runner: applies a plan through a [`RuntimeClient`].
//!
//! # Execution Model
//!
//! ```text
//!   tier 0:  spawn(a0) spawn(a1) spawn(a2) ──► ErrorWaitGroup(3).wait()  (tier deadline)
//!                                                    │
//!                          Err ◄─────────────────────┤ first error: stop here
//!                                                    │
//!   tier 1:  spawn(b0) ──► ErrorWaitGroup(1) ...     ▼ Ok
//! ```
//!
//! - Every action of a tier runs in its own tokio task.
//! - Each task is bounded by `action_timeout`, so no worker outlives its
//!   deadline even when the tier barrier gave up on it.
//! - A failing action does not interrupt its siblings; it only prevents
//!   later tiers from being dispatched.
//! - Each worker hands the [`ActionOutcome`]s of its action back through
//!   its join handle, even when the action failed partway. They are merged
//!   into the [`RunReport`] after the barrier.

use super::{RunReport, Runner};
use crate::client::{RegistryAuth, RuntimeClient};
use crate::constants::{DEFAULT_ACTION_TIMEOUT, DEFAULT_STOP_GRACE, TIER_TIMEOUT_SLACK};
use crate::error::{Error, Result};
use crate::plan::{Action, ActionOutcome, ApplyOptions, ExecutionPlan};
use crate::waitgroup::ErrorWaitGroup;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Runner that mutates the runtime.
pub struct ClientRunner {
    client: Arc<dyn RuntimeClient>,
    options: ApplyOptions,
    action_timeout: Duration,
    tier_timeout: Option<Duration>,
    report: RunReport,
}

impl ClientRunner {
    /// Creates a runner with default grace and timeouts.
    #[must_use]
    pub fn new(client: Arc<dyn RuntimeClient>) -> Self {
        Self {
            client,
            options: ApplyOptions {
                grace: DEFAULT_STOP_GRACE,
                auth: None,
            },
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            tier_timeout: Some(DEFAULT_ACTION_TIMEOUT + TIER_TIMEOUT_SLACK),
            report: RunReport::default(),
        }
    }

    /// Sets the grace period between stop and force kill.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.options.grace = grace;
        self
    }

    /// Sets registry credentials for pulls.
    #[must_use]
    pub fn with_auth(mut self, auth: Option<RegistryAuth>) -> Self {
        self.options.auth = auth;
        self
    }

    /// Sets the per-action deadline.
    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Sets the tier barrier deadline; `None` waits indefinitely.
    #[must_use]
    pub fn with_tier_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tier_timeout = timeout;
        self
    }

    fn dispatch(&self, action: &Action, wg: &ErrorWaitGroup) -> JoinHandle<Vec<ActionOutcome>> {
        let done = wg.handle();
        let client = Arc::clone(&self.client);
        let options = self.options.clone();
        let deadline = self.action_timeout;
        let action = action.clone();

        tokio::spawn(async move {
            let mut effects = Vec::new();
            let applied = action.apply(client.as_ref(), &options, &mut effects);
            let result = match tokio::time::timeout(deadline, applied).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    operation: action.describe(),
                    duration: deadline,
                }),
            };

            if let Err(err) = &result {
                warn!(action = %action, error = %err, effects = effects.len(), "action failed");
            }
            done.done(result);
            effects
        })
    }

    async fn run_tier(&mut self, tier: usize, actions: &[Action]) -> Result<()> {
        debug!(tier, actions = actions.len(), "dispatching tier");

        let wg = ErrorWaitGroup::new(actions.len());
        let workers: Vec<_> = actions.iter().map(|a| self.dispatch(a, &wg)).collect();

        let (barrier, expired) = match self.tier_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, wg.wait()).await {
                Ok(result) => (result, false),
                Err(_) => (
                    Err(Error::Timeout {
                        operation: format!("tier {tier} ({} actions)", actions.len()),
                        duration: timeout,
                    }),
                    true,
                ),
            },
            None => (wg.wait().await, false),
        };

        // Once the barrier itself expired only finished workers are
        // collected; the rest are left to hit their own action deadline.
        for worker in workers {
            if expired && !worker.is_finished() {
                continue;
            }
            match worker.await {
                Ok(effects) => effects.into_iter().for_each(|e| self.report.record(e)),
                Err(join_err) => warn!(tier, error = %join_err, "worker panicked"),
            }
        }

        barrier
    }
}

#[async_trait]
impl Runner for ClientRunner {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn run(&mut self, plan: &ExecutionPlan) -> Result<()> {
        for (tier, actions) in plan.tiers().iter().enumerate() {
            if let Err(err) = self.run_tier(tier, actions).await {
                error!(tier, error = %err, "tier failed; skipping remaining tiers");
                return Err(err);
            }
        }
        Ok(())
    }

    fn report(&self) -> &RunReport {
        &self.report
    }
}
