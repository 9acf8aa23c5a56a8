//! Dry-run runner: describes a plan without touching the runtime.

use super::{RunReport, Runner};
use crate::error::Result;
use crate::plan::ExecutionPlan;
use async_trait::async_trait;
use tracing::{debug, info};

/// Runner that logs and records what each action would do.
#[derive(Debug, Default)]
pub struct DryRunner {
    report: RunReport,
}

impl DryRunner {
    /// Creates a dry runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Runner for DryRunner {
    fn name(&self) -> &str {
        "dry"
    }

    async fn run(&mut self, plan: &ExecutionPlan) -> Result<()> {
        for (tier, actions) in plan.tiers().iter().enumerate() {
            for action in actions {
                let description = action.describe();
                if action.is_noop() {
                    debug!(tier, "[dry run] {description}");
                } else {
                    info!(tier, "[dry run] {description}");
                }
                self.report.descriptions.push(description);
            }
        }
        Ok(())
    }

    fn report(&self) -> &RunReport {
        &self.report
    }
}
