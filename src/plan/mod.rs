//! # Diff / Planner and Execution Plans
//!
//! The planner compares desired containers against what the runtime
//! reports and produces an [`ExecutionPlan`]: an ordered list of **tiers**,
//! each a batch of mutually independent [`Action`]s.
//!
//! ```text
//!   expected ─┐
//!             ├──► Planner::plan ──► [ tier 0: remove(web)            ]
//!   actual ───┘                      [ tier 1: remove(db)             ]
//!                                    [ tier 2: create(db)             ]
//!                                    [ tier 3: create(web), noop(log) ]
//! ```
//!
//! Actions in one tier may run concurrently; tiers run strictly in order.
//! Removal tiers always come first, so a name freed by a removal is never
//! claimed by a create in an earlier or the same tier.
//!
//! A plan is a plain value: it can be inspected, described, and executed
//! by either runner.

mod action;
mod diff;

pub use action::{Action, ActionOutcome, ApplyOptions};
pub use diff::Planner;

use serde::Serialize;

/// Ordered tiers of actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    tiers: Vec<Vec<Action>>,
}

impl ExecutionPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a plan from tiers, dropping empty ones.
    #[must_use]
    pub fn from_tiers(tiers: Vec<Vec<Action>>) -> Self {
        Self {
            tiers: tiers.into_iter().filter(|t| !t.is_empty()).collect(),
        }
    }

    /// Tiers in execution order.
    #[must_use]
    pub fn tiers(&self) -> &[Vec<Action>] {
        &self.tiers
    }

    /// All actions in execution order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.tiers.iter().flatten()
    }

    /// Total number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    /// Returns true if the plan has no actions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Returns true if executing the plan would change nothing.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.actions().all(Action::is_noop)
    }

    /// Descriptions of every action, in order.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        self.actions().map(Action::describe).collect()
    }
}

impl std::fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return writeln!(f, "(empty plan)");
        }
        for (index, tier) in self.tiers.iter().enumerate() {
            writeln!(f, "tier {index}:")?;
            for action in tier {
                writeln!(f, "  - {action}")?;
            }
        }
        Ok(())
    }
}
