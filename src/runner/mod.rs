//! # Runners
//!
//! A [`Runner`] executes an [`ExecutionPlan`] tier by tier. Two
//! implementations share the contract:
//!
//! | Runner | Effect | Fails when |
//! |--------|--------|-----------|
//! | [`DryRunner`] | Logs [`Action::describe`] for every action | never |
//! | [`ClientRunner`] | Applies every action through a [`RuntimeClient`] | an action fails or a tier times out |
//!
//! [`Action::describe`]: crate::plan::Action::describe
//! [`RuntimeClient`]: crate::client::RuntimeClient

mod client;
mod dry;
mod report;

pub use client::ClientRunner;
pub use dry::DryRunner;
pub use report::{ContainerRef, RunReport};

use crate::error::Result;
use crate::plan::ExecutionPlan;
use async_trait::async_trait;

/// Executes execution plans.
#[async_trait]
pub trait Runner: Send {
    /// Runner name (for logs).
    fn name(&self) -> &str;

    /// Executes `plan`, stopping at the first tier that fails.
    async fn run(&mut self, plan: &ExecutionPlan) -> Result<()>;

    /// Bookkeeping accumulated over every `run` call so far.
    fn report(&self) -> &RunReport;
}
