//! # Compose Facade
//!
//! [`Compose`] sequences the high-level verbs on top of the planner, the
//! runners and a [`RuntimeClient`]:
//!
//! ```text
//!   run:      [pull] ─► list(ns) ─► assign ids ─► plan ─► fetch ─► execute ─► [attach]
//!   recover:  list(all) ─► expected := actual ─► plan ─► execute
//!   pull:     image plan (force) ─► execute
//!   clean:    list images per repository ─► remove all but the newest N
//! ```
//!
//! Every verb tags its terminal error with the [`Phase`] it surfaced in.
//! Nothing is retried; calling `run` again re-plans against the runtime's
//! current state, which is how partial failures converge.

mod config;
mod summary;

pub use config::ComposeConfig;
pub use summary::RunSummary;

use crate::client::RuntimeClient;
use crate::container::{ContainerSpec, ImageRef, ObservedContainer, assign_identity};
use crate::error::{Phase, Result};
use crate::manifest::Manifest;
use crate::plan::{Action, ExecutionPlan, Planner};
use crate::runner::{ClientRunner, ContainerRef, DryRunner, RunReport, Runner};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconciles one manifest against a runtime.
pub struct Compose {
    manifest: Manifest,
    config: ComposeConfig,
    client: Arc<dyn RuntimeClient>,
    plan: Option<ExecutionPlan>,
    report: RunReport,
}

impl Compose {
    /// Creates a compose instance.
    pub fn new(manifest: Manifest, config: ComposeConfig, client: Arc<dyn RuntimeClient>) -> Self {
        Self {
            manifest,
            config,
            client,
            plan: None,
            report: RunReport::default(),
        }
    }

    /// Manifest being reconciled.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Settings in effect.
    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Runs `recover` or `run`, depending on [`ComposeConfig::recover`].
    pub async fn execute(&mut self) -> Result<()> {
        if self.config.recover {
            self.recover().await
        } else {
            self.run().await
        }
    }

    /// Converges the manifest namespace to the manifest.
    pub async fn run(&mut self) -> Result<()> {
        if self.config.pull {
            self.pull().await?;
        }

        let namespace = self.manifest.namespace().to_string();
        let actual = self
            .client
            .list_containers(Some(&namespace))
            .await
            .map_err(|e| e.in_phase(Phase::List))?;

        let mut expected = if self.config.remove_all {
            info!(namespace = %namespace, "removing every container in namespace");
            Vec::new()
        } else {
            self.manifest.containers().to_vec()
        };
        assign_identity(&mut expected, &actual);

        let plan = Planner::new(namespace.as_str())
            .plan(&expected, &actual)
            .map_err(|e| e.in_phase(Phase::Plan))?;
        self.plan = Some(plan.clone());

        // Only images of containers about to be created are fetched.
        let creates: Vec<ContainerSpec> = plan
            .actions()
            .filter_map(|action| match action {
                Action::Create(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect();
        if !creates.is_empty() {
            let fetch = Planner::image_plan(&creates, false);
            self.execute_plan(&fetch)
                .await
                .map_err(|e| e.in_phase(Phase::Fetch))?;
        }

        self.execute_plan(&plan)
            .await
            .map_err(|e| e.in_phase(Phase::Execute))?;
        log_result(&expected);

        if self.config.attach && !self.config.dry_run && !expected.is_empty() {
            debug!(containers = expected.len(), "attaching to containers");
            self.client
                .attach(&expected)
                .await
                .map_err(|e| e.in_phase(Phase::Attach))?;
        }
        Ok(())
    }

    /// Re-applies the declared state of every observed container.
    ///
    /// Needs no manifest: each container's recorded configuration is its
    /// own expected state. Spans all namespaces.
    pub async fn recover(&mut self) -> Result<()> {
        let actual = self
            .client
            .list_containers(None)
            .await
            .map_err(|e| e.in_phase(Phase::List))?;

        let expected: Vec<ContainerSpec> = actual
            .iter()
            .map(ObservedContainer::to_recovery_spec)
            .collect();

        let plan = Planner::all_namespaces()
            .plan(&expected, &actual)
            .map_err(|e| e.in_phase(Phase::Plan))?;
        self.plan = Some(plan.clone());

        self.execute_plan(&plan)
            .await
            .map_err(|e| e.in_phase(Phase::Execute))?;
        info!(
            started = self.report.started.len(),
            stopped = self.report.stopped.len(),
            "recovered container states"
        );
        log_result(&expected);
        Ok(())
    }

    /// Force-pulls every image the manifest references.
    pub async fn pull(&mut self) -> Result<()> {
        let plan = Planner::image_plan(self.manifest.containers(), true);
        info!(images = plan.len(), "pulling images");
        self.execute_plan(&plan)
            .await
            .map_err(|e| e.in_phase(Phase::Pull))
    }

    /// Removes old images of the repositories the manifest uses.
    ///
    /// Per repository the `keep_images` newest images survive, plus any
    /// image the manifest references. Skipped in dry run.
    pub async fn clean(&mut self) -> Result<()> {
        if self.config.dry_run {
            info!("[dry run] skipping image cleanup");
            return Ok(());
        }
        self.clean_images()
            .await
            .map_err(|e| e.in_phase(Phase::Clean))
    }

    async fn clean_images(&mut self) -> Result<()> {
        let in_use: BTreeSet<ImageRef> = self.manifest.images().into_iter().collect();
        let repositories: BTreeSet<String> = in_use.iter().map(ImageRef::repository).collect();

        for repository in repositories {
            let mut images = self.client.list_images(&repository).await?;
            images.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            for info in images.into_iter().skip(self.config.keep_images) {
                let reference = info.reference.normalized();
                if in_use.contains(&reference) {
                    debug!(image = %reference, "keeping image in use");
                    continue;
                }
                self.client.remove_image(&info.reference).await?;
                info!(image = %reference, "removed image");
                self.report.removed_images.push(reference);
            }
        }
        Ok(())
    }

    /// Runs `plan` with the runner the configuration selects and merges its
    /// report, including the partial report of a failed run.
    async fn execute_plan(&mut self, plan: &ExecutionPlan) -> Result<()> {
        let mut runner = self.runner();
        debug!(runner = runner.name(), actions = plan.len(), "executing plan");
        let result = runner.run(plan).await;
        self.report.merge(runner.report().clone());
        result
    }

    fn runner(&self) -> Box<dyn Runner> {
        if self.config.dry_run {
            return Box::new(DryRunner::new());
        }
        Box::new(
            ClientRunner::new(Arc::clone(&self.client))
                .with_grace(self.config.wait)
                .with_auth(self.config.auth.clone())
                .with_action_timeout(self.config.action_timeout)
                .with_tier_timeout(self.config.tier_timeout),
        )
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// The last plan computed by `run` or `recover`.
    pub fn execution_plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    /// Everything the runners did so far.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Images pulled so far.
    pub fn pulled_images(&self) -> &[ImageRef] {
        &self.report.pulled_images
    }

    /// Images removed by `clean` so far.
    pub fn removed_images(&self) -> &[ImageRef] {
        &self.report.removed_images
    }

    /// Summarizes the changes.
    ///
    /// State changes of existing containers are not part of the summary;
    /// see [`report`](Self::report) for those.
    ///
    /// In a real run containers come from what the runner actually did; in
    /// a dry run they come from the plan, with empty ids for creates.
    pub fn summary(&self) -> RunSummary {
        let (removed, created) = if self.config.dry_run {
            let mut removed = Vec::new();
            let mut created = Vec::new();
            for action in self.plan.iter().flat_map(|plan| plan.actions()) {
                match action {
                    Action::Remove(c) => removed.push(ContainerRef::new(&c.id, &c.name)),
                    Action::Create(spec) => created.push(ContainerRef::new("", &spec.name)),
                    _ => {}
                }
            }
            (removed, created)
        } else {
            (self.report.removed.clone(), self.report.created.clone())
        };

        RunSummary::new(
            removed,
            created,
            self.report.pulled_images.iter().map(ToString::to_string).collect(),
            self.report.removed_images.iter().map(ToString::to_string).collect(),
        )
    }
}

fn log_result(expected: &[ContainerSpec]) {
    if expected.is_empty() {
        info!("nothing is running");
        return;
    }
    let names: Vec<String> = expected.iter().map(|c| c.name.to_string()).collect();
    info!(containers = %names.join(", "), "containers converged");
}

impl std::fmt::Debug for Compose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compose")
            .field("namespace", &self.manifest.namespace())
            .field("runtime", &self.client.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
