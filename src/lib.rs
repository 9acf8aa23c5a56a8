//! # magikcompose
//!
//! **Idempotent Container Composition Engine**
//!
//! This crate converges the containers running on a host to a declared
//! manifest. It compares what the manifest wants with what the runtime
//! reports, computes the minimal ordered set of actions, and executes them
//! with bounded parallelism. Running it twice against an unchanged host is
//! a no-op.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          magikcompose                               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Manifest (YAML) ──► ContainerSpec ─┐                               │
//! │                                     ├──► Planner ──► ExecutionPlan  │
//! │  RuntimeClient ──► ObservedContainer┘                   │           │
//! │                                                         ▼           │
//! │                                ┌────────────────────────────────┐   │
//! │                                │ Runner (tier by tier)          │   │
//! │                                │  DryRunner   : describe        │   │
//! │                                │  ClientRunner: apply, parallel │   │
//! │                                │    per tier, ErrorWaitGroup    │   │
//! │                                └────────────────────────────────┘   │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Compose facade: run │ recover │ pull │ clean │ summary             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Reconciliation Model
//!
//! - **Namespace**: every manifest owns one namespace; containers of other
//!   namespaces are never listed, removed or recreated by its runs.
//! - **Kind**: a container is kept when its name and [`KindSignature`]
//!   match the declared one. Any significant config change recreates it.
//! - **Tiers**: removals first (dependents before dependencies), then
//!   creates layered by dependency. Actions within a tier run in parallel;
//!   a failing tier stops the plan.
//! - **No local state**: each run re-reads the runtime, so a partially
//!   applied plan converges on the next run.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`container`] | Names, image references, configs, kind signatures |
//! | [`manifest`] | YAML manifest loading and validation |
//! | [`plan`] | Actions, execution plans and the planner |
//! | [`runner`] | Dry and client runners |
//! | [`waitgroup`] | First-error fan-in barrier |
//! | [`client`] | The runtime client capability |
//! | [`runtimes`] | Bundled runtime backends (in-memory) |
//! | [`compose`] | High-level verbs and run summaries |
//!
//! # Example
//!
//! ```rust,ignore
//! use magikcompose::{Compose, ComposeConfig, Manifest, MemoryRuntime};
//! use std::sync::Arc;
//!
//! let manifest = Manifest::from_file("compose.yml")?;
//! let runtime = Arc::new(MemoryRuntime::new());
//! let mut compose = Compose::new(manifest, ComposeConfig::default(), runtime);
//! compose.run().await?;
//! println!("{}", serde_json::to_string(&compose.summary())?);
//! ```

pub mod client;
pub mod compose;
pub mod constants;
pub mod container;
pub mod error;
pub mod manifest;
pub mod plan;
pub mod runner;
pub mod runtimes;
pub mod waitgroup;

// Re-exports
pub use client::{ImageInfo, RegistryAuth, RuntimeClient};
pub use compose::{Compose, ComposeConfig, RunSummary};
pub use constants::*;
pub use container::{
    ContainerConfig, ContainerName, ContainerSpec, DesiredState, ImageRef, KindSignature,
    ObservedContainer, RuntimeStatus,
};
pub use error::{Error, Phase, Result};
pub use manifest::Manifest;
pub use plan::{Action, ExecutionPlan, Planner};
pub use runner::{ClientRunner, DryRunner, RunReport, Runner};
pub use runtimes::{MemoryRuntime, RuntimeRegistry};
pub use waitgroup::{DoneHandle, ErrorWaitGroup};
