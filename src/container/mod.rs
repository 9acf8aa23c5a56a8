//! # Container Model
//!
//! Typed representation of desired containers ([`ContainerSpec`]) and
//! runtime-reported ones ([`ObservedContainer`]), plus the identity rules
//! used to match them:
//!
//! - **Name**: [`ContainerName`] is `namespace.name`; the namespace scopes
//!   a reconciliation run.
//! - **Kind**: [`KindSignature`] is a stable content hash of the fields
//!   that change runtime behavior. Same name + same signature = same kind =
//!   nothing to do.
//!
//! Values are built fresh for every reconciliation cycle and dropped after
//! the plan runs.

mod config;
mod image;
mod name;
mod spec;

pub use config::{
    ContainerConfig, DesiredState, KindSignature, Link, PortBinding, RestartPolicy,
};
pub use image::ImageRef;
pub use name::ContainerName;
pub use spec::{
    ContainerSpec, ObservedContainer, RuntimeStatus, assign_identity, matches_kind,
};
