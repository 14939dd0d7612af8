//! # fspec-apply
//!
//! The idempotent apply engine: load a spec directory, materialize and
//! upload archives, then reconcile each resource kind against the control
//! plane in dependency order.
//!
//! Call [`loader::load`] to read a spec directory and [`pipeline::apply`]
//! to converge the cluster to it.

pub mod archive;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod reconcile;
pub mod upload;

pub use error::ApplyError;
pub use loader::{load, ResourceSet};
pub use pipeline::{apply, ApplyReport};
pub use reconcile::{MetadataMap, ReconcileSummary};
