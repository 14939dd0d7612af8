//! The apply pipeline: fixed-order composition across resource kinds.
//!
//! Order is load-bearing — later kinds reference earlier ones (functions
//! reference packages and environments; triggers reference functions), so
//! earlier kinds must exist server-side first:
//! archives → environments → packages → functions → HTTP triggers →
//! Kubernetes watch triggers → time triggers → message queue triggers.
//!
//! The pipeline is single-threaded, strictly sequential, and not
//! transactional: an interrupted run leaves prior kinds' writes committed,
//! and re-running apply converges.

use std::path::Path;

use fspec_core::types::Function;
use fspec_core::Cluster;

use crate::error::ApplyError;
use crate::loader::ResourceSet;
use crate::reconcile::{reconcile, MetadataMap, ReconcileSummary};
use crate::upload::apply_archives;

/// Per-kind write counts for one apply run, in pipeline order.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub summaries: Vec<ReconcileSummary>,
}

/// Run the full apply pipeline.
///
/// `resources` is mutated along the way: archive references are rewritten,
/// ownership annotations stamped, and function package references pinned.
/// Idempotent — applying the same set twice issues no writes the second
/// time.
pub fn apply<C: Cluster>(
    client: &C,
    spec_dir: &Path,
    resources: &mut ResourceSet,
    delete_orphans: bool,
) -> Result<ApplyReport, ApplyError> {
    let owner = resources
        .deployment_config
        .clone()
        .ok_or(ApplyError::MissingDeploymentConfig)?;

    // Upload archives first; rewrites archive references in the packages.
    apply_archives(client, spec_dir, resources)?;

    let mut report = ApplyReport::default();

    let (_, summary) = reconcile(client, &mut resources.environments, &owner, delete_orphans)?;
    report.summaries.push(summary);

    let (package_meta, summary) =
        reconcile(client, &mut resources.packages, &owner, delete_orphans)?;
    report.summaries.push(summary);

    resolve_package_refs(&mut resources.functions, &package_meta);

    let (_, summary) = reconcile(client, &mut resources.functions, &owner, delete_orphans)?;
    report.summaries.push(summary);

    let (_, summary) = reconcile(client, &mut resources.http_triggers, &owner, delete_orphans)?;
    report.summaries.push(summary);

    let (_, summary) = reconcile(
        client,
        &mut resources.kubernetes_watch_triggers,
        &owner,
        delete_orphans,
    )?;
    report.summaries.push(summary);

    let (_, summary) = reconcile(client, &mut resources.time_triggers, &owner, delete_orphans)?;
    report.summaries.push(summary);

    let (_, summary) = reconcile(
        client,
        &mut resources.message_queue_triggers,
        &owner,
        delete_orphans,
    )?;
    report.summaries.push(summary);

    Ok(report)
}

/// Pin each function's package reference to the version observed during
/// package reconciliation, so the server resolves the exact package this
/// apply produced.
//
// TODO: also pin the package UID once the control plane validates it on
// function writes; resourceVersion is the only field it checks today.
fn resolve_package_refs(functions: &mut [Function], package_meta: &MetadataMap) {
    for function in functions {
        let reference = &mut function.spec.package.package_ref;
        let key = (reference.namespace.clone(), reference.name.clone());
        if let Some(metadata) = package_meta.get(&key) {
            if let Some(version) = &metadata.resource_version {
                reference.resource_version = version.clone();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
