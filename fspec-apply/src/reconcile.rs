//! Generic per-kind reconciliation.
//!
//! One routine serves all resource kinds: list the server, keep only what
//! this deployment owns, then create, update, or leave alone each declared
//! resource and optionally delete owned orphans. Change detection is
//! structural spec equality; metadata and server-assigned fields never
//! trigger writes.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use fspec_core::ownership::{is_owned_by, stamp};
use fspec_core::types::{DeploymentConfig, Metadata, SpecResource};
use fspec_core::ResourceClient;

use crate::error::{client_err, ApplyError};

/// Observed metadata per declared resource, keyed by `(namespace, name)`.
/// Used by the pipeline to wire references between kinds.
pub type MetadataMap = BTreeMap<(String, String), Metadata>;

/// Write counts for one kind's reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub kind: &'static str,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ReconcileSummary {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            created: 0,
            updated: 0,
            deleted: 0,
        }
    }

    /// True when the pass issued no writes at all.
    pub fn unchanged(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Reconcile the declared resources of one kind against the server.
///
/// Declared resources are stamped with the owner annotations in place, so
/// the caller sees exactly what was sent. Create/Update follow declaration
/// order; deletes run after all writes, and only when `delete_orphans` is
/// set. Resources not owned by `owner` (by UID annotation) are invisible:
/// never diffed, never deleted.
pub fn reconcile<R, C>(
    client: &C,
    declared: &mut [R],
    owner: &DeploymentConfig,
    delete_orphans: bool,
) -> Result<(MetadataMap, ReconcileSummary), ApplyError>
where
    R: SpecResource,
    C: ResourceClient<R>,
{
    let mut summary = ReconcileSummary::new(R::KIND);

    let all = client.list().map_err(client_err(R::LABEL))?;
    let mut owned: BTreeMap<(String, String), R> = BTreeMap::new();
    for resource in all {
        if is_owned_by(resource.metadata(), owner) {
            owned.insert(resource.metadata().key(), resource);
        }
    }
    debug!("{}: {} owned on server", R::KIND, owned.len());

    let mut metadata_map = MetadataMap::new();
    let mut desired: BTreeSet<(String, String)> = BTreeSet::new();

    for resource in declared.iter_mut() {
        stamp(resource.metadata_mut(), owner);
        let key = resource.metadata().key();
        desired.insert(key.clone());

        match owned.get(&key) {
            Some(existing) if existing.same_spec(resource) => {
                // Nothing to do on the server.
                metadata_map.insert(key, existing.metadata().clone());
            }
            Some(_) => {
                let metadata = client.update(resource).map_err(client_err(R::LABEL))?;
                summary.updated += 1;
                metadata_map.insert(key, metadata);
            }
            None => {
                let metadata = client.create(resource).map_err(client_err(R::LABEL))?;
                summary.created += 1;
                metadata_map.insert(key, metadata);
            }
        }
    }

    if delete_orphans {
        // `owned` is already filtered to this deployment's UID.
        for (key, resource) in &owned {
            if !desired.contains(key) {
                client
                    .delete(resource.metadata())
                    .map_err(client_err(R::LABEL))?;
                summary.deleted += 1;
                info!("deleted {} {}", R::KIND, resource.metadata());
            }
        }
    }

    Ok((metadata_map, summary))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
