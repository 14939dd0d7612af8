//! Control-plane client contract and the in-memory implementation.
//!
//! The reconciler only ever talks through [`ResourceClient`] /
//! [`Cluster`], so the transport is swappable: [`crate::HttpClient`]
//! for a real control plane, [`MemCluster`] for tests and local inspection.

use std::path::Path;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{io_err, ClientError};
use crate::types::{
    Archive, Checksum, Environment, Function, HttpTrigger, KubernetesWatchTrigger, Metadata,
    MessageQueueTrigger, Package, SpecResource, TimeTrigger,
};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// List/Create/Update/Delete for one resource kind.
///
/// `create` and `update` return the server-assigned metadata (uid, resource
/// version) so callers can wire references between resources.
pub trait ResourceClient<R: SpecResource> {
    fn list(&self) -> Result<Vec<R>, ClientError>;
    fn create(&self, resource: &R) -> Result<Metadata, ClientError>;
    fn update(&self, resource: &R) -> Result<Metadata, ClientError>;
    fn delete(&self, metadata: &Metadata) -> Result<(), ClientError>;
}

/// A full control plane: every resource kind plus content-addressed archive
/// upload.
pub trait Cluster:
    ResourceClient<Environment>
    + ResourceClient<Package>
    + ResourceClient<Function>
    + ResourceClient<HttpTrigger>
    + ResourceClient<KubernetesWatchTrigger>
    + ResourceClient<TimeTrigger>
    + ResourceClient<MessageQueueTrigger>
{
    /// Upload the file at `path`; returns the canonical archive reference
    /// (server URL + confirmed checksum).
    fn upload_archive(&self, path: &Path) -> Result<Archive, ClientError>;
}

// ---------------------------------------------------------------------------
// In-memory cluster
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemState {
    environments: Vec<Environment>,
    packages: Vec<Package>,
    functions: Vec<Function>,
    http_triggers: Vec<HttpTrigger>,
    kubernetes_watch_triggers: Vec<KubernetesWatchTrigger>,
    time_triggers: Vec<TimeTrigger>,
    message_queue_triggers: Vec<MessageQueueTrigger>,
    ops: Vec<String>,
    revision: u64,
}

/// In-memory control plane.
///
/// Behaves like the real thing from the reconciler's point of view: assigns
/// a uid and resource version on create, bumps the resource version on
/// update, and rejects updates/deletes of resources that do not exist. Every
/// mutating call and upload is appended to an operation log so tests can
/// assert not just on final state but on the traffic that produced it.
#[derive(Debug, Default)]
pub struct MemCluster {
    state: Mutex<MemState>,
}

impl MemCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutating operations issued so far, oldest first.
    pub fn operations(&self) -> Vec<String> {
        self.state.lock().expect("poisoned").ops.clone()
    }

    /// Drain the operation log, e.g. between apply runs in a test.
    pub fn take_operations(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().expect("poisoned").ops)
    }

    /// Seed a resource without recording it in the operation log. For
    /// arranging server state in tests (e.g. resources owned by a foreign
    /// deployment).
    pub fn seed<R>(&self, resource: R)
    where
        R: SpecResource,
        Self: ResourceClient<R>,
    {
        let depth = self.state.lock().expect("poisoned").ops.len();
        self.create(&resource).expect("in-memory create is infallible");
        self.state.lock().expect("poisoned").ops.truncate(depth);
    }
}

macro_rules! mem_client {
    ($resource:ty, $field:ident) => {
        impl ResourceClient<$resource> for MemCluster {
            fn list(&self) -> Result<Vec<$resource>, ClientError> {
                Ok(self.state.lock().expect("poisoned").$field.clone())
            }

            fn create(&self, resource: &$resource) -> Result<Metadata, ClientError> {
                let mut state = self.state.lock().expect("poisoned");
                state.revision += 1;
                let mut stored = resource.clone();
                stored.metadata.uid = Some(Uuid::new_v4().to_string());
                stored.metadata.resource_version = Some(state.revision.to_string());
                let metadata = stored.metadata.clone();
                state.ops.push(format!(
                    "create {} {}",
                    <$resource>::KIND,
                    stored.metadata
                ));
                state.$field.push(stored);
                Ok(metadata)
            }

            fn update(&self, resource: &$resource) -> Result<Metadata, ClientError> {
                let mut state = self.state.lock().expect("poisoned");
                state.revision += 1;
                let revision = state.revision;
                let key = resource.metadata.key();
                let Some(existing) = state.$field.iter_mut().find(|r| r.metadata.key() == key)
                else {
                    return Err(ClientError::NotFound {
                        kind: <$resource>::KIND,
                        namespace: key.0,
                        name: key.1,
                    });
                };
                let uid = existing.metadata.uid.clone();
                *existing = resource.clone();
                existing.metadata.uid = uid;
                existing.metadata.resource_version = Some(revision.to_string());
                let metadata = existing.metadata.clone();
                state
                    .ops
                    .push(format!("update {} {}", <$resource>::KIND, metadata));
                Ok(metadata)
            }

            fn delete(&self, metadata: &Metadata) -> Result<(), ClientError> {
                let mut state = self.state.lock().expect("poisoned");
                let key = metadata.key();
                let before = state.$field.len();
                state.$field.retain(|r| r.metadata.key() != key);
                if state.$field.len() == before {
                    return Err(ClientError::NotFound {
                        kind: <$resource>::KIND,
                        namespace: key.0,
                        name: key.1,
                    });
                }
                state
                    .ops
                    .push(format!("delete {} {}", <$resource>::KIND, metadata));
                Ok(())
            }
        }
    };
}

mem_client!(Environment, environments);
mem_client!(Package, packages);
mem_client!(Function, functions);
mem_client!(HttpTrigger, http_triggers);
mem_client!(KubernetesWatchTrigger, kubernetes_watch_triggers);
mem_client!(TimeTrigger, time_triggers);
mem_client!(MessageQueueTrigger, message_queue_triggers);

impl Cluster for MemCluster {
    fn upload_archive(&self, path: &Path) -> Result<Archive, ClientError> {
        let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
        let sum = hex::encode(Sha256::digest(&bytes));
        let mut state = self.state.lock().expect("poisoned");
        state.ops.push(format!("upload archive {sum}"));
        Ok(Archive::url(
            format!("http://storagesvc/archives/{sum}"),
            Checksum::sha256(sum),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnvironmentSpec, RuntimeSpec};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(name: &str, image: &str) -> Environment {
        Environment {
            metadata: Metadata::named("default", name),
            spec: EnvironmentSpec {
                version: 1,
                runtime: RuntimeSpec {
                    image: image.to_string(),
                },
                builder: None,
            },
        }
    }

    #[test]
    fn create_assigns_uid_and_resource_version() {
        let cluster = MemCluster::new();
        let meta = cluster.create(&env("python", "python:3.11")).expect("create");
        assert!(meta.uid.is_some());
        assert_eq!(meta.resource_version.as_deref(), Some("1"));

        let listed: Vec<Environment> = cluster.list().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].metadata.uid, meta.uid);
    }

    #[test]
    fn update_preserves_uid_and_bumps_resource_version() {
        let cluster = MemCluster::new();
        let created = cluster.create(&env("python", "python:3.11")).expect("create");
        let updated = cluster.update(&env("python", "python:3.12")).expect("update");
        assert_eq!(updated.uid, created.uid);
        assert_ne!(updated.resource_version, created.resource_version);
    }

    #[test]
    fn update_of_missing_resource_is_not_found() {
        let cluster = MemCluster::new();
        let err = cluster.update(&env("ghost", "python:3.11")).unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }));
        assert!(err.to_string().contains("default/ghost"));
    }

    #[test]
    fn delete_removes_and_logs() {
        let cluster = MemCluster::new();
        cluster.create(&env("python", "python:3.11")).expect("create");
        ResourceClient::<Environment>::delete(&cluster, &Metadata::named("default", "python"))
            .expect("delete");
        let listed: Vec<Environment> = cluster.list().expect("list");
        assert!(listed.is_empty());
        let ops = cluster.operations();
        assert_eq!(ops.len(), 2);
        assert!(ops[1].starts_with("delete Environment"));
    }

    #[test]
    fn upload_returns_checksum_addressed_url() {
        let cluster = MemCluster::new();
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(b"archive bytes").expect("write");
        file.flush().expect("flush");

        let archive = cluster.upload_archive(file.path()).expect("upload");
        assert_eq!(archive.checksum.algorithm, "sha256");
        assert!(archive.url.ends_with(&archive.checksum.sum));
    }

    #[test]
    fn seed_does_not_log_operations() {
        let cluster = MemCluster::new();
        cluster.seed(env("python", "python:3.11"));
        assert!(cluster.operations().is_empty());
        let listed: Vec<Environment> = cluster.list().expect("list");
        assert_eq!(listed.len(), 1);
        assert!(listed[0].metadata.uid.is_some());
    }
}
