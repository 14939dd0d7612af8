//! fspec core library — domain types, ownership annotations, client contract.
//!
//! Public API surface:
//! - [`types`] — resources, metadata, archives, deployment identity
//! - [`ownership`] — the two deployment annotations and the UID ownership test
//! - [`client`] — [`ResourceClient`] / [`Cluster`] traits and [`MemCluster`]
//! - [`http`] — the blocking [`HttpClient`] adapter
//! - [`error`] — [`ClientError`]

pub mod client;
pub mod error;
pub mod http;
pub mod ownership;
pub mod types;

pub use client::{Cluster, MemCluster, ResourceClient};
pub use error::ClientError;
pub use http::HttpClient;
pub use types::{
    Archive, ArchiveKind, ArchiveUploadSpec, Checksum, DeploymentConfig, Environment, Function,
    HttpTrigger, KubernetesWatchTrigger, Metadata, MessageQueueTrigger, Package, SpecResource,
    TimeTrigger, ARCHIVE_LITERAL_SIZE_LIMIT, ARCHIVE_URL_PREFIX, DEPLOYMENT_NAME_KEY,
    DEPLOYMENT_UID_KEY,
};
