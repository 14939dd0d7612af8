//! Error types for the apply engine.

use std::path::PathBuf;

use thiserror::Error;

use fspec_core::ClientError;

/// All errors that can abort an apply run. There is no retry layer: every
/// variant propagates to the caller, and recovery is re-invocation (the
/// engine is idempotent).
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Malformed YAML for a document whose kind is recognized.
    #[error("failed to parse {kind} in {path}: {source}")]
    Parse {
        path: PathBuf,
        kind: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The spec directory has no DeploymentConfig document.
    #[error("no DeploymentConfig found in the spec directory; run `fspec init` first")]
    MissingDeploymentConfig,

    /// An archive's include globs matched no files.
    #[error("archive '{0}' is empty")]
    EmptyArchive(String),

    /// A package references `archive://<name>` with no matching upload spec.
    #[error("unknown archive name '{0}'")]
    UnknownArchive(String),

    /// A glob pattern in an upload spec failed to compile.
    #[error("invalid glob '{pattern}' in archive '{name}': {source}")]
    InvalidGlob {
        name: String,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A control-plane call failed; wrapped with the resource label
    /// ("environment apply failed", "HTTPTrigger apply failed").
    #[error("{kind} apply failed: {source}")]
    Client {
        kind: &'static str,
        #[source]
        source: ClientError,
    },

    /// Filesystem failure during walk, read, or archive packing.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zip container packing failed.
    #[error("failed to zip archive '{name}': {source}")]
    Zip {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Convenience constructor for [`ApplyError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ApplyError {
    ApplyError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`ApplyError::Client`].
pub(crate) fn client_err(kind: &'static str) -> impl FnOnce(ClientError) -> ApplyError {
    move |source| ApplyError::Client { kind, source }
}
