//! Domain types for declared and server-side resources.
//!
//! Every resource is `{ metadata, spec }`; specs are compared by structural
//! equality, so all spec types derive `PartialEq`. Wire field names are
//! camelCase via serde. All filesystem locations use `PathBuf`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Platform constants
// ---------------------------------------------------------------------------

/// Annotation key carrying the human-readable deployment name.
pub const DEPLOYMENT_NAME_KEY: &str = "fission-deployment-name";

/// Annotation key carrying the deployment UID — the ownership tag.
pub const DEPLOYMENT_UID_KEY: &str = "fission-deployment-uid";

/// Pseudo-URL scheme referencing an [`ArchiveUploadSpec`] by symbolic name.
pub const ARCHIVE_URL_PREFIX: &str = "archive://";

/// Archives below this byte length are inlined as literals; anything at or
/// above it is uploaded and referenced by URL + checksum. Platform-wide
/// value, shared with every existing package on the server.
pub const ARCHIVE_LITERAL_SIZE_LIMIT: u64 = 256 * 1024;

// ---------------------------------------------------------------------------
// Deployment identity
// ---------------------------------------------------------------------------

/// The identity document of a managed deployment, persisted as
/// `fission-config.yaml` in the spec directory.
///
/// The `uid` is minted once at init and never changes; it is the owner tag
/// stamped on every resource this deployment creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl DeploymentConfig {
    pub const KIND: &'static str = "DeploymentConfig";

    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            name: name.into(),
            uid: uid.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Resource metadata header shared by every kind.
///
/// `uid` and `resource_version` are server-assigned and come back on every
/// write; they never participate in change detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: default_namespace(),
            annotations: BTreeMap::new(),
            uid: None,
            resource_version: None,
        }
    }
}

impl Metadata {
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// The identity key of a resource within its kind.
    pub fn key(&self) -> (String, String) {
        (self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

// ---------------------------------------------------------------------------
// Archives
// ---------------------------------------------------------------------------

/// Content hash attached to URL archives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sum: String,
}

impl Checksum {
    pub fn sha256(sum: impl Into<String>) -> Self {
        Self {
            algorithm: "sha256".to_string(),
            sum: sum.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Literal,
    Url,
}

/// The deployable unit of code: either inline bytes (small enough to ride
/// along in the resource body) or a URL plus content checksum.
///
/// In declared packages the URL may use the `archive://<name>` pseudo-scheme;
/// the apply pipeline rewrites such references before anything reaches the
/// server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archive {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ArchiveKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "base64_bytes")]
    pub literal: Vec<u8>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Checksum::is_empty")]
    pub checksum: Checksum,
}

impl Archive {
    pub fn literal(bytes: Vec<u8>) -> Self {
        Self {
            kind: Some(ArchiveKind::Literal),
            literal: bytes,
            ..Self::default()
        }
    }

    pub fn url(url: impl Into<String>, checksum: Checksum) -> Self {
        Self {
            kind: Some(ArchiveKind::Url),
            url: url.into(),
            checksum,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
    }
}

/// Literal archive bytes travel base64-encoded on the wire.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Declares how to assemble a local archive from glob patterns, and the
/// symbolic name packages use to reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveUploadSpec {
    pub name: String,
    /// Root for glob expansion; defaults to the parent of the spec directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_globs: Vec<String>,
}

// ---------------------------------------------------------------------------
// References between resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentReference {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRef {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    /// Pinned by the apply pipeline from the observed package metadata.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionPackageRef {
    pub package_ref: PackageRef,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub function_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionReference {
    #[serde(rename = "type", default = "default_function_reference_type")]
    pub kind: String,
    pub name: String,
}

fn default_function_reference_type() -> String {
    "name".to_string()
}

// ---------------------------------------------------------------------------
// Resource specs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSpec {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub version: i32,
    pub runtime: RuntimeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSpec {
    pub environment: EnvironmentReference,
    #[serde(default, skip_serializing_if = "Archive::is_empty")]
    pub source: Archive,
    #[serde(default, skip_serializing_if = "Archive::is_empty")]
    pub deployment: Archive,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub environment: EnvironmentReference,
    pub package: FunctionPackageRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTriggerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub relative_url: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub function_reference: FunctionReference,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesWatchTriggerSpec {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub label_selector: BTreeMap<String, String>,
    pub function_reference: FunctionReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeTriggerSpec {
    pub cron: String,
    pub function_reference: FunctionReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQueueTriggerSpec {
    pub function_reference: FunctionReference,
    pub message_queue_type: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Common surface of the reconciled resource kinds: a kind label, a
/// metadata header, and structural spec equality. The reconciler is generic
/// over this trait and never looks inside a spec.
pub trait SpecResource: Clone {
    /// The document `kind:` tag, also used in summary lines.
    const KIND: &'static str;

    /// Noun used when wrapping control-plane failures
    /// ("environment apply failed").
    const LABEL: &'static str;

    fn metadata(&self) -> &Metadata;
    fn metadata_mut(&mut self) -> &mut Metadata;

    /// True iff the declarative payloads are structurally identical.
    fn same_spec(&self, other: &Self) -> bool;
}

macro_rules! resources {
    ($($(#[$doc:meta])* $name:ident, $kind:literal, $label:literal, $spec:ty;)+) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
            pub struct $name {
                pub metadata: Metadata,
                pub spec: $spec,
            }

            impl SpecResource for $name {
                const KIND: &'static str = $kind;
                const LABEL: &'static str = $label;

                fn metadata(&self) -> &Metadata {
                    &self.metadata
                }

                fn metadata_mut(&mut self) -> &mut Metadata {
                    &mut self.metadata
                }

                fn same_spec(&self, other: &Self) -> bool {
                    self.spec == other.spec
                }
            }
        )+
    };
}

resources! {
    /// A language runtime (and optional builder) functions execute in.
    Environment, "Environment", "environment", EnvironmentSpec;
    /// A deployable bundle of source and/or built code tied to an environment.
    Package, "Package", "package", PackageSpec;
    /// An invocable function backed by a package.
    Function, "Function", "function", FunctionSpec;
    HttpTrigger, "HTTPTrigger", "HTTPTrigger", HttpTriggerSpec;
    KubernetesWatchTrigger, "KubernetesWatchTrigger", "KubernetesWatchTrigger", KubernetesWatchTriggerSpec;
    TimeTrigger, "TimeTrigger", "TimeTrigger", TimeTriggerSpec;
    MessageQueueTrigger, "MessageQueueTrigger", "MessageQueueTrigger", MessageQueueTriggerSpec;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
