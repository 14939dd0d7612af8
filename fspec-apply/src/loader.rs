//! Spec directory loader.
//!
//! Walks a directory tree, reads every `.yaml`/`.yml` file, splits
//! multi-document streams on `---` separators, and dispatches each document
//! by its `kind` field into a typed [`ResourceSet`]. Unknown kinds are
//! skipped with a warning (forward compatibility); malformed documents of a
//! known kind are fatal. The loader never touches the network and never
//! writes.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;
use walkdir::WalkDir;

use fspec_core::types::{
    ArchiveUploadSpec, DeploymentConfig, Environment, Function, HttpTrigger,
    KubernetesWatchTrigger, MessageQueueTrigger, Package, SpecResource, TimeTrigger,
};

use crate::error::{io_err, ApplyError};

// ---------------------------------------------------------------------------
// Resource set
// ---------------------------------------------------------------------------

/// Everything declared in a spec directory, one ordered list per kind.
///
/// Order within a list follows file order (paths sorted lexicographically)
/// and document order within each file. Duplicate identity keys within a
/// kind are last-write-wins: a later document silently replaces an earlier
/// one, just as a later DeploymentConfig replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    pub deployment_config: Option<DeploymentConfig>,
    pub archive_upload_specs: Vec<ArchiveUploadSpec>,
    pub environments: Vec<Environment>,
    pub packages: Vec<Package>,
    pub functions: Vec<Function>,
    pub http_triggers: Vec<HttpTrigger>,
    pub kubernetes_watch_triggers: Vec<KubernetesWatchTrigger>,
    pub time_triggers: Vec<TimeTrigger>,
    pub message_queue_triggers: Vec<MessageQueueTrigger>,
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load every spec document under `spec_dir` into a [`ResourceSet`].
pub fn load(spec_dir: &Path) -> Result<ResourceSet, ApplyError> {
    let mut set = ResourceSet::default();

    // Users can organize the spec dir into subdirectories; the sorted walk
    // keeps declaration order stable across platforms.
    let walker = WalkDir::new(spec_dir).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(spec_dir).to_path_buf();
            io_err(path, e.into())
        })?;
        if !entry.file_type().is_file() || !has_yaml_extension(entry.path()) {
            continue;
        }
        let contents =
            std::fs::read_to_string(entry.path()).map_err(|e| io_err(entry.path(), e))?;
        for document in split_documents(&contents) {
            parse_document(entry.path(), document, &mut set)?;
        }
    }

    Ok(set)
}

fn has_yaml_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Split a YAML stream into documents on lines beginning with `---`.
fn split_documents(contents: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();
    for line in contents.lines() {
        if line.starts_with("---") {
            documents.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    documents.push(current);
    documents.retain(|d| !d.trim().is_empty());
    documents
}

// ---------------------------------------------------------------------------
// Per-document dispatch
// ---------------------------------------------------------------------------

/// Minimal envelope: just enough to learn the document's kind before the
/// typed parse.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    kind: String,
}

fn parse_document(path: &Path, document: String, set: &mut ResourceSet) -> Result<(), ApplyError> {
    let envelope: Envelope = match serde_yaml::from_str(&document) {
        Ok(e) => e,
        Err(err) => {
            // Not even a mapping with a kind; same policy as an unknown kind.
            warn!("ignoring unparseable document in {}: {err}", path.display());
            return Ok(());
        }
    };

    fn typed<T: serde::de::DeserializeOwned>(
        path: &Path,
        kind: &str,
        document: &str,
    ) -> Result<T, ApplyError> {
        serde_yaml::from_str(document).map_err(|source| {
            warn!("failed to parse {kind} in {}: {source}", path.display());
            ApplyError::Parse {
                path: path.to_path_buf(),
                kind: kind.to_string(),
                source,
            }
        })
    }

    let kind = envelope.kind.as_str();
    match kind {
        "DeploymentConfig" => set.deployment_config = Some(typed(path, kind, &document)?),
        "ArchiveUploadSpec" => set.archive_upload_specs.push(typed(path, kind, &document)?),
        "Environment" => upsert(&mut set.environments, typed(path, kind, &document)?),
        "Package" => upsert(&mut set.packages, typed(path, kind, &document)?),
        "Function" => upsert(&mut set.functions, typed(path, kind, &document)?),
        "HTTPTrigger" => upsert(&mut set.http_triggers, typed(path, kind, &document)?),
        "KubernetesWatchTrigger" => upsert(
            &mut set.kubernetes_watch_triggers,
            typed(path, kind, &document)?,
        ),
        "TimeTrigger" => upsert(&mut set.time_triggers, typed(path, kind, &document)?),
        "MessageQueueTrigger" => upsert(
            &mut set.message_queue_triggers,
            typed(path, kind, &document)?,
        ),
        other => {
            // Extra files are fine; also good for forward compatibility.
            warn!("ignoring unknown kind '{other}' in {}", path.display());
        }
    }

    Ok(())
}

/// Append `resource`, dropping any earlier declaration with the same
/// `(namespace, name)` key so the last document wins.
fn upsert<R: SpecResource>(list: &mut Vec<R>, resource: R) {
    let key = resource.metadata().key();
    list.retain(|existing| existing.metadata().key() != key);
    list.push(resource);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ENVIRONMENT_DOC: &str = r#"kind: Environment
metadata:
  name: python
spec:
  version: 1
  runtime:
    image: python:3.11
"#;

    const FUNCTION_DOC: &str = r#"kind: Function
metadata:
  name: hello
spec:
  environment:
    name: python
  package:
    packageRef:
      name: hello-pkg
"#;

    #[test]
    fn loads_multi_document_file() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("resources.yaml"),
            format!("{ENVIRONMENT_DOC}---\n{FUNCTION_DOC}"),
        )
        .expect("write");

        let set = load(dir.path()).expect("load");
        assert_eq!(set.environments.len(), 1);
        assert_eq!(set.functions.len(), 1);
        assert_eq!(set.environments[0].metadata.name, "python");
    }

    #[test]
    fn walks_subdirectories_and_skips_non_yaml() {
        let dir = TempDir::new().expect("tempdir");
        let nested = dir.path().join("envs");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("python.yml"), ENVIRONMENT_DOC).expect("write");
        fs::write(dir.path().join("README.md"), "not yaml").expect("write");
        fs::write(dir.path().join("notes.txt"), "kind: Environment").expect("write");

        let set = load(dir.path()).expect("load");
        assert_eq!(set.environments.len(), 1);
    }

    #[test]
    fn unknown_kind_is_skipped() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("future.yaml"),
            "kind: CanaryConfig\nmetadata:\n  name: x\n",
        )
        .expect("write");

        let set = load(dir.path()).expect("load");
        assert!(set.environments.is_empty());
        assert!(set.functions.is_empty());
    }

    #[test]
    fn malformed_known_kind_is_fatal() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("broken.yaml"),
            "kind: Environment\nmetadata: 42\n",
        )
        .expect("write");

        let err = load(dir.path()).unwrap_err();
        match err {
            ApplyError::Parse { kind, path, .. } => {
                assert_eq!(kind, "Environment");
                assert!(path.ends_with("broken.yaml"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_identity_keys_are_last_write_wins() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("a-env.yaml"), ENVIRONMENT_DOC).expect("write");
        fs::write(
            dir.path().join("b-env.yaml"),
            "kind: Environment\nmetadata:\n  name: python\nspec:\n  version: 2\n  runtime:\n    image: python:3.12\n",
        )
        .expect("write");

        let set = load(dir.path()).expect("load");
        assert_eq!(set.environments.len(), 1);
        assert_eq!(set.environments[0].spec.runtime.image, "python:3.12");
    }

    #[test]
    fn same_name_in_different_namespaces_is_not_a_duplicate() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("envs.yaml"),
            format!(
                "{ENVIRONMENT_DOC}---\nkind: Environment\nmetadata:\n  name: python\n  namespace: staging\nspec:\n  version: 1\n  runtime:\n    image: python:3.11\n"
            ),
        )
        .expect("write");

        let set = load(dir.path()).expect("load");
        assert_eq!(set.environments.len(), 2);
    }

    #[test]
    fn later_deployment_config_wins() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("a-config.yaml"),
            "kind: DeploymentConfig\nname: first\nuid: uid-1\n",
        )
        .expect("write");
        fs::write(
            dir.path().join("b-config.yaml"),
            "kind: DeploymentConfig\nname: second\nuid: uid-2\n",
        )
        .expect("write");

        let set = load(dir.path()).expect("load");
        let config = set.deployment_config.expect("config");
        assert_eq!(config.name, "second");
        assert_eq!(config.uid, "uid-2");
    }

    #[test]
    fn leading_separator_and_blank_documents_are_ignored() {
        let docs = split_documents("---\nkind: A\n---\n\n---\nkind: B\n");
        assert_eq!(docs.len(), 2);
        assert!(docs[0].contains("kind: A"));
        assert!(docs[1].contains("kind: B"));
    }

    #[test]
    fn document_comment_markers_do_not_split() {
        // A line beginning with "---" splits; indented dashes do not.
        let docs = split_documents("kind: A\nitems:\n  - one\n  - two\n");
        assert_eq!(docs.len(), 1);
    }
}
