//! Archive upload and reference resolution.
//!
//! Builds every declared archive, dedupes against archives the server
//! already holds (by content checksum), uploads the rest, and rewrites
//! `archive://<name>` references inside package specs to the concrete
//! archives. After this pass no pseudo-URL is left in the resource set.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use fspec_core::types::{Archive, ArchiveKind, Package, ARCHIVE_URL_PREFIX};
use fspec_core::{Cluster, ResourceClient, SpecResource};

use crate::archive;
use crate::error::{client_err, io_err, ApplyError};
use crate::loader::ResourceSet;

/// Materialize, dedupe, and upload archives; rewrite package references.
pub fn apply_archives<C: Cluster>(
    client: &C,
    spec_dir: &Path,
    resources: &mut ResourceSet,
) -> Result<(), ApplyError> {
    // Staging dir for intermediate zips; lives until all uploads are done.
    let staging = tempfile::tempdir().map_err(|e| io_err(spec_dir, e))?;

    // archive://<name> -> locally built archive.
    let mut built: BTreeMap<String, Archive> = BTreeMap::new();
    for spec in &resources.archive_upload_specs {
        let ar = archive::build(spec_dir, staging.path(), spec)?;
        built.insert(format!("{ARCHIVE_URL_PREFIX}{}", spec.name), ar);
    }

    // Content index of archives the server already knows: checksum -> URL.
    let packages: Vec<Package> =
        ResourceClient::<Package>::list(client).map_err(client_err(Package::LABEL))?;
    let mut available: BTreeMap<String, String> = BTreeMap::new();
    for package in &packages {
        for ar in [&package.spec.source, &package.spec.deployment] {
            if ar.kind == Some(ArchiveKind::Url) && !ar.url.is_empty() {
                available.insert(ar.checksum.sum.clone(), ar.url.clone());
            }
        }
    }

    // Upload what the server lacks; reuse what it has. Literals ride along
    // inside the package body and are never uploaded.
    for (name, ar) in built.iter_mut() {
        if ar.kind != Some(ArchiveKind::Url) {
            continue;
        }
        if let Some(url) = available.get(&ar.checksum.sum) {
            info!("archive {name} exists on the server, not uploading");
            ar.url = url.clone();
        } else {
            info!("uploading archive {name}");
            *ar = client
                .upload_archive(Path::new(&ar.url))
                .map_err(client_err("archive"))?;
        }
    }

    // Resolve pseudo-URLs in the declared packages.
    for package in &mut resources.packages {
        for ar in [&mut package.spec.source, &mut package.spec.deployment] {
            resolve_reference(ar, &built)?;
        }
    }

    Ok(())
}

fn resolve_reference(
    ar: &mut Archive,
    built: &BTreeMap<String, Archive>,
) -> Result<(), ApplyError> {
    if ar.kind != Some(ArchiveKind::Url) || !ar.url.starts_with(ARCHIVE_URL_PREFIX) {
        return Ok(());
    }
    let Some(resolved) = built.get(&ar.url) else {
        let name = ar.url.trim_start_matches(ARCHIVE_URL_PREFIX).to_string();
        return Err(ApplyError::UnknownArchive(name));
    };
    *ar = resolved.clone();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fspec_core::types::{
        ArchiveUploadSpec, Checksum, EnvironmentReference, Metadata, PackageSpec,
        ARCHIVE_LITERAL_SIZE_LIMIT,
    };
    use fspec_core::MemCluster;
    use std::fs;
    use tempfile::TempDir;

    fn package(name: &str, source_url: &str) -> Package {
        Package {
            metadata: Metadata::named("default", name),
            spec: PackageSpec {
                environment: EnvironmentReference {
                    namespace: "default".to_string(),
                    name: "python".to_string(),
                },
                source: Archive::url(source_url, Checksum::default()),
                deployment: Archive::default(),
                build_command: None,
            },
        }
    }

    fn upload_spec(name: &str, include: &str) -> ArchiveUploadSpec {
        ArchiveUploadSpec {
            name: name.to_string(),
            root_dir: None,
            include_globs: vec![include.to_string()],
            exclude_globs: vec![],
        }
    }

    /// Workspace with a big source file so archives take the URL path.
    fn workspace_with_big_file(file: &str) -> (TempDir, std::path::PathBuf) {
        let root = TempDir::new().expect("root");
        let spec_dir = root.path().join("specs");
        fs::create_dir_all(&spec_dir).expect("mkdir");
        let big = vec![3u8; ARCHIVE_LITERAL_SIZE_LIMIT as usize + 1];
        fs::write(root.path().join(file), big).expect("write");
        (root, spec_dir)
    }

    #[test]
    fn rewrites_package_reference_to_uploaded_archive() {
        let (_root, spec_dir) = workspace_with_big_file("src.bin");
        let cluster = MemCluster::new();

        let mut set = ResourceSet {
            archive_upload_specs: vec![upload_spec("src", "src.bin")],
            packages: vec![package("hello-pkg", "archive://src")],
            ..ResourceSet::default()
        };
        apply_archives(&cluster, &spec_dir, &mut set).expect("apply archives");

        let source = &set.packages[0].spec.source;
        assert_eq!(source.kind, Some(ArchiveKind::Url));
        assert!(source.url.starts_with("http://storagesvc/"));
        assert!(!source.checksum.sum.is_empty());

        let uploads: Vec<_> = cluster
            .operations()
            .into_iter()
            .filter(|op| op.starts_with("upload"))
            .collect();
        assert_eq!(uploads.len(), 1);
    }

    #[test]
    fn shared_reference_uploads_once() {
        let (_root, spec_dir) = workspace_with_big_file("src.bin");
        let cluster = MemCluster::new();

        let mut set = ResourceSet {
            archive_upload_specs: vec![upload_spec("src", "src.bin")],
            packages: vec![
                package("pkg-a", "archive://src"),
                package("pkg-b", "archive://src"),
            ],
            ..ResourceSet::default()
        };
        apply_archives(&cluster, &spec_dir, &mut set).expect("apply archives");

        let uploads = cluster
            .operations()
            .iter()
            .filter(|op| op.starts_with("upload"))
            .count();
        assert_eq!(uploads, 1);
        assert_eq!(
            set.packages[0].spec.source.url,
            set.packages[1].spec.source.url
        );
    }

    #[test]
    fn server_known_checksum_skips_upload() {
        let (root, spec_dir) = workspace_with_big_file("src.bin");
        let cluster = MemCluster::new();

        // A package on the server already carries this content.
        let sum = archive::file_sha256(&root.path().join("src.bin")).expect("hash");
        let mut existing = package("old-pkg", "http://storagesvc/archives/known");
        existing.spec.source.checksum = Checksum::sha256(sum);
        cluster.seed(existing);

        let mut set = ResourceSet {
            archive_upload_specs: vec![upload_spec("src", "src.bin")],
            packages: vec![package("new-pkg", "archive://src")],
            ..ResourceSet::default()
        };
        apply_archives(&cluster, &spec_dir, &mut set).expect("apply archives");

        assert!(cluster.operations().iter().all(|op| !op.starts_with("upload")));
        assert_eq!(
            set.packages[0].spec.source.url,
            "http://storagesvc/archives/known"
        );
    }

    #[test]
    fn literal_archives_are_never_uploaded() {
        let root = TempDir::new().expect("root");
        let spec_dir = root.path().join("specs");
        fs::create_dir_all(&spec_dir).expect("mkdir");
        fs::write(root.path().join("tiny.py"), b"x = 1\n").expect("write");

        let cluster = MemCluster::new();
        let mut set = ResourceSet {
            archive_upload_specs: vec![upload_spec("tiny", "tiny.py")],
            packages: vec![package("pkg", "archive://tiny")],
            ..ResourceSet::default()
        };
        apply_archives(&cluster, &spec_dir, &mut set).expect("apply archives");

        assert!(cluster.operations().is_empty());
        let source = &set.packages[0].spec.source;
        assert_eq!(source.kind, Some(ArchiveKind::Literal));
        assert_eq!(source.literal, b"x = 1\n");
        assert!(source.url.is_empty());
    }

    #[test]
    fn unresolved_reference_is_fatal() {
        let root = TempDir::new().expect("root");
        let spec_dir = root.path().join("specs");
        fs::create_dir_all(&spec_dir).expect("mkdir");

        let cluster = MemCluster::new();
        let mut set = ResourceSet {
            packages: vec![package("pkg", "archive://missing")],
            ..ResourceSet::default()
        };
        let err = apply_archives(&cluster, &spec_dir, &mut set).unwrap_err();
        assert!(matches!(err, ApplyError::UnknownArchive(name) if name == "missing"));
    }

    #[test]
    fn plain_urls_pass_through_untouched() {
        let root = TempDir::new().expect("root");
        let spec_dir = root.path().join("specs");
        fs::create_dir_all(&spec_dir).expect("mkdir");

        let cluster = MemCluster::new();
        let mut set = ResourceSet {
            packages: vec![package("pkg", "http://example.com/code.zip")],
            ..ResourceSet::default()
        };
        apply_archives(&cluster, &spec_dir, &mut set).expect("apply archives");
        assert_eq!(set.packages[0].spec.source.url, "http://example.com/code.zip");
    }
}
