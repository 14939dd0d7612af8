//! Local archive materialization.
//!
//! Turns an [`ArchiveUploadSpec`] into a concrete artifact: the include
//! globs are expanded relative to the root dir, exclusions subtracted, and
//! the survivors either used in place (single file) or packed into a zip in
//! the staging directory. Small artifacts become literal archives; larger
//! ones get a SHA-256 checksum and a URL pointing at the local file, to be
//! uploaded by the caller.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use glob::Pattern;
use sha2::{Digest, Sha256};
use tracing::debug;
use zip::write::FileOptions;
use zip::ZipWriter;

use fspec_core::types::{Archive, ArchiveUploadSpec, Checksum, ARCHIVE_LITERAL_SIZE_LIMIT};

use crate::error::{io_err, ApplyError};

/// Build the archive declared by `spec`.
///
/// `staging` receives any intermediate zip file and must outlive the
/// returned [`Archive`] until upload (URL archives reference a path inside
/// it).
pub fn build(spec_dir: &Path, staging: &Path, spec: &ArchiveUploadSpec) -> Result<Archive, ApplyError> {
    let root_dir = match &spec.root_dir {
        Some(dir) => dir.clone(),
        None => spec_dir.join(".."),
    };

    let files = collect_files(&root_dir, spec)?;
    if files.is_empty() {
        return Err(ApplyError::EmptyArchive(spec.name.clone()));
    }

    // A single file needs no container.
    let artifact = if files.len() == 1 {
        files[0].clone()
    } else {
        write_zip(staging, &root_dir, spec, &files)?
    };
    debug!(
        "archive '{}': {} file(s) -> {}",
        spec.name,
        files.len(),
        artifact.display()
    );

    let size = std::fs::metadata(&artifact)
        .map_err(|e| io_err(&artifact, e))?
        .len();
    if size < ARCHIVE_LITERAL_SIZE_LIMIT {
        let bytes = std::fs::read(&artifact).map_err(|e| io_err(&artifact, e))?;
        Ok(Archive::literal(bytes))
    } else {
        let sum = file_sha256(&artifact)?;
        // The path stands in for a URL here; this archive is only an
        // intermediate step and the uploader replaces it with the server's.
        Ok(Archive::url(
            artifact.to_string_lossy().into_owned(),
            Checksum::sha256(sum),
        ))
    }
}

// ---------------------------------------------------------------------------
// Glob expansion
// ---------------------------------------------------------------------------

fn collect_files(root_dir: &Path, spec: &ArchiveUploadSpec) -> Result<Vec<PathBuf>, ApplyError> {
    let excludes = compile_patterns(&spec.name, &spec.exclude_globs)?;

    let mut files = Vec::new();
    for include in &spec.include_globs {
        let absolute = root_dir.join(include);
        let matches =
            glob::glob(&absolute.to_string_lossy()).map_err(|source| ApplyError::InvalidGlob {
                name: spec.name.clone(),
                pattern: include.clone(),
                source,
            })?;
        for entry in matches {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                io_err(path, e.into_error())
            })?;
            if path.is_dir() {
                // Directories match too; take their contents.
                for file in walkdir::WalkDir::new(&path).sort_by_file_name() {
                    let file = file.map_err(|e| {
                        let p = e.path().unwrap_or(&path).to_path_buf();
                        io_err(p, e.into())
                    })?;
                    if file.file_type().is_file() {
                        files.push(file.into_path());
                    }
                }
            } else {
                files.push(path);
            }
        }
    }

    files.retain(|path| !is_excluded(root_dir, path, &excludes));
    Ok(files)
}

fn compile_patterns(name: &str, globs: &[String]) -> Result<Vec<Pattern>, ApplyError> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|source| ApplyError::InvalidGlob {
                name: name.to_string(),
                pattern: g.clone(),
                source,
            })
        })
        .collect()
}

fn is_excluded(root_dir: &Path, path: &Path, excludes: &[Pattern]) -> bool {
    let relative = path.strip_prefix(root_dir).unwrap_or(path);
    excludes.iter().any(|p| p.matches_path(relative))
}

// ---------------------------------------------------------------------------
// Zip packing
// ---------------------------------------------------------------------------

fn write_zip(
    staging: &Path,
    root_dir: &Path,
    spec: &ArchiveUploadSpec,
    files: &[PathBuf],
) -> Result<PathBuf, ApplyError> {
    let zip_path = staging.join(format!("fspec-archive-{}.zip", spec.name));
    let zip_file = File::create(&zip_path).map_err(|e| io_err(&zip_path, e))?;
    let mut writer = ZipWriter::new(zip_file);
    let options = FileOptions::default();

    fn zip_err(name: String) -> impl FnOnce(zip::result::ZipError) -> ApplyError {
        move |source| ApplyError::Zip { name, source }
    }

    for path in files {
        let entry_name = path
            .strip_prefix(root_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        writer
            .start_file(entry_name, options)
            .map_err(zip_err(spec.name.clone()))?;
        let mut source = File::open(path).map_err(|e| io_err(path, e))?;
        std::io::copy(&mut source, &mut writer).map_err(|e| io_err(path, e))?;
    }
    writer
        .finish()
        .map_err(zip_err(spec.name.clone()))?
        .flush()
        .map_err(|e| io_err(&zip_path, e))?;

    Ok(zip_path)
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Streaming SHA-256 of a file, hex-encoded.
pub fn file_sha256(path: &Path) -> Result<String, ApplyError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer).map_err(|e| io_err(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
