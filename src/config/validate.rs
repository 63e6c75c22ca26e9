//! Root validation.
//! Verifies the source is a readable directory and the destination is (or can
//! become) a writable directory, then returns both in canonical form.
//! `inspect_roots` is the read-only variant used for previews.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::errors::ClassifyError;

/// Validate and canonicalize the two roots of a classify run.
///
/// The destination is created when missing; this is the only side effect.
pub fn validate_roots(source: &Path, destination: &Path) -> Result<(PathBuf, PathBuf), ClassifyError> {
    check_roots(source, destination, true)
}

/// Like [`validate_roots`] but touches nothing: a missing destination is
/// accepted and resolved against its nearest existing ancestor.
pub fn inspect_roots(source: &Path, destination: &Path) -> Result<(PathBuf, PathBuf), ClassifyError> {
    check_roots(source, destination, false)
}

fn check_roots(source: &Path, destination: &Path, create: bool) -> Result<(PathBuf, PathBuf), ClassifyError> {
    // 1) Source: must exist, be a directory, and be readable.
    ensure_dir_exists_and_is_dir(source, "source")?;
    fs::read_dir(source).map_err(|e| {
        error!("Cannot read source directory {}: {e}", source.display());
        ClassifyError::not_found("source", source, format!("cannot read directory: {e}"))
    })?;

    // 2) Destination: must be a directory; create if missing; ensure writable.
    if create {
        ensure_dir_is_or_create(destination, "destination")?;
        is_writable_probe(destination).map_err(|e| {
            ClassifyError::not_found("destination", destination, format!("not writable: {e}"))
        })?;
        debug!("destination writable: {}", destination.display());
    } else if destination.exists() && !destination.is_dir() {
        return Err(ClassifyError::not_found("destination", destination, "exists but is not a directory"));
    }

    // 3) Resolve symlinks so later containment checks compare like with like.
    let source_real = dunce::canonicalize(source)
        .map_err(|e| ClassifyError::not_found("source", source, e.to_string()))?;
    let dest_real = canonicalize_existing_prefix(destination)
        .map_err(|e| ClassifyError::not_found("destination", destination, e.to_string()))?;

    info!(
        source = %source_real.display(),
        destination = %dest_real.display(),
        "Roots validated"
    );
    Ok((source_real, dest_real))
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest.
fn canonicalize_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut real = dunce::canonicalize(existing)?;
    for name in missing.into_iter().rev() {
        real.push(name);
    }
    Ok(real)
}

fn ensure_dir_exists_and_is_dir(path: &Path, role: &'static str) -> Result<(), ClassifyError> {
    match fs::metadata(path) {
        Ok(md) if md.is_dir() => Ok(()),
        Ok(_) => {
            error!("{role} is not a directory: {}", path.display());
            Err(ClassifyError::not_found(role, path, "not a directory"))
        }
        Err(e) => {
            error!("{role} does not exist: {}", path.display());
            Err(ClassifyError::not_found(role, path, e.to_string()))
        }
    }
}

fn ensure_dir_is_or_create(path: &Path, role: &'static str) -> Result<(), ClassifyError> {
    if path.exists() {
        if !path.is_dir() {
            error!("{role} exists but isn't a directory: {}", path.display());
            return Err(ClassifyError::not_found(role, path, "exists but is not a directory"));
        }
    } else {
        fs::create_dir_all(path)
            .map_err(|e| ClassifyError::not_found(role, path, format!("cannot create directory: {e}")))?;
        info!("Created {role} directory: {}", path.display());
    }
    Ok(())
}

/// Non-destructive writability probe: create and remove a uniquely named file.
fn is_writable_probe(dir: &Path) -> io::Result<()> {
    let probe = dir.join(format!(".filesort_probe_{}.tmp", std::process::id()));
    fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&probe)?;
    let _ = fs::remove_file(&probe);
    Ok(())
}
