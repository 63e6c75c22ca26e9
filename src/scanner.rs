//! Recursive source walk.
//!
//! `scan` returns a lazy iterator of regular files below the source root.
//! Symbolic links are followed, but every directory is entered at most once
//! by its resolved path, so a link into the tree never lists a file twice.
//! File links whose target lies inside the tree are dropped (the target is
//! listed on its own); links to outside files are listed once per target.
//! Entries that cannot be read are logged and skipped, never fatal.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::errors::ClassifyError;

/// One regular file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Lower-case, without the leading dot. `None` for dotfiles and names without one.
    pub extension: Option<String>,
}

impl FileDescriptor {
    fn from_path(path: PathBuf, size_bytes: u64) -> Self {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| !e.is_empty());
        Self {
            path,
            size_bytes,
            extension,
        }
    }
}

/// Lazy walk over a source tree.
pub struct Scan {
    walker: walkdir::IntoIter,
    root_real: PathBuf,
    excluded: Vec<PathBuf>,
    // Walked path -> resolved path of every directory entered so far.
    dirs: HashMap<PathBuf, PathBuf>,
    entered: HashSet<PathBuf>,
    // Resolved paths of files listed from outside the root.
    outside_files: HashSet<PathBuf>,
}

/// Start walking `root`. Fails only when the root itself is not a readable directory.
pub fn scan(root: &Path) -> Result<Scan, ClassifyError> {
    let md = fs::metadata(root).map_err(|e| ClassifyError::not_found("source", root, e.to_string()))?;
    if !md.is_dir() {
        return Err(ClassifyError::not_found("source", root, "not a directory"));
    }
    let root_real = dunce::canonicalize(root).map_err(|e| ClassifyError::not_found("source", root, e.to_string()))?;
    debug!(root = %root.display(), "scan started");
    Ok(Scan {
        walker: WalkDir::new(root).follow_links(true).into_iter(),
        root_real,
        excluded: Vec::new(),
        dirs: HashMap::new(),
        entered: HashSet::new(),
        outside_files: HashSet::new(),
    })
}

impl Scan {
    /// Prune `path` (a file or a whole subtree) from the walk.
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|ex| path.starts_with(ex))
    }

    /// Resolve a directory and claim it. False when it must not be entered.
    fn enter_dir(&mut self, entry: &DirEntry) -> bool {
        let real = match dunce::canonicalize(entry.path()) {
            Ok(real) => real,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "cannot resolve directory; skipping");
                return false;
            }
        };
        if self.is_excluded(&real) {
            return false;
        }
        if !self.entered.insert(real.clone()) {
            debug!(path = %entry.path().display(), real = %real.display(), "directory already walked; skipping");
            return false;
        }
        self.dirs.insert(entry.path().to_path_buf(), real);
        true
    }

    /// Resolved path of a file entry, using the already resolved parent when it is not a link.
    fn real_file_path(&self, entry: &DirEntry) -> std::io::Result<PathBuf> {
        if !entry.path_is_symlink() {
            let parent = entry.path().parent().and_then(|p| self.dirs.get(p));
            if let Some(parent) = parent {
                return Ok(parent.join(entry.file_name()));
            }
        }
        dunce::canonicalize(entry.path())
    }

    /// True the first time a file is seen by its resolved path.
    fn first_visit_of_file(&mut self, entry: &DirEntry) -> bool {
        let real = match self.real_file_path(entry) {
            Ok(real) => real,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "cannot resolve file; skipping");
                return false;
            }
        };
        if self.is_excluded(&real) {
            return false;
        }
        if real.starts_with(&self.root_real) {
            // Inside the tree every directory is walked once, so the plain
            // entry is the one listed; a link to it would be a second copy.
            return !entry.path_is_symlink();
        }
        self.outside_files.insert(real)
    }
}

impl Iterator for Scan {
    type Item = FileDescriptor;

    fn next(&mut self) -> Option<FileDescriptor> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    if let Some(ancestor) = err.loop_ancestor() {
                        warn!(
                            path = ?err.path(),
                            ancestor = %ancestor.display(),
                            "symlink loop detected; skipping"
                        );
                    } else {
                        warn!(path = ?err.path(), error = %err, "unreadable entry; skipping");
                    }
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if self.is_excluded(entry.path()) || !self.enter_dir(&entry) {
                    self.walker.skip_current_dir();
                }
                continue;
            }
            if !entry.file_type().is_file() || self.is_excluded(entry.path()) || !self.first_visit_of_file(&entry) {
                continue;
            }

            let size_bytes = match entry.metadata() {
                Ok(md) => md.len(),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "cannot stat file; skipping");
                    continue;
                }
            };
            return Some(FileDescriptor::from_path(entry.into_path(), size_bytes));
        }
    }
}
