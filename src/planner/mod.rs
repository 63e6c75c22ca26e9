//! Move planning.
//!
//! Turns scanned files into a [`MovePlan`]: every file gets a destination of
//! `dest_root/<category>/<extension or no_extension>/<file name>`, adjusted by
//! the duplicate policy. Planning never touches the filesystem beyond
//! existence checks.

pub mod duplicate;

pub use duplicate::{DuplicatePolicy, Resolution, next_free_name, resolve};

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::mapping::{Category, Mapping};
use crate::scanner::FileDescriptor;

/// Directory used for files without an extension.
pub const NO_EXTENSION_DIR: &str = "no_extension";

/// One file to move. Consumed exactly once by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub category: Category,
    /// Set by the replace policy: an existing destination may be overwritten.
    pub overwrite: bool,
}

/// A file the planner decided not to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSkip {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: &'static str,
}

/// Immutable result of planning.
#[derive(Debug, Clone, Default)]
pub struct MovePlan {
    entries: Vec<MoveEntry>,
    per_category: BTreeMap<String, usize>,
    skipped: Vec<PlanSkip>,
}

impl MovePlan {
    pub fn entries(&self) -> &[MoveEntry] {
        &self.entries
    }

    /// Planned moves per category directory name.
    pub fn per_category(&self) -> &BTreeMap<String, usize> {
        &self.per_category
    }

    pub fn skipped(&self) -> &[PlanSkip] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Planner<'a> {
    mapping: &'a Mapping,
    dest_root: PathBuf,
    policy: DuplicatePolicy,
}

impl<'a> Planner<'a> {
    pub fn new(mapping: &'a Mapping, dest_root: impl Into<PathBuf>, policy: DuplicatePolicy) -> Self {
        Self {
            mapping,
            dest_root: dest_root.into(),
            policy,
        }
    }

    /// Destination before duplicate handling.
    pub fn proposed_destination(&self, file: &FileDescriptor) -> (Category, PathBuf) {
        let ext = file.extension.as_deref().unwrap_or("");
        let category = self.mapping.category_of(ext);
        let ext_dir = file.extension.as_deref().unwrap_or(NO_EXTENSION_DIR);
        let mut dest = self.dest_root.join(category.dir_name()).join(ext_dir);
        if let Some(name) = file.path.file_name() {
            dest.push(name);
        }
        (category, dest)
    }

    /// Build the plan. Order follows the input order.
    pub fn plan(&self, files: impl IntoIterator<Item = FileDescriptor>) -> MovePlan {
        self.plan_with(files, |p: &Path| p.exists())
    }

    /// Planning with an explicit on-disk existence probe.
    pub fn plan_with(
        &self,
        files: impl IntoIterator<Item = FileDescriptor>,
        exists_on_disk: impl Fn(&Path) -> bool,
    ) -> MovePlan {
        let mut plan = MovePlan::default();
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        for file in files {
            let (category, proposed) = self.proposed_destination(&file);

            if proposed == file.path {
                debug!(path = %file.path.display(), "already in place");
                plan.skipped.push(PlanSkip {
                    source: file.path,
                    destination: proposed,
                    reason: "already in place",
                });
                continue;
            }

            let resolution = match self.policy {
                DuplicatePolicy::Skip => resolve(&proposed, self.policy, |p: &Path| {
                    claimed.contains(p) || exists_on_disk(p)
                }),
                // Replace overwrites what is on disk, but two files of one plan
                // must never share a destination; later ones get numbered.
                DuplicatePolicy::Replace if claimed.contains(&proposed) => {
                    resolve(&proposed, DuplicatePolicy::AppendNumber, |p: &Path| {
                        claimed.contains(p) || exists_on_disk(p)
                    })
                }
                DuplicatePolicy::Replace => Resolution::Use(proposed.clone()),
                DuplicatePolicy::AppendNumber => resolve(&proposed, self.policy, |p: &Path| {
                    claimed.contains(p) || (p != file.path && exists_on_disk(p))
                }),
            };

            match resolution {
                Resolution::Skip => {
                    let reason = if claimed.contains(&proposed) {
                        "claimed by another file in this run"
                    } else {
                        "destination exists"
                    };
                    debug!(path = %file.path.display(), reason, "skipping");
                    plan.skipped.push(PlanSkip {
                        source: file.path,
                        destination: proposed,
                        reason,
                    });
                }
                Resolution::Use(destination) => {
                    let overwrite = self.policy == DuplicatePolicy::Replace && destination == proposed;
                    claimed.insert(destination.clone());
                    *plan
                        .per_category
                        .entry(category.dir_name().to_string())
                        .or_insert(0) += 1;
                    plan.entries.push(MoveEntry {
                        source: file.path,
                        destination,
                        category,
                        overwrite,
                    });
                }
            }
        }

        info!(
            planned = plan.entries.len(),
            skipped = plan.skipped.len(),
            policy = %self.policy,
            "Plan generated"
        );
        plan
    }
}
