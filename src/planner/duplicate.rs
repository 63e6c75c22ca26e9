//! Duplicate-name resolution.
//!
//! Policy:
//! - Skip: use the intended path unless it is taken, otherwise drop the file.
//! - Replace: use the intended path; the mover overwrites what is there.
//! - AppendNumber: probe `name_1.ext`, `name_2.ext`, ... until a free name is found.
//!
//! Notes:
//! - Resolution is pure: "taken" is whatever the caller's predicate says, which lets
//!   the planner combine on-disk state with names already claimed in the same plan.
//! - Dotfiles take the suffix after the whole name (`.env_1`); multi-dot names take
//!   it before the last extension (`archive.tar_1.gz`).

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Leave the source where it is when the destination is taken.
    Skip,
    /// Overwrite whatever occupies the destination.
    Replace,
    /// Pick a unique name by appending `_n` before the extension.
    #[default]
    AppendNumber,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Replace => "replace",
            DuplicatePolicy::AppendNumber => "append_number",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(DuplicatePolicy::Skip),
            "replace" | "overwrite" => Ok(DuplicatePolicy::Replace),
            "append_number" | "append" | "rename" => Ok(DuplicatePolicy::AppendNumber),
            other => Err(format!(
                "invalid duplicate policy: '{other}' (expected skip, replace or append_number)"
            )),
        }
    }
}

/// Outcome of resolving one proposed destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Use(PathBuf),
    Skip,
}

/// Apply `policy` to `proposed`. `is_taken` reports whether a path is unavailable.
pub fn resolve(proposed: &Path, policy: DuplicatePolicy, is_taken: impl Fn(&Path) -> bool) -> Resolution {
    match policy {
        DuplicatePolicy::Skip if is_taken(proposed) => Resolution::Skip,
        DuplicatePolicy::Skip | DuplicatePolicy::Replace => Resolution::Use(proposed.to_path_buf()),
        DuplicatePolicy::AppendNumber => Resolution::Use(next_free_name(proposed, is_taken)),
    }
}

// Numbered variants probed before giving up on the plain counter.
const MAX_TRIES: u64 = 100_000;

/// Return `path` itself when free, otherwise the first free `_n` variant next to it.
pub fn next_free_name(path: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    let Some(name) = path.file_name() else {
        return path.to_path_buf();
    };
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    // Path-length awareness: first, ensure the base name (without suffix) fits.
    let (stem, ext) = split_name(name);
    let adjusted = dir.join(build_name_with_suffix(&stem, ext.as_deref(), ""));
    if !is_taken(&adjusted) {
        return adjusted;
    }

    let mut collisions = 0u32;
    for n in 1..=MAX_TRIES {
        let candidate = dir.join(build_name_with_suffix(&stem, ext.as_deref(), &format!("_{n}")));
        if !is_taken(&candidate) {
            return candidate;
        }
        collisions = collisions.saturating_add(1);
        if collisions == 3 {
            trace!(name = ?name, dir = %dir.display(), "duplicate: multiple collisions, continuing to search");
        }
    }

    // Directory is extremely crowded with numbered variants; fall back to a
    // per-process marker that cannot have been produced by the counter.
    let marker = format!("_{}_{}", std::process::id(), MAX_TRIES);
    dir.join(build_name_with_suffix(&stem, ext.as_deref(), &marker))
}

/// Split a file name into stem and extension. Dotfiles have no extension.
fn split_name(name: &OsStr) -> (OsString, Option<OsString>) {
    let base = Path::new(name);
    let stem = base
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| name.to_os_string());
    (stem, base.extension().map(|e| e.to_os_string()))
}

// Conservative filename limits (bytes/characters, platform-specific and approximate).
#[cfg(windows)]
const MAX_FILENAME_LEN: usize = 240;
#[cfg(not(windows))]
const MAX_FILENAME_LEN: usize = 255;

#[cfg(unix)]
fn name_len_units(s: &OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().len()
}

#[cfg(not(unix))]
fn name_len_units(s: &OsStr) -> usize {
    s.to_string_lossy().len()
}

/// Truncate the stem if needed so `stem + suffix + ["." + ext]` fits within MAX_FILENAME_LEN.
fn build_name_with_suffix(stem: &OsStr, ext: Option<&OsStr>, suffix: &str) -> OsString {
    let mut overhead = suffix.len();
    let mut ext_part = OsString::new();
    if let Some(e) = ext {
        overhead = overhead.saturating_add(1 + name_len_units(e));
        ext_part.push(".");
        ext_part.push(e);
    }

    let stem_os = if name_len_units(stem) + overhead > MAX_FILENAME_LEN {
        truncate_stem(stem, MAX_FILENAME_LEN.saturating_sub(overhead))
    } else {
        stem.to_os_string()
    };

    let mut new_name = stem_os;
    new_name.push(suffix);
    new_name.push(&ext_part);
    new_name
}

fn truncate_stem(stem: &OsStr, budget: usize) -> OsString {
    if budget == 0 {
        return OsString::from("f");
    }
    // UTF-8-aware truncation first, never splitting a character.
    if let Some(s) = stem.to_str() {
        let mut end = 0;
        for (idx, ch) in s.char_indices() {
            if idx + ch.len_utf8() > budget {
                break;
            }
            end = idx + ch.len_utf8();
        }
        if end == 0 {
            return OsString::from("f");
        }
        return OsString::from(&s[..end]);
    }
    #[cfg(unix)]
    {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};
        let bytes = stem.as_bytes();
        OsString::from_vec(bytes[..bytes.len().min(budget)].to_vec())
    }
    #[cfg(not(unix))]
    {
        truncate_stem(OsStr::new(stem.to_string_lossy().as_ref()), budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn taken(set: &[&str]) -> impl Fn(&Path) -> bool {
        let owned: HashSet<PathBuf> = set.iter().map(PathBuf::from).collect();
        move |p: &Path| owned.contains(p)
    }

    #[test]
    fn free_name_is_used_verbatim() {
        let r = resolve(Path::new("d/report.pdf"), DuplicatePolicy::AppendNumber, taken(&[]));
        assert_eq!(r, Resolution::Use(PathBuf::from("d/report.pdf")));
    }

    #[test]
    fn append_number_counts_from_one() {
        let r = resolve(
            Path::new("d/report.pdf"),
            DuplicatePolicy::AppendNumber,
            taken(&["d/report.pdf", "d/report_1.pdf"]),
        );
        assert_eq!(r, Resolution::Use(PathBuf::from("d/report_2.pdf")));
    }

    #[test]
    fn dotfile_and_multi_dot_names() {
        let r = resolve(Path::new("d/.env"), DuplicatePolicy::AppendNumber, taken(&["d/.env"]));
        assert_eq!(r, Resolution::Use(PathBuf::from("d/.env_1")));
        let r = resolve(
            Path::new("d/archive.tar.gz"),
            DuplicatePolicy::AppendNumber,
            taken(&["d/archive.tar.gz"]),
        );
        assert_eq!(r, Resolution::Use(PathBuf::from("d/archive.tar_1.gz")));
    }

    #[test]
    fn skip_and_replace() {
        let busy = taken(&["d/a.txt"]);
        assert_eq!(resolve(Path::new("d/a.txt"), DuplicatePolicy::Skip, &busy), Resolution::Skip);
        assert_eq!(
            resolve(Path::new("d/a.txt"), DuplicatePolicy::Replace, &busy),
            Resolution::Use(PathBuf::from("d/a.txt"))
        );
    }

    #[test]
    fn long_names_stay_within_limit() {
        let long = "x".repeat(300);
        let proposed = PathBuf::from(format!("d/{long}.txt"));
        let Resolution::Use(p) = resolve(&proposed, DuplicatePolicy::AppendNumber, |_: &Path| false) else {
            panic!("expected a path");
        };
        let name = p.file_name().unwrap().to_str().unwrap();
        assert!(name.len() <= MAX_FILENAME_LEN);
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn policy_parses_aliases() {
        assert_eq!("append".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::AppendNumber);
        assert_eq!("SKIP".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Skip);
        assert!("bogus".parse::<DuplicatePolicy>().is_err());
    }
}
