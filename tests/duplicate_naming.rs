use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use filesort::planner::{Resolution, next_free_name, resolve};
use filesort::DuplicatePolicy;

fn on_disk(p: &Path) -> bool {
    p.exists()
}

#[test]
fn free_name_is_returned_unchanged() {
    let td = tempdir().unwrap();
    let dst = td.path().join("file.txt");
    assert_eq!(next_free_name(&dst, on_disk), dst);
}

#[test]
fn first_collision_gets_suffix_one() {
    let td = tempdir().unwrap();
    fs::write(td.path().join("report.pdf"), b"x").unwrap();
    assert_eq!(
        next_free_name(&td.path().join("report.pdf"), on_disk),
        td.path().join("report_1.pdf")
    );
}

#[test]
fn multiple_collisions_increment_suffix() {
    let td = tempdir().unwrap();
    let dir = td.path();
    for name in ["file.txt", "file_1.txt", "file_2.txt"] {
        fs::write(dir.join(name), b"x").unwrap();
    }
    assert_eq!(next_free_name(&dir.join("file.txt"), on_disk), dir.join("file_3.txt"));
}

#[test]
fn dotfile_takes_suffix_after_name() {
    let td = tempdir().unwrap();
    fs::write(td.path().join(".env"), b"a").unwrap();
    assert_eq!(next_free_name(&td.path().join(".env"), on_disk), td.path().join(".env_1"));
}

#[test]
fn multi_extension_suffix_goes_before_last_extension() {
    let td = tempdir().unwrap();
    fs::write(td.path().join("archive.tar.gz"), b"a").unwrap();
    assert_eq!(
        next_free_name(&td.path().join("archive.tar.gz"), on_disk),
        td.path().join("archive.tar_1.gz")
    );
}

#[test]
fn long_names_are_truncated_to_fit() {
    let td = tempdir().unwrap();
    let stem = "a".repeat(300);
    let wanted = td.path().join(format!("{stem}.txt"));
    let got = next_free_name(&wanted, |_: &Path| false);
    let name = got.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.len() <= 255, "name too long: {}", name.len());
    assert!(name.ends_with(".txt"));
}

#[test]
fn predicate_can_combine_disk_and_claimed_names() {
    let dir = PathBuf::from("/virtual");
    let claimed: HashSet<PathBuf> = [dir.join("a.jpg"), dir.join("a_1.jpg")].into_iter().collect();
    let taken = |p: &Path| claimed.contains(p);
    assert_eq!(
        resolve(&dir.join("a.jpg"), DuplicatePolicy::AppendNumber, taken),
        Resolution::Use(dir.join("a_2.jpg"))
    );
    assert_eq!(resolve(&dir.join("a.jpg"), DuplicatePolicy::Skip, taken), Resolution::Skip);
    assert_eq!(
        resolve(&dir.join("a.jpg"), DuplicatePolicy::Replace, taken),
        Resolution::Use(dir.join("a.jpg"))
    );
}

#[test]
fn policy_names_and_aliases_parse() {
    assert_eq!("skip".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Skip);
    assert_eq!("REPLACE".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Replace);
    assert_eq!("append".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::AppendNumber);
    assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::AppendNumber);
    assert_eq!(DuplicatePolicy::AppendNumber.to_string(), "append_number");
    assert!("keep_both".parse::<DuplicatePolicy>().is_err());
}
