use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use filesort::planner::NO_EXTENSION_DIR;
use filesort::{Category, DuplicatePolicy, Mapping, Planner, scan};

fn mapping() -> Mapping {
    Mapping::from_json_str(
        r#"{"Documents": {".pdf": "", ".txt": ""}, "Images": {".jpg": ""}}"#,
        Path::new("test.json"),
    )
    .unwrap()
}

/// Source tree with the given files, plus an empty destination root.
fn fixture(files: &[&str]) -> (tempfile::TempDir, PathBuf, PathBuf) {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let src = base.join("src");
    let dst = base.join("dst");
    fs::create_dir_all(&dst).unwrap();
    for f in files {
        let p = src.join(f);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, f.as_bytes()).unwrap();
    }
    (td, src, dst)
}

#[test]
fn layout_is_category_then_extension() {
    let (_td, src, dst) = fixture(&["report.pdf", "photo.jpg", "notes.txt", "Makefile", "clip.mkv"]);
    let m = mapping();
    let plan = Planner::new(&m, &dst, DuplicatePolicy::AppendNumber).plan(scan(&src).unwrap());

    let dests: HashSet<PathBuf> = plan.entries().iter().map(|e| e.destination.clone()).collect();
    assert!(dests.contains(&dst.join("Documents/pdf/report.pdf")));
    assert!(dests.contains(&dst.join("Images/jpg/photo.jpg")));
    assert!(dests.contains(&dst.join("Documents/txt/notes.txt")));
    assert!(dests.contains(&dst.join("Uncategorized").join(NO_EXTENSION_DIR).join("Makefile")));
    assert!(dests.contains(&dst.join("Uncategorized/mkv/clip.mkv")));

    assert_eq!(plan.per_category().get("Documents"), Some(&2));
    assert_eq!(plan.per_category().get("Images"), Some(&1));
    assert_eq!(plan.per_category().get("Uncategorized"), Some(&2));
}

#[test]
fn append_number_resolves_against_disk_and_plan() {
    let (_td, src, dst) = fixture(&["report.pdf", "sub/report.pdf", "other/report.pdf"]);
    fs::create_dir_all(dst.join("Documents/pdf")).unwrap();
    fs::write(dst.join("Documents/pdf/report.pdf"), b"existing").unwrap();

    let m = mapping();
    let plan = Planner::new(&m, &dst, DuplicatePolicy::AppendNumber).plan(scan(&src).unwrap());
    assert_eq!(plan.len(), 3);

    let dests: HashSet<PathBuf> = plan.entries().iter().map(|e| e.destination.clone()).collect();
    assert_eq!(dests.len(), 3, "destinations must be pairwise distinct");
    for d in &dests {
        assert_ne!(d, &dst.join("Documents/pdf/report.pdf"));
        assert!(!d.exists());
    }
    assert!(dests.contains(&dst.join("Documents/pdf/report_1.pdf")));
}

#[test]
fn skip_never_targets_an_existing_path() {
    let (_td, src, dst) = fixture(&["report.pdf", "photo.jpg"]);
    fs::create_dir_all(dst.join("Documents/pdf")).unwrap();
    fs::write(dst.join("Documents/pdf/report.pdf"), b"existing").unwrap();

    let m = mapping();
    let plan = Planner::new(&m, &dst, DuplicatePolicy::Skip).plan(scan(&src).unwrap());
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.entries()[0].destination, dst.join("Images/jpg/photo.jpg"));
    assert_eq!(plan.skipped().len(), 1);
    assert_eq!(plan.skipped()[0].source, src.join("report.pdf"));
}

#[test]
fn skip_also_drops_second_claim_in_same_plan() {
    let (_td, src, dst) = fixture(&["a/x.txt", "b/x.txt"]);
    let m = mapping();
    let plan = Planner::new(&m, &dst, DuplicatePolicy::Skip).plan(scan(&src).unwrap());
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.skipped().len(), 1);
}

#[test]
fn replace_marks_overwrite_only_for_first_claim() {
    let (_td, src, dst) = fixture(&["a/x.txt", "b/x.txt"]);
    fs::create_dir_all(dst.join("Documents/txt")).unwrap();
    fs::write(dst.join("Documents/txt/x.txt"), b"existing").unwrap();

    let m = mapping();
    let plan = Planner::new(&m, &dst, DuplicatePolicy::Replace).plan(scan(&src).unwrap());
    assert_eq!(plan.len(), 2);
    let overwriting: Vec<_> = plan.entries().iter().filter(|e| e.overwrite).collect();
    assert_eq!(overwriting.len(), 1);
    assert_eq!(overwriting[0].destination, dst.join("Documents/txt/x.txt"));
    let other = plan.entries().iter().find(|e| !e.overwrite).unwrap();
    assert_eq!(other.destination, dst.join("Documents/txt/x_1.txt"));
}

#[test]
fn proposed_destination_uses_uncategorized_for_unknown() {
    let (_td, src, dst) = fixture(&["data.bin"]);
    let m = mapping();
    let planner = Planner::new(&m, &dst, DuplicatePolicy::AppendNumber);
    let file = scan(&src).unwrap().next().unwrap();
    let (category, dest) = planner.proposed_destination(&file);
    assert_eq!(category, Category::Uncategorized);
    assert_eq!(dest, dst.join("Uncategorized/bin/data.bin"));
}

#[test]
fn file_already_in_place_is_left_alone() {
    let (_td, _src, dst) = fixture(&[]);
    let placed = dst.join("Documents/pdf/report.pdf");
    fs::create_dir_all(placed.parent().unwrap()).unwrap();
    fs::write(&placed, b"x").unwrap();

    let m = mapping();
    let plan = Planner::new(&m, &dst, DuplicatePolicy::AppendNumber).plan(scan(&dst).unwrap());
    assert!(plan.is_empty());
    assert_eq!(plan.skipped().len(), 1);
    assert_eq!(plan.skipped()[0].reason, "already in place");
}
