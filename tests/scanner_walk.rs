use std::fs;
use tempfile::tempdir;

use filesort::{ClassifyError, scan};

#[test]
fn finds_nested_files_with_sizes_and_extensions() {
    let td = tempdir().unwrap();
    let root = td.path();
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::write(root.join("top.PDF"), b"12345").unwrap();
    fs::write(root.join("a/b/deep.tar.gz"), b"x").unwrap();
    fs::write(root.join("a/README"), b"").unwrap();
    fs::write(root.join("a/.env"), b"K=V").unwrap();

    let mut files: Vec<_> = scan(root).unwrap().collect();
    files.sort_by(|x, y| x.path.cmp(&y.path));

    let by_name = |n: &str| {
        files
            .iter()
            .find(|f| f.path.file_name().unwrap() == n)
            .unwrap_or_else(|| panic!("{n} not scanned"))
            .clone()
    };
    assert_eq!(files.len(), 4);
    assert_eq!(by_name("top.PDF").extension.as_deref(), Some("pdf"));
    assert_eq!(by_name("top.PDF").size_bytes, 5);
    assert_eq!(by_name("deep.tar.gz").extension.as_deref(), Some("gz"));
    assert_eq!(by_name("README").extension, None);
    assert_eq!(by_name(".env").extension, None);
}

#[test]
fn directories_are_not_reported() {
    let td = tempdir().unwrap();
    fs::create_dir_all(td.path().join("empty/nested")).unwrap();
    assert_eq!(scan(td.path()).unwrap().count(), 0);
}

#[test]
fn excluded_subtree_is_pruned() {
    let td = tempdir().unwrap();
    let root = td.path();
    fs::create_dir_all(root.join("sorted/Documents/pdf")).unwrap();
    fs::write(root.join("sorted/Documents/pdf/old.pdf"), b"x").unwrap();
    fs::write(root.join("new.pdf"), b"y").unwrap();

    let files: Vec<_> = scan(root).unwrap().excluding(root.join("sorted")).collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].path.ends_with("new.pdf"));
}

#[test]
fn missing_root_is_not_found() {
    let td = tempdir().unwrap();
    let err = scan(&td.path().join("nope")).err().expect("must fail");
    assert!(matches!(err, ClassifyError::NotFound { role: "source", .. }));
}

#[cfg(unix)]
#[test]
fn symlink_loop_terminates() {
    let td = tempdir().unwrap();
    let root = td.path();
    fs::create_dir_all(root.join("d")).unwrap();
    fs::write(root.join("d/file.txt"), b"x").unwrap();
    std::os::unix::fs::symlink(root, root.join("d/loop")).unwrap();

    let files: Vec<_> = scan(root).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[cfg(unix)]
#[test]
fn aliased_directory_is_listed_once() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    fs::create_dir_all(root.join("real")).unwrap();
    fs::write(root.join("real/report.pdf"), b"pdf").unwrap();
    std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

    let files: Vec<_> = scan(&root).unwrap().collect();
    assert_eq!(files.len(), 1, "{files:?}");
    assert!(files[0].path.ends_with("report.pdf"));
}
