//! Transaction journal for undo.
//!
//! JSON lines: a `run` header followed by one `moved` record per completed
//! move. Every append is flushed and `sync_data`-ed before the mover reports
//! success, so a crash loses at most the record being written. A failed append
//! is cut back off the file, and a reader skips any line it cannot decode, so
//! one bad record never costs the undo of the others. Only the last real run
//! is kept: `begin` truncates, undo deletes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::errors::ClassifyError;
use crate::fs_ops::{OperationLock, try_lock_operation};
use crate::platform::replace_file_atomic;

/// First line of a journal: which run produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalHeader {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub started: DateTime<Utc>,
}

/// One completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn now(original_path: impl Into<PathBuf>, new_path: impl Into<PathBuf>) -> Self {
        Self {
            original_path: original_path.into(),
            new_path: new_path.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Line {
    Run(JournalHeader),
    Moved(TransactionRecord),
}

/// Parsed journal.
#[derive(Debug, Clone, Default)]
pub struct JournalContents {
    pub header: Option<JournalHeader>,
    pub records: Vec<TransactionRecord>,
}

/// Open writer for the current run. Appends are serialized by a mutex.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: Mutex<File>,
    _lock: OperationLock,
}

/// Take the operation lock for the journal at `path`, or report `Busy`.
pub fn lock(path: &Path) -> Result<OperationLock, ClassifyError> {
    try_lock_operation(path)
        .map_err(|e| ClassifyError::journal(path, e))?
        .ok_or_else(|| ClassifyError::Busy(path.to_path_buf()))
}

fn encode(line: &Line) -> io::Result<Vec<u8>> {
    let mut buf = serde_json::to_vec(line).map_err(io::Error::other)?;
    buf.push(b'\n');
    Ok(buf)
}

impl Journal {
    /// Lock, truncate and start a new generation with a `run` header.
    pub fn begin(path: &Path, source_root: &Path, destination_root: &Path) -> Result<Journal, ClassifyError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ClassifyError::journal(path, e))?;
        }
        let lock = lock(path)?;

        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        opts.mode(0o600);
        let mut file = opts.open(path).map_err(|e| ClassifyError::journal(path, e))?;

        let header = Line::Run(JournalHeader {
            source_root: source_root.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
            started: Utc::now(),
        });
        encode(&header)
            .and_then(|bytes| file.write_all(&bytes))
            .and_then(|()| file.sync_data())
            .map_err(|e| ClassifyError::journal(path, e))?;

        info!(path = %path.display(), "Journal started");
        Ok(Journal {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one record. Returns only after `sync_data`.
    pub fn append(&self, record: &TransactionRecord) -> io::Result<()> {
        let bytes = encode(&Line::Moved(record.clone()))?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("journal writer poisoned"))?;
        write_or_rewind(&mut file, |f| {
            f.write_all(&bytes)?;
            f.flush()?;
            f.sync_data()
        })
    }

    /// Read a journal. Lines that do not decode (a torn append) are skipped
    /// with a warning; a non-empty file with no decodable line is an error.
    pub fn read(path: &Path) -> Result<JournalContents, ClassifyError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ClassifyError::NoLog(path.to_path_buf()));
            }
            Err(e) => return Err(ClassifyError::journal(path, e)),
        };

        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<io::Result<_>>()
            .map_err(|e| ClassifyError::journal(path, e))?;

        let mut contents = JournalContents::default();
        let mut first_bad = None;
        let mut decoded = 0usize;
        for (idx, text) in lines.iter().enumerate() {
            if text.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Line>(text) {
                Ok(Line::Run(h)) => contents.header = Some(h),
                Ok(Line::Moved(r)) => contents.records.push(r),
                Err(e) => {
                    warn!(path = %path.display(), line = idx + 1, error = %e, "skipping undecodable journal line");
                    if first_bad.is_none() {
                        first_bad = Some((idx + 1, e));
                    }
                    continue;
                }
            }
            decoded += 1;
        }
        if decoded == 0 {
            if let Some((line, e)) = first_bad {
                return Err(ClassifyError::journal(
                    path,
                    io::Error::new(io::ErrorKind::InvalidData, format!("line {line}: {e}")),
                ));
            }
        }
        debug!(path = %path.display(), records = contents.records.len(), "journal read");
        Ok(contents)
    }

    /// Delete the journal. A missing journal is not an error.
    pub fn clear(path: &Path) -> Result<(), ClassifyError> {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Journal cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClassifyError::journal(path, e)),
        }
    }

    /// Atomically replace the journal with `header` and `records`.
    pub fn rewrite(
        path: &Path,
        header: Option<&JournalHeader>,
        records: &[TransactionRecord],
    ) -> Result<(), ClassifyError> {
        let mut out = Vec::new();
        let lines = header
            .cloned()
            .map(Line::Run)
            .into_iter()
            .chain(records.iter().cloned().map(Line::Moved));
        for line in lines {
            out.extend(encode(&line).map_err(|e| ClassifyError::journal(path, e))?);
        }
        replace_file_atomic(path, &out)
            .map_err(|e| ClassifyError::journal(path, io::Error::other(format!("{e:#}"))))?;
        debug!(path = %path.display(), records = records.len(), "journal rewritten");
        Ok(())
    }
}

/// Run `write` at the current end of `file`. If it fails, the file is cut back
/// to where it was so the next record does not start on a torn line.
fn write_or_rewind(file: &mut File, write: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<()> {
    let start = file.stream_position()?;
    let Err(e) = write(file) else {
        return Ok(());
    };
    if let Err(rewind) = file.set_len(start).and_then(|()| file.seek(SeekFrom::Start(start)).map(drop)) {
        warn!(error = %rewind, "could not cut a failed journal append back off");
    }
    Err(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_append_read() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("j.jsonl");
        let journal = Journal::begin(&path, Path::new("/src"), Path::new("/dst")).unwrap();
        journal.append(&TransactionRecord::now("/src/a", "/dst/A/a")).unwrap();
        journal.append(&TransactionRecord::now("/src/b", "/dst/B/b")).unwrap();
        drop(journal);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(r#"{"type":"run""#));

        let contents = Journal::read(&path).unwrap();
        assert_eq!(contents.header.unwrap().destination_root, PathBuf::from("/dst"));
        assert_eq!(contents.records.len(), 2);
        assert_eq!(contents.records[1].original_path, PathBuf::from("/src/b"));
    }

    #[test]
    fn begin_truncates_previous_generation() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("j.jsonl");
        let j = Journal::begin(&path, Path::new("/s"), Path::new("/d")).unwrap();
        j.append(&TransactionRecord::now("/s/a", "/d/a")).unwrap();
        drop(j);
        drop(Journal::begin(&path, Path::new("/s"), Path::new("/d")).unwrap());
        assert!(Journal::read(&path).unwrap().records.is_empty());
    }

    #[test]
    fn torn_last_line_is_ignored() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("j.jsonl");
        let j = Journal::begin(&path, Path::new("/s"), Path::new("/d")).unwrap();
        j.append(&TransactionRecord::now("/s/a", "/d/a")).unwrap();
        drop(j);
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(br#"{"type":"moved","original_pa"#).unwrap();

        assert_eq!(Journal::read(&path).unwrap().records.len(), 1);
    }

    #[test]
    fn failed_append_is_cut_back_off() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("j.jsonl");
        let j = Journal::begin(&path, Path::new("/s"), Path::new("/d")).unwrap();
        j.append(&TransactionRecord::now("/s/a", "/d/a")).unwrap();
        let before = fs::metadata(&path).unwrap().len();

        {
            let mut file = j.file.lock().unwrap();
            let err = write_or_rewind(&mut file, |f| {
                f.write_all(br#"{"type":"moved","original_pa"#)?;
                Err(io::Error::other("no space left on device"))
            })
            .unwrap_err();
            assert_eq!(err.to_string(), "no space left on device");
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), before);

        j.append(&TransactionRecord::now("/s/b", "/d/b")).unwrap();
        drop(j);
        let contents = Journal::read(&path).unwrap();
        assert_eq!(contents.records.len(), 2);
        assert_eq!(contents.records[1].original_path, PathBuf::from("/s/b"));
    }

    #[test]
    fn torn_line_in_the_middle_is_skipped() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("j.jsonl");
        let j = Journal::begin(&path, Path::new("/s"), Path::new("/d")).unwrap();
        j.append(&TransactionRecord::now("/s/a", "/d/a")).unwrap();
        drop(j);
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"type\":\"moved\",\"original_pa").unwrap();
        for name in ["b", "c"] {
            let line = encode(&Line::Moved(TransactionRecord::now(format!("/s/{name}"), format!("/d/{name}")))).unwrap();
            f.write_all(&line).unwrap();
        }
        drop(f);

        let contents = Journal::read(&path).unwrap();
        assert!(contents.header.is_some());
        let originals: Vec<_> = contents.records.iter().map(|r| r.original_path.clone()).collect();
        assert_eq!(originals, [PathBuf::from("/s/a"), PathBuf::from("/s/c")]);
    }

    #[test]
    fn file_with_nothing_decodable_is_an_error() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("j.jsonl");
        fs::write(&path, "not a journal\nstill not\n").unwrap();
        assert!(matches!(Journal::read(&path), Err(ClassifyError::Journal { .. })));
    }

    #[test]
    fn missing_journal_is_no_log() {
        let td = tempfile::tempdir().unwrap();
        let err = Journal::read(&td.path().join("none.jsonl")).unwrap_err();
        assert!(matches!(err, ClassifyError::NoLog(_)));
    }

    #[test]
    fn second_writer_is_busy() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("j.jsonl");
        let _first = Journal::begin(&path, Path::new("/s"), Path::new("/d")).unwrap();
        let err = Journal::begin(&path, Path::new("/s"), Path::new("/d")).unwrap_err();
        assert!(matches!(err, ClassifyError::Busy(_)));
    }

    #[test]
    fn rewrite_keeps_only_given_records() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("j.jsonl");
        let keep = TransactionRecord::now("/s/a", "/d/a");
        Journal::rewrite(&path, None, std::slice::from_ref(&keep)).unwrap();
        let contents = Journal::read(&path).unwrap();
        assert!(contents.header.is_none());
        assert_eq!(contents.records, vec![keep]);
    }
}
