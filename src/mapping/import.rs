//! Bulk rule import from CSV.
//!
//! Reads rows of `extension,category,description` and merges them into an
//! existing mapping document. Each row lands in exactly one bucket of the
//! returned [`ImportReport`]. The document is backed up (`*.bak`) before it
//! is replaced, and the merged result must still validate as a [`Mapping`].

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{Mapping, normalize_extension, parse_document, valid_category_name, valid_extension};
use crate::platform::replace_file_atomic;

#[derive(Debug, Deserialize)]
struct ImportRow {
    extension: Option<String>,
    category: Option<String>,
    description: Option<String>,
}

/// Outcome of an import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Extensions that were new to the document.
    pub added: Vec<String>,
    /// Extensions reassigned to another category: (extension, old category, new category).
    pub updated: Vec<(String, String, String)>,
    /// Extensions already present in the requested category.
    pub duplicates: Vec<String>,
    /// Rows that could not be used: (CSV line number, reason).
    pub errors: Vec<(usize, String)>,
}

impl ImportReport {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty()
    }
}

/// Backup path written before the document is replaced.
pub fn backup_path(mapping_path: &Path) -> PathBuf {
    let mut name = mapping_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "file_types.json".into());
    name.push(".bak");
    mapping_path.with_file_name(name)
}

/// Merge the rules in `csv_path` into the mapping document at `mapping_path`.
pub fn import_rules(mapping_path: &Path, csv_path: &Path) -> Result<ImportReport> {
    let text = fs::read_to_string(mapping_path)
        .with_context(|| format!("read mapping '{}'", mapping_path.display()))?;
    let mut doc = parse_document(&text)
        .map_err(|e| anyhow!("parse mapping '{}': {e}", mapping_path.display()))?;
    // Refuse to merge into a document that is already ambiguous.
    Mapping::from_object(&doc, mapping_path)?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("open csv '{}'", csv_path.display()))?;

    let mut report = ImportReport::default();
    for (idx, row) in reader.deserialize::<ImportRow>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                report.errors.push((line, format!("unreadable row: {e}")));
                continue;
            }
        };
        if let Err(reason) = merge_row(&mut doc, row, &mut report) {
            report.errors.push((line, reason));
        }
    }

    if !report.changed() {
        info!(csv = %csv_path.display(), "import made no changes");
        return Ok(report);
    }

    // Validate before touching the file.
    Mapping::from_object(&doc, mapping_path)?;
    let rendered = serde_json::to_string_pretty(&Value::Object(doc))?;

    let backup = backup_path(mapping_path);
    fs::copy(mapping_path, &backup)
        .with_context(|| format!("back up mapping to '{}'", backup.display()))?;
    info!(backup = %backup.display(), "mapping backup created");

    if let Err(e) = replace_file_atomic(mapping_path, rendered.as_bytes()) {
        warn!(error = %e, "mapping write failed; restoring backup");
        fs::copy(&backup, mapping_path)
            .with_context(|| format!("restore mapping from '{}'", backup.display()))?;
        return Err(e).with_context(|| format!("write mapping '{}'", mapping_path.display()));
    }

    info!(
        added = report.added.len(),
        updated = report.updated.len(),
        duplicates = report.duplicates.len(),
        errors = report.errors.len(),
        "rules imported"
    );
    Ok(report)
}

fn merge_row(doc: &mut Map<String, Value>, row: ImportRow, report: &mut ImportReport) -> Result<(), String> {
    let raw_ext = row.extension.unwrap_or_default();
    let ext = normalize_extension(&raw_ext);
    if !valid_extension(&ext) {
        return Err(format!("invalid extension '{raw_ext}'"));
    }
    let category = row.category.unwrap_or_default();
    if category.starts_with('_') || !valid_category_name(&category) {
        return Err(format!("invalid category '{category}'"));
    }
    let description = row.description.unwrap_or_default();

    // Find every existing key that normalizes to the same extension.
    let mut previous: Vec<(String, String)> = Vec::new();
    for (cat, rules) in doc.iter().filter(|(k, _)| !k.starts_with('_')) {
        if let Value::Object(rules) = rules {
            for key in rules.keys() {
                if normalize_extension(key) == ext {
                    previous.push((cat.clone(), key.clone()));
                }
            }
        }
    }

    if previous.iter().any(|(cat, _)| *cat == category) {
        report.duplicates.push(format!(".{ext}"));
        return Ok(());
    }

    for (cat, key) in &previous {
        if let Some(Value::Object(rules)) = doc.get_mut(cat) {
            rules.remove(key);
        }
    }

    let target = doc
        .entry(category.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(rules) = target else {
        return Err(format!("category '{category}' is not an object in the mapping"));
    };
    rules.insert(format!(".{ext}"), Value::String(description));

    match previous.into_iter().next() {
        Some((old, _)) => report.updated.push((format!(".{ext}"), old, category)),
        None => report.added.push(format!(".{ext}")),
    }
    Ok(())
}
