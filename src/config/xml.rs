//! XML settings support.
//! - Loads settings from config.xml (quick_xml).
//! - Creates a secure template if missing (unless FILESORT_CONFIG is set).
//!
//! Notes:
//! - This module only reads/writes the settings file; directory validation happens elsewhere.
//! - Unknown XML fields are a hard error to surface misconfigurations early.

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::CONFIG_ENV;
use super::paths::{default_config_path, default_journal_path, default_log_path, path_has_symlink_ancestor};
use crate::config::types::{Config, LogLevel};
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};
use crate::planner::DuplicatePolicy;

/// Struct mirroring the XML settings for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    #[serde(rename = "log_level")]
    log_level: Option<String>,
    #[serde(rename = "log_file")]
    log_file: Option<String>,
    #[serde(rename = "mapping_file")]
    mapping_file: Option<String>,
    #[serde(rename = "journal_file")]
    journal_file: Option<String>,
    #[serde(rename = "duplicates")]
    duplicates: Option<String>,
    #[serde(rename = "workers", default, deserialize_with = "de_usize_trimmed_opt")]
    workers: Option<usize>,
    #[serde(rename = "queue_capacity", default, deserialize_with = "de_usize_trimmed_opt")]
    queue_capacity: Option<usize>,
}

// Custom deserializer that trims surrounding whitespace for optional integers
fn de_usize_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<usize>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid number '{s}': {e}"))),
    }
}

fn non_empty_path(s: Option<&str>) -> Option<PathBuf> {
    let trimmed = s?.trim();
    if trimmed.is_empty() { None } else { Some(PathBuf::from(trimmed)) }
}

// Map XmlConfig -> Config
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(s) = parsed.log_level.as_deref() {
        cfg.log_level = s.trim().parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    if let Some(p) = non_empty_path(parsed.log_file.as_deref()) {
        cfg.log_file = Some(p);
    }
    cfg.mapping_file = non_empty_path(parsed.mapping_file.as_deref());
    cfg.journal_file = non_empty_path(parsed.journal_file.as_deref()).unwrap_or_else(default_journal_path);
    if let Some(s) = parsed.duplicates.as_deref() {
        cfg.duplicates = s.trim().parse::<DuplicatePolicy>().map_err(anyhow::Error::msg)?;
    }
    cfg.workers = parsed.workers.unwrap_or(0);
    cfg.queue_capacity = parsed.queue_capacity.unwrap_or(0);

    Ok(cfg)
}

/// Load a Config from a specific XML file path (quick_xml).
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in config xml '{}'", path.display()))
}

/// What `load_or_init` found.
#[derive(Debug)]
pub enum LoadResult {
    /// Settings file existed and parsed.
    Loaded { path: PathBuf, config: Config },
    /// A template was written to the default location; defaults apply for this run.
    CreatedTemplate(PathBuf),
    /// No usable settings location; defaults apply.
    Defaults,
}

/// Resolve the settings file and load it, writing a template on first use.
pub fn load_or_init() -> Result<LoadResult> {
    let explicit = env::var_os(CONFIG_ENV).is_some();
    let Some(path) = default_config_path() else {
        return Ok(LoadResult::Defaults);
    };

    if path.exists() {
        let config = load_config_from_xml_path(&path)?;
        return Ok(LoadResult::Loaded { path, config });
    }
    if explicit {
        bail!("{CONFIG_ENV} points at a missing file: {}", path.display());
    }

    match create_template_config(&path) {
        Ok(()) => Ok(LoadResult::CreatedTemplate(path)),
        Err(e) => {
            eprintln!("Failed to create template config at {}: {}", path.display(), e);
            Ok(LoadResult::Defaults)
        }
    }
}

/// Create default template settings file and parent directory (best-effort permissions).
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!("Refusing to create config: ancestor of {} is a symlink", path.display());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let suggested_log = default_log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "/path/to/filesort.log".into());

    let content = format!(
        "<!--\n  filesort configuration (XML)\n\n  Fields:\n    log_level       -> quiet | normal | info | debug\n    log_file        -> path to log file (optional; stdout/stderr still used)\n    mapping_file    -> extension/category rules (JSON); builtin rules when empty\n    journal_file    -> where the last run is recorded for undo\n    duplicates      -> skip | replace | append_number\n    workers         -> mover threads (0 = automatic)\n    queue_capacity  -> pending moves held in memory (0 = automatic)\n\n  Notes:\n    - CLI flags override XML values.\n-->\n<config>\n  <log_level>normal</log_level>\n  <log_file>{}</log_file>\n  <mapping_file></mapping_file>\n  <journal_file>{}</journal_file>\n  <duplicates>append_number</duplicates>\n  <workers>0</workers>\n  <queue_capacity>0</queue_capacity>\n</config>\n",
        suggested_log,
        default_journal_path().display(),
    );

    write_config_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!("Created template config at {}", path.display());
    Ok(())
}
