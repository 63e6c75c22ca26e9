//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Global flags (`--log-level`, `--debug`, `--json`) are accepted before or after the subcommand.
//! - --debug is a shorthand for --log-level debug.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueHint};
use std::path::{Path, PathBuf};

use crate::config::types::{Config, LogLevel};
use crate::planner::DuplicatePolicy;

/// Sort files into category/extension folders.
/// CLI flags override settings (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Sort files into category/extension folders, with dry-run, pause/cancel and undo"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(long, global = true, help = "Enable debug logging (shorthand for --log-level debug)")]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, value_name = "LEVEL", help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<LogLevel>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, global = true, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print where filesort will look for its settings file (or FILESORT_CONFIG if set), then exit.
    #[arg(long, help = "Print the settings file location used by filesort and exit")]
    pub print_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sort SOURCE into DEST/<category>/<extension>/.
    Classify(ClassifyArgs),

    /// Move every file of the last run back where it came from.
    Undo {
        /// Do not ask for confirmation.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Start the graphical interface (not part of this build).
    Gui,

    /// Manage classification rules.
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ClassifyArgs {
    /// Directory to sort (searched recursively).
    #[arg(short = 's', long = "source", value_name = "SOURCE", value_hint = ValueHint::DirPath)]
    pub source: PathBuf,

    /// Root of the sorted tree; created if missing.
    #[arg(short = 'd', long = "dest", value_name = "DEST", value_hint = ValueHint::DirPath)]
    pub destination: PathBuf,

    /// What to do when a destination name is taken: skip, replace, append_number.
    #[arg(long, value_name = "POLICY")]
    pub duplicates: Option<DuplicatePolicy>,

    /// Show the plan, move nothing.
    #[arg(long, help = "Show what would be done, but do not modify files/directories")]
    pub dry_run: bool,

    /// Mapping document (JSON) to use instead of the configured one.
    #[arg(long = "config", value_name = "MAPPING", value_hint = ValueHint::FilePath)]
    pub mapping: Option<PathBuf>,

    /// Do not ask for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl ClassifyArgs {
    pub fn source(&self) -> PathBuf {
        sanitize_path(&self.source)
    }

    pub fn destination(&self) -> PathBuf {
        sanitize_path(&self.destination)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum RulesCommand {
    /// Merge rules from a CSV file (extension,category,description).
    Import {
        #[arg(value_name = "CSV", value_hint = ValueHint::FilePath)]
        csv: PathBuf,

        /// Mapping document to update instead of the configured one.
        #[arg(long = "config", value_name = "MAPPING", value_hint = ValueHint::FilePath)]
        mapping: Option<PathBuf>,
    },
}

/// Trim quotes left behind by shells (PowerShell/CMD quoting mistakes) and one
/// trailing separator.
pub fn sanitize_path(p: &Path) -> PathBuf {
    let raw = p.to_string_lossy();
    let trimmed = raw.trim();
    let mut inner = trimmed.trim_matches(|c| c == '\'' || c == '"').to_string();
    if inner.len() > 1 && (inner.ends_with('\\') || inner.ends_with('/')) {
        inner.pop();
    }
    PathBuf::from(inner)
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use settings).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.clone()
    }

    /// Apply CLI overrides to loaded settings (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(Command::Classify(c)) = &self.command {
            if let Some(policy) = c.duplicates {
                cfg.duplicates = policy;
            }
            if let Some(mapping) = &c.mapping {
                cfg.mapping_file = Some(sanitize_path(mapping));
            }
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
