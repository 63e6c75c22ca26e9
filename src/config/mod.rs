//! Settings module.
//! Provides settings types, default paths, XML loading, and root validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, default_journal_path, default_log_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel};
pub use validate::{inspect_roots, validate_roots};
pub use xml::{LoadResult, create_template_config, load_config_from_xml_path, load_or_init};

/// Environment variable that points at an explicit settings file.
pub const CONFIG_ENV: &str = "FILESORT_CONFIG";
