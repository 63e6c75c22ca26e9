//! Extension → category mapping.
//!
//! The mapping document is a JSON object of `category name → object of
//! extension → description`. Descriptions are informational only. Keys that
//! start with `_` are reserved for metadata (`_metadata.version`).
//!
//! Validation is strict: an extension claimed by two categories is a hard
//! error, never "first definition wins".

pub mod import;

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::ClassifyError;

/// Document versions this build understands.
pub const SUPPORTED_VERSIONS: &[&str] = &["2.0"];

/// Directory name used for files no rule matches.
pub const UNCATEGORIZED_DIR: &str = "Uncategorized";

const BUILTIN_MAPPING: &str = include_str!("../../assets/file_types.json");

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Named(String),
    Uncategorized,
}

impl Category {
    /// Directory name for this category under the destination root.
    pub fn dir_name(&self) -> &str {
        match self {
            Category::Named(name) => name,
            Category::Uncategorized => UNCATEGORIZED_DIR,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Validated, immutable lookup table.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    by_extension: HashMap<String, Category>,
    categories: Vec<String>,
}

/// Lower-case and strip leading dots: ".PDF" -> "pdf".
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// A category is used verbatim as a directory name, so it must be a single
/// normal path component.
pub(crate) fn valid_category_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed == name
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

pub(crate) fn valid_extension(ext: &str) -> bool {
    !ext.is_empty() && !ext.contains(['/', '\\', '\0'])
}

impl Mapping {
    /// Read and validate a mapping document from disk.
    pub fn load(path: &Path) -> Result<Self, ClassifyError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ClassifyError::config(path, format!("cannot read mapping file: {e}")))?;
        let mapping = Self::from_json_str(&text, path)?;
        info!(
            path = %path.display(),
            rules = mapping.len(),
            categories = mapping.categories.len(),
            "Loaded classification rules"
        );
        Ok(mapping)
    }

    /// The default document shipped with the binary.
    pub fn builtin() -> Result<Self, ClassifyError> {
        Self::from_json_str(BUILTIN_MAPPING, Path::new("<builtin>"))
    }

    /// Parse and validate a mapping document. `origin` is only used in errors.
    pub fn from_json_str(text: &str, origin: &Path) -> Result<Self, ClassifyError> {
        let root = parse_document(text).map_err(|e| ClassifyError::config(origin, e))?;
        Self::from_object(&root, origin)
    }

    pub(crate) fn from_object(root: &Map<String, Value>, origin: &Path) -> Result<Self, ClassifyError> {
        check_metadata(root, origin)?;

        let mut by_extension: HashMap<String, Category> = HashMap::new();
        let mut categories = Vec::new();

        for (category, rules) in root.iter().filter(|(k, _)| !k.starts_with('_')) {
            if !valid_category_name(category) {
                return Err(ClassifyError::config(
                    origin,
                    format!("category name '{category}' cannot be used as a directory name"),
                ));
            }
            let Value::Object(rules) = rules else {
                return Err(ClassifyError::config(
                    origin,
                    format!("category '{category}' must map to an object of extensions"),
                ));
            };

            for ext in rules.keys() {
                let norm = normalize_extension(ext);
                if !valid_extension(&norm) {
                    return Err(ClassifyError::config(
                        origin,
                        format!("invalid extension '{ext}' in category '{category}'"),
                    ));
                }
                match by_extension.get(&norm) {
                    Some(Category::Named(existing)) if existing != category => {
                        return Err(ClassifyError::config(
                            origin,
                            format!(
                                "extension '.{norm}' is mapped to both '{existing}' and '{category}'"
                            ),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        by_extension.insert(norm, Category::Named(category.clone()));
                    }
                }
            }
            categories.push(category.clone());
        }

        debug!(origin = %origin.display(), rules = by_extension.len(), "mapping validated");
        Ok(Self {
            by_extension,
            categories,
        })
    }

    /// Total lookup: unknown, empty or missing extensions are `Uncategorized`.
    pub fn category_of(&self, extension: &str) -> Category {
        let norm = normalize_extension(extension);
        if norm.is_empty() {
            return Category::Uncategorized;
        }
        self.by_extension
            .get(&norm)
            .cloned()
            .unwrap_or(Category::Uncategorized)
    }

    /// Category names in document order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Number of extension rules.
    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

fn check_metadata(root: &Map<String, Value>, origin: &Path) -> Result<(), ClassifyError> {
    let Some(meta) = root.get("_metadata") else {
        return Ok(());
    };
    let version = meta.get("version").and_then(Value::as_str);
    match version {
        None => Ok(()),
        Some(v) if SUPPORTED_VERSIONS.contains(&v) => Ok(()),
        Some(v) => Err(ClassifyError::config(
            origin,
            format!(
                "unsupported mapping version '{v}'; supported: {}",
                SUPPORTED_VERSIONS.join(", ")
            ),
        )),
    }
}

/// Top-level object of a mapping document. Unlike a plain `Map`, a category
/// key that appears twice is rejected instead of silently keeping the last block.
struct Document(Map<String, Value>);

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DocumentVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = Document;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object of category -> extensions")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Document, A::Error> {
        let mut root = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            if root.contains_key(&key) {
                return Err(de::Error::custom(format_args!("key '{key}' appears more than once")));
            }
            let value: Value = access.next_value()?;
            root.insert(key, value);
        }
        Ok(Document(root))
    }
}

/// Parse the top level of a mapping document, keeping keys in document order.
pub(crate) fn parse_document(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Document>(text) {
        Ok(Document(root)) => Ok(root),
        Err(e) if e.is_syntax() || e.is_eof() => Err(format!("not valid JSON: {e}")),
        Err(e) => Err(e.to_string()),
    }
}

/// Resolve which mapping to use: explicit path, settings path, or the builtin.
pub fn load_effective(explicit: Option<&Path>, from_settings: Option<&PathBuf>) -> Result<Mapping, ClassifyError> {
    match explicit.or(from_settings.map(PathBuf::as_path)) {
        Some(path) => Mapping::load(path),
        None => {
            debug!("no mapping file configured; using builtin rules");
            Mapping::builtin()
        }
    }
}
