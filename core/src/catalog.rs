//! Schema catalogs loaded from YAML.
//!
//! A catalog declares extra schemas without code, for feature areas that
//! live outside this crate. JSON catalogs are accepted too, since JSON is a
//! subset of YAML.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1"
//! schemas:
//!   - keyword: dialog
//!     type: progress
//!     attributes:
//!       - name: message
//!         required: true
//!         rule: { type: string, min_len: 1 }
//!       - name: percent
//!         rule: { type: integer, min: 0, max: 100 }
//!     children: { max: 1 }
//! ```

use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::check::ValueRule;
use crate::registry::{RegistryError, SchemaKey, SchemaRegistry};
use crate::schema::{ChildBounds, Schema, SchemaError};

/// Catalog format versions this crate reads.
pub const SUPPORTED_CATALOG_VERSIONS: &[&str] = &["1", "1.0"];

/// Errors raised while loading or applying a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported catalog version '{0}'")]
    UnsupportedVersion(String),

    /// An entry does not describe a valid schema.
    #[error("schema '{key}': {source}")]
    Schema {
        key: SchemaKey,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// One attribute declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAttribute {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    /// Accepts any literal when omitted.
    #[serde(default = "any_rule")]
    pub rule: ValueRule,
}

fn any_rule() -> ValueRule {
    ValueRule::Any
}

/// One schema declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub keyword: String,
    /// Schema variant; empty for the keyword's default.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<CatalogAttribute>,
    #[serde(default)]
    pub children: Option<ChildBounds>,
}

impl CatalogEntry {
    pub fn key(&self) -> SchemaKey {
        SchemaKey::new(self.keyword.as_str(), self.kind.as_str())
    }

    /// Compiles the entry into a [`Schema`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Schema`] if a rule or declaration is invalid.
    pub fn to_schema(&self) -> Result<Schema, CatalogError> {
        let mut builder = Schema::builder();
        for attr in &self.attributes {
            builder = if attr.required {
                builder.required(&attr.name, attr.rule.clone())
            } else {
                builder.optional(&attr.name, attr.rule.clone())
            };
        }
        if let Some(bounds) = self.children {
            builder = builder.children(bounds);
        }
        builder.build().map_err(|source| CatalogError::Schema {
            key: self.key(),
            source,
        })
    }
}

/// A set of schema declarations.
///
/// # Examples
///
/// ```
/// use uidl_core::{SchemaCatalog, SchemaRegistry};
///
/// let catalog = SchemaCatalog::from_yaml(r#"
/// version: "1"
/// schemas:
///   - keyword: dialog
///     type: progress
///     attributes:
///       - name: percent
///         required: true
///         rule: { type: integer, min: 0, max: 100 }
/// "#).unwrap();
///
/// let mut registry = SchemaRegistry::new();
/// assert_eq!(catalog.register_into(&mut registry).unwrap(), 1);
/// assert!(registry.lookup("dialog", "progress").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// Catalog format version (`"1"` or `"1.0"`).
    pub version: String,
    #[serde(default)]
    pub schemas: Vec<CatalogEntry>,
}

impl SchemaCatalog {
    /// Loads a catalog from a YAML (or JSON) file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the file cannot be read, or
    /// [`CatalogError::Yaml`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let catalog = serde_yaml::from_reader(reader)?;
        Ok(catalog)
    }

    /// Parses a catalog from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Compiles and registers every entry, returning how many were added.
    ///
    /// Entries are registered in order; on the first failure the error is
    /// returned and later entries are skipped.
    ///
    /// # Errors
    ///
    /// Fails on an unsupported version, an invalid entry, or a registry
    /// conflict (duplicate pair, frozen registry).
    pub fn register_into(&self, registry: &mut SchemaRegistry) -> Result<usize, CatalogError> {
        if !SUPPORTED_CATALOG_VERSIONS.contains(&self.version.as_str()) {
            return Err(CatalogError::UnsupportedVersion(self.version.clone()));
        }
        for entry in &self.schemas {
            let schema = entry.to_schema()?;
            registry.register(&entry.keyword, &entry.kind, schema)?;
        }
        debug!(schemas = self.schemas.len(), "registered catalog");
        Ok(self.schemas.len())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::check::IntegerRule;
    use tempfile::TempDir;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
schemas:
  - keyword: window
    type: tool
    attributes:
      - name: title
        required: true
        rule: { type: string }
      - name: opacity
        rule: { type: float, min: 0.0, max: 1.0 }
      - name: tag
    children: { min: 1, max: 3 }
  - keyword: status
"#
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = SchemaCatalog::from_yaml(sample_yaml()).unwrap();
        assert_eq!(catalog.schemas.len(), 2);

        let tool = &catalog.schemas[0];
        assert_eq!(tool.key().to_string(), "window/tool");
        assert_eq!(tool.children, Some(ChildBounds::new(1, Some(3))));
        assert_eq!(tool.attributes[2].rule, ValueRule::Any);
        assert!(!tool.attributes[1].required);

        let status = &catalog.schemas[1];
        assert_eq!(status.kind, "");
        assert!(status.attributes.is_empty());
    }

    #[test]
    fn test_load_from_file_and_register() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();

        let catalog = SchemaCatalog::load(&path).unwrap();
        let mut registry = SchemaRegistry::new();
        assert_eq!(catalog.register_into(&mut registry).unwrap(), 2);

        let schema = registry.lookup("window", "tool").unwrap();
        assert!(schema.attribute("title").unwrap().required);
        assert_eq!(schema.child_bounds(), Some(ChildBounds::new(1, Some(3))));
        assert!(registry.lookup("status", "").is_some());
    }

    #[test]
    fn test_load_json_catalog() {
        let json = r#"{"version": "1", "schemas": [{"keyword": "meter", "attributes": [
            {"name": "value", "required": true, "rule": {"type": "integer", "min": 0}}
        ]}]}"#;
        let catalog = SchemaCatalog::from_yaml(json).unwrap();
        assert_eq!(
            catalog.schemas[0].attributes[0].rule,
            ValueRule::from(IntegerRule {
                min: Some(0),
                max: None
            })
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = SchemaCatalog::load(dir.path().join("absent.yml"));
        assert!(matches!(result, Err(CatalogError::Io(_))));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let catalog = SchemaCatalog::from_yaml("version: \"2\"\nschemas: []\n").unwrap();
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            catalog.register_into(&mut registry),
            Err(CatalogError::UnsupportedVersion(v)) if v == "2"
        ));
    }

    #[test]
    fn test_invalid_entry_names_its_key() {
        let catalog = SchemaCatalog::from_yaml(
            r#"
version: "1"
schemas:
  - keyword: dialog
    type: bad
    attributes:
      - name: children
"#,
        )
        .unwrap();
        let err = catalog.register_into(&mut SchemaRegistry::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "schema 'dialog/bad': attribute 'children' is a reserved key and cannot be declared"
        );
    }

    #[test]
    fn test_conflict_with_existing_registration() {
        let catalog = SchemaCatalog::from_yaml(sample_yaml()).unwrap();
        let mut registry = SchemaRegistry::new();
        catalog.register_into(&mut registry).unwrap();
        assert!(matches!(
            catalog.register_into(&mut registry),
            Err(CatalogError::Registry(RegistryError::Duplicate(_)))
        ));
    }
}
