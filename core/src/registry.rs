//! Append-only store of schemas keyed by `(keyword, type)`.
//!
//! The registry is an ordinary value owned by whoever composes the
//! application. Feature modules register their schemas during startup, the
//! owner calls [`SchemaRegistry::freeze`], and from then on the registry is
//! only read. Validation borrows it immutably, so the write-then-read
//! lifecycle is checked by the borrow checker; a frozen registry can be
//! shared across threads by reference.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::schema::Schema;

/// Registry lookup key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaKey {
    pub keyword: String,
    /// Variant selected by the `type` attribute; empty for the default.
    pub kind: String,
}

impl SchemaKey {
    pub fn new(keyword: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            f.write_str(&self.keyword)
        } else {
            write!(f, "{}/{}", self.keyword, self.kind)
        }
    }
}

/// Registration failures. These are startup configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The pair is already registered.
    #[error("schema '{0}' is already registered")]
    Duplicate(SchemaKey),
    /// Registration was attempted after [`SchemaRegistry::freeze`].
    #[error("cannot register '{0}': registry is frozen")]
    Frozen(SchemaKey),
    #[error("schema keyword must not be empty")]
    EmptyKeyword,
}

/// Mapping from `(keyword, type)` to [`Schema`].
///
/// # Examples
///
/// ```
/// use uidl_core::{RegistryError, Schema, SchemaRegistry, StringRule};
///
/// let mut registry = SchemaRegistry::new();
/// let schema = Schema::builder()
///     .required("message", StringRule::new().min_len(1))
///     .build()
///     .unwrap();
///
/// registry.register("dialog", "info", schema.clone()).unwrap();
/// assert!(matches!(
///     registry.register("dialog", "info", schema.clone()),
///     Err(RegistryError::Duplicate(_))
/// ));
///
/// registry.freeze();
/// assert!(registry.lookup("dialog", "info").is_some());
/// assert!(matches!(
///     registry.register("dialog", "warning", schema),
///     Err(RegistryError::Frozen(_))
/// ));
/// ```
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<SchemaKey, Schema>,
    frozen: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema for `(keyword, kind)`.
    ///
    /// # Errors
    ///
    /// Fails if the registry is frozen, the keyword is empty, or the pair
    /// is already taken. The existing entry is never replaced.
    pub fn register(
        &mut self,
        keyword: &str,
        kind: &str,
        schema: Schema,
    ) -> Result<(), RegistryError> {
        let key = SchemaKey::new(keyword, kind);
        if self.frozen {
            return Err(RegistryError::Frozen(key));
        }
        if keyword.is_empty() {
            return Err(RegistryError::EmptyKeyword);
        }
        if self.schemas.contains_key(&key) {
            return Err(RegistryError::Duplicate(key));
        }

        debug!(
            schema = %key,
            attributes = schema.attributes().len(),
            "registered schema"
        );
        self.schemas.insert(key, schema);
        Ok(())
    }

    /// Ends the registration phase; later [`register`](Self::register)
    /// calls fail with [`RegistryError::Frozen`].
    pub fn freeze(&mut self) {
        if !self.frozen {
            info!(schemas = self.schemas.len(), "schema registry frozen");
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn lookup(&self, keyword: &str, kind: &str) -> Option<&Schema> {
        self.schemas.get(&SchemaKey::new(keyword, kind))
    }

    /// Iterates schemas ordered by keyword, then type.
    pub fn iter(&self) -> impl Iterator<Item = (&SchemaKey, &Schema)> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
