//! Command tree model, schema registry and validation for UIDL documents.
//!
//! This crate holds everything downstream of parsing:
//!
//! - [`CommandTree`] / [`CommandNode`]: the canonical, ordered tree of named
//!   commands with literal [`Value`] attributes.
//! - [`canonicalize`]: folds the flat command lists produced by a parser
//!   into a tree, reporting duplicate names and reserved-key collisions.
//! - [`Checker`] and [`ValueRule`]: pure attribute checkers with
//!   integral-float coercion.
//! - [`Schema`] and [`SchemaRegistry`]: attribute contracts keyed by
//!   `(keyword, type)`, registered once and then frozen.
//! - [`Validator`]: strict or lenient validation producing one complete
//!   report per run.
//! - [`builtin`] and [`SchemaCatalog`]: built-in schema families and YAML
//!   catalogs for additional ones.
//!
//! # Example
//!
//! ```
//! use uidl_core::*;
//!
//! let mut registry = SchemaRegistry::new();
//! builtin::register_all(&mut registry).unwrap();
//! registry.freeze();
//!
//! let mut tree = CommandTree::new();
//! tree.insert(
//!     "info1",
//!     CommandNode::new("dialog")
//!         .with_kind("info")
//!         .with_attribute("message", Value::from("Hi")),
//! )
//! .unwrap();
//!
//! let report = Validator::new(&registry, ValidationMode::Strict).validate(&tree);
//! assert!(report.is_ok());
//! ```

pub mod builtin;
mod canonical;
mod catalog;
mod check;
mod registry;
mod schema;
mod types;
mod validate;

pub use builtin::BuiltinError;
pub use canonical::{RawAttribute, RawCommand, StructureError, canonicalize};
pub use catalog::{
    CatalogAttribute, CatalogEntry, CatalogError, SUPPORTED_CATALOG_VERSIONS, SchemaCatalog,
};
pub use check::{
    CheckError, CheckFn, Checker, FloatRule, IntegerRule, ListRule, StringRule, ValueRule,
};
pub use registry::{RegistryError, SchemaKey, SchemaRegistry};
pub use schema::{AttributeSpec, ChildBounds, Schema, SchemaBuilder, SchemaError};
pub use types::*;
pub use validate::{
    Validated, ValidationError, ValidationErrors, ValidationMode, ValidationReport,
    ValidationWarning, Validator, validate,
};
