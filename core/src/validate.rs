//! Schema validation of command trees.
//!
//! Every command is checked against the schema registered for its
//! `(keyword, type)` pair. The walk is depth-first and pre-order; within a
//! command, declared attributes are checked in schema declaration order,
//! then undeclared attributes in source order, then child-count bounds.
//! Nothing is reported mid-walk: one run produces one complete
//! [`ValidationReport`].
//!
//! # Examples
//!
//! ```
//! use uidl_core::*;
//!
//! let mut registry = SchemaRegistry::new();
//! registry
//!     .register(
//!         "dialog",
//!         "info",
//!         Schema::builder()
//!             .required("message", StringRule::new().min_len(1))
//!             .optional("title", StringRule::new())
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//! registry.freeze();
//!
//! let mut tree = CommandTree::new();
//! tree.insert(
//!     "info1",
//!     CommandNode::new("dialog")
//!         .with_kind("info")
//!         .with_attribute("message", Value::from("")),
//! )
//! .unwrap();
//!
//! let report = validate(&registry, &tree, ValidationMode::Strict);
//! assert_eq!(report.errors.len(), 1);
//! assert_eq!(report.errors[0].path(), "info1");
//! ```

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::check::CheckError;
use crate::registry::{SchemaKey, SchemaRegistry};
use crate::schema::{ChildBounds, Schema};
use crate::types::{CommandNode, CommandTree, Position, STRUCTURAL_KEYS, child_path};

/// How undeclared attributes are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Undeclared attributes are errors.
    Strict,
    /// Undeclared attributes are warnings.
    #[default]
    Lenient,
}

impl ValidationMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ValidationMode::Strict
        } else {
            ValidationMode::Lenient
        }
    }
}

/// A schema violation found on one command.
///
/// `path` is the dotted name of the command, e.g. `confirm1.dismiss`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// No schema is registered for the command's `(keyword, type)`.
    #[error("command '{path}': unknown schema '{schema}'")]
    UnknownSchema {
        path: String,
        schema: SchemaKey,
        position: Option<Position>,
    },
    /// A required attribute is absent.
    #[error("command '{path}': missing required attribute '{attribute}'")]
    MissingAttribute {
        path: String,
        attribute: String,
        position: Option<Position>,
    },
    /// An attribute's checker rejected its value.
    #[error("command '{path}': attribute '{attribute}' {reason}")]
    InvalidAttribute {
        path: String,
        attribute: String,
        reason: CheckError,
        position: Option<Position>,
    },
    /// An undeclared attribute in strict mode.
    #[error("command '{path}': unexpected attribute '{attribute}'")]
    ExtraAttribute {
        path: String,
        attribute: String,
        position: Option<Position>,
    },
    /// The number of children is outside the declared bounds.
    #[error("command '{path}': expected {bounds} children, found {count}")]
    ChildCount {
        path: String,
        bounds: ChildBounds,
        count: usize,
        position: Option<Position>,
    },
}

impl ValidationError {
    pub fn path(&self) -> &str {
        match self {
            ValidationError::UnknownSchema { path, .. }
            | ValidationError::MissingAttribute { path, .. }
            | ValidationError::InvalidAttribute { path, .. }
            | ValidationError::ExtraAttribute { path, .. }
            | ValidationError::ChildCount { path, .. } => path,
        }
    }

    /// Attribute the error refers to, if any.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            ValidationError::MissingAttribute { attribute, .. }
            | ValidationError::InvalidAttribute { attribute, .. }
            | ValidationError::ExtraAttribute { attribute, .. } => Some(attribute),
            ValidationError::UnknownSchema { .. } | ValidationError::ChildCount { .. } => None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            ValidationError::UnknownSchema { position, .. }
            | ValidationError::MissingAttribute { position, .. }
            | ValidationError::InvalidAttribute { position, .. }
            | ValidationError::ExtraAttribute { position, .. }
            | ValidationError::ChildCount { position, .. } => *position,
        }
    }
}

/// An undeclared attribute accepted in lenient mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub path: String,
    pub attribute: String,
    pub position: Option<Position>,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command '{}': undeclared attribute '{}'",
            self.path, self.attribute
        )
    }
}

/// Every error of one validation run, in walk order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Outcome of one validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    /// Lenient-mode findings; never affect [`is_ok`](Self::is_ok).
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts the report into the warnings on success, or the aggregated
    /// errors.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

/// A tree that passed validation, with coerced attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub tree: CommandTree,
    pub warnings: Vec<ValidationWarning>,
}

/// Validates trees against a registry.
///
/// Holds only a shared borrow of the registry, so any number of validators
/// may run concurrently over one frozen registry.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    registry: &'r SchemaRegistry,
    mode: ValidationMode,
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r SchemaRegistry, mode: ValidationMode) -> Self {
        Self { registry, mode }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Validates a tree, collecting every error and warning.
    pub fn validate(&self, tree: &CommandTree) -> ValidationReport {
        let mut report = ValidationReport::default();
        self.walk(tree, None, &mut report);
        debug!(
            commands = tree.total_commands(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "validated command tree"
        );
        report
    }

    /// Validates an owned tree and, on success, replaces each declared
    /// attribute with the value its checker returned (e.g. an integral
    /// float converted to an integer).
    ///
    /// # Errors
    ///
    /// Returns every validation error if the tree is invalid.
    pub fn validate_owned(&self, mut tree: CommandTree) -> Result<Validated, ValidationErrors> {
        let warnings = self.validate(&tree).into_result()?;
        self.coerce(&mut tree);
        Ok(Validated { tree, warnings })
    }

    fn walk(&self, tree: &CommandTree, parent: Option<&str>, report: &mut ValidationReport) {
        for (name, node) in tree.iter() {
            let path = child_path(parent, name);
            self.check_node(&path, node, report);
            // Children of a node with an unknown schema are still checked.
            if let Some(children) = &node.children {
                self.walk(children, Some(&path), report);
            }
        }
    }

    fn check_node(&self, path: &str, node: &CommandNode, report: &mut ValidationReport) {
        let Some(schema) = self.registry.lookup(&node.keyword, node.kind()) else {
            report.errors.push(ValidationError::UnknownSchema {
                path: path.to_string(),
                schema: SchemaKey::new(node.keyword.as_str(), node.kind()),
                position: node.position,
            });
            return;
        };

        self.check_declared(path, node, schema, report);
        self.check_undeclared(path, node, schema, report);

        if let Some(bounds) = schema.child_bounds() {
            let count = node.child_count();
            if !bounds.contains(count) {
                report.errors.push(ValidationError::ChildCount {
                    path: path.to_string(),
                    bounds,
                    count,
                    position: node.position,
                });
            }
        }
    }

    fn check_declared(
        &self,
        path: &str,
        node: &CommandNode,
        schema: &Schema,
        report: &mut ValidationReport,
    ) {
        for spec in schema.attributes() {
            match node.attributes.get(&spec.name) {
                Some(value) => {
                    if let Err(reason) = spec.checker.check(value) {
                        report.errors.push(ValidationError::InvalidAttribute {
                            path: path.to_string(),
                            attribute: spec.name.clone(),
                            reason,
                            position: node.position,
                        });
                    }
                }
                None if spec.required => {
                    report.errors.push(ValidationError::MissingAttribute {
                        path: path.to_string(),
                        attribute: spec.name.clone(),
                        position: node.position,
                    });
                }
                None => {}
            }
        }
    }

    fn check_undeclared(
        &self,
        path: &str,
        node: &CommandNode,
        schema: &Schema,
        report: &mut ValidationReport,
    ) {
        let extras = node
            .attributes
            .keys()
            .filter(|key| !STRUCTURAL_KEYS.contains(key) && schema.attribute(key).is_none());

        for key in extras {
            match self.mode {
                ValidationMode::Strict => {
                    report.errors.push(ValidationError::ExtraAttribute {
                        path: path.to_string(),
                        attribute: key.to_string(),
                        position: node.position,
                    });
                }
                ValidationMode::Lenient => {
                    debug!(command = path, attribute = key, "undeclared attribute");
                    report.warnings.push(ValidationWarning {
                        path: path.to_string(),
                        attribute: key.to_string(),
                        position: node.position,
                    });
                }
            }
        }
    }

    fn coerce(&self, tree: &mut CommandTree) {
        for (_, node) in tree.iter_mut() {
            if let Some(schema) = self.registry.lookup(&node.keyword, node.kind()) {
                for spec in schema.attributes() {
                    if let Some(value) = node.attributes.get_mut(&spec.name) {
                        if let Ok(coerced) = spec.checker.check(value) {
                            *value = coerced;
                        }
                    }
                }
            }
            if let Some(children) = node.children.as_mut() {
                self.coerce(children);
            }
        }
    }
}

/// Validates `tree` against `registry` in the given mode.
pub fn validate(
    registry: &SchemaRegistry,
    tree: &CommandTree,
    mode: ValidationMode,
) -> ValidationReport {
    Validator::new(registry, mode).validate(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{IntegerRule, StringRule};
    use crate::types::Value;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "dialog",
                "confirmation",
                Schema::builder()
                    .required("message", StringRule::new().min_len(1))
                    .optional("title", StringRule::new())
                    .children(ChildBounds::exactly(2))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                "action",
                "exit",
                Schema::builder()
                    .optional("label", StringRule::new())
                    .optional("code", IntegerRule::new().range(0, 255))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry.freeze();
        registry
    }

    fn exit_action() -> CommandNode {
        CommandNode::new("action").with_kind("exit")
    }

    fn confirm(children: CommandTree) -> CommandTree {
        let mut tree = CommandTree::new();
        tree.insert(
            "confirm1",
            CommandNode::new("dialog")
                .with_kind("confirmation")
                .with_attribute("message", Value::from("Q"))
                .with_children(children),
        )
        .unwrap();
        tree
    }

    #[test]
    fn test_child_bounds_violation() {
        let registry = registry();
        let mut children = CommandTree::new();
        children.insert("confirm", exit_action()).unwrap();
        children.insert("dismiss", exit_action()).unwrap();
        assert!(validate(&registry, &confirm(children.clone()), ValidationMode::Strict).is_ok());

        let mut one = CommandTree::new();
        one.insert("confirm", exit_action()).unwrap();
        let report = validate(&registry, &confirm(one), ValidationMode::Strict);
        assert_eq!(
            report.errors,
            vec![ValidationError::ChildCount {
                path: "confirm1".to_string(),
                bounds: ChildBounds::exactly(2),
                count: 1,
                position: None,
            }]
        );
    }

    #[test]
    fn test_errors_follow_schema_order_then_children() {
        let registry = registry();
        let mut children = CommandTree::new();
        children
            .insert("a", exit_action().with_attribute("code", Value::from(300)))
            .unwrap();
        children.insert("b", CommandNode::new("action")).unwrap();

        let mut tree = CommandTree::new();
        tree.insert(
            "c",
            CommandNode::new("dialog")
                .with_kind("confirmation")
                .with_attribute("title", Value::from(1))
                .with_children(children),
        )
        .unwrap();

        let report = validate(&registry, &tree, ValidationMode::Strict);
        let summary: Vec<(&str, Option<&str>)> = report
            .errors
            .iter()
            .map(|e| (e.path(), e.attribute()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("c", Some("message")),
                ("c", Some("title")),
                ("c.a", Some("code")),
                ("c.b", None),
            ]
        );
        assert!(matches!(report.errors[3], ValidationError::UnknownSchema { .. }));
    }

    #[test]
    fn test_strict_and_lenient_extra_attribute() {
        let registry = registry();
        let mut tree = CommandTree::new();
        tree.insert("quit", exit_action().with_attribute("colour", Value::from("red")))
            .unwrap();

        let strict = validate(&registry, &tree, ValidationMode::Strict);
        assert!(matches!(
            &strict.errors[..],
            [ValidationError::ExtraAttribute { attribute, .. }] if attribute == "colour"
        ));

        let lenient = validate(&registry, &tree, ValidationMode::Lenient);
        assert!(lenient.is_ok());
        assert_eq!(lenient.warnings.len(), 1);
        assert_eq!(
            lenient.warnings[0].to_string(),
            "command 'quit': undeclared attribute 'colour'"
        );
    }

    #[test]
    fn test_validate_is_idempotent() {
        let registry = registry();
        let mut tree = CommandTree::new();
        tree.insert("x", CommandNode::new("window")).unwrap();
        tree.insert("y", exit_action().with_attribute("code", Value::from(2.5)))
            .unwrap();

        let first = validate(&registry, &tree, ValidationMode::Strict);
        let second = validate(&registry, &tree, ValidationMode::Strict);
        assert_eq!(first, second);
        assert_eq!(first.errors.len(), 2);
    }

    #[test]
    fn test_validate_owned_coerces_integral_floats() {
        let registry = registry();
        let mut tree = CommandTree::new();
        tree.insert("quit", exit_action().with_attribute("code", Value::from(3.0)))
            .unwrap();

        let validated = Validator::new(&registry, ValidationMode::Strict)
            .validate_owned(tree)
            .unwrap();
        assert_eq!(
            validated.tree.get("quit").unwrap().attributes.get("code"),
            Some(&Value::Integer(3))
        );
    }

    #[test]
    fn test_validation_errors_display_joins_lines() {
        let registry = registry();
        let mut tree = CommandTree::new();
        tree.insert("a", CommandNode::new("window")).unwrap();
        tree.insert("b", CommandNode::new("link")).unwrap();

        let errors = validate(&registry, &tree, ValidationMode::Strict)
            .into_result()
            .unwrap_err();
        assert_eq!(
            errors.to_string(),
            "command 'a': unknown schema 'window'\ncommand 'b': unknown schema 'link'"
        );
    }
}
