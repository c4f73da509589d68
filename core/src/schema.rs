//! Attribute and child-count contracts for one `(keyword, type)` pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::check::{Checker, ValueRule};
use crate::types::is_structural_or_reserved;

/// Errors raised while declaring a schema.
///
/// These are configuration errors: they surface while schemas are wired
/// up at startup, never while a document is validated.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A string rule's pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// The same attribute is declared twice.
    #[error("attribute '{0}' declared twice")]
    DuplicateAttribute(String),
    /// A structural or reserved key is declared as an attribute.
    #[error("attribute '{0}' is a reserved key and cannot be declared")]
    ReservedAttribute(String),
    /// Child bounds with `min > max`.
    #[error("invalid child bounds: min {min} exceeds max {max}")]
    InvalidChildBounds { min: usize, max: usize },
}

/// Inclusive bounds on the number of children of a command.
///
/// # Examples
///
/// ```
/// use uidl_core::ChildBounds;
///
/// let exactly_two = ChildBounds::exactly(2);
/// assert!(exactly_two.contains(2));
/// assert!(!exactly_two.contains(1));
/// assert_eq!(exactly_two.to_string(), "exactly 2");
///
/// assert_eq!(ChildBounds::at_least(1).to_string(), "at least 1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildBounds {
    #[serde(default)]
    pub min: usize,
    #[serde(default)]
    pub max: Option<usize>,
}

impl ChildBounds {
    pub fn new(min: usize, max: Option<usize>) -> Self {
        Self { min, max }
    }

    pub fn exactly(n: usize) -> Self {
        Self::new(n, Some(n))
    }

    pub fn at_least(min: usize) -> Self {
        Self::new(min, None)
    }

    pub fn at_most(max: usize) -> Self {
        Self::new(0, Some(max))
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

impl fmt::Display for ChildBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {max}"),
            Some(max) if self.min == 0 => write!(f, "at most {max}"),
            Some(max) => write!(f, "between {} and {max}", self.min),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// One declared attribute.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: String,
    pub required: bool,
    pub checker: Checker,
}

/// Attribute contract for one `(keyword, type)` pair.
///
/// Attributes keep their declaration order, which is the order the
/// validator reports findings in.
///
/// # Examples
///
/// ```
/// use uidl_core::{ChildBounds, Schema, StringRule};
///
/// let schema = Schema::builder()
///     .required("message", StringRule::new().min_len(1))
///     .optional("title", StringRule::new())
///     .children(ChildBounds::exactly(2))
///     .build()
///     .unwrap();
///
/// assert!(schema.attribute("message").unwrap().required);
/// assert_eq!(schema.child_bounds(), Some(ChildBounds::exactly(2)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    attributes: Vec<AttributeSpec>,
    children: Option<ChildBounds>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|spec| spec.name == name)
    }

    pub fn child_bounds(&self) -> Option<ChildBounds> {
        self.children
    }
}

enum PendingChecker {
    Rule(ValueRule),
    Custom(Checker),
}

/// Builder for [`Schema`]; rules are compiled in [`build`](Self::build).
#[derive(Default)]
pub struct SchemaBuilder {
    attributes: Vec<(String, bool, PendingChecker)>,
    children: Option<ChildBounds>,
}

impl SchemaBuilder {
    /// Declares a required attribute checked by `rule`.
    pub fn required(mut self, name: &str, rule: impl Into<ValueRule>) -> Self {
        self.attributes
            .push((name.to_string(), true, PendingChecker::Rule(rule.into())));
        self
    }

    /// Declares an optional attribute checked by `rule`.
    pub fn optional(mut self, name: &str, rule: impl Into<ValueRule>) -> Self {
        self.attributes
            .push((name.to_string(), false, PendingChecker::Rule(rule.into())));
        self
    }

    /// Declares an attribute checked by a custom [`Checker`].
    pub fn attribute_with(mut self, name: &str, required: bool, checker: Checker) -> Self {
        self.attributes
            .push((name.to_string(), required, PendingChecker::Custom(checker)));
        self
    }

    pub fn children(mut self, bounds: ChildBounds) -> Self {
        self.children = Some(bounds);
        self
    }

    /// Compiles every rule and checks the declaration for consistency.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid patterns, duplicate or
    /// reserved attribute names, and inverted child bounds.
    pub fn build(self) -> Result<Schema, SchemaError> {
        if let Some(ChildBounds {
            min,
            max: Some(max),
        }) = self.children
        {
            if min > max {
                return Err(SchemaError::InvalidChildBounds { min, max });
            }
        }

        let mut attributes: Vec<AttributeSpec> = Vec::with_capacity(self.attributes.len());
        for (name, required, pending) in self.attributes {
            if is_structural_or_reserved(&name) {
                return Err(SchemaError::ReservedAttribute(name));
            }
            if attributes.iter().any(|spec| spec.name == name) {
                return Err(SchemaError::DuplicateAttribute(name));
            }
            let checker = match pending {
                PendingChecker::Rule(rule) => Checker::from_rule(&rule)?,
                PendingChecker::Custom(checker) => checker,
            };
            attributes.push(AttributeSpec {
                name,
                required,
                checker,
            });
        }

        Ok(Schema {
            attributes,
            children: self.children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::StringRule;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let schema = Schema::builder()
            .optional("title", StringRule::new())
            .required("message", StringRule::new())
            .build()
            .unwrap();

        let names: Vec<&str> = schema.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["title", "message"]);
    }

    #[test]
    fn test_builder_rejects_reserved_and_duplicate_names() {
        for reserved in ["keyword", "type", "children", "name"] {
            let result = Schema::builder()
                .optional(reserved, ValueRule::string())
                .build();
            assert!(matches!(result, Err(SchemaError::ReservedAttribute(_))));
        }

        let result = Schema::builder()
            .optional("title", ValueRule::string())
            .required("title", ValueRule::string())
            .build();
        assert!(matches!(result, Err(SchemaError::DuplicateAttribute(name)) if name == "title"));
    }

    #[test]
    fn test_builder_rejects_inverted_bounds() {
        let result = Schema::builder()
            .children(ChildBounds::new(3, Some(1)))
            .build();
        assert!(matches!(
            result,
            Err(SchemaError::InvalidChildBounds { min: 3, max: 1 })
        ));
    }

    #[test]
    fn test_child_bounds_display() {
        assert_eq!(ChildBounds::new(1, Some(3)).to_string(), "between 1 and 3");
        assert_eq!(ChildBounds::at_most(2).to_string(), "at most 2");
        assert!(ChildBounds::at_least(1).contains(10));
        assert!(!ChildBounds::at_most(2).contains(3));
    }
}
