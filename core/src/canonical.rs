//! Folding parsed commands into the canonical [`CommandTree`].
//!
//! Both ingestion paths (UIDL text and relaxed JSON) produce flat, ordered
//! lists of [`RawCommand`]s per nesting level. [`canonicalize`] turns them
//! into a tree, enforcing sibling-name uniqueness, attribute-key uniqueness
//! and the reserved-key rules. It never stops early: every structural
//! problem in the document is collected and returned alongside the tree.

use thiserror::Error;

use crate::types::{
    CommandNode, CommandTree, Position, RESERVED_ATTRIBUTE_KEYS, TYPE_KEY, Value, child_path,
};

/// One attribute as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub key: String,
    pub value: Value,
    pub position: Option<Position>,
}

impl RawAttribute {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            position: None,
        }
    }
}

/// One command as produced by an ingestion path, before canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommand {
    pub name: String,
    pub keyword: String,
    pub position: Option<Position>,
    /// Attributes in source order, possibly including `type`.
    pub attributes: Vec<RawAttribute>,
    /// Nested commands, if the command had a body.
    pub body: Option<Vec<RawCommand>>,
}

impl RawCommand {
    pub fn new(name: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyword: keyword.into(),
            position: None,
            attributes: Vec::new(),
            body: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.push(RawAttribute::new(key, value));
        self
    }

    pub fn with_body(mut self, body: Vec<RawCommand>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Structural problems found while building the canonical tree.
///
/// `path` is the dotted path of the offending command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructureError {
    /// A sibling with the same name was declared earlier.
    #[error("duplicate command name '{path}'")]
    DuplicateCommand {
        path: String,
        position: Option<Position>,
    },
    /// An attribute key appears twice in one command.
    #[error("duplicate attribute '{key}' in command '{path}'")]
    DuplicateAttribute {
        path: String,
        key: String,
        position: Option<Position>,
    },
    /// An attribute uses one of the reserved structural keys.
    #[error("attribute '{key}' in command '{path}' collides with a reserved key")]
    ReservedAttribute {
        path: String,
        key: String,
        position: Option<Position>,
    },
    /// The `type` attribute is not a string.
    #[error("attribute 'type' of command '{path}' must be a string, found {found}")]
    InvalidType {
        path: String,
        found: &'static str,
        position: Option<Position>,
    },
    /// A command has an empty name.
    #[error("command name must not be empty")]
    EmptyName { position: Option<Position> },
    /// A command has an empty keyword.
    #[error("command '{path}' has an empty keyword")]
    EmptyKeyword {
        path: String,
        position: Option<Position>,
    },
}

impl StructureError {
    pub fn position(&self) -> Option<Position> {
        match self {
            StructureError::DuplicateCommand { position, .. }
            | StructureError::DuplicateAttribute { position, .. }
            | StructureError::ReservedAttribute { position, .. }
            | StructureError::InvalidType { position, .. }
            | StructureError::EmptyName { position }
            | StructureError::EmptyKeyword { position, .. } => *position,
        }
    }
}

/// Builds the canonical tree from one level of parsed commands.
///
/// The first occurrence of a name or attribute key is authoritative; later
/// duplicates are dropped and reported. Errors are returned in document
/// order (pre-order over commands).
///
/// # Examples
///
/// ```
/// use uidl_core::{RawCommand, StructureError, Value, canonicalize};
///
/// let commands = vec![
///     RawCommand::new("greet", "dialog").with_attribute("message", Value::from("Hi")),
///     RawCommand::new("greet", "dialog").with_attribute("message", Value::from("Again")),
/// ];
///
/// let (tree, errors) = canonicalize(commands);
/// assert_eq!(tree.len(), 1);
/// assert_eq!(tree.get("greet").unwrap().attributes.get("message"), Some(&Value::from("Hi")));
/// assert!(matches!(errors[0], StructureError::DuplicateCommand { .. }));
/// ```
pub fn canonicalize(commands: Vec<RawCommand>) -> (CommandTree, Vec<StructureError>) {
    let mut errors = Vec::new();
    let tree = fold_scope(commands, None, &mut errors);
    (tree, errors)
}

fn fold_scope(
    commands: Vec<RawCommand>,
    parent: Option<&str>,
    errors: &mut Vec<StructureError>,
) -> CommandTree {
    let mut tree = CommandTree::new();

    for raw in commands {
        if raw.name.is_empty() {
            errors.push(StructureError::EmptyName {
                position: raw.position,
            });
            continue;
        }

        let path = child_path(parent, &raw.name);
        let duplicate = tree.contains(&raw.name);
        if duplicate {
            errors.push(StructureError::DuplicateCommand {
                path: path.clone(),
                position: raw.position,
            });
        }

        // Dropped duplicates are still folded so problems nested inside
        // them are reported too.
        let name = raw.name.clone();
        let node = build_node(raw, &path, errors);
        if !duplicate {
            let _ = tree.insert(name, node);
        }
    }

    tree
}

fn build_node(raw: RawCommand, path: &str, errors: &mut Vec<StructureError>) -> CommandNode {
    let mut node = CommandNode::new(raw.keyword);
    node.position = raw.position;

    if node.keyword.is_empty() {
        errors.push(StructureError::EmptyKeyword {
            path: path.to_string(),
            position: raw.position,
        });
    }

    for attr in raw.attributes {
        if RESERVED_ATTRIBUTE_KEYS.contains(&attr.key.as_str()) {
            errors.push(StructureError::ReservedAttribute {
                path: path.to_string(),
                key: attr.key,
                position: attr.position,
            });
            continue;
        }

        let seen = if attr.key == TYPE_KEY {
            node.kind.is_some()
        } else {
            node.attributes.contains_key(&attr.key)
        };
        if seen {
            errors.push(StructureError::DuplicateAttribute {
                path: path.to_string(),
                key: attr.key,
                position: attr.position,
            });
            continue;
        }

        if attr.key == TYPE_KEY {
            match attr.value {
                Value::String(kind) => node.kind = Some(kind),
                other => errors.push(StructureError::InvalidType {
                    path: path.to_string(),
                    found: other.kind_name(),
                    position: attr.position,
                }),
            }
            continue;
        }

        node.attributes.insert(attr.key, attr.value);
    }

    if let Some(body) = raw.body {
        node.children = Some(fold_scope(body, Some(path), errors));
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_preserves_declaration_order() {
        let (tree, errors) = canonicalize(vec![
            RawCommand::new("zeta", "dialog"),
            RawCommand::new("alpha", "dialog"),
            RawCommand::new("mid", "window"),
        ]);

        assert!(errors.is_empty());
        assert_eq!(tree.names().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_canonicalize_reports_every_duplicate_name() {
        let (tree, errors) = canonicalize(vec![
            RawCommand::new("a", "dialog").with_attribute("message", Value::from("first")),
            RawCommand::new("a", "dialog"),
            RawCommand::new("b", "dialog"),
            RawCommand::new("a", "window"),
        ]);

        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.get("a").unwrap().attributes.get("message"),
            Some(&Value::from("first"))
        );
        let duplicates = errors
            .iter()
            .filter(|e| matches!(e, StructureError::DuplicateCommand { .. }))
            .count();
        assert_eq!(duplicates, 2);
    }

    #[test]
    fn test_canonicalize_lifts_type_and_rejects_reserved_keys() {
        let (tree, errors) = canonicalize(vec![
            RawCommand::new("ok", "action")
                .with_attribute("type", Value::from("exit"))
                .with_attribute("name", Value::from("shadow"))
                .with_attribute("label", Value::from("OK")),
        ]);

        let node = tree.get("ok").unwrap();
        assert_eq!(node.kind.as_deref(), Some("exit"));
        assert!(!node.attributes.contains_key("type"));
        assert!(!node.attributes.contains_key("name"));
        assert_eq!(
            errors,
            vec![StructureError::ReservedAttribute {
                path: "ok".to_string(),
                key: "name".to_string(),
                position: None,
            }]
        );
    }

    #[test]
    fn test_canonicalize_rejects_non_string_type() {
        let (tree, errors) = canonicalize(vec![
            RawCommand::new("ok", "action").with_attribute("type", Value::from(3)),
        ]);

        assert!(tree.get("ok").unwrap().kind.is_none());
        assert!(matches!(
            errors[0],
            StructureError::InvalidType { found: "integer", .. }
        ));
    }

    #[test]
    fn test_canonicalize_reports_nested_errors_with_paths() {
        let (tree, errors) = canonicalize(vec![RawCommand::new("outer", "dialog").with_body(vec![
            RawCommand::new("x", "action")
                .with_attribute("label", Value::from("one"))
                .with_attribute("label", Value::from("two")),
            RawCommand::new("x", "action"),
        ])]);

        let children = tree.get("outer").unwrap().children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(
            children.get("x").unwrap().attributes.get("label"),
            Some(&Value::from("one"))
        );
        assert_eq!(
            errors,
            vec![
                StructureError::DuplicateAttribute {
                    path: "outer.x".to_string(),
                    key: "label".to_string(),
                    position: None,
                },
                StructureError::DuplicateCommand {
                    path: "outer.x".to_string(),
                    position: None,
                },
            ]
        );
    }

    #[test]
    fn test_canonicalize_reports_empty_name_and_keyword() {
        let (tree, errors) = canonicalize(vec![
            RawCommand::new("", "dialog"),
            RawCommand::new("blank", ""),
        ]);

        assert_eq!(tree.len(), 1);
        assert!(matches!(errors[0], StructureError::EmptyName { .. }));
        assert!(matches!(errors[1], StructureError::EmptyKeyword { .. }));
    }
}
