//! Command tree data model.
//!
//! This module defines the canonical, format-agnostic representation of a
//! UIDL document: an ordered [`CommandTree`] mapping command names to
//! [`CommandNode`]s, each carrying a keyword, an optional subtype, literal
//! [`Value`] attributes and optionally a nested tree of children.
//!
//! The types serialize with [`serde`] into the same shape the relaxed-JSON
//! ingestion path accepts, so a tree can be dumped and read back.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Document version understood by this crate.
pub const SUPPORTED_VERSION: u64 = 1;

/// Structural key selecting the schema family of a command.
pub const KEYWORD_KEY: &str = "keyword";
/// Structural key selecting the schema variant within a family.
pub const TYPE_KEY: &str = "type";
/// Structural key holding nested commands.
pub const CHILDREN_KEY: &str = "children";
/// Reserved key: the command name lives in the parent tree, never in the
/// attribute list.
pub const NAME_KEY: &str = "name";

/// Keys that can never be written as a user attribute.
///
/// `type` is deliberately absent: it is written as an ordinary attribute in
/// source (`action(type="exit")`) and lifted into [`CommandNode::kind`]
/// during canonicalization.
pub const RESERVED_ATTRIBUTE_KEYS: &[&str] = &[KEYWORD_KEY, CHILDREN_KEY, NAME_KEY];

/// Keys carried structurally by [`CommandNode`] and never matched against a
/// schema's attribute declarations.
pub const STRUCTURAL_KEYS: &[&str] = &[KEYWORD_KEY, TYPE_KEY, CHILDREN_KEY];

/// Subtype used for lookups when a command has no `type` attribute.
pub const DEFAULT_KIND: &str = "";

/// Returns `true` if `key` may not be declared by a schema.
pub fn is_structural_or_reserved(key: &str) -> bool {
    STRUCTURAL_KEYS.contains(&key) || RESERVED_ATTRIBUTE_KEYS.contains(&key)
}

/// Source locator used by every diagnostic.
///
/// `offset` is a byte offset into the source; `line` and `column` are
/// one-based, with columns counted in characters.
///
/// # Examples
///
/// ```
/// use uidl_core::Position;
///
/// let pos = Position::new(12, 2, 5);
/// assert_eq!(pos.to_string(), "2:5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset from the start of the document.
    pub offset: usize,
    /// One-based line number.
    pub line: usize,
    /// One-based column number (characters).
    pub column: usize,
}

impl Position {
    /// Creates a position from its parts.
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Position of the first character of a document.
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Literal attribute value.
///
/// Values are immutable once parsed. `List` only appears for attributes
/// declared as lists (e.g. the options of a choice dialog).
///
/// # Examples
///
/// ```
/// use uidl_core::Value;
///
/// let v = Value::from(3.0);
/// assert_eq!(v.kind_name(), "float");
/// assert_eq!(v.as_integer(), Some(3));
///
/// let fractional = Value::from(3.5);
/// assert_eq!(fractional.as_integer(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    List(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    ///
    /// Floats are accepted only when they are finite, have no fractional
    /// part and fit in an `i64`; sources such as JSON represent every number
    /// as floating point.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => integral_float(*f),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Converts an exactly integral float to `i64`.
pub(crate) fn integral_float(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it overflows.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Ordered attribute map with unique keys.
///
/// Iteration follows insertion order, which for parsed documents is source
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: Vec<(String, Value)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Inserts or replaces an attribute, returning the previous value.
    ///
    /// A replaced entry keeps its original position in the iteration order.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(existing) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for AttributeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A single named command in the tree.
///
/// The reserved structural keys of the source attribute list are carried as
/// fields: `keyword` selects the schema family, `kind` (the `type`
/// attribute) selects the variant, and `children` holds the nested body.
///
/// # Examples
///
/// ```
/// use uidl_core::{CommandNode, CommandTree, Value};
///
/// let mut body = CommandTree::new();
/// body.insert("ok", CommandNode::new("action").with_kind("exit")).unwrap();
///
/// let node = CommandNode::new("dialog")
///     .with_kind("confirmation")
///     .with_attribute("message", Value::from("Proceed?"))
///     .with_children(body);
///
/// assert_eq!(node.kind(), "confirmation");
/// assert_eq!(node.child_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct CommandNode {
    /// Schema family (e.g. `dialog`, `window`, `action`, `link`).
    pub keyword: String,
    /// Schema variant from the `type` attribute, if one was given.
    pub kind: Option<String>,
    /// User attributes, excluding the structural keys.
    pub attributes: AttributeMap,
    /// Nested commands, present when the source had a body.
    pub children: Option<CommandTree>,
    /// Where the command's name starts in the source, when known.
    pub position: Option<Position>,
}

impl CommandNode {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            kind: None,
            attributes: AttributeMap::new(),
            children: None,
            position: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn with_children(mut self, children: CommandTree) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Variant used for schema lookup; [`DEFAULT_KIND`] when absent.
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_KIND)
    }

    pub fn child_count(&self) -> usize {
        self.children.as_ref().map_or(0, CommandTree::len)
    }
}

// Positions are provenance, not content.
impl PartialEq for CommandNode {
    fn eq(&self, other: &Self) -> bool {
        self.keyword == other.keyword
            && self.kind == other.kind
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl Serialize for CommandNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1
            + usize::from(self.kind.is_some())
            + self.attributes.len()
            + usize::from(self.children.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(KEYWORD_KEY, &self.keyword)?;
        if let Some(kind) = &self.kind {
            map.serialize_entry(TYPE_KEY, kind)?;
        }
        for (k, v) in self.attributes.iter() {
            map.serialize_entry(k, v)?;
        }
        if let Some(children) = &self.children {
            map.serialize_entry(CHILDREN_KEY, children)?;
        }
        map.end()
    }
}

/// Rejected [`CommandTree::insert`] calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Command names must be non-empty.
    #[error("command name must not be empty")]
    EmptyName,
    /// A sibling with this name already exists.
    #[error("duplicate command name '{0}'")]
    DuplicateName(String),
}

/// Ordered mapping from command name to [`CommandNode`].
///
/// Names are non-empty and unique among siblings; declaration order is
/// preserved for rendering.
///
/// # Examples
///
/// ```
/// use uidl_core::{CommandNode, CommandTree};
///
/// let mut tree = CommandTree::new();
/// tree.insert("b", CommandNode::new("dialog")).unwrap();
/// tree.insert("a", CommandNode::new("dialog")).unwrap();
/// assert!(tree.insert("a", CommandNode::new("window")).is_err());
///
/// assert_eq!(tree.names().collect::<Vec<_>>(), vec!["b", "a"]);
/// assert_eq!(tree.get("a").unwrap().keyword, "dialog");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandTree {
    nodes: Vec<(String, CommandNode)>,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CommandNode> {
        self.nodes.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CommandNode> {
        self.nodes
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|(n, _)| n == name)
    }

    /// Appends a command.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or a sibling with the same name already
    /// exists; the existing entry is never overwritten.
    pub fn insert(&mut self, name: impl Into<String>, node: CommandNode) -> Result<(), TreeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TreeError::EmptyName);
        }
        if self.contains(&name) {
            return Err(TreeError::DuplicateName(name));
        }
        self.nodes.push((name, node));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CommandNode)> {
        self.nodes.iter().map(|(n, node)| (n.as_str(), node))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut CommandNode)> {
        self.nodes.iter_mut().map(|(n, node)| (n.as_str(), node))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(n, _)| n.as_str())
    }

    /// Total number of commands at every depth.
    pub fn total_commands(&self) -> usize {
        self.nodes
            .iter()
            .map(|(_, node)| 1 + node.children.as_ref().map_or(0, CommandTree::total_commands))
            .sum()
    }
}

impl Serialize for CommandTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (name, node) in &self.nodes {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

/// Joins a parent path and a command name into a dotted node path.
pub fn child_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_float_coerces_to_integer() {
        assert_eq!(Value::Float(42.0).as_integer(), Some(42));
        assert_eq!(Value::Float(-3.0).as_integer(), Some(-3));
        assert_eq!(Value::Float(1.25).as_integer(), None);
        assert_eq!(Value::Float(f64::NAN).as_integer(), None);
        assert_eq!(Value::Float(1e30).as_integer(), None);
        assert_eq!(Value::from("1").as_integer(), None);
    }

    #[test]
    fn test_attribute_map_preserves_order_and_replaces_in_place() {
        let mut attrs = AttributeMap::new();
        attrs.insert("z", Value::from(1));
        attrs.insert("a", Value::from(2));
        let previous = attrs.insert("z", Value::from(3));

        assert_eq!(previous, Some(Value::Integer(1)));
        assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(attrs.get("z"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_command_tree_rejects_duplicate_names() {
        let mut tree = CommandTree::new();
        tree.insert("one", CommandNode::new("dialog")).unwrap();
        let rejected = tree.insert("one", CommandNode::new("window")).unwrap_err();

        assert_eq!(rejected, TreeError::DuplicateName("one".to_string()));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get("one").unwrap().keyword, "dialog");
    }

    #[test]
    fn test_command_tree_rejects_empty_name() {
        let mut tree = CommandTree::new();
        assert_eq!(
            tree.insert("", CommandNode::new("dialog")),
            Err(TreeError::EmptyName)
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn test_node_equality_ignores_position() {
        let a = CommandNode::new("dialog").with_position(Position::new(0, 1, 1));
        let b = CommandNode::new("dialog").with_position(Position::new(40, 3, 7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_total_commands_counts_nested() {
        let mut inner = CommandTree::new();
        inner.insert("x", CommandNode::new("action")).unwrap();
        inner.insert("y", CommandNode::new("action")).unwrap();
        let mut tree = CommandTree::new();
        tree.insert("d", CommandNode::new("dialog").with_children(inner))
            .unwrap();

        assert_eq!(tree.total_commands(), 3);
    }
}
