//! Schemas for the built-in command families.
//!
//! Each feature area registers its own schemas; [`register_all`] wires all
//! of them into a registry during startup.

use thiserror::Error;

use crate::check::{IntegerRule, ListRule, StringRule, ValueRule};
use crate::registry::{RegistryError, SchemaRegistry};
use crate::schema::{ChildBounds, Schema, SchemaBuilder, SchemaError};
use crate::types::DEFAULT_KIND;

/// Largest accepted window dimension.
pub const MAX_WINDOW_DIMENSION: i64 = 16_384;

/// Failure while wiring built-in schemas.
#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("built-in schema '{keyword}/{kind}' is invalid: {source}")]
    Schema {
        keyword: &'static str,
        kind: &'static str,
        #[source]
        source: SchemaError,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Registers every built-in schema family.
///
/// # Examples
///
/// ```
/// use uidl_core::{SchemaRegistry, builtin};
///
/// let mut registry = SchemaRegistry::new();
/// builtin::register_all(&mut registry).unwrap();
/// assert!(registry.lookup("dialog", "confirmation").is_some());
/// assert!(registry.lookup("window", "").is_some());
/// ```
pub fn register_all(registry: &mut SchemaRegistry) -> Result<(), BuiltinError> {
    register_dialogs(registry)?;
    register_windows(registry)?;
    register_actions(registry)?;
    register_links(registry)?;
    Ok(())
}

fn register(
    registry: &mut SchemaRegistry,
    keyword: &'static str,
    kind: &'static str,
    builder: SchemaBuilder,
) -> Result<(), BuiltinError> {
    let schema = builder.build().map_err(|source| BuiltinError::Schema {
        keyword,
        kind,
        source,
    })?;
    registry.register(keyword, kind, schema)?;
    Ok(())
}

fn non_empty() -> ValueRule {
    StringRule::new().min_len(1).into()
}

fn message_dialog() -> SchemaBuilder {
    Schema::builder()
        .required("message", non_empty())
        .optional("title", ValueRule::string())
}

/// `dialog/info`, `dialog/warning`, `dialog/error`, `dialog/confirmation`,
/// `dialog/entry` and `dialog/choice`.
pub fn register_dialogs(registry: &mut SchemaRegistry) -> Result<(), BuiltinError> {
    for kind in ["info", "warning", "error"] {
        register(registry, "dialog", kind, message_dialog())?;
    }
    register(
        registry,
        "dialog",
        "confirmation",
        message_dialog().children(ChildBounds::exactly(2)),
    )?;
    register(
        registry,
        "dialog",
        "entry",
        message_dialog()
            .optional("default", ValueRule::string())
            .optional("placeholder", ValueRule::string())
            .optional("hidden", ValueRule::Bool),
    )?;
    register(
        registry,
        "dialog",
        "choice",
        message_dialog()
            .required("options", ListRule::of(non_empty()).min_len(1))
            .optional("multiple", ValueRule::Bool)
            .children(ChildBounds::at_most(2)),
    )
}

/// The default `window` variant.
pub fn register_windows(registry: &mut SchemaRegistry) -> Result<(), BuiltinError> {
    let dimension = IntegerRule::new().range(1, MAX_WINDOW_DIMENSION);
    register(
        registry,
        "window",
        DEFAULT_KIND,
        Schema::builder()
            .required("title", ValueRule::string())
            .optional("width", dimension)
            .optional("height", dimension)
            .optional("resizable", ValueRule::Bool)
            .children(ChildBounds::at_least(1)),
    )
}

/// `action/exit`, `action/open` and `action/submit`.
pub fn register_actions(registry: &mut SchemaRegistry) -> Result<(), BuiltinError> {
    register(
        registry,
        "action",
        "exit",
        Schema::builder()
            .optional("label", ValueRule::string())
            .optional("code", IntegerRule::new().range(0, 255)),
    )?;
    register(
        registry,
        "action",
        "open",
        Schema::builder()
            .optional("label", ValueRule::string())
            .required("url", StringRule::new().pattern(r"^(https?|file)://")),
    )?;
    register(
        registry,
        "action",
        "submit",
        Schema::builder().optional("label", ValueRule::string()),
    )
}

/// The default `link` variant.
pub fn register_links(registry: &mut SchemaRegistry) -> Result<(), BuiltinError> {
    register(
        registry,
        "link",
        DEFAULT_KIND,
        Schema::builder()
            .required("target", StringRule::new().pattern(r"^[A-Za-z_][A-Za-z0-9_.\-]*$"))
            .optional("label", ValueRule::string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommandNode, CommandTree, Value};
    use crate::validate::{ValidationError, ValidationMode, validate};

    fn builtin_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        register_all(&mut registry).unwrap();
        registry.freeze();
        registry
    }

    fn single(name: &str, node: CommandNode) -> CommandTree {
        let mut tree = CommandTree::new();
        tree.insert(name, node).unwrap();
        tree
    }

    #[test]
    fn test_register_all_registers_every_family() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 11);
        for (keyword, kind) in [
            ("dialog", "info"),
            ("dialog", "warning"),
            ("dialog", "error"),
            ("dialog", "entry"),
            ("dialog", "choice"),
            ("action", "open"),
            ("action", "submit"),
            ("link", ""),
        ] {
            assert!(registry.lookup(keyword, kind).is_some(), "{keyword}/{kind}");
        }
    }

    #[test]
    fn test_register_all_twice_is_a_duplicate() {
        let mut registry = SchemaRegistry::new();
        register_all(&mut registry).unwrap();
        assert!(matches!(
            register_all(&mut registry),
            Err(BuiltinError::Registry(RegistryError::Duplicate(_)))
        ));
    }

    #[test]
    fn test_choice_options_must_be_non_empty_strings() {
        let registry = builtin_registry();
        let good = single(
            "pick",
            CommandNode::new("dialog")
                .with_kind("choice")
                .with_attribute("message", Value::from("Pick one"))
                .with_attribute("options", Value::from(vec![Value::from("a"), Value::from("b")])),
        );
        assert!(validate(&registry, &good, ValidationMode::Strict).is_ok());

        let bad = single(
            "pick",
            CommandNode::new("dialog")
                .with_kind("choice")
                .with_attribute("message", Value::from("Pick one"))
                .with_attribute("options", Value::from(vec![Value::from("")])),
        );
        let report = validate(&registry, &bad, ValidationMode::Strict);
        assert!(matches!(
            &report.errors[..],
            [ValidationError::InvalidAttribute { attribute, .. }] if attribute == "options"
        ));
    }

    #[test]
    fn test_open_action_url_scheme() {
        let registry = builtin_registry();
        let ok = single(
            "docs",
            CommandNode::new("action")
                .with_kind("open")
                .with_attribute("url", Value::from("https://example.org")),
        );
        assert!(validate(&registry, &ok, ValidationMode::Strict).is_ok());

        let bad = single(
            "docs",
            CommandNode::new("action")
                .with_kind("open")
                .with_attribute("url", Value::from("ftp://example.org")),
        );
        assert_eq!(validate(&registry, &bad, ValidationMode::Strict).errors.len(), 1);
    }

    #[test]
    fn test_window_requires_a_child_and_bounded_size() {
        let registry = builtin_registry();
        let tree = single(
            "main",
            CommandNode::new("window")
                .with_attribute("title", Value::from("Main"))
                .with_attribute("width", Value::from(0)),
        );
        let report = validate(&registry, &tree, ValidationMode::Strict);
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(report.errors[0], ValidationError::InvalidAttribute { .. }));
        assert!(matches!(report.errors[1], ValidationError::ChildCount { count: 0, .. }));
    }
}
