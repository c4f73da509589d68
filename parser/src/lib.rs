//! Parsers for UIDL dialog documents.
//!
//! Two ingestion paths produce the same canonical [`CommandTree`]:
//!
//! - [`parse_uidl`] reads the native text format, built from the small
//!   combinator library in [`combinator`].
//! - [`parse_json`] reads the relaxed-JSON form (comments and trailing
//!   commas allowed).
//!
//! Both collect every diagnostic of a document before returning, and
//! [`render`] writes a tree back out as canonical UIDL text.
//!
//! # Example
//!
//! ```
//! let source = r#"
//! version 1
//!
//! confirm1 dialog(type="confirmation", message="Delete?") {
//!     yes action(type="exit", code=0)
//!     no action(type="exit", code=1)
//! }
//! "#;
//!
//! let tree = uidl_parser::parse_uidl(source, "confirm.uidl").unwrap();
//! let confirm = tree.get("confirm1").unwrap();
//! assert_eq!(confirm.kind(), "confirmation");
//! assert_eq!(confirm.child_count(), 2);
//! ```

pub mod combinator;
mod error;
mod grammar;
mod json;
mod render;

use tracing::debug;
use uidl_core::{CommandTree, RawCommand, canonicalize};

pub use error::{ParseError, ParseErrors};
pub use json::VERSION_KEY;
pub use render::render;

/// Parses UIDL text. `document` names the source in diagnostics.
pub fn parse_uidl(source: &str, document: &str) -> Result<CommandTree, ParseErrors> {
    let mut ctx = combinator::ParseContext::new();
    let commands = grammar::document(source, &mut ctx);
    finish(document, commands, ctx.into_errors())
}

/// Parses relaxed JSON. `document` names the source in diagnostics.
pub fn parse_json(source: &str, document: &str) -> Result<CommandTree, ParseErrors> {
    let mut errors = Vec::new();
    let commands = json::document(source, &mut errors);
    finish(document, commands, errors)
}

fn finish(
    document: &str,
    commands: Vec<RawCommand>,
    mut errors: Vec<ParseError>,
) -> Result<CommandTree, ParseErrors> {
    let (tree, structure) = canonicalize(commands);
    errors.extend(structure.into_iter().map(ParseError::from));

    if errors.is_empty() {
        debug!(
            document,
            commands = tree.total_commands(),
            "parsed document"
        );
        Ok(tree)
    } else {
        debug!(document, errors = errors.len(), "document has errors");
        Err(ParseErrors::new(document, errors))
    }
}
