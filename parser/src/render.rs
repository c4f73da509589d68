//! Canonical UIDL text output.

use std::fmt::Write;

use uidl_core::{CommandNode, CommandTree, SUPPORTED_VERSION, TYPE_KEY, Value};

const INDENT: &str = "    ";

/// Renders a tree as canonical UIDL text.
///
/// Commands keep their order, `type` is written first and every other
/// attribute follows in stored order. Parsing the output of a tree that was
/// itself parsed from UIDL yields an equal tree, and rendering that tree
/// again yields the same text.
///
/// # Examples
///
/// ```
/// use uidl_core::{CommandNode, CommandTree, Value};
///
/// let mut tree = CommandTree::new();
/// tree.insert(
///     "info1",
///     CommandNode::new("dialog")
///         .with_kind("info")
///         .with_attribute("message", Value::from("Hi")),
/// )
/// .unwrap();
///
/// assert_eq!(
///     uidl_parser::render(&tree),
///     "version 1\n\ninfo1 dialog(type=\"info\", message=\"Hi\")\n"
/// );
/// ```
pub fn render(tree: &CommandTree) -> String {
    let mut out = format!("version {SUPPORTED_VERSION}\n\n");
    render_scope(&mut out, tree, 0);
    out
}

fn render_scope(out: &mut String, tree: &CommandTree, depth: usize) {
    for (name, node) in tree.iter() {
        render_command(out, name, node, depth);
    }
}

fn render_command(out: &mut String, name: &str, node: &CommandNode, depth: usize) {
    let indent = INDENT.repeat(depth);
    let _ = write!(out, "{indent}{name} {}(", node.keyword);

    let mut first = true;
    if let Some(kind) = &node.kind {
        out.push_str(TYPE_KEY);
        out.push('=');
        push_string(out, kind);
        first = false;
    }
    for (key, value) in node.attributes.iter() {
        if !first {
            out.push_str(", ");
        }
        first = false;
        out.push_str(key);
        out.push('=');
        push_value(out, value);
    }
    out.push(')');

    match &node.children {
        Some(children) if !children.is_empty() => {
            out.push_str(" {\n");
            render_scope(out, children, depth + 1);
            out.push_str(&indent);
            out.push_str("}\n");
        }
        _ => out.push('\n'),
    }
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => push_string(out, s),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Integer(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float(x) => {
            // The grammar needs digits on both sides of the point.
            let text = x.to_string();
            out.push_str(&text);
            if !text.contains('.') {
                out.push_str(".0");
            }
        }
        Value::List(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                push_value(out, item);
            }
            out.push(']');
        }
    }
}

fn push_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            // Control characters are all below U+00A0, so four digits do.
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
