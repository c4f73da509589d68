//! Relaxed-JSON ingestion.
//!
//! The JSON form mirrors the canonical tree: the top-level object maps
//! command names to objects holding `keyword`, optional `type`, literal
//! attributes and an optional `children` object. Comments (`//`, `/* */`
//! and `#`) and trailing commas are accepted.
//!
//! Objects are read with a custom `serde` visitor that keeps key order and
//! duplicate keys, so the canonicalizer reports duplicates exactly as it
//! does for UIDL text.

use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use uidl_core::{
    CHILDREN_KEY, KEYWORD_KEY, Position, RawAttribute, RawCommand, SUPPORTED_VERSION, Value,
    child_path,
};

use crate::combinator::{is_identifier, is_name_char};
use crate::error::ParseError;

/// Key of the optional top-level version entry.
pub const VERSION_KEY: &str = "version";

/// A JSON value with object entries kept in source order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JsonValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(Vec<(String, JsonValue)>),
}

impl JsonValue {
    fn kind_name(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "bool",
            JsonValue::Integer(_) => "integer",
            JsonValue::Float(_) => "float",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }
}

impl<'de> Deserialize<'de> for JsonValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(JsonValueVisitor)
    }
}

struct JsonValueVisitor;

impl<'de> Visitor<'de> for JsonValueVisitor {
    type Value = JsonValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E>(self) -> Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_none<E>(self) -> Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_bool<E>(self, v: bool) -> Result<JsonValue, E> {
        Ok(JsonValue::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<JsonValue, E> {
        Ok(JsonValue::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<JsonValue, E> {
        Ok(match i64::try_from(v) {
            Ok(n) => JsonValue::Integer(n),
            Err(_) => JsonValue::Float(v as f64),
        })
    }

    fn visit_f64<E>(self, v: f64) -> Result<JsonValue, E> {
        Ok(JsonValue::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<JsonValue, E> {
        Ok(JsonValue::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<JsonValue, E> {
        Ok(JsonValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<JsonValue, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(JsonValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JsonValue, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, JsonValue>()? {
            entries.push((key, value));
        }
        Ok(JsonValue::Object(entries))
    }
}

/// Blanks comments and trailing commas, keeping every byte offset.
pub(crate) fn relax(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'#' => i = blank_until_newline(&mut out, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = blank_until_newline(&mut out, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = source[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |idx| i + 2 + idx + 2);
                blank(&mut out, i, end);
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    // Second pass over the comment-free text: drop commas before `}`/`]`.
    let mut in_string = false;
    let mut i = 0;
    while i < out.len() {
        let b = out[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b',' {
            let next = out[i + 1..].iter().find(|c| !c.is_ascii_whitespace());
            if matches!(next, Some(b'}') | Some(b']')) {
                out[i] = b' ';
            }
        }
        i += 1;
    }

    // Blanked ranges always cover whole characters.
    String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

fn blank_until_newline(out: &mut [u8], start: usize) -> usize {
    let end = out[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(out.len(), |idx| start + idx);
    blank(out, start, end);
    end
}

fn blank(out: &mut [u8], start: usize, end: usize) {
    for b in &mut out[start..end] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

/// Converts serde_json's one-based line and byte column into a position.
fn position_at(source: &str, line: usize, column: usize) -> Position {
    let line_start = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum::<usize>();
    let line_start = line_start.min(source.len());
    let mut offset = (line_start + column.saturating_sub(1)).min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let column = source[line_start..offset].chars().count() + 1;
    Position::new(offset, line.max(1), column)
}

/// Strips serde_json's trailing " at line L column C".
fn bare_message(err: &serde_json::Error) -> String {
    let text = err.to_string();
    match text.rfind(" at line ") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}

/// Parses relaxed JSON into raw commands, reporting shape problems.
pub(crate) fn document(source: &str, errors: &mut Vec<ParseError>) -> Vec<RawCommand> {
    let relaxed = relax(source);
    let root: JsonValue = match serde_json::from_str(&relaxed) {
        Ok(root) => root,
        Err(err) => {
            let position = (err.line() > 0).then(|| position_at(source, err.line(), err.column()));
            errors.push(ParseError::json(position, bare_message(&err)));
            return Vec::new();
        }
    };

    let JsonValue::Object(entries) = root else {
        errors.push(ParseError::json(
            None,
            format!("top-level value must be an object, found {}", root.kind_name()),
        ));
        return Vec::new();
    };

    let mut commands = Vec::new();
    for (name, value) in entries {
        if name == VERSION_KEY && !matches!(value, JsonValue::Object(_)) {
            check_version(&value, errors);
            continue;
        }
        if let Some(command) = command(name, value, None, errors) {
            commands.push(command);
        }
    }

    if commands.is_empty() && errors.is_empty() {
        errors.push(ParseError::json(None, "document contains no commands"));
    }
    commands
}

fn check_version(value: &JsonValue, errors: &mut Vec<ParseError>) {
    match value {
        JsonValue::Integer(n) if u64::try_from(*n) == Ok(SUPPORTED_VERSION) => {}
        JsonValue::Integer(n) if *n >= 0 => errors.push(ParseError::UnsupportedVersion {
            found: n.unsigned_abs(),
            position: None,
        }),
        other => errors.push(ParseError::json(
            None,
            format!("'version' must be a non-negative integer, found {}", other.kind_name()),
        )),
    }
}

fn command(
    name: String,
    value: JsonValue,
    parent: Option<&str>,
    errors: &mut Vec<ParseError>,
) -> Option<RawCommand> {
    let path = child_path(parent, &name);
    let JsonValue::Object(fields) = value else {
        errors.push(ParseError::json(
            None,
            format!("command '{path}' must be an object, found {}", value.kind_name()),
        ));
        return None;
    };

    // Empty names and keywords are left to the canonicalizer.
    let mut valid = true;
    if !name.chars().all(is_name_char) {
        errors.push(ParseError::json(
            None,
            format!("command '{path}': name is not a valid UIDL command name"),
        ));
        valid = false;
    }

    let mut keyword: Option<String> = None;
    let mut attributes = Vec::new();
    let mut body: Option<Vec<RawCommand>> = None;

    for (key, field) in fields {
        match key.as_str() {
            KEYWORD_KEY => match field {
                JsonValue::String(_) if keyword.is_some() => {
                    errors.push(duplicate_key(&path, &key));
                }
                JsonValue::String(s) => keyword = Some(s),
                other => errors.push(ParseError::json(
                    None,
                    format!("command '{path}': 'keyword' must be a string, found {}", other.kind_name()),
                )),
            },
            CHILDREN_KEY => match field {
                JsonValue::Object(_) if body.is_some() => {
                    errors.push(duplicate_key(&path, &key));
                }
                JsonValue::Object(children) => body = Some(child_commands(&path, children, errors)),
                other => errors.push(ParseError::json(
                    None,
                    format!("command '{path}': 'children' must be an object, found {}", other.kind_name()),
                )),
            },
            _ if !is_identifier(&key) => errors.push(ParseError::json(
                None,
                format!("command '{path}': attribute key '{key}' is not a valid identifier"),
            )),
            _ => match attribute_value(field) {
                Ok(value) => attributes.push(RawAttribute::new(key, value)),
                Err(found) => errors.push(ParseError::json(
                    None,
                    format!("command '{path}': attribute '{key}' cannot be {found}"),
                )),
            },
        }
    }

    let Some(keyword) = keyword else {
        errors.push(ParseError::json(
            None,
            format!("command '{path}' has no 'keyword'"),
        ));
        return None;
    };
    if !keyword.is_empty() && !is_identifier(&keyword) {
        errors.push(ParseError::json(
            None,
            format!("command '{path}': keyword '{keyword}' is not a valid identifier"),
        ));
        valid = false;
    }
    if !valid {
        return None;
    }

    Some(RawCommand {
        name,
        keyword,
        position: None,
        attributes,
        body,
    })
}

fn child_commands(
    path: &str,
    children: Vec<(String, JsonValue)>,
    errors: &mut Vec<ParseError>,
) -> Vec<RawCommand> {
    if children.is_empty() {
        errors.push(ParseError::json(
            None,
            format!("command '{path}': 'children' must contain at least one command"),
        ));
    }
    children
        .into_iter()
        .filter_map(|(name, value)| command(name, value, Some(path), errors))
        .collect()
}

fn duplicate_key(path: &str, key: &str) -> ParseError {
    ParseError::json(None, format!("command '{path}': duplicate key '{key}'"))
}

/// Converts a literal; the error names the unsupported JSON kind.
fn attribute_value(value: JsonValue) -> Result<Value, &'static str> {
    match value {
        JsonValue::String(s) => Ok(Value::String(s)),
        JsonValue::Bool(b) => Ok(Value::Bool(b)),
        JsonValue::Integer(n) => Ok(Value::Integer(n)),
        JsonValue::Float(x) => Ok(Value::Float(x)),
        JsonValue::Array(items) => items
            .into_iter()
            .map(attribute_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        JsonValue::Null => Err("null"),
        JsonValue::Object(_) => Err("an object (only 'children' may nest commands)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Vec<RawCommand>, Vec<ParseError>) {
        let mut errors = Vec::new();
        let commands = document(source, &mut errors);
        (commands, errors)
    }

    #[test]
    fn test_relax_blanks_comments_and_trailing_commas() {
        let source = "{ // note\n  \"a\": [1, 2,], # x\n  /* y\n */ \"b\": \"//,\" ,}";
        let relaxed = relax(source);
        assert_eq!(relaxed.len(), source.len());
        assert_eq!(relaxed.lines().count(), source.lines().count());
        let value: JsonValue = serde_json::from_str(&relaxed).unwrap();
        assert_eq!(
            value,
            JsonValue::Object(vec![
                (
                    "a".to_string(),
                    JsonValue::Array(vec![JsonValue::Integer(1), JsonValue::Integer(2)])
                ),
                ("b".to_string(), JsonValue::String("//,".to_string())),
            ])
        );
    }

    #[test]
    fn test_visitor_keeps_order_and_duplicates() {
        let value: JsonValue = serde_json::from_str(r#"{"z": 1, "a": 2.5, "z": null}"#).unwrap();
        assert_eq!(
            value,
            JsonValue::Object(vec![
                ("z".to_string(), JsonValue::Integer(1)),
                ("a".to_string(), JsonValue::Float(2.5)),
                ("z".to_string(), JsonValue::Null),
            ])
        );
    }

    #[test]
    fn test_document_builds_raw_commands() {
        let (commands, errors) = parse(
            r#"{
                "version": 1,
                "confirm1": {
                    "keyword": "dialog",
                    "type": "confirmation",
                    "message": "Q",
                    "children": {
                        "ok": {"keyword": "action", "type": "exit", "code": 0},
                    },
                },
            }"#,
        );
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(commands.len(), 1);
        let confirm = &commands[0];
        assert_eq!(confirm.keyword, "dialog");
        assert_eq!(confirm.attributes[0].key, "type");
        assert_eq!(confirm.body.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_document_reports_shape_problems() {
        let (commands, errors) = parse(
            r#"{"a": {"type": "info"}, "b": 3, "c": {"keyword": "x", "n": null, "o": {}}}"#,
        );
        assert_eq!(commands.len(), 1);
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "command 'a' has no 'keyword'",
                "command 'b' must be an object, found integer",
                "command 'c': attribute 'n' cannot be null",
                "command 'c': attribute 'o' cannot be an object (only 'children' may nest commands)",
            ]
        );
    }

    #[test]
    fn test_document_rejects_names_the_grammar_cannot_express() {
        let (commands, errors) = parse(
            r#"{
                "my dialog": {"keyword": "dialog"},
                "w": {"keyword": "main-window"},
                "ok": {"keyword": "dialog", "max-width": 3, "title": "T"}
            }"#,
        );
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name, "ok");
        assert_eq!(commands[0].attributes.len(), 1);
        assert!(errors.iter().all(|e| matches!(e, ParseError::Json { .. })));
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "command 'my dialog': name is not a valid UIDL command name",
                "command 'w': keyword 'main-window' is not a valid identifier",
                "command 'ok': attribute key 'max-width' is not a valid identifier",
            ]
        );
    }

    #[test]
    fn test_version_entry() {
        let (_, errors) = parse(r#"{"version": 3, "a": {"keyword": "dialog"}}"#);
        assert!(matches!(
            errors[..],
            [ParseError::UnsupportedVersion { found: 3, .. }]
        ));
    }

    #[test]
    fn test_syntax_error_position() {
        let (commands, errors) = parse("{\n  \"a\": {\"keyword\": }\n}");
        assert!(commands.is_empty());
        let position = errors[0].position().unwrap();
        assert_eq!(position.line, 2);
        assert!(matches!(errors[0], ParseError::Json { .. }));
    }
}
