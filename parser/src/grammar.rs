//! The UIDL document grammar.
//!
//! ```text
//! document   := spacing version commands
//! version    := ("version" | "v") WS natural spacing (";" spacing)?
//! commands   := command (separator command)* separator?
//! separator  := spacing ";" spacing | spacing-with-newline
//! command    := name WS keyword spacing attributes (spacing body)?
//! body       := "{" commands "}"
//! attributes := "(" [attribute ("," attribute)* ","?] ")"
//! attribute  := key "=" value
//! value      := string | raw-string | bool | float | integer | list
//! list       := "[" [value ("," value)* ","?] "]"
//! ```
//!
//! A failed command is reported at its furthest failure and skipped up to
//! the next separator, so one pass reports every broken command.

use uidl_core::{Position, RawAttribute, RawCommand, SUPPORTED_VERSION, Value};

use crate::combinator::{
    Input, PResult, ParseContext, Parser, alternation, boolean, float_literal, identifier,
    is_key_char, is_key_start, is_name_char, labeled, literal, located, map, natural_number,
    optional, quoted_string, raw_string, repeat_zero_or_more, required_spacing, sequence,
    signed_integer, skip_spacing, spacing,
};
use crate::error::ParseError;

/// Parses a whole document, reporting every problem into `ctx`.
pub(crate) fn document(source: &str, ctx: &mut ParseContext) -> Vec<RawCommand> {
    let (input, _) = skip_spacing(Input::new(source));

    let input = match version_header(input, ctx) {
        Ok((rest, (position, version))) => {
            if version != SUPPORTED_VERSION {
                ctx.report(ParseError::UnsupportedVersion {
                    found: version,
                    position: Some(position),
                });
            }
            rest
        }
        Err(_) => {
            ctx.report(ParseError::syntax(
                input.position(),
                format!("expected version header 'version {SUPPORTED_VERSION}'"),
            ));
            input
        }
    };

    let (_, commands) = command_list(input, ctx, None);
    commands
}

fn version_header<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, (Position, u64)> {
    sequence(
        (
            alternation((literal("version"), literal("v"))),
            required_spacing(),
            located(natural_number(10)),
            spacing(),
            optional(literal(";")),
            spacing(),
        ),
        |(_, _, version, _, _, _), _| version,
    )
    .parse(input, ctx)
}

fn at_end(input: Input<'_>, closing: Option<char>) -> bool {
    input.is_empty() || (closing.is_some() && input.peek() == closing)
}

/// One or more commands up to the end of input or the `closing` brace.
fn command_list<'a>(
    input: Input<'a>,
    ctx: &mut ParseContext,
    closing: Option<char>,
) -> (Input<'a>, Vec<RawCommand>) {
    let errors_before = ctx.error_count();
    let mut commands = Vec::new();
    let (mut input, _) = skip_spacing(input);

    while !at_end(input, closing) {
        ctx.reset_furthest();
        match command(input, ctx) {
            Ok((rest, parsed)) => {
                commands.push(parsed);
                input = match separator(rest, ctx) {
                    Ok((next, ())) => next,
                    Err(failure) => {
                        let (next, _) = skip_spacing(rest);
                        if !at_end(next, closing) {
                            ctx.report(failure);
                        }
                        next
                    }
                };
            }
            Err(failure) => {
                let failure = ctx.take_furthest().unwrap_or(failure);
                ctx.report(failure);
                let skipped = recover(input, closing);
                input = match separator(skipped, ctx) {
                    Ok((next, ())) => next,
                    Err(_) => skip_spacing(skipped).0,
                };
            }
        }
    }

    if commands.is_empty() && ctx.error_count() == errors_before {
        ctx.report(ParseError::syntax(input.position(), "expected at least one command"));
    }
    (input, commands)
}

fn separator<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, ()> {
    alternation((
        sequence((spacing(), literal(";"), spacing()), |_, _| ()),
        newline_spacing,
    ))
    .parse(input, ctx)
}

fn newline_spacing<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, ()> {
    let (rest, spacing) = skip_spacing(input);
    if spacing.newline {
        Ok((rest, ()))
    } else {
        Err(ctx.failure(
            rest.position(),
            "expected ';' or a newline between commands",
        ))
    }
}

/// Skips a broken command: stops at the next `;` or newline outside
/// brackets, or before the enclosing body's `}`.
fn recover(input: Input<'_>, closing: Option<char>) -> Input<'_> {
    let mut depth = 0usize;
    let mut rest = input;
    while let Some(c) = rest.peek() {
        match c {
            ';' | '\n' if depth == 0 => break,
            '}' if depth == 0 && closing.is_some() => break,
            '"' | '`' => {
                rest = skip_quoted(rest, c);
                continue;
            }
            '#' => {
                let len = rest.rest().find('\n').unwrap_or(rest.rest().len());
                rest = rest.advance(len);
                continue;
            }
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        rest = rest.advance(c.len_utf8());
    }
    rest
}

fn skip_quoted(input: Input<'_>, quote: char) -> Input<'_> {
    let body = input.advance(quote.len_utf8());
    let mut escaped = false;
    for (idx, c) in body.rest().char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && quote == '"' {
            escaped = true;
        } else if c == quote {
            return body.advance(idx + c.len_utf8());
        }
    }
    body.advance(body.rest().len())
}

fn command<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, RawCommand> {
    sequence(
        (
            located(labeled(
                identifier(is_name_char, is_name_char),
                "expected command name",
            )),
            required_spacing(),
            labeled(
                identifier(is_key_start, is_key_char),
                "expected command keyword",
            ),
            spacing(),
            labeled(attribute_list, "expected attribute list '('"),
            optional(sequence((spacing(), body), |(_, commands), _| commands)),
        ),
        |((position, name), _, keyword, _, attributes, body), _| RawCommand {
            name: String::from(name),
            keyword: String::from(keyword),
            position: Some(position),
            attributes,
            body,
        },
    )
    .parse(input, ctx)
}

/// Parses a body. Once `{` is seen the body is committed: problems inside
/// are reported and the body still yields the commands that parsed.
fn body<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, Vec<RawCommand>> {
    let (inner, _) = literal("{").parse(input, ctx)?;
    let (rest, commands) = command_list(inner, ctx, Some('}'));
    if rest.peek() == Some('}') {
        Ok((rest.advance(1), commands))
    } else {
        ctx.report(ParseError::syntax(input.position(), "unclosed '{'"));
        Ok((rest, commands))
    }
}

/// `open [item ("," item)* ","?] close`; the list may be empty.
fn delimited_list<'a, P, T>(
    open: &'static str,
    item: P,
    close: &'static str,
) -> impl Parser<'a, Vec<T>>
where
    P: Parser<'a, T> + Copy,
{
    let more = repeat_zero_or_more(
        sequence((spacing(), literal(","), spacing(), item), |(_, _, _, next), _| next),
        |items, _| items,
    );
    let items = sequence(
        (item, more, spacing(), optional(literal(","))),
        |(first, rest, _, _), _| prepend(first, rest),
    );
    sequence(
        (
            literal(open),
            spacing(),
            optional(items),
            spacing(),
            literal(close),
        ),
        |(_, _, items, _, _), _| Option::unwrap_or_default(items),
    )
}

fn prepend<T>(first: T, mut rest: Vec<T>) -> Vec<T> {
    rest.insert(0, first);
    rest
}

fn attribute_list<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, Vec<RawAttribute>> {
    delimited_list("(", attribute, ")").parse(input, ctx)
}

fn attribute<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, RawAttribute> {
    sequence(
        (
            located(labeled(
                identifier(is_key_start, is_key_char),
                "expected attribute name",
            )),
            spacing(),
            literal("="),
            spacing(),
            value,
        ),
        |((position, key), _, _, _, value), _| RawAttribute {
            key: String::from(key),
            value,
            position: Some(position),
        },
    )
    .parse(input, ctx)
}

/// Literal values, tried in this order. Floats come before integers so
/// `1.5` is never read as `1` followed by `.5`.
fn value<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, Value> {
    labeled(
        alternation((
            map(quoted_string(), Value::String),
            map(raw_string(), Value::String),
            map(boolean(), Value::Bool),
            map(float_literal(), Value::Float),
            map(signed_integer(), Value::Integer),
            map(list, Value::List),
        )),
        "expected a value",
    )
    .parse(input, ctx)
}

fn list<'a>(input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, Vec<Value>> {
    delimited_list("[", value, "]").parse(input, ctx)
}
