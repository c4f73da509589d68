//! Parser combinators over a position-tracking cursor.
//!
//! A parser is anything implementing [`Parser`]: a function from an
//! [`Input`] cursor and the shared [`ParseContext`] to either a value and
//! the advanced cursor, or a [`Failure`] carrying a position and message.
//! Closures and plain `fn`s are parsers, so recursive grammar rules are
//! written as ordinary functions.
//!
//! Failures are values, never panics. The only panic is a programmer error
//! caught at construction time: [`natural_number`] with a radix outside
//! `2..=36`.
//!
//! # Examples
//!
//! ```
//! use uidl_parser::combinator::*;
//!
//! let pair = sequence(
//!     (identifier(is_key_start, is_key_char), literal("="), signed_integer()),
//!     |(key, _, value), _| (key, value),
//! );
//!
//! let mut ctx = ParseContext::new();
//! let (rest, (key, value)) = pair.parse(Input::new("width=640)"), &mut ctx).unwrap();
//! assert_eq!((key, value), ("width", 640));
//! assert_eq!(rest.rest(), ")");
//! ```

use std::borrow::Cow;

use uidl_core::Position;

use crate::error::ParseError;

/// Immutable cursor into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Input<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Input<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Unconsumed text.
    pub fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    pub fn position(&self) -> Position {
        Position::new(self.offset, self.line, self.column)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.source.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consumes one character.
    pub fn bump(self) -> Option<(char, Input<'a>)> {
        let c = self.peek()?;
        Some((c, self.advance(c.len_utf8())))
    }

    /// Consumes `bytes` bytes, which must end on a character boundary.
    pub fn advance(self, bytes: usize) -> Input<'a> {
        let mut next = self;
        for c in self.rest()[..bytes].chars() {
            if c == '\n' {
                next.line += 1;
                next.column = 1;
            } else {
                next.column += 1;
            }
        }
        next.offset += bytes;
        next
    }

    /// Text between this cursor and a later one.
    pub fn slice_to(&self, end: &Input<'a>) -> &'a str {
        &self.source[self.offset..end.offset]
    }
}

/// Why a parser did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub position: Position,
    pub message: Cow<'static, str>,
}

impl From<Failure> for ParseError {
    fn from(failure: Failure) -> Self {
        ParseError::syntax(failure.position, failure.message)
    }
}

pub type PResult<'a, T> = Result<(Input<'a>, T), Failure>;

/// State shared by every parser during one parse.
///
/// Collects reported diagnostics and tracks the furthest failure seen since
/// the last [`reset_furthest`](Self::reset_furthest), which is usually the
/// most useful explanation of why a rule failed.
#[derive(Debug, Default)]
pub struct ParseContext {
    errors: Vec<ParseError>,
    furthest: Option<Failure>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a failure, remembering it if it is strictly further than
    /// anything seen so far.
    pub fn failure(
        &mut self,
        position: Position,
        message: impl Into<Cow<'static, str>>,
    ) -> Failure {
        self.record(
            Failure {
                position,
                message: message.into(),
            },
            false,
        )
    }

    /// Like [`failure`](Self::failure), but also replaces a failure
    /// recorded at the same position.
    pub fn relabel(&mut self, position: Position, message: &'static str) -> Failure {
        self.record(
            Failure {
                position,
                message: Cow::Borrowed(message),
            },
            true,
        )
    }

    fn record(&mut self, failure: Failure, replace_tie: bool) -> Failure {
        let further = self.furthest.as_ref().is_none_or(|best| {
            failure.position.offset > best.position.offset
                || (replace_tie && failure.position.offset == best.position.offset)
        });
        if further {
            self.furthest = Some(failure.clone());
        }
        failure
    }

    /// Records a diagnostic; parsing continues.
    pub fn report(&mut self, error: impl Into<ParseError>) {
        self.errors.push(error.into());
    }

    pub fn reset_furthest(&mut self) {
        self.furthest = None;
    }

    pub fn take_furthest(&mut self) -> Option<Failure> {
        self.furthest.take()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }
}

/// A parser producing `T`.
pub trait Parser<'a, T> {
    fn parse(&self, input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, T>;
}

impl<'a, T, F> Parser<'a, T> for F
where
    F: Fn(Input<'a>, &mut ParseContext) -> PResult<'a, T>,
{
    fn parse(&self, input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, T> {
        self(input, ctx)
    }
}

/// A tuple of parsers run one after another; see [`sequence`].
pub trait Sequence<'a, O> {
    fn parse_all(&self, input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, O>;
}

/// A tuple of parsers tried in order; see [`alternation`].
pub trait Alternation<'a, T> {
    fn parse_first(&self, input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, T>;
}

macro_rules! impl_sequence {
    ($($p:ident $t:ident $v:ident),+) => {
        impl<'a, $($p, $t),+> Sequence<'a, ($($t,)+)> for ($($p,)+)
        where
            $($p: Parser<'a, $t>),+
        {
            fn parse_all(&self, input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, ($($t,)+)> {
                let ($($v,)+) = self;
                let rest = input;
                $(let (rest, $v) = $v.parse(rest, ctx)?;)+
                Ok((rest, ($($v,)+)))
            }
        }
    };
}

impl_sequence!(P1 T1 v1);
impl_sequence!(P1 T1 v1, P2 T2 v2);
impl_sequence!(P1 T1 v1, P2 T2 v2, P3 T3 v3);
impl_sequence!(P1 T1 v1, P2 T2 v2, P3 T3 v3, P4 T4 v4);
impl_sequence!(P1 T1 v1, P2 T2 v2, P3 T3 v3, P4 T4 v4, P5 T5 v5);
impl_sequence!(P1 T1 v1, P2 T2 v2, P3 T3 v3, P4 T4 v4, P5 T5 v5, P6 T6 v6);
impl_sequence!(P1 T1 v1, P2 T2 v2, P3 T3 v3, P4 T4 v4, P5 T5 v5, P6 T6 v6, P7 T7 v7);

macro_rules! impl_alternation {
    ($first:ident $(, $p:ident)+) => {
        impl<'a, T, $first $(, $p)+> Alternation<'a, T> for ($first, $($p,)+)
        where
            $first: Parser<'a, T>,
            $($p: Parser<'a, T>,)+
        {
            #[allow(non_snake_case)]
            fn parse_first(&self, input: Input<'a>, ctx: &mut ParseContext) -> PResult<'a, T> {
                let ($first, $($p,)+) = self;
                let mut furthest = match $first.parse(input, ctx) {
                    Ok(done) => return Ok(done),
                    Err(failure) => failure,
                };
                $(
                    match $p.parse(input, ctx) {
                        Ok(done) => return Ok(done),
                        Err(failure) => {
                            if failure.position.offset >= furthest.position.offset {
                                furthest = failure;
                            }
                        }
                    }
                )+
                Err(furthest)
            }
        }
    };
}

impl_alternation!(A, B);
impl_alternation!(A, B, C);
impl_alternation!(A, B, C, D);
impl_alternation!(A, B, C, D, E);
impl_alternation!(A, B, C, D, E, F);

/// Runs every parser in order, aborting at the first failure, and passes
/// the tuple of results to `reducer`.
pub fn sequence<'a, S, O, R, F>(parsers: S, reducer: F) -> impl Parser<'a, R>
where
    S: Sequence<'a, O>,
    F: Fn(O, &mut ParseContext) -> R,
{
    move |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, R> {
        let (rest, values) = parsers.parse_all(input, ctx)?;
        Ok((rest, reducer(values, ctx)))
    }
}

/// Ordered choice: the first parser to succeed wins.
///
/// Order is significant. When every alternative fails, the failure that got
/// furthest into the input is returned; on a tie the later alternative's.
pub fn alternation<'a, A, T>(parsers: A) -> impl Parser<'a, T>
where
    A: Alternation<'a, T>,
{
    move |input: Input<'a>, ctx: &mut ParseContext| parsers.parse_first(input, ctx)
}

/// Applies `parser` until it fails or stops consuming input, then reduces
/// the collected values. Never fails.
pub fn repeat_zero_or_more<'a, P, T, R, F>(parser: P, reducer: F) -> impl Parser<'a, R>
where
    P: Parser<'a, T>,
    F: Fn(Vec<T>, &mut ParseContext) -> R,
{
    move |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, R> {
        let mut items = Vec::new();
        let mut rest = input;
        while let Ok((next, item)) = parser.parse(rest, ctx) {
            if next.offset() == rest.offset() {
                break;
            }
            items.push(item);
            rest = next;
        }
        Ok((rest, reducer(items, ctx)))
    }
}

/// Returns `None` without consuming input if `parser` fails. Never fails.
pub fn optional<'a, P, T>(parser: P) -> impl Parser<'a, Option<T>>
where
    P: Parser<'a, T>,
{
    move |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, Option<T>> {
        match parser.parse(input, ctx) {
            Ok((rest, value)) => Ok((rest, Some(value))),
            Err(_) => Ok((input, None)),
        }
    }
}

pub fn map<'a, P, T, U, F>(parser: P, f: F) -> impl Parser<'a, U>
where
    P: Parser<'a, T>,
    F: Fn(T) -> U,
{
    move |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, U> {
        let (rest, value) = parser.parse(input, ctx)?;
        Ok((rest, f(value)))
    }
}

/// Pairs the result with the position where it started.
pub fn located<'a, P, T>(parser: P) -> impl Parser<'a, (Position, T)>
where
    P: Parser<'a, T>,
{
    move |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, (Position, T)> {
        let (rest, value) = parser.parse(input, ctx)?;
        Ok((rest, (input.position(), value)))
    }
}

/// Replaces the message of a failure that did not get past the start.
pub fn labeled<'a, P, T>(parser: P, label: &'static str) -> impl Parser<'a, T>
where
    P: Parser<'a, T>,
{
    move |input: Input<'a>, ctx: &mut ParseContext| match parser.parse(input, ctx) {
        Err(failure) if failure.position.offset == input.offset() => {
            Err(ctx.relabel(failure.position, label))
        }
        other => other,
    }
}

/// Matches `text` exactly.
pub fn literal<'a>(text: &'static str) -> impl Parser<'a, &'a str> {
    move |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, &'a str> {
        if input.rest().starts_with(text) {
            let rest = input.advance(text.len());
            Ok((rest, input.slice_to(&rest)))
        } else {
            Err(ctx.failure(input.position(), format!("expected '{text}'")))
        }
    }
}

/// Matches one `lead` character followed by any number of `body`
/// characters.
pub fn identifier<'a>(lead: fn(char) -> bool, body: fn(char) -> bool) -> impl Parser<'a, &'a str> {
    move |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, &'a str> {
        let mut chars = input.rest().char_indices();
        match chars.next() {
            Some((_, c)) if lead(c) => {}
            _ => return Err(ctx.failure(input.position(), "expected identifier")),
        }
        let end = chars
            .find(|&(_, c)| !body(c))
            .map_or(input.rest().len(), |(idx, _)| idx);
        let rest = input.advance(end);
        Ok((rest, input.slice_to(&rest)))
    }
}

/// First character of a keyword or attribute key.
pub fn is_key_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Remaining characters of a keyword or attribute key.
pub fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `text` is a complete keyword or attribute key.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next().is_some_and(is_key_start) && chars.all(is_key_char)
}

/// Characters allowed in command names: any printable character that is
/// not whitespace or punctuation used by the grammar.
pub fn is_name_char(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_control()
        && !matches!(
            c,
            '(' | ')' | '{' | '}' | '[' | ']' | '=' | ',' | ';' | '#' | '"' | '`'
        )
}

/// Matches an unsigned integer in `radix`.
///
/// # Panics
///
/// Panics if `radix` is outside `2..=36`. That is a bug in the calling
/// grammar, not a property of the input.
pub fn natural_number<'a>(radix: u32) -> impl Parser<'a, u64> {
    assert!(
        (2..=36).contains(&radix),
        "natural_number: invalid radix {radix}"
    );
    move |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, u64> {
        let end = input
            .rest()
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(input.rest().len());
        if end == 0 {
            return Err(ctx.failure(input.position(), "expected a number"));
        }
        let rest = input.advance(end);
        match u64::from_str_radix(input.slice_to(&rest), radix) {
            Ok(n) => Ok((rest, n)),
            Err(_) => Err(ctx.failure(rest.position(), "number out of range")),
        }
    }
}

/// What a run of spacing contained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spacing {
    pub consumed: bool,
    pub newline: bool,
}

/// Consumes whitespace and `#` line comments.
pub fn skip_spacing(input: Input<'_>) -> (Input<'_>, Spacing) {
    let mut rest = input;
    let mut spacing = Spacing::default();
    loop {
        match rest.peek() {
            Some('#') => {
                let len = rest.rest().find('\n').unwrap_or(rest.rest().len());
                rest = rest.advance(len);
            }
            Some(c) if c.is_whitespace() => {
                spacing.newline |= c == '\n';
                rest = rest.advance(c.len_utf8());
            }
            _ => break,
        }
    }
    spacing.consumed = rest.offset() > input.offset();
    (rest, spacing)
}

/// Whitespace and comments; always succeeds.
pub fn spacing<'a>() -> impl Parser<'a, Spacing> {
    |input: Input<'a>, _ctx: &mut ParseContext| -> PResult<'a, Spacing> { Ok(skip_spacing(input)) }
}

/// Like [`spacing`], but at least one character must be consumed.
pub fn required_spacing<'a>() -> impl Parser<'a, Spacing> {
    |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, Spacing> {
        let (rest, spacing) = skip_spacing(input);
        if spacing.consumed {
            Ok((rest, spacing))
        } else {
            Err(ctx.failure(input.position(), "expected whitespace"))
        }
    }
}

/// Double-quoted string with C-style escapes.
///
/// Supported escapes: `\n \t \r \a \b \f \v \\ \" \' \?`, one to three
/// octal digits (`\0`, `\012`, `\377`), `\xHH`, `\uHHHH` and `\UHHHHHHHH`.
pub fn quoted_string<'a>() -> impl Parser<'a, String> {
    |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, String> {
        let Some(('"', mut rest)) = input.bump() else {
            return Err(ctx.failure(input.position(), "expected '\"'"));
        };
        let mut out = String::new();
        loop {
            let escape_start = rest;
            let Some((c, next)) = rest.bump() else {
                return Err(ctx.failure(
                    rest.position(),
                    format!("unterminated string starting at {}", input.position()),
                ));
            };
            rest = next;
            match c {
                '"' => return Ok((rest, out)),
                '\\' => {
                    let (next, decoded) = unescape(rest).ok_or_else(|| {
                        let shown = rest.peek().map(String::from).unwrap_or_default();
                        ctx.failure(
                            escape_start.position(),
                            format!("invalid escape sequence '\\{shown}'"),
                        )
                    })?;
                    out.push(decoded);
                    rest = next;
                }
                other => out.push(other),
            }
        }
    }
}

fn unescape(input: Input<'_>) -> Option<(Input<'_>, char)> {
    let (c, rest) = input.bump()?;
    let simple = match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0C}',
        'v' => '\u{0B}',
        '\\' | '"' | '\'' | '?' => c,
        '0'..='7' => return octal_escape(input),
        'x' => return hex_escape(rest, 2),
        'u' => return hex_escape(rest, 4),
        'U' => return hex_escape(rest, 8),
        _ => return None,
    };
    Some((rest, simple))
}

/// One to three octal digits, at most `\377`.
fn octal_escape(input: Input<'_>) -> Option<(Input<'_>, char)> {
    let digits = input
        .rest()
        .bytes()
        .take(3)
        .take_while(|b| (b'0'..=b'7').contains(b))
        .count();
    let code = u32::from_str_radix(&input.rest()[..digits], 8).ok()?;
    if code > 0o377 {
        return None;
    }
    Some((input.advance(digits), char::from_u32(code)?))
}

/// Exactly `len` hex digits naming a Unicode scalar value.
fn hex_escape(input: Input<'_>, len: usize) -> Option<(Input<'_>, char)> {
    let digits = input.rest().get(..len)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let code = u32::from_str_radix(digits, 16).ok()?;
    Some((input.advance(len), char::from_u32(code)?))
}

/// Back-quoted string taken verbatim; cannot contain a backtick.
pub fn raw_string<'a>() -> impl Parser<'a, String> {
    |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, String> {
        let Some(('`', body)) = input.bump() else {
            return Err(ctx.failure(input.position(), "expected '`'"));
        };
        match body.rest().find('`') {
            Some(len) => {
                let end = body.advance(len);
                Ok((end.advance(1), body.slice_to(&end).to_string()))
            }
            None => Err(ctx.failure(
                body.advance(body.rest().len()).position(),
                format!("unterminated raw string starting at {}", input.position()),
            )),
        }
    }
}

/// `true` or `false`, not followed by an identifier character.
pub fn boolean<'a>() -> impl Parser<'a, bool> {
    |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, bool> {
        for (text, value) in [("true", true), ("false", false)] {
            if let Some(after) = input.rest().strip_prefix(text) {
                if !after.starts_with(is_key_char) {
                    return Ok((input.advance(text.len()), value));
                }
            }
        }
        Err(ctx.failure(input.position(), "expected 'true' or 'false'"))
    }
}

fn sign_and_digits(input: Input<'_>) -> (Input<'_>, usize) {
    let rest = match input.peek() {
        Some('+') | Some('-') => input.advance(1),
        _ => input,
    };
    let digits = rest
        .rest()
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.rest().len());
    (rest.advance(digits), digits)
}

/// Optional sign, digits, a mandatory `.`, digits.
pub fn float_literal<'a>() -> impl Parser<'a, f64> {
    |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, f64> {
        let (after_int, int_digits) = sign_and_digits(input);
        if int_digits == 0 {
            return Err(ctx.failure(after_int.position(), "expected a digit"));
        }
        if after_int.peek() != Some('.') {
            return Err(ctx.failure(after_int.position(), "expected '.'"));
        }
        let after_dot = after_int.advance(1);
        let frac_digits = after_dot
            .rest()
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_dot.rest().len());
        if frac_digits == 0 {
            return Err(ctx.failure(after_dot.position(), "expected a digit after '.'"));
        }
        let rest = after_dot.advance(frac_digits);
        match input.slice_to(&rest).parse::<f64>() {
            Ok(x) => Ok((rest, x)),
            Err(_) => Err(ctx.failure(input.position(), "malformed float literal")),
        }
    }
}

/// Optional sign followed by decimal digits, as a 64-bit signed integer.
pub fn signed_integer<'a>() -> impl Parser<'a, i64> {
    |input: Input<'a>, ctx: &mut ParseContext| -> PResult<'a, i64> {
        let (rest, digits) = sign_and_digits(input);
        if digits == 0 {
            return Err(ctx.failure(rest.position(), "expected a digit"));
        }
        match input.slice_to(&rest).parse::<i64>() {
            Ok(n) => Ok((rest, n)),
            Err(_) => Err(ctx.failure(rest.position(), "integer literal out of range")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<'a, T>(parser: impl Parser<'a, T>, text: &'a str) -> (Result<(&'a str, T), Failure>, ParseContext) {
        let mut ctx = ParseContext::new();
        let result = parser
            .parse(Input::new(text), &mut ctx)
            .map(|(rest, value)| (rest.rest(), value));
        (result, ctx)
    }

    #[test]
    fn test_input_tracks_lines_and_columns() {
        let input = Input::new("ab\ncé d").advance(6);
        assert_eq!(input.position(), Position::new(6, 2, 3));
        assert_eq!(input.rest(), " d");
    }

    #[test]
    fn test_literal_and_failure_position() {
        let (ok, _) = run(literal("version"), "version 1");
        assert_eq!(ok.unwrap(), (" 1", "version"));

        let (err, mut ctx) = run(literal("{"), "(");
        let failure = err.unwrap_err();
        assert_eq!(failure.message, "expected '{'");
        assert_eq!(ctx.take_furthest(), Some(failure));
    }

    #[test]
    fn test_identifier_classes() {
        let (name, _) = run(identifier(is_name_char, is_name_char), "ok-1.a dialog");
        assert_eq!(name.unwrap(), (" dialog", "ok-1.a"));

        let (key, _) = run(identifier(is_key_start, is_key_char), "_tag2=1");
        assert_eq!(key.unwrap(), ("=1", "_tag2"));

        let (bad, _) = run(identifier(is_key_start, is_key_char), "9abc");
        assert!(bad.is_err());

        assert!(is_identifier("_max_width2"));
        assert!(!is_identifier("max-width"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_natural_number_radix() {
        let (n, _) = run(natural_number(10), "42 rest");
        assert_eq!(n.unwrap(), (" rest", 42));
        let (hex, _) = run(natural_number(16), "ff");
        assert_eq!(hex.unwrap().1, 255);
        let (overflow, _) = run(natural_number(10), "99999999999999999999999");
        assert_eq!(overflow.unwrap_err().message, "number out of range");
    }

    #[test]
    #[should_panic(expected = "invalid radix")]
    fn test_natural_number_rejects_bad_radix() {
        let _ = natural_number(1);
    }

    #[test]
    fn test_spacing_records_newlines_and_comments() {
        let (input, spacing) = skip_spacing(Input::new("  # note ; {\n\t x"));
        assert_eq!(input.rest(), "x");
        assert!(spacing.consumed && spacing.newline);

        let (_, inline) = skip_spacing(Input::new("   x"));
        assert!(inline.consumed && !inline.newline);

        let (none, _) = run(required_spacing(), "x");
        assert_eq!(none.unwrap_err().message, "expected whitespace");
    }

    #[test]
    fn test_quoted_string_escapes() {
        let (s, _) = run(quoted_string(), r#""a\"b\n\t\\\x41\U0001F600" tail"#);
        assert_eq!(s.unwrap(), (" tail", "a\"b\n\t\\A\u{1F600}".to_string()));

        let (bad, _) = run(quoted_string(), r#""bad \q""#);
        let failure = bad.unwrap_err();
        assert_eq!(failure.message, "invalid escape sequence '\\q'");
        assert_eq!(failure.position.column, 6);

        let (open, _) = run(quoted_string(), "\"never closed");
        assert!(open.unwrap_err().message.starts_with("unterminated string"));
    }

    #[test]
    fn test_quoted_string_octal_and_unicode_escapes() {
        let (s, _) = run(quoted_string(), r#""x\012y\101\0z""#);
        assert_eq!(s.unwrap().1, "x\nyA\0z");

        let (s, _) = run(quoted_string(), r#""\0\1234""#);
        assert_eq!(s.unwrap().1, "\0S4");

        let (s, _) = run(quoted_string(), r#""caf\u00e9 \U0001F600""#);
        assert_eq!(s.unwrap().1, "caf\u{e9} \u{1F600}");

        for bad in [r#""\400""#, r#""\u00g9""#, r#""\uD800""#, r#""\u{41}""#] {
            let (result, _) = run(quoted_string(), bad);
            assert!(
                result.unwrap_err().message.starts_with("invalid escape sequence"),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_raw_string_is_verbatim() {
        let (s, _) = run(raw_string(), r"`C:\path\n`,");
        assert_eq!(s.unwrap(), (",", r"C:\path\n".to_string()));
    }

    #[test]
    fn test_boolean_needs_word_boundary() {
        let (t, _) = run(boolean(), "true)");
        assert_eq!(t.unwrap(), (")", true));
        let (word, _) = run(boolean(), "trueish");
        assert!(word.is_err());
    }

    fn number<'a>() -> impl Parser<'a, String> {
        alternation((
            map(float_literal(), |x: f64| format!("float {x}")),
            map(signed_integer(), |n: i64| format!("int {n}")),
        ))
    }

    #[test]
    fn test_float_before_integer_alternation() {
        let (float, _) = run(number(), "1.5)");
        assert_eq!(float.unwrap(), (")", "float 1.5".to_string()));
        let (int, _) = run(number(), "-7)");
        assert_eq!(int.unwrap(), (")", "int -7".to_string()));
    }

    #[test]
    fn test_alternation_reports_furthest_failure() {
        let parser = alternation((
            map(literal("abc"), |_| ()),
            sequence((literal("a"), literal("x")), |_, _| ()),
        ));
        let (err, _) = run(parser, "ab");
        let failure = err.unwrap_err();
        assert_eq!(failure.position.offset, 1);
        assert_eq!(failure.message, "expected 'x'");
    }

    #[test]
    fn test_repeat_optional_and_labeled() {
        let digits = repeat_zero_or_more(
            sequence((signed_integer(), optional(literal(","))), |(n, _), _| n),
            |items, _| items,
        );
        let (all, _) = run(digits, "1,2,3;");
        assert_eq!(all.unwrap(), (";", vec![1, 2, 3]));

        let (absent, _) = run(optional(literal("x")), "y");
        assert_eq!(absent.unwrap(), ("y", None));

        let (err, mut ctx) = run(labeled(literal("("), "expected attribute list"), "x");
        assert_eq!(err.unwrap_err().message, "expected attribute list");
        assert_eq!(
            ctx.take_furthest().map(|f| f.message),
            Some(Cow::Borrowed("expected attribute list"))
        );
    }

    #[test]
    fn test_located_reports_start_position() {
        let parser = sequence((spacing(), located(literal("x"))), |(_, loc), _| loc);
        let (result, _) = run(parser, "\n  x");
        let (_, (pos, _)) = result.unwrap();
        assert_eq!(pos, Position::new(3, 2, 3));
    }
}
