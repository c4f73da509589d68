//! Attribute value rules and checkers.
//!
//! A [`Checker`] is a pure function from a [`Value`] to either the accepted
//! (possibly coerced) value or a [`CheckError`]. Checkers are usually
//! compiled from a declarative [`ValueRule`], which is also the form schema
//! catalogs use on disk, but any closure can be wrapped with
//! [`Checker::new`].
//!
//! # Examples
//!
//! ```
//! use uidl_core::{Checker, CheckError, IntegerRule, StringRule, Value, ValueRule};
//!
//! let title = Checker::from_rule(&StringRule::new().min_len(1).into()).unwrap();
//! assert!(title.check(&Value::from("Hello")).is_ok());
//! assert!(matches!(title.check(&Value::from("")), Err(CheckError::TooShort { .. })));
//!
//! // Integral floats are accepted where integers are expected.
//! let width = Checker::from_rule(&ValueRule::from(IntegerRule::new().range(1, 100))).unwrap();
//! assert_eq!(width.check(&Value::from(40.0)).unwrap(), Value::Integer(40));
//! ```

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::SchemaError;
use crate::types::{Value, integral_float};

/// Why a value was rejected by a checker.
///
/// The `Display` text reads as a predicate on the attribute, e.g.
/// `attribute 'width' must be >= 1, found 0`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckError {
    /// The value has the wrong variant.
    #[error("must be {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A float with a fractional part where an integer is required.
    #[error("must be an integer, found fractional number {0}")]
    FractionalInteger(f64),
    #[error("must be at least {min} characters long, found {len}")]
    TooShort { min: usize, len: usize },
    #[error("must be at most {max} characters long, found {len}")]
    TooLong { max: usize, len: usize },
    #[error("must be >= {min}, found {found}")]
    BelowMinimum { min: String, found: String },
    #[error("must be <= {max}, found {found}")]
    AboveMaximum { max: String, found: String },
    #[error("must match pattern '{pattern}'")]
    PatternMismatch { pattern: String },
    #[error("must be one of [{}], found '{found}'", .allowed.join(", "))]
    NotAllowed { allowed: Vec<String>, found: String },
    #[error("must contain at least {min} items, found {len}")]
    TooFewItems { min: usize, len: usize },
    #[error("must contain at most {max} items, found {len}")]
    TooManyItems { max: usize, len: usize },
    /// A list element failed the item rule.
    #[error("item {index} {reason}")]
    Item {
        index: usize,
        reason: Box<CheckError>,
    },
    /// Free-form failure from a custom checker.
    #[error("{0}")]
    Custom(String),
}

/// Constraints on a string attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringRule {
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    /// Regular expression the whole value must match (anchor it yourself).
    pub pattern: Option<String>,
    /// Closed set of accepted values; empty means unrestricted.
    pub one_of: Vec<String>,
}

impl StringRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.one_of = allowed.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Constraints on an integer attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegerRule {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl IntegerRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }
}

/// Constraints on a floating-point attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatRule {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FloatRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }
}

/// Constraints on a list attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRule {
    pub item: Box<ValueRule>,
    #[serde(default)]
    pub min_len: Option<usize>,
    #[serde(default)]
    pub max_len: Option<usize>,
}

impl ListRule {
    pub fn of(item: impl Into<ValueRule>) -> Self {
        Self {
            item: Box::new(item.into()),
            min_len: None,
            max_len: None,
        }
    }

    pub fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }
}

/// Declarative description of an accepted attribute value.
///
/// Serialized with a `type` tag, e.g. `{ type: integer, min: 0, max: 255 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueRule {
    String(StringRule),
    Integer(IntegerRule),
    Float(FloatRule),
    Bool,
    List(ListRule),
    /// Any literal value.
    Any,
}

impl ValueRule {
    pub fn string() -> Self {
        ValueRule::String(StringRule::new())
    }

    pub fn integer() -> Self {
        ValueRule::Integer(IntegerRule::new())
    }

    pub fn float() -> Self {
        ValueRule::Float(FloatRule::new())
    }
}

impl From<StringRule> for ValueRule {
    fn from(rule: StringRule) -> Self {
        ValueRule::String(rule)
    }
}

impl From<IntegerRule> for ValueRule {
    fn from(rule: IntegerRule) -> Self {
        ValueRule::Integer(rule)
    }
}

impl From<FloatRule> for ValueRule {
    fn from(rule: FloatRule) -> Self {
        ValueRule::Float(rule)
    }
}

impl From<ListRule> for ValueRule {
    fn from(rule: ListRule) -> Self {
        ValueRule::List(rule)
    }
}

impl fmt::Display for ValueRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params: Vec<String> = Vec::new();
        let name = match self {
            ValueRule::String(rule) => {
                if let Some(min) = rule.min_len {
                    params.push(format!("min_len={min}"));
                }
                if let Some(max) = rule.max_len {
                    params.push(format!("max_len={max}"));
                }
                if let Some(pattern) = &rule.pattern {
                    params.push(format!("pattern={pattern}"));
                }
                if !rule.one_of.is_empty() {
                    params.push(format!("one_of={}", rule.one_of.join("|")));
                }
                "string"
            }
            ValueRule::Integer(rule) => {
                push_bounds(&mut params, rule.min, rule.max);
                "integer"
            }
            ValueRule::Float(rule) => {
                push_bounds(&mut params, rule.min, rule.max);
                "float"
            }
            ValueRule::Bool => "bool",
            ValueRule::List(rule) => {
                params.push(format!("item={}", rule.item));
                if let Some(min) = rule.min_len {
                    params.push(format!("min_len={min}"));
                }
                if let Some(max) = rule.max_len {
                    params.push(format!("max_len={max}"));
                }
                "list"
            }
            ValueRule::Any => "any",
        };

        if params.is_empty() {
            f.write_str(name)
        } else {
            write!(f, "{name}({})", params.join(", "))
        }
    }
}

fn push_bounds<T: fmt::Display>(params: &mut Vec<String>, min: Option<T>, max: Option<T>) {
    if let Some(min) = min {
        params.push(format!("min={min}"));
    }
    if let Some(max) = max {
        params.push(format!("max={max}"));
    }
}

/// Signature of a checker function.
pub type CheckFn = dyn Fn(&Value) -> Result<Value, CheckError> + Send + Sync;

/// A shareable, pure attribute checker with a human-readable label.
#[derive(Clone)]
pub struct Checker {
    label: String,
    check: Arc<CheckFn>,
}

impl Checker {
    /// Wraps an arbitrary checking function.
    pub fn new<F>(label: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, CheckError> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    /// Compiles a declarative rule.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidPattern`] if a string pattern (at any
    /// list nesting depth) is not a valid regular expression.
    pub fn from_rule(rule: &ValueRule) -> Result<Self, SchemaError> {
        let compiled = CompiledRule::compile(rule)?;
        Ok(Self::new(rule.to_string(), move |value| compiled.check(value)))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Checks a value, returning the accepted (possibly coerced) form.
    pub fn check(&self, value: &Value) -> Result<Value, CheckError> {
        (self.check)(value)
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checker").field("label", &self.label).finish()
    }
}

/// A [`ValueRule`] with its patterns compiled.
enum CompiledRule {
    String {
        rule: StringRule,
        pattern: Option<Regex>,
    },
    Integer(IntegerRule),
    Float(FloatRule),
    Bool,
    List {
        item: Box<CompiledRule>,
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Any,
}

impl CompiledRule {
    fn compile(rule: &ValueRule) -> Result<Self, SchemaError> {
        Ok(match rule {
            ValueRule::String(rule) => {
                let pattern = match &rule.pattern {
                    Some(pattern) => {
                        Some(
                            Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
                                pattern: pattern.clone(),
                                source,
                            })?,
                        )
                    }
                    None => None,
                };
                CompiledRule::String {
                    rule: rule.clone(),
                    pattern,
                }
            }
            ValueRule::Integer(rule) => CompiledRule::Integer(*rule),
            ValueRule::Float(rule) => CompiledRule::Float(*rule),
            ValueRule::Bool => CompiledRule::Bool,
            ValueRule::List(rule) => CompiledRule::List {
                item: Box::new(CompiledRule::compile(&rule.item)?),
                min_len: rule.min_len,
                max_len: rule.max_len,
            },
            ValueRule::Any => CompiledRule::Any,
        })
    }

    fn check(&self, value: &Value) -> Result<Value, CheckError> {
        match self {
            CompiledRule::String { rule, pattern } => {
                let Value::String(s) = value else {
                    return Err(mismatch("a string", value));
                };
                check_string(s, rule, pattern.as_ref())?;
                Ok(value.clone())
            }
            CompiledRule::Integer(rule) => {
                let n = match value {
                    Value::Integer(n) => *n,
                    Value::Float(f) => {
                        integral_float(*f).ok_or(CheckError::FractionalInteger(*f))?
                    }
                    other => return Err(mismatch("an integer", other)),
                };
                check_bounds(n, rule.min, rule.max)?;
                Ok(Value::Integer(n))
            }
            CompiledRule::Float(rule) => {
                let x = match value {
                    Value::Float(f) => *f,
                    Value::Integer(n) => *n as f64,
                    other => return Err(mismatch("a number", other)),
                };
                check_bounds(x, rule.min, rule.max)?;
                Ok(Value::Float(x))
            }
            CompiledRule::Bool => match value {
                Value::Bool(_) => Ok(value.clone()),
                other => Err(mismatch("a bool", other)),
            },
            CompiledRule::List {
                item,
                min_len,
                max_len,
            } => {
                let Value::List(items) = value else {
                    return Err(mismatch("a list", value));
                };
                if let Some(min) = *min_len {
                    if items.len() < min {
                        return Err(CheckError::TooFewItems {
                            min,
                            len: items.len(),
                        });
                    }
                }
                if let Some(max) = *max_len {
                    if items.len() > max {
                        return Err(CheckError::TooManyItems {
                            max,
                            len: items.len(),
                        });
                    }
                }
                items
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        item.check(element).map_err(|reason| CheckError::Item {
                            index,
                            reason: Box::new(reason),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            CompiledRule::Any => Ok(value.clone()),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> CheckError {
    CheckError::TypeMismatch {
        expected,
        found: found.kind_name(),
    }
}

fn check_string(s: &str, rule: &StringRule, pattern: Option<&Regex>) -> Result<(), CheckError> {
    let len = s.chars().count();
    if let Some(min) = rule.min_len {
        if len < min {
            return Err(CheckError::TooShort { min, len });
        }
    }
    if let Some(max) = rule.max_len {
        if len > max {
            return Err(CheckError::TooLong { max, len });
        }
    }
    if let Some(re) = pattern {
        if !re.is_match(s) {
            return Err(CheckError::PatternMismatch {
                pattern: re.as_str().to_string(),
            });
        }
    }
    if !rule.one_of.is_empty() && !rule.one_of.iter().any(|allowed| allowed == s) {
        return Err(CheckError::NotAllowed {
            allowed: rule.one_of.clone(),
            found: s.to_string(),
        });
    }
    Ok(())
}

fn check_bounds<T>(n: T, min: Option<T>, max: Option<T>) -> Result<(), CheckError>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if let Some(min) = min {
        if n < min {
            return Err(CheckError::BelowMinimum {
                min: min.to_string(),
                found: n.to_string(),
            });
        }
    }
    if let Some(max) = max {
        if n > max {
            return Err(CheckError::AboveMaximum {
                max: max.to_string(),
                found: n.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(rule: impl Into<ValueRule>) -> Checker {
        Checker::from_rule(&rule.into()).unwrap()
    }

    #[test]
    fn test_integer_rule_coerces_integral_float() {
        let checker = compile(IntegerRule::new());
        assert_eq!(checker.check(&Value::Float(7.0)).unwrap(), Value::Integer(7));
        assert_eq!(
            checker.check(&Value::Float(7.5)),
            Err(CheckError::FractionalInteger(7.5))
        );
        assert_eq!(
            checker.check(&Value::from("7")),
            Err(CheckError::TypeMismatch {
                expected: "an integer",
                found: "string"
            })
        );
    }

    #[test]
    fn test_integer_rule_enforces_range() {
        let checker = compile(IntegerRule::new().range(0, 255));
        assert!(checker.check(&Value::Integer(255)).is_ok());
        assert_eq!(
            checker.check(&Value::Integer(256)),
            Err(CheckError::AboveMaximum {
                max: "255".to_string(),
                found: "256".to_string()
            })
        );
        assert!(matches!(
            checker.check(&Value::Integer(-1)),
            Err(CheckError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn test_float_rule_widens_integers() {
        let checker = compile(FloatRule::new().range(0.0, 1.0));
        assert_eq!(checker.check(&Value::Integer(1)).unwrap(), Value::Float(1.0));
        assert!(checker.check(&Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_string_rule_length_pattern_and_choices() {
        let checker = compile(StringRule::new().min_len(2).max_len(4).pattern("^[a-z]+$"));
        assert!(checker.check(&Value::from("abc")).is_ok());
        assert!(matches!(
            checker.check(&Value::from("a")),
            Err(CheckError::TooShort { min: 2, len: 1 })
        ));
        assert!(matches!(
            checker.check(&Value::from("abcde")),
            Err(CheckError::TooLong { max: 4, len: 5 })
        ));
        assert!(matches!(
            checker.check(&Value::from("AB")),
            Err(CheckError::PatternMismatch { .. })
        ));

        let choices = compile(StringRule::new().one_of(&["left", "right"]));
        let err = choices.check(&Value::from("up")).unwrap_err();
        assert_eq!(err.to_string(), "must be one of [left, right], found 'up'");
    }

    #[test]
    fn test_list_rule_checks_items_and_coerces() {
        let checker = compile(ListRule::of(IntegerRule::new()).min_len(1));
        assert_eq!(
            checker
                .check(&Value::List(vec![Value::Float(1.0), Value::Integer(2)]))
                .unwrap(),
            Value::List(vec![Value::Integer(1), Value::Integer(2)])
        );
        assert!(matches!(
            checker.check(&Value::List(Vec::new())),
            Err(CheckError::TooFewItems { min: 1, len: 0 })
        ));
        let err = checker
            .check(&Value::List(vec![Value::Integer(1), Value::from("x")]))
            .unwrap_err();
        assert!(matches!(err, CheckError::Item { index: 1, .. }));
    }

    #[test]
    fn test_invalid_pattern_is_a_schema_error() {
        let result = Checker::from_rule(&StringRule::new().pattern("(unclosed").into());
        assert!(matches!(result, Err(SchemaError::InvalidPattern { .. })));
    }

    #[test]
    fn test_rule_labels() {
        assert_eq!(
            ValueRule::from(StringRule::new().min_len(1)).to_string(),
            "string(min_len=1)"
        );
        assert_eq!(
            ValueRule::from(ListRule::of(ValueRule::string())).to_string(),
            "list(item=string)"
        );
        assert_eq!(ValueRule::Bool.to_string(), "bool");
    }

    #[test]
    fn test_rule_deserializes_from_tagged_yaml() {
        let rule: ValueRule = serde_yaml::from_str("type: integer\nmin: 0\nmax: 255\n").unwrap();
        assert_eq!(rule, ValueRule::from(IntegerRule::new().range(0, 255)));

        let rule: ValueRule =
            serde_yaml::from_str("type: list\nitem:\n  type: string\nmin_len: 1\n").unwrap();
        assert_eq!(
            rule,
            ValueRule::from(ListRule::of(ValueRule::string()).min_len(1))
        );
    }
}
