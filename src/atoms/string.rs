//! # Text Atoms
//!
//! Search, replace and split over text. The single-character spellings take
//! regular expressions (`regex` crate syntax); the doubled spellings take
//! literal text.
//!
//! ## Atoms Provided
//!
//! - **Split**: `^` (regex), `^^` (literal)
//! - **Replace**: `% pattern ~ replacement` (regex), `%% pattern ~ replacement` (literal)
//!
//! The `/` and `//` containment tests live with the arithmetic atoms that
//! share their spelling and call into [`regex_search`].

use regex::Regex;

use crate::ast::value::Value;
use crate::ast::BinaryOp;
use crate::atoms::{logic, mismatch, repeat_count, AtomRegistry, BinaryAtomFn, TernaryAtomFn};
use crate::errors::ErrorKind;

// ============================================================================
// HELPERS
// ============================================================================

pub fn compile(pattern: &str) -> Result<Regex, ErrorKind> {
    Regex::new(pattern).map_err(|e| ErrorKind::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Compiles `pattern` so that it only matches a whole string.
fn compile_anchored(pattern: &str) -> Result<Regex, ErrorKind> {
    compile(pattern)?;
    compile(&format!("^(?:{pattern})$"))
}

pub fn regex_search(text: &str, pattern: &str) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(compile(pattern)?.is_match(text)))
}

pub fn remove_all(text: &str, needle: &str) -> String {
    if needle.is_empty() {
        return text.to_string();
    }
    text.replace(needle, "")
}

pub fn repeat(text: &str, count: i64) -> Result<Value, ErrorKind> {
    let count = repeat_count(text.len(), count, "text")?;
    Ok(Value::Text(text.repeat(count)))
}

/// Rewrites a replacement template written with `\1`-style group references
/// into the `${1}` form the regex engine expects. A literal `$` stays literal.
pub fn translate_replacement(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

fn text_operand<'v>(operation: &str, value: &'v Value) -> Result<&'v str, ErrorKind> {
    value.as_str().ok_or_else(|| ErrorKind::ExpectedKind {
        expected: format!("text pattern for '{operation}'"),
        actual: value.type_name().into(),
    })
}

// ============================================================================
// SPLIT OPERATIONS
// ============================================================================

/// Splits text on every match of a regular expression. Empty pieces are kept.
///
/// Usage: <text> ^ <pattern>
///   - integers and booleans: exclusive or
///
/// Example:
///   "a.b" ^ "." ; => ["", "", "", ""]
pub const ATOM_SPLIT: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Text(text), Value::Text(pattern)) => {
        let re = compile(pattern)?;
        Ok(Value::List(
            re.split(text).map(Value::from).collect(),
        ))
    }
    _ => logic::xor(lhs, rhs).ok_or_else(|| mismatch("^", &[lhs, rhs])),
};

/// Splits text on a literal delimiter. Runs of the delimiter coalesce: only
/// a leading or trailing empty piece survives.
///
/// Usage: <text> ^^ <delimiter>
///
/// Example:
///   "a..b" ^^ "." ; => ["a", "b"]
pub const ATOM_SPLIT_LITERAL: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Text(text), Value::Text(delimiter)) => {
        if delimiter.is_empty() {
            return Err(ErrorKind::InvalidValue {
                message: "cannot split on an empty delimiter".into(),
            });
        }
        let pieces: Vec<&str> = text.split(delimiter.as_str()).collect();
        let last = pieces.len() - 1;
        Ok(Value::List(
            pieces
                .into_iter()
                .enumerate()
                .filter(|(i, piece)| *i == 0 || *i == last || !piece.is_empty())
                .map(|(_, piece)| Value::from(piece))
                .collect(),
        ))
    }
    _ => Err(mismatch("^^", &[lhs, rhs])),
};

// ============================================================================
// REPLACE OPERATIONS
// ============================================================================

/// Regex replace-all. On a list, every text element the pattern matches in
/// full is rewritten; other elements are kept.
///
/// Usage: <text> % <pattern> ~ <replacement>
///   - <replacement> may refer to groups as `\1`, `\2`, ...
///
/// Example:
///   "John Smith" % "(\w+) (\w+)" ~ "\2, \1" ; => "Smith, John"
pub const ATOM_REPLACE: TernaryAtomFn = |target, pattern, replacement| {
    let pattern = text_operand("%", pattern)?;
    let template = translate_replacement(&replacement.to_string());
    match target {
        Value::Text(text) => {
            let re = compile(pattern)?;
            Ok(Value::Text(re.replace_all(text, template.as_str()).into_owned()))
        }
        Value::List(items) => {
            let re = compile_anchored(pattern)?;
            Ok(Value::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Text(s) if re.is_match(s) => {
                            Value::Text(re.replace(s, template.as_str()).into_owned())
                        }
                        other => other.clone(),
                    })
                    .collect(),
            ))
        }
        other => Err(mismatch("% ~", &[other])),
    }
};

/// Literal replace-all. On a list, elements equal to the pattern are
/// replaced by the replacement value.
///
/// Usage: <text> %% <pattern> ~ <replacement>
///
/// Example:
///   "a-b-c" %% "-" ~ "+" ; => "a+b+c"
pub const ATOM_REPLACE_LITERAL: TernaryAtomFn = |target, pattern, replacement| match target {
    Value::Text(text) => {
        let pattern = text_operand("%%", pattern)?;
        Ok(Value::Text(text.replace(pattern, &replacement.to_string())))
    }
    Value::List(items) => Ok(Value::List(
        items
            .iter()
            .map(|item| {
                if item == pattern {
                    replacement.clone()
                } else {
                    item.clone()
                }
            })
            .collect(),
    )),
    other => Err(mismatch("%% ~", &[other])),
};

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

pub fn register_string_atoms(registry: &mut AtomRegistry) {
    registry.register_binary(BinaryOp::Caret, ATOM_SPLIT);
    registry.register_binary(BinaryOp::DoubleCaret, ATOM_SPLIT_LITERAL);
    registry.register_ternary(BinaryOp::Percent, ATOM_REPLACE);
    registry.register_ternary(BinaryOp::DoublePercent, ATOM_REPLACE_LITERAL);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn regex_and_literal_split_differ() {
        assert_eq!(
            ATOM_SPLIT(&Value::from("a.b"), &Value::from(".")).unwrap(),
            texts(&["", "", "", ""])
        );
        assert_eq!(
            ATOM_SPLIT_LITERAL(&Value::from("a.b"), &Value::from(".")).unwrap(),
            texts(&["a", "b"])
        );
        assert_eq!(
            ATOM_SPLIT(&Value::from("abc def"), &Value::from(" ")).unwrap(),
            texts(&["abc", "def"])
        );
    }

    #[test]
    fn literal_split_keeps_outer_empties() {
        assert_eq!(
            ATOM_SPLIT_LITERAL(&Value::from(",a,,b,"), &Value::from(",")).unwrap(),
            texts(&["", "a", "b", ""])
        );
    }

    #[test]
    fn regex_replace_with_backreferences() {
        let out = ATOM_REPLACE(
            &Value::from("John Smith"),
            &Value::from(r"(\w+) (\w+)"),
            &Value::from(r"\2, \1"),
        )
        .unwrap();
        assert_eq!(out, Value::from("Smith, John"));
        let cost = ATOM_REPLACE(&Value::from("5"), &Value::from(r"\d"), &Value::from("$0")).unwrap();
        assert_eq!(cost, Value::from("$0"));
    }

    #[test]
    fn replace_on_lists() {
        let list = texts(&["cat", "catalog", "dog"]);
        assert_eq!(
            ATOM_REPLACE(&list, &Value::from("cat"), &Value::from("kitten")).unwrap(),
            texts(&["kitten", "catalog", "dog"])
        );
        let mixed = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
        assert_eq!(
            ATOM_REPLACE_LITERAL(&mixed, &Value::Int(1), &Value::Int(9)).unwrap(),
            Value::List(vec![Value::Int(9), Value::Int(2), Value::Int(9)])
        );
    }

    #[test]
    fn malformed_regex_is_a_value_error() {
        let err = ATOM_SPLIT(&Value::from("abc"), &Value::from("(")).unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidRegex { .. }));
        assert_eq!(err.category(), crate::errors::ErrorCategory::Value);
    }
}
