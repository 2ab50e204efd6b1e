//! # Arithmetic Atoms
//!
//! Integer arithmetic stays integral and is overflow-checked; mixing an
//! integer with a real yields a real. Several arithmetic spellings also have
//! text, list or mapping meanings, which are delegated to the sibling
//! modules.
//!
//! ## Atoms Provided
//!
//! - **Arithmetic**: `+`, `-`, `*`, `/`, `//`, `%`, `**`
//! - **Unary**: `-`, `+`

use crate::ast::value::Value;
use crate::ast::BinaryOp;
use crate::atoms::{collections, mismatch, string, AtomRegistry, BinaryAtomFn};
use crate::errors::ErrorKind;

// ============================================================================
// HELPERS
// ============================================================================

fn real_pair(lhs: &Value, rhs: &Value) -> Option<(f64, f64)> {
    Some((lhs.as_real()?, rhs.as_real()?))
}

pub fn overflow(operation: &str) -> ErrorKind {
    ErrorKind::InvalidValue {
        message: format!("integer overflow in '{operation}'"),
    }
}

fn checked(result: Option<i64>, operation: &str) -> Result<Value, ErrorKind> {
    result.map(Value::Int).ok_or_else(|| overflow(operation))
}

fn division_by_zero(operation: &str) -> ErrorKind {
    ErrorKind::DivisionByZero {
        operation: operation.to_string(),
    }
}

/// Floor division with the sign conventions of the expression language:
/// the quotient rounds toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Remainder taking the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn real_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

// ============================================================================
// ARITHMETIC OPERATIONS
// ============================================================================

/// Adds numbers, concatenates text and lists, and merges mappings.
///
/// Usage: <a> + <b>
///   - numbers: sum (integer if both are integers)
///   - text and anything: concatenation, the other side rendered as text
///   - two lists: concatenation
///   - two mappings: union, right-hand values win
///
/// Example:
///   "gold: " + 3 ; => "gold: 3"
pub const ATOM_ADD: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(a), Value::Int(b)) => checked(a.checked_add(*b), "+"),
    (Value::Text(a), other) => Ok(Value::Text(format!("{a}{other}"))),
    (other, Value::Text(b)) => Ok(Value::Text(format!("{other}{b}"))),
    (Value::List(a), Value::List(b)) => Ok(collections::concat(a, b)),
    (Value::Map(a), Value::Map(b)) => Ok(collections::union(a, b, true)),
    _ => match real_pair(lhs, rhs) {
        Some((a, b)) => Ok(Value::Real(a + b)),
        None => Err(mismatch("+", &[lhs, rhs])),
    },
};

/// Subtracts numbers, removes substrings, or takes a mapping difference.
///
/// Usage: <a> - <b>
///   - text minus text: every occurrence of <b> removed
///   - mapping minus mapping: keys only in <a>
///
/// Example:
///   "banana" - "an" ; => "ba"
pub const ATOM_SUB: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(a), Value::Int(b)) => checked(a.checked_sub(*b), "-"),
    (Value::Text(a), Value::Text(b)) => Ok(Value::Text(string::remove_all(a, b))),
    (Value::Map(a), Value::Map(b)) => Ok(collections::difference(a, b)),
    _ => match real_pair(lhs, rhs) {
        Some((a, b)) => Ok(Value::Real(a - b)),
        None => Err(mismatch("-", &[lhs, rhs])),
    },
};

/// Multiplies numbers or repeats text and lists.
///
/// Usage: <a> * <b>
///   - text or list times a non-negative integer: repetition
///
/// Example:
///   "ab" * 3 ; => "ababab"
pub const ATOM_MUL: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(a), Value::Int(b)) => checked(a.checked_mul(*b), "*"),
    (Value::Text(s), Value::Int(n)) | (Value::Int(n), Value::Text(s)) => string::repeat(s, *n),
    (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
        collections::repeat(items, *n)
    }
    _ => match real_pair(lhs, rhs) {
        Some((a, b)) => Ok(Value::Real(a * b)),
        None => Err(mismatch("*", &[lhs, rhs])),
    },
};

/// Divides numbers, or tests for a regular-expression match.
///
/// Usage: <a> / <b>
///   - numbers: quotient; integer when both are integers and it is exact
///   - text / pattern: true if the pattern matches anywhere in the text
///   - list / value: true if the value is an element of the list
///
/// Example:
///   "the red door" / "r[aeiou]d" ; => true
pub const ATOM_DIV: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(_), Value::Int(0)) => Err(division_by_zero("/")),
    (Value::Int(a), Value::Int(b)) if a.checked_rem(*b) == Some(0) => checked(a.checked_div(*b), "/"),
    (Value::Text(text), Value::Text(pattern)) => string::regex_search(text, pattern),
    (Value::List(items), needle) => Ok(collections::contains(items, needle)),
    _ => match real_pair(lhs, rhs) {
        Some((_, b)) if b == 0.0 => Err(division_by_zero("/")),
        Some((a, b)) => Ok(Value::Real(a / b)),
        None => Err(mismatch("/", &[lhs, rhs])),
    },
};

/// Floor-divides numbers, or tests for a literal substring.
///
/// Usage: <a> // <b>
///   - text // text: true if <b> occurs in <a>
///   - list // value: true if the value is an element of the list
///
/// Example:
///   7 // 2 ; => 3
pub const ATOM_FLOOR_DIV: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(_), Value::Int(0)) => Err(division_by_zero("//")),
    (Value::Int(a), Value::Int(b)) => checked(floor_div(*a, *b), "//"),
    (Value::Text(text), Value::Text(needle)) => Ok(Value::Bool(text.contains(needle.as_str()))),
    (Value::List(items), needle) => Ok(collections::contains(items, needle)),
    _ => match real_pair(lhs, rhs) {
        Some((_, b)) if b == 0.0 => Err(division_by_zero("//")),
        Some((a, b)) => Ok(Value::Real((a / b).floor())),
        None => Err(mismatch("//", &[lhs, rhs])),
    },
};

/// Remainder of a floor division. Text replacement with `%` needs a third
/// operand and lives in the string atoms.
///
/// Example:
///   -7 % 3 ; => 2
pub const ATOM_MOD: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(_), Value::Int(0)) => Err(division_by_zero("%")),
    (Value::Int(a), Value::Int(b)) => checked(floor_mod(*a, *b), "%"),
    _ => match real_pair(lhs, rhs) {
        Some((_, b)) if b == 0.0 => Err(division_by_zero("%")),
        Some((a, b)) => Ok(Value::Real(real_mod(a, b))),
        None => Err(mismatch("%", &[lhs, rhs])),
    },
};

/// Raises <a> to the power <b>.
///
/// Integers with a non-negative integer exponent stay integral.
///
/// Example:
///   2 ** 10 ; => 1024
pub const ATOM_POW: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(a), Value::Int(b)) if *b >= 0 => {
        let exp = u32::try_from(*b).map_err(|_| overflow("**"))?;
        checked(a.checked_pow(exp), "**")
    }
    _ => match real_pair(lhs, rhs) {
        Some((a, b)) => Ok(Value::Real(a.powf(b))),
        None => Err(mismatch("**", &[lhs, rhs])),
    },
};

// ============================================================================
// UNARY OPERATIONS
// ============================================================================

pub fn negate(operand: &Value) -> Result<Value, ErrorKind> {
    match operand {
        Value::Int(n) => checked(n.checked_neg(), "-"),
        Value::Real(x) => Ok(Value::Real(-x)),
        other => Err(mismatch("-", &[other])),
    }
}

pub fn identity(operand: &Value) -> Result<Value, ErrorKind> {
    match operand {
        Value::Int(_) | Value::Real(_) => Ok(operand.clone()),
        other => Err(mismatch("+", &[other])),
    }
}

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

pub fn register_math_atoms(registry: &mut AtomRegistry) {
    registry.register_binary(BinaryOp::Plus, ATOM_ADD);
    registry.register_binary(BinaryOp::Minus, ATOM_SUB);
    registry.register_binary(BinaryOp::Star, ATOM_MUL);
    registry.register_binary(BinaryOp::Slash, ATOM_DIV);
    registry.register_binary(BinaryOp::DoubleSlash, ATOM_FLOOR_DIV);
    registry.register_binary(BinaryOp::Percent, ATOM_MOD);
    registry.register_binary(BinaryOp::Power, ATOM_POW);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(ATOM_ADD(&Value::Int(2), &Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(ATOM_DIV(&Value::Int(6), &Value::Int(3)).unwrap().type_name(), "integer");
        assert_eq!(ATOM_DIV(&Value::Int(7), &Value::Int(2)).unwrap(), Value::Real(3.5));
        assert_eq!(ATOM_POW(&Value::Int(2), &Value::Int(10)).unwrap(), Value::Int(1024));
        assert_eq!(ATOM_POW(&Value::Int(2), &Value::Int(-1)).unwrap(), Value::Real(0.5));
    }

    #[test]
    fn floor_semantics_for_negative_operands() {
        assert_eq!(ATOM_FLOOR_DIV(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(ATOM_MOD(&Value::Int(-7), &Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(ATOM_MOD(&Value::Real(-1.5), &Value::Int(1)).unwrap(), Value::Real(0.5));
    }

    #[test]
    fn division_by_zero_is_a_value_error() {
        for atom in [ATOM_DIV, ATOM_FLOOR_DIV, ATOM_MOD] {
            let err = atom(&Value::Int(1), &Value::Int(0)).unwrap_err();
            assert!(matches!(err, ErrorKind::DivisionByZero { .. }));
        }
        assert!(ATOM_DIV(&Value::Real(1.0), &Value::Real(0.0)).is_err());
    }

    #[test]
    fn overflow_is_reported() {
        assert!(ATOM_ADD(&Value::Int(i64::MAX), &Value::Int(1)).is_err());
        assert!(negate(&Value::Int(i64::MIN)).is_err());
    }

    #[test]
    fn text_arithmetic() {
        assert_eq!(
            ATOM_ADD(&Value::from("n="), &Value::Real(2.0)).unwrap(),
            Value::from("n=2.0")
        );
        assert_eq!(
            ATOM_SUB(&Value::from("banana"), &Value::from("an")).unwrap(),
            Value::from("ba")
        );
        assert_eq!(ATOM_MUL(&Value::Int(2), &Value::from("ab")).unwrap(), Value::from("abab"));
        assert!(ATOM_MUL(&Value::from("ab"), &Value::Int(-1)).is_err());
    }

    #[test]
    fn arithmetic_on_mappings_is_rejected() {
        let map = Value::Map(Default::default());
        assert!(matches!(
            ATOM_MUL(&map, &Value::Int(1)),
            Err(ErrorKind::TypeMismatch { .. })
        ));
    }
}
