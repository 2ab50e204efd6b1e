//! # Logic and Comparison Atoms
//!
//! ## Atoms Provided
//!
//! - **Equality**: `=`, `!=` (integers and reals compare by value)
//! - **Ordering**: `<`, `>`, `<=`, `>=`
//! - **Boolean**: `and`, `or` (return one of their operands)
//! - **Bitwise**: `&`, `|`, plus the integer half of `^`
//!
//! The evaluator short-circuits `and`/`or` itself; the atoms here are used
//! when folding a list with `| and seed` or `| or seed`.

use std::cmp::Ordering;

use crate::ast::value::Value;
use crate::ast::BinaryOp;
use crate::atoms::{collections, mismatch, AtomRegistry, BinaryAtomFn};
use crate::errors::ErrorKind;

fn ordering(operation: &str, lhs: &Value, rhs: &Value) -> Result<Ordering, ErrorKind> {
    lhs.compare(rhs).ok_or_else(|| mismatch(operation, &[lhs, rhs]))
}

// ============================================================================
// COMPARISON OPERATIONS
// ============================================================================

pub const ATOM_EQ: BinaryAtomFn = |lhs, rhs| Ok(Value::Bool(lhs == rhs));

pub const ATOM_NE: BinaryAtomFn = |lhs, rhs| Ok(Value::Bool(lhs != rhs));

/// Usage: <a> < <b>
///   - numbers, text (lexicographic), booleans, lists (element-wise)
///
/// Example:
///   "apple" < "banana" ; => true
pub const ATOM_LT: BinaryAtomFn = |lhs, rhs| Ok(Value::Bool(ordering("<", lhs, rhs)?.is_lt()));

pub const ATOM_GT: BinaryAtomFn = |lhs, rhs| Ok(Value::Bool(ordering(">", lhs, rhs)?.is_gt()));

pub const ATOM_LE: BinaryAtomFn = |lhs, rhs| Ok(Value::Bool(ordering("<=", lhs, rhs)?.is_le()));

pub const ATOM_GE: BinaryAtomFn = |lhs, rhs| Ok(Value::Bool(ordering(">=", lhs, rhs)?.is_ge()));

// ============================================================================
// BOOLEAN OPERATIONS
// ============================================================================

/// Returns <a> if it is falsy, otherwise <b>.
///
/// Example:
///   [True, False, True] | and True ; => false
pub const ATOM_AND: BinaryAtomFn = |lhs, rhs| {
    Ok(if lhs.is_truthy() {
        rhs.clone()
    } else {
        lhs.clone()
    })
};

/// Returns <a> if it is truthy, otherwise <b>.
///
/// Example:
///   [True, False, True] | or False ; => true
pub const ATOM_OR: BinaryAtomFn = |lhs, rhs| {
    Ok(if lhs.is_truthy() {
        lhs.clone()
    } else {
        rhs.clone()
    })
};

// ============================================================================
// BITWISE OPERATIONS
// ============================================================================

/// Usage: <a> & <b>
///   - integers: bitwise and
///   - booleans: logical and
///   - two mappings: keys present in both, values from <b>
pub const ATOM_BIT_AND: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
    (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
    (Value::Map(a), Value::Map(b)) => Ok(collections::intersection(a, b)),
    _ => Err(mismatch("&", &[lhs, rhs])),
};

/// Usage: <a> | <b>
///   - integers: bitwise or
///   - booleans: logical or
///   - two mappings: union, left-hand values win
///
/// A list followed by `| op seed` is a reduction, handled by the parser.
pub const ATOM_BIT_OR: BinaryAtomFn = |lhs, rhs| match (lhs, rhs) {
    (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
    (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
    (Value::Map(a), Value::Map(b)) => Ok(collections::union(a, b, false)),
    _ => Err(mismatch("|", &[lhs, rhs])),
};

/// Exclusive or for integers and booleans; `None` for other kinds.
pub fn xor(lhs: &Value, rhs: &Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(a ^ b)),
        (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(a ^ b)),
        _ => None,
    }
}

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

pub fn register_logic_atoms(registry: &mut AtomRegistry) {
    registry.register_binary(BinaryOp::Eq, ATOM_EQ);
    registry.register_binary(BinaryOp::NotEq, ATOM_NE);
    registry.register_binary(BinaryOp::Lt, ATOM_LT);
    registry.register_binary(BinaryOp::Gt, ATOM_GT);
    registry.register_binary(BinaryOp::Le, ATOM_LE);
    registry.register_binary(BinaryOp::Ge, ATOM_GE);
    registry.register_binary(BinaryOp::And, ATOM_AND);
    registry.register_binary(BinaryOp::Or, ATOM_OR);
    registry.register_binary(BinaryOp::Amp, ATOM_BIT_AND);
    registry.register_binary(BinaryOp::Pipe, ATOM_BIT_OR);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_numeric_equality() {
        assert_eq!(ATOM_EQ(&Value::Int(1), &Value::Real(1.0)).unwrap(), Value::Bool(true));
        assert_eq!(ATOM_NE(&Value::Int(1), &Value::from("1")).unwrap(), Value::Bool(true));
    }

    #[test]
    fn ordering_requires_comparable_kinds() {
        assert_eq!(ATOM_LE(&Value::Int(2), &Value::Real(2.0)).unwrap(), Value::Bool(true));
        assert!(matches!(
            ATOM_LT(&Value::Int(1), &Value::from("a")),
            Err(ErrorKind::TypeMismatch { .. })
        ));
    }

    #[test]
    fn boolean_operators_return_operands() {
        assert_eq!(ATOM_OR(&Value::Int(0), &Value::from("x")).unwrap(), Value::from("x"));
        assert_eq!(ATOM_AND(&Value::Int(0), &Value::from("x")).unwrap(), Value::Int(0));
    }

    #[test]
    fn bitwise_on_integers() {
        assert_eq!(ATOM_BIT_AND(&Value::Int(6), &Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(ATOM_BIT_OR(&Value::Int(6), &Value::Int(3)).unwrap(), Value::Int(7));
        assert_eq!(xor(&Value::Int(6), &Value::Int(3)), Some(Value::Int(5)));
    }
}
