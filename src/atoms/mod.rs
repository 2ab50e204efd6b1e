//! # Firelight Operator Atoms
//!
//! Atoms are the primitive operations behind every expression operator. Each
//! operator spelling maps to one function that inspects its operand kinds and
//! either computes a result or rejects the combination with a type error.
//!
//! ## Module Structure
//!
//! - **`math`**: arithmetic (`+ - * / // % **`, unary `-`/`+`)
//! - **`logic`**: comparisons, `and`/`or`/`not`, bitwise `& |`
//! - **`string`**: regex and literal search, replace and split
//! - **`collections`**: list and mapping operators, indexing, membership
//!
//! Atoms work on plain [`Value`]s and report bare [`ErrorKind`]s; the
//! evaluator attaches source spans.

use im::HashMap;
use once_cell::sync::Lazy;

use crate::ast::value::Value;
use crate::ast::{BinaryOp, UnaryOp};
use crate::errors::ErrorKind;

pub mod collections;
pub mod logic;
pub mod math;
pub mod string;

// ============================================================================
// CORE TYPES
// ============================================================================

/// `lhs op rhs`
pub type BinaryAtomFn = fn(&Value, &Value) -> Result<Value, ErrorKind>;

/// `lhs op mid ~ rhs`
pub type TernaryAtomFn = fn(&Value, &Value, &Value) -> Result<Value, ErrorKind>;

/// Operator table, inspectable at runtime.
#[derive(Default, Clone)]
pub struct AtomRegistry {
    binary: HashMap<BinaryOp, BinaryAtomFn>,
    ternary: HashMap<BinaryOp, TernaryAtomFn>,
}

impl AtomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_binary(&mut self, op: BinaryOp, func: BinaryAtomFn) {
        self.binary.insert(op, func);
    }

    pub fn register_ternary(&mut self, op: BinaryOp, func: TernaryAtomFn) {
        self.ternary.insert(op, func);
    }

    pub fn binary(&self, op: BinaryOp) -> Option<BinaryAtomFn> {
        self.binary.get(&op).copied()
    }

    pub fn ternary(&self, op: BinaryOp) -> Option<TernaryAtomFn> {
        self.ternary.get(&op).copied()
    }

    pub fn has_binary(&self, op: BinaryOp) -> bool {
        self.binary.contains_key(&op)
    }
}

/// Registers every standard operator with `registry`.
pub fn register_all_atoms(registry: &mut AtomRegistry) {
    math::register_math_atoms(registry);
    logic::register_logic_atoms(registry);
    string::register_string_atoms(registry);
    collections::register_collection_atoms(registry);
}

static STANDARD_ATOMS: Lazy<AtomRegistry> = Lazy::new(|| {
    let mut registry = AtomRegistry::new();
    register_all_atoms(&mut registry);
    registry
});

// ============================================================================
// DISPATCH
// ============================================================================

pub fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ErrorKind> {
    let func = STANDARD_ATOMS
        .binary(op)
        .ok_or_else(|| mismatch(op.symbol(), &[lhs, rhs]))?;
    func(lhs, rhs)
}

pub fn apply_ternary(op: BinaryOp, lhs: &Value, mid: &Value, rhs: &Value) -> Result<Value, ErrorKind> {
    let func = STANDARD_ATOMS
        .ternary(op)
        .ok_or_else(|| mismatch(&format!("{} ~", op.symbol()), &[lhs, mid, rhs]))?;
    func(lhs, mid, rhs)
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, ErrorKind> {
    match op {
        UnaryOp::Neg => math::negate(operand),
        UnaryOp::Pos => math::identity(operand),
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
    }
}

/// Folds `list` with `op`, placing `seed` between neighbouring elements.
///
/// An empty list yields the zero of the seed's kind.
///
/// ```rust
/// use firelight::ast::value::Value;
/// use firelight::ast::BinaryOp;
/// use firelight::atoms::reduce;
///
/// let words = [Value::from("a"), Value::from("b")];
/// assert_eq!(reduce(&words, BinaryOp::Plus, &Value::from(", ")).unwrap(), Value::from("a, b"));
/// assert_eq!(reduce(&[], BinaryOp::Plus, &Value::from(", ")).unwrap(), Value::from(""));
/// ```
pub fn reduce(list: &[Value], op: BinaryOp, seed: &Value) -> Result<Value, ErrorKind> {
    let Some((first, rest)) = list.split_first() else {
        return Ok(seed.zero_like());
    };
    let mut result = first.clone();
    for item in rest {
        result = apply_binary(op, &result, seed)?;
        result = apply_binary(op, &result, item)?;
    }
    Ok(result)
}

/// Upper bound on the length of a repeated text (bytes) or list (elements).
pub const MAX_REPEAT_LEN: usize = 1 << 24;

/// Checks a repetition count against [`MAX_REPEAT_LEN`] for a unit of
/// `unit_len`, returning it as a `usize`. Empty units repeat zero times.
pub fn repeat_count(unit_len: usize, count: i64, what: &str) -> Result<usize, ErrorKind> {
    let count = usize::try_from(count).map_err(|_| ErrorKind::InvalidValue {
        message: format!("cannot repeat {what} a negative number of times ({count})"),
    })?;
    if unit_len == 0 {
        return Ok(0);
    }
    match unit_len.checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(count),
        _ => Err(ErrorKind::InvalidValue {
            message: format!("repeating {what} {count} times exceeds the limit of {MAX_REPEAT_LEN}"),
        }),
    }
}

/// Type error naming the operator and the kinds it was applied to.
pub fn mismatch(operation: &str, operands: &[&Value]) -> ErrorKind {
    ErrorKind::TypeMismatch {
        operation: operation.to_string(),
        operands: operands
            .iter()
            .map(|v| v.type_name())
            .collect::<Vec<_>>()
            .join(" and "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(items: &[i64]) -> Vec<Value> {
        items.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn reductions() {
        assert_eq!(
            reduce(&ints(&[1, 2, 3, 4]), BinaryOp::Plus, &Value::Int(0)).unwrap(),
            Value::Int(10)
        );
        assert_eq!(
            reduce(&ints(&[1, 2, 3, 4]), BinaryOp::Star, &Value::Int(1)).unwrap(),
            Value::Int(24)
        );
        let flags = [Value::Bool(true), Value::Bool(false), Value::Bool(true)];
        assert_eq!(
            reduce(&flags, BinaryOp::Or, &Value::Bool(false)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            reduce(&flags, BinaryOp::And, &Value::Bool(true)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn empty_reduction_uses_seed_kind() {
        assert_eq!(reduce(&[], BinaryOp::Plus, &Value::Int(5)).unwrap(), Value::Int(0));
        assert_eq!(reduce(&[], BinaryOp::Plus, &Value::Real(1.5)).unwrap(), Value::Real(0.0));
        assert_eq!(reduce(&[], BinaryOp::Plus, &Value::Null).unwrap(), Value::Null);
        assert_eq!(
            reduce(&[], BinaryOp::Plus, &Value::List(vec![Value::Int(1)])).unwrap(),
            Value::List(vec![])
        );
    }

    #[test]
    fn repeat_counts_are_bounded() {
        assert_eq!(repeat_count(2, 3, "text"), Ok(3));
        assert_eq!(repeat_count(0, i64::MAX, "a list"), Ok(0));
        assert!(matches!(repeat_count(2, -1, "text"), Err(ErrorKind::InvalidValue { .. })));
        assert!(matches!(repeat_count(2, i64::MAX, "text"), Err(ErrorKind::InvalidValue { .. })));
        assert!(matches!(
            repeat_count(1, MAX_REPEAT_LEN as i64 + 1, "a list"),
            Err(ErrorKind::InvalidValue { .. })
        ));
    }

    #[test]
    fn unknown_combination_is_a_type_error() {
        let err = apply_binary(BinaryOp::Star, &Value::Map(Default::default()), &Value::Int(2)).unwrap_err();
        assert_eq!(
            err,
            ErrorKind::TypeMismatch {
                operation: "*".into(),
                operands: "mapping and integer".into(),
            }
        );
    }
}
