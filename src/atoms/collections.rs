//! # Collection Atoms
//!
//! List and mapping operations. Every operation returns a new value; the
//! operands are never modified, so `xs . 4` leaves the binding `xs` as it was.
//!
//! ## Atoms Provided
//!
//! - **Append**: `list . value`, and `text . value` concatenation
//! - **Insert**: `mapping . key ~ value`
//! - **Indexing**: `list[i]`, `text[i]`, `mapping[key]`
//! - **Set operations** used by `+ | & -` on mappings

use crate::ast::value::{Value, ValueMap};
use crate::ast::BinaryOp;
use crate::atoms::{mismatch, repeat_count, AtomRegistry, BinaryAtomFn, TernaryAtomFn};
use crate::errors::ErrorKind;

// ============================================================================
// LIST HELPERS
// ============================================================================

pub fn concat(lhs: &[Value], rhs: &[Value]) -> Value {
    Value::List(lhs.iter().chain(rhs).cloned().collect())
}

pub fn repeat(items: &[Value], count: i64) -> Result<Value, ErrorKind> {
    let count = repeat_count(items.len(), count, "a list")?;
    Ok(Value::List(
        std::iter::repeat(items).take(count).flatten().cloned().collect(),
    ))
}

/// Exact-element membership.
pub fn contains(items: &[Value], needle: &Value) -> Value {
    Value::Bool(items.iter().any(|item| item == needle))
}

// ============================================================================
// MAPPING HELPERS
// ============================================================================

/// Union of two mappings. On a shared key the right-hand value wins when
/// `rhs_wins`, the left-hand value otherwise.
pub fn union(lhs: &ValueMap, rhs: &ValueMap, rhs_wins: bool) -> Value {
    let mut out = lhs.clone();
    for (key, value) in rhs {
        if rhs_wins || !out.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    Value::Map(out)
}

/// Keys present in both mappings, with the right-hand values.
pub fn intersection(lhs: &ValueMap, rhs: &ValueMap) -> Value {
    Value::Map(
        lhs.keys()
            .filter_map(|key| rhs.get(key).map(|value| (key.clone(), value.clone())))
            .collect(),
    )
}

/// Entries of `lhs` whose keys are not in `rhs`.
pub fn difference(lhs: &ValueMap, rhs: &ValueMap) -> Value {
    Value::Map(
        lhs.iter()
            .filter(|(key, _)| !rhs.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

// ============================================================================
// INDEXING
// ============================================================================

fn resolve_position(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let position = if index < 0 { len + index } else { index };
    if (0..len).contains(&position) {
        usize::try_from(position).ok()
    } else {
        None
    }
}

fn out_of_range(index: i64, len: usize) -> ErrorKind {
    ErrorKind::InvalidValue {
        message: format!("index {index} is out of range for length {len}"),
    }
}

/// `target[index]`. Negative indices count from the end.
pub fn index(target: &Value, index: &Value) -> Result<Value, ErrorKind> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => resolve_position(items.len(), *i)
            .map(|p| items[p].clone())
            .ok_or_else(|| out_of_range(*i, items.len())),
        (Value::Text(text), Value::Int(i)) => {
            let chars: Vec<char> = text.chars().collect();
            resolve_position(chars.len(), *i)
                .map(|p| Value::Text(chars[p].to_string()))
                .ok_or_else(|| out_of_range(*i, chars.len()))
        }
        (Value::Map(map), Value::Text(key)) => {
            map.get(key).cloned().ok_or_else(|| ErrorKind::UndefinedPath {
                path: format!("[{}]", index.repr()),
            })
        }
        _ => Err(mismatch("[]", &[target, index])),
    }
}

// ============================================================================
// APPEND AND INSERT
// ============================================================================

/// Usage: <list> . <value>
///   - returns a new list with <value> appended
///   - text . value: concatenation
///
/// Example:
///   [1, 2] . 3 ; => [1, 2, 3]
pub const ATOM_APPEND: BinaryAtomFn = |lhs, rhs| match lhs {
    Value::List(items) => {
        let mut out = items.clone();
        out.push(rhs.clone());
        Ok(Value::List(out))
    }
    Value::Text(text) => Ok(Value::Text(format!("{text}{rhs}"))),
    _ => Err(mismatch(".", &[lhs, rhs])),
};

/// Usage: <mapping> . <key> ~ <value>
///   - returns a new mapping with <key> set to <value>
///
/// Example:
///   {"a": 1} . "b" ~ 2 ; => {"a": 1, "b": 2}
pub const ATOM_INSERT: TernaryAtomFn = |target, key, value| match (target, key) {
    (Value::Map(map), Value::Text(key)) => {
        let mut out = map.clone();
        out.insert(key.clone(), value.clone());
        Ok(Value::Map(out))
    }
    (Value::Map(_), other) => Err(ErrorKind::ExpectedKind {
        expected: "text key".into(),
        actual: other.type_name().into(),
    }),
    _ => Err(mismatch(". ~", &[target, key, value])),
};

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

pub fn register_collection_atoms(registry: &mut AtomRegistry) {
    registry.register_binary(BinaryOp::Dot, ATOM_APPEND);
    registry.register_ternary(BinaryOp::Dot, ATOM_INSERT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::apply_binary;

    fn map(entries: &[(&str, i64)]) -> ValueMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Int(*v)))
            .collect()
    }

    #[test]
    fn mapping_set_operations() {
        let a = Value::Map(map(&[("x", 1), ("y", 2)]));
        let b = Value::Map(map(&[("y", 20), ("z", 30)]));
        assert_eq!(
            apply_binary(BinaryOp::Plus, &a, &b).unwrap(),
            Value::Map(map(&[("x", 1), ("y", 20), ("z", 30)]))
        );
        assert_eq!(
            apply_binary(BinaryOp::Pipe, &a, &b).unwrap(),
            Value::Map(map(&[("x", 1), ("y", 2), ("z", 30)]))
        );
        assert_eq!(
            apply_binary(BinaryOp::Amp, &a, &b).unwrap(),
            Value::Map(map(&[("y", 20)]))
        );
        assert_eq!(
            apply_binary(BinaryOp::Minus, &a, &b).unwrap(),
            Value::Map(map(&[("x", 1)]))
        );
    }

    #[test]
    fn append_returns_a_new_list() {
        let xs = Value::List(vec![Value::Int(1)]);
        let ys = ATOM_APPEND(&xs, &Value::Int(2)).unwrap();
        assert_eq!(xs, Value::List(vec![Value::Int(1)]));
        assert_eq!(ys, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let xs = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(index(&xs, &Value::Int(-1)).unwrap(), Value::Int(3));
        assert!(index(&xs, &Value::Int(3)).is_err());
        assert_eq!(index(&Value::from("héllo"), &Value::Int(1)).unwrap(), Value::from("é"));
    }

    #[test]
    fn membership() {
        let xs = Value::List(vec![Value::from("key"), Value::Int(2)]);
        assert_eq!(apply_binary(BinaryOp::Slash, &xs, &Value::from("key")).unwrap(), Value::Bool(true));
        assert_eq!(apply_binary(BinaryOp::DoubleSlash, &xs, &Value::Int(3)).unwrap(), Value::Bool(false));
    }
}
