//! # Inventory Module
//!
//! An extension module over three conventional store entries:
//!
//! | Path       | Holds                                         |
//! |------------|-----------------------------------------------|
//! | `inv`      | item id → count                               |
//! | `inv-desc` | item id → display text (defaults to the id)   |
//! | `inv-cat`  | item id → category, or a list of categories   |
//!
//! Enabled with `% modules: inventory`. Macros answer to `count` and
//! `inventory.count` alike.

use std::sync::Arc;

use crate::ast::value::{Value, ValueMap};
use crate::atoms::math::overflow;
use crate::errors::{ErrorKind, ErrorReporting, FirelightError};
use crate::macros::{Expander, Macro, MacroRegistry, NativeMacro};
use crate::runtime::path::Path;
use crate::syntax::markup::{Fragment, MacroCall};

pub const MODULE_NAME: &str = "inventory";

const INV: &str = "inv";
const INV_DESC: &str = "inv-desc";
const INV_CAT: &str = "inv-cat";

// ============================================================================
// HELPERS
// ============================================================================

fn item_path(item: &str) -> Path {
    Path(vec![INV.to_string(), item.to_string()])
}

/// A store mapping, or an empty one when the entry does not exist yet.
fn table(exp: &Expander<'_>, name: &str) -> Result<ValueMap, ErrorKind> {
    match exp.read(&Path::single(name)) {
        Ok(Value::Map(map)) => Ok(map),
        Ok(other) => Err(ErrorKind::ExpectedKind {
            expected: format!("mapping at '{name}'"),
            actual: other.type_name().into(),
        }),
        Err(ErrorKind::UndefinedPath { .. }) => Ok(ValueMap::new()),
        Err(other) => Err(other),
    }
}

fn in_category(categories: &ValueMap, item: &str, category: &str) -> bool {
    match categories.get(item) {
        Some(Value::Text(c)) => c == category,
        Some(Value::List(cs)) => cs.iter().any(|c| c.as_str() == Some(category)),
        _ => false,
    }
}

fn count_of(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        Value::Real(x) => *x as i64,
        _ => 0,
    }
}

fn total<'v>(counts: impl IntoIterator<Item = &'v Value>) -> Result<i64, ErrorKind> {
    counts
        .into_iter()
        .try_fold(0i64, |sum, n| sum.checked_add(count_of(n)))
        .ok_or_else(|| overflow("count"))
}

/// Stores a new count for `path`; the entry disappears at zero or below.
fn store_count(exp: &mut Expander<'_>, path: &Path, left: i64) -> Result<(), ErrorKind> {
    if left > 0 {
        return exp.write(path, Value::Int(left));
    }
    match exp.remove(path) {
        Ok(_) | Err(ErrorKind::UndefinedPath { .. }) => Ok(()),
        Err(other) => Err(other),
    }
}

/// Expands an item or `#category` argument to plain text.
fn selector(exp: &mut Expander<'_>, arg: Option<&Fragment<'_>>) -> Result<Option<String>, FirelightError> {
    match arg {
        Some(frag) if !frag.is_blank() => {
            let text = exp.expand_markup(frag.trim())?;
            Ok(Some(text.trim().to_string()))
        }
        _ => Ok(None),
    }
}

fn amount(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<i64, FirelightError> {
    let Some(arg) = call.args.get(1).filter(|a| !a.is_blank()) else {
        return Ok(1);
    };
    match exp.evaluate(*arg)? {
        Value::Int(n) => Ok(n),
        other => Err(exp.expected_kind("integer amount", other.type_name(), arg.span())),
    }
}

fn item_arg(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<String, FirelightError> {
    if call.args.is_empty() || call.args.len() > 2 {
        return Err(exp.malformed_macro(call.name, "expected an item and an optional amount", call.span()));
    }
    match selector(exp, call.args.first())? {
        Some(item) => Ok(item),
        None => Err(exp.malformed_macro(call.name, "missing item", call.span())),
    }
}

// ============================================================================
// MACROS
// ============================================================================

/// Usage: (count~) | (count~ <item>) | (count~ #<category>)
///   - total items held, one item's count, or the total within a category
fn macro_count(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    if call.args.len() > 1 {
        return Err(exp.malformed_macro(call.name, "expected at most one argument", call.span()));
    }
    let which = selector(exp, call.args.first())?;
    let span = call.span();
    let inv = table(exp, INV).map_err(|kind| exp.report(kind, span))?;
    let held = match which.as_deref() {
        None => total(inv.values()),
        Some(tag) if tag.starts_with('#') => {
            let categories = table(exp, INV_CAT).map_err(|kind| exp.report(kind, span))?;
            total(
                inv.iter()
                    .filter(|(item, _)| in_category(&categories, item, &tag[1..]))
                    .map(|(_, n)| n),
            )
        }
        Some(item) => Ok(inv.get(item).map(count_of).unwrap_or(0)),
    };
    held.map(Value::Int).map_err(|kind| exp.report(kind, span))
}

/// Usage: (list~) | (list~ #<category>)
///   - held items as `description` or `description (n)`, comma separated
fn macro_list(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    if call.args.len() > 1 {
        return Err(exp.malformed_macro(call.name, "expected at most one argument", call.span()));
    }
    let filter = selector(exp, call.args.first())?;
    let span = call.span();
    let category = match filter.as_deref() {
        None => None,
        Some(tag) => match tag.strip_prefix('#') {
            Some(category) => Some(category.to_string()),
            None => return Err(exp.malformed_macro(call.name, "filters look like #category", span)),
        },
    };
    let tables = (table(exp, INV), table(exp, INV_DESC), table(exp, INV_CAT));
    let (inv, descriptions, categories) = match tables {
        (Ok(a), Ok(b), Ok(c)) => (a, b, c),
        (Err(kind), _, _) | (_, Err(kind), _) | (_, _, Err(kind)) => return Err(exp.report(kind, span)),
    };
    let entries: Vec<String> = inv
        .iter()
        .filter(|(_, n)| count_of(n) > 0)
        .filter(|(item, _)| {
            category
                .as_deref()
                .map_or(true, |c| in_category(&categories, item, c))
        })
        .map(|(item, n)| {
            let name = descriptions
                .get(item.as_str())
                .map_or_else(|| item.clone(), Value::to_string);
            match count_of(n) {
                1 => name,
                n => format!("{name} ({n})"),
            }
        })
        .collect();
    Ok(Value::Text(entries.join(", ")))
}

/// Usage: (plus~ <item> ~ <n>)
///   - adds <n> (default 1), creating the entry if needed; a count that
///     drops to zero or below removes the entry
fn macro_plus(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    let item = item_arg(exp, call)?;
    let n = amount(exp, call)?;
    let path = item_path(&item);
    let span = call.span();
    let held = match exp.read(&path) {
        Ok(value) => count_of(&value),
        Err(ErrorKind::UndefinedPath { .. }) => 0,
        Err(kind) => return Err(exp.report(kind, span)),
    };
    held.checked_add(n)
        .ok_or_else(|| overflow("plus"))
        .and_then(|left| store_count(exp, &path, left))
        .map_err(|kind| exp.report(kind, span))?;
    Ok(Value::Null)
}

/// Usage: (minus~ <item> ~ <n>)
///   - removes <n> (default 1); the entry disappears at zero
fn macro_minus(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    let item = item_arg(exp, call)?;
    let n = amount(exp, call)?;
    let path = item_path(&item);
    let span = call.span();
    let held = exp
        .read(&path)
        .map(|value| count_of(&value))
        .map_err(|kind| exp.report(kind, span))?;
    held.checked_sub(n)
        .ok_or_else(|| overflow("minus"))
        .and_then(|left| store_count(exp, &path, left))
        .map_err(|kind| exp.report(kind, span))?;
    Ok(Value::Null)
}

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

pub const INVENTORY_MACROS: [NativeMacro; 4] = [
    NativeMacro::new("count", "(count~ item | #category) items held", macro_count),
    NativeMacro::new("list", "(list~ #category) held items as text", macro_list),
    NativeMacro::new("plus", "(plus~ item ~ n) gain items", macro_plus),
    NativeMacro::new("minus", "(minus~ item ~ n) lose items", macro_minus),
];

pub fn register_inventory_module(registry: &mut MacroRegistry) {
    let macros = INVENTORY_MACROS
        .iter()
        .map(|mac| Arc::new(*mac) as Arc<dyn Macro>)
        .collect();
    registry.register_module(MODULE_NAME, macros);
}
