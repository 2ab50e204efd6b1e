//! # Built-in Macros
//!
//! ## Macros Provided
//!
//! - **State**: `set`, `add`, `invert`
//! - **Values**: `eval`, `text`, `lookup`, `context`
//! - **Conditionals**: `if`, `once`, `again`
//! - **Chance**: `random`
//!
//! Expression arguments are evaluated, path arguments are expanded as markup
//! and then read as a dotted path, and body arguments (`if` results, `once`
//! and `again` text) are expanded as markup only when chosen.

use rand::seq::SliceRandom;

use crate::ast::value::Value;
use crate::errors::{ErrorReporting, FirelightError};
use crate::macros::{Expander, MacroRegistry, NativeMacro};
use crate::story::CommandKind;
use crate::syntax::markup::MacroCall;

const ELSE: &str = "else";

// ============================================================================
// ARGUMENT CHECKS
// ============================================================================

fn arity(call: &MacroCall<'_>, expected: usize, reporter: &dyn ErrorReporting) -> Result<(), FirelightError> {
    if call.args.len() == expected {
        return Ok(());
    }
    let plural = if expected == 1 { "" } else { "s" };
    Err(reporter.malformed_macro(
        call.name,
        &format!("expected {expected} argument{plural}, found {}", call.args.len()),
        call.span(),
    ))
}

/// Shape check shared by the state-change macros and link traversal text.
pub fn check_command_args(
    kind: CommandKind,
    call: &MacroCall<'_>,
    reporter: &dyn ErrorReporting,
) -> Result<(), FirelightError> {
    match kind {
        CommandKind::Invert => arity(call, 1, reporter)?,
        CommandKind::Set | CommandKind::Add => {
            arity(call, 2, reporter)?;
            if call.args[1].is_blank() {
                return Err(reporter.malformed_macro(call.name, "missing value", call.span()));
            }
        }
    }
    if call.args[0].is_blank() {
        return Err(reporter.malformed_macro(call.name, "missing path", call.span()));
    }
    Ok(())
}

// ============================================================================
// STATE CHANGES
// ============================================================================

/// Usage: (set~ <path> ~ <expr>)
///   - creates missing intermediate mappings
///
/// Example:
///   (set~ properties.turkey-tail ~ 2)
fn macro_set(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    check_command_args(CommandKind::Set, call, &*exp)?;
    let path = exp.path_arg(call.args[0])?;
    let value = exp.evaluate(call.args[1])?;
    exp.write(&path, value)
        .map_err(|kind| exp.report(kind, call.args[0].span()))?;
    Ok(Value::Null)
}

/// Usage: (add~ <path> ~ <expr>)
///   - `+` of the current value and <expr>; the path must exist
///
/// Example:
///   (add~ gold ~ -5)
fn macro_add(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    check_command_args(CommandKind::Add, call, &*exp)?;
    let path = exp.path_arg(call.args[0])?;
    let delta = exp.evaluate(call.args[1])?;
    exp.add(&path, &delta)
        .map_err(|kind| exp.report(kind, call.args[0].span()))?;
    Ok(Value::Null)
}

/// Usage: (invert~ <path>)
///   - booleans are negated, numbers change sign; the path must exist
fn macro_invert(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    check_command_args(CommandKind::Invert, call, &*exp)?;
    let path = exp.path_arg(call.args[0])?;
    exp.invert(&path)
        .map_err(|kind| exp.report(kind, call.args[0].span()))?;
    Ok(Value::Null)
}

// ============================================================================
// VALUES
// ============================================================================

/// Usage: (eval~ <expr>)
///
/// Example:
///   (eval~ [1, 2, 3] | + 0) ; => 6
fn macro_eval(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    arity(call, 1, &*exp)?;
    exp.evaluate(call.args[0])
}

/// Usage: (text~ <markup> ~ ...)
///   - expands each argument as markup and concatenates the results
fn macro_text(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    let mut out = String::new();
    for arg in &call.args {
        if let Value::Text(text) = exp.expand_body(*arg)? {
            out.push_str(&text);
        }
    }
    Ok(Value::Text(out))
}

/// Usage: (lookup~ <path>)
///   - the value stored at <path>, which may be built from macros
///
/// Example:
///   (lookup~ inv.(eval~ _item))
fn macro_lookup(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    arity(call, 1, &*exp)?;
    let path = exp.path_arg(call.args[0])?;
    exp.read(&path)
        .map_err(|kind| exp.report(kind, call.args[0].span()))
}

/// Usage: (context~ <n>)
///   - `_context[n - 1]`, or null when there is no such entry
fn macro_context(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    arity(call, 1, &*exp)?;
    let n = match exp.evaluate(call.args[0])? {
        Value::Int(n) => n,
        other => {
            return Err(exp.expected_kind("integer", other.type_name(), call.args[0].span()));
        }
    };
    let entry = usize::try_from(n)
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| exp.scope().context.get(i).cloned());
    Ok(entry.unwrap_or(Value::Null))
}

// ============================================================================
// CONDITIONALS
// ============================================================================

/// Usage: (if~ <cond> ~ <result> ~ <cond> ~ <result> ~ ... ~ else ~ <result>)
///   - conditions are evaluated in order until one is truthy
///   - `else` is the fallback wherever it appears; only the first counts
///   - only the chosen result is expanded; null if nothing matches
///
/// Example:
///   (if~ gold > 10 ~ You are rich. ~ else ~ You are poor.)
fn macro_if(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    if call.args.is_empty() || call.args.len() % 2 != 0 {
        return Err(exp.malformed_macro(
            call.name,
            "expected condition and result pairs",
            call.span(),
        ));
    }
    let mut fallback = None;
    for pair in call.args.chunks_exact(2) {
        let (condition, result) = (pair[0], pair[1]);
        if condition.trim().text == ELSE {
            fallback = fallback.or(Some(result));
            continue;
        }
        if exp.evaluate(condition)?.is_truthy() {
            return exp.expand_body(result);
        }
    }
    match fallback {
        Some(result) => exp.expand_body(result),
        None => Ok(Value::Null),
    }
}

/// Usage: (once~ <markup>)
///   - expanded only on the first visit to the current node
fn macro_once(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    arity(call, 1, &*exp)?;
    if exp.scope().once {
        exp.expand_body(call.args[0])
    } else {
        Ok(Value::Null)
    }
}

/// Usage: (again~ <markup>)
///   - expanded on every visit but the first
fn macro_again(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    arity(call, 1, &*exp)?;
    if exp.scope().once {
        Ok(Value::Null)
    } else {
        exp.expand_body(call.args[0])
    }
}

// ============================================================================
// CHANCE
// ============================================================================

/// Usage: (random~ <lo> ~ <hi>) or (random~ <list>)
///   - an integer in `lo..=hi`, or a uniformly chosen element
///
/// Example:
///   (random~ 1 ~ 6)
fn macro_random(exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
    match call.args.as_slice() {
        [choices] => {
            let span = choices.span();
            match exp.evaluate(*choices)? {
                Value::List(items) => items
                    .choose(&mut exp.world().rng)
                    .cloned()
                    .ok_or_else(|| exp.invalid_value("cannot choose from an empty list", span)),
                other => Err(exp.expected_kind("list", other.type_name(), span)),
            }
        }
        [lo, hi] => {
            let low = exp.evaluate(*lo)?;
            let high = exp.evaluate(*hi)?;
            let span = lo.span().join(hi.span());
            match (low, high) {
                (Value::Int(low), Value::Int(high)) if low <= high => {
                    Ok(Value::Int(exp.world().random_between(low, high)))
                }
                (Value::Int(low), Value::Int(high)) => Err(exp.invalid_value(
                    &format!("empty range {low} to {high}"),
                    span,
                )),
                (low, high) => Err(exp.type_mismatch("random", &[&low, &high], span)),
            }
        }
        _ => Err(exp.malformed_macro(call.name, "expected a list or two bounds", call.span())),
    }
}

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

pub const STD_MACROS: [NativeMacro; 11] = [
    NativeMacro::new("set", "(set~ path ~ expr) stores a value", macro_set),
    NativeMacro::new("add", "(add~ path ~ expr) adds to a stored value", macro_add),
    NativeMacro::new("invert", "(invert~ path) negates a stored value", macro_invert),
    NativeMacro::new("eval", "(eval~ expr) evaluates an expression", macro_eval),
    NativeMacro::new("text", "(text~ markup ~ ...) expands markup to text", macro_text),
    NativeMacro::new("lookup", "(lookup~ path) reads a stored value", macro_lookup),
    NativeMacro::new("context", "(context~ n) the nth context value", macro_context),
    NativeMacro::new("if", "(if~ cond ~ result ~ ... ~ else ~ result)", macro_if),
    NativeMacro::new("once", "(once~ markup) first visit only", macro_once),
    NativeMacro::new("again", "(again~ markup) return visits only", macro_again),
    NativeMacro::new("random", "(random~ lo ~ hi) or (random~ list)", macro_random),
];

pub fn register_std_macros(registry: &mut MacroRegistry) {
    for mac in STD_MACROS {
        registry.register(mac);
    }
}
