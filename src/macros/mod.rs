//! # Firelight Macro System
//!
//! Macros are the verbs of node text. A call `(name~ arg ~ arg)` hands its
//! arguments to a [`Macro`] as raw, unexpanded fragments, and the macro
//! decides which of them to expand, evaluate or skip. That is what lets
//! `if` leave untaken branches untouched and `set` treat its first argument
//! as a path.
//!
//! ## Module Structure
//!
//! - **`registry`**: [`MacroRegistry`], the table of built-ins and the named
//!   extension modules a story can enable
//! - **`expander`**: [`Expander`], the expansion driver that walks markup,
//!   dispatches calls and includes nodes called as macros
//! - **`std`**: the built-in macros
//! - **`inventory`**: the bundled `inventory` extension module
//!
//! ## Resolution Order
//!
//! A call name is looked up among the registered macros first; only if none
//! matches is it treated as the name of a node to include.

pub mod expander;
pub mod inventory;
pub mod registry;
pub mod std;

use crate::ast::value::Value;
use crate::errors::FirelightError;
use crate::syntax::markup::MacroCall;

pub use expander::Expander;
pub use registry::MacroRegistry;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Signature of a macro implemented as a plain function.
pub type MacroFn = for<'s, 'a> fn(&mut Expander<'s>, &MacroCall<'a>) -> Result<Value, FirelightError>;

/// Anything callable as `(name~ ...)`.
pub trait Macro: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the macro. Arguments in `call` are raw; the macro expands them
    /// through `exp` as it needs them.
    fn call(&self, exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError>;

    /// One-line usage text.
    fn doc(&self) -> &str {
        ""
    }
}

/// A macro backed by a function pointer.
#[derive(Clone, Copy)]
pub struct NativeMacro {
    pub name: &'static str,
    pub doc: &'static str,
    pub func: MacroFn,
}

impl NativeMacro {
    pub const fn new(name: &'static str, doc: &'static str, func: MacroFn) -> Self {
        Self { name, doc, func }
    }
}

impl Macro for NativeMacro {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, exp: &mut Expander<'_>, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
        (self.func)(exp, call)
    }

    fn doc(&self) -> &str {
        self.doc
    }
}
