//! Node-local scope.
//!
//! A [`NodeContext`] is created for every render and carries the automatic
//! variables (`_context`, `_prev`, `_node`, `_once`, `_visited_`,
//! `_status_`), the node's own `_`-prefixed locals, and the transient `?`,
//! `@` and `#` bindings of an in-progress `!` map. Everything else resolves
//! to the global [`StateStore`].

use serde::{Deserialize, Serialize};

use crate::ast::value::{Value, ValueMap};
use crate::errors::ErrorKind;
use crate::runtime::path::Path;
use crate::runtime::world::{descend, StateStore};

/// Names bound by the `!` map operator.
pub const BINDING_NAMES: [&str; 3] = ["?", "@", "#"];

const AUTOMATIC_NAMES: [&str; 6] = ["_context", "_prev", "_node", "_once", "_visited_", "_status_"];

/// Whether the story is still going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unfolding,
    Finished,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unfolding => "unfolding",
            Status::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    pub node: String,
    pub prev: Option<String>,
    pub context: Vec<Value>,
    pub once: bool,
    pub visited: ValueMap,
    pub status: Status,
    locals: StateStore,
    bindings: Vec<ValueMap>,
}

impl NodeContext {
    pub fn new(node: impl Into<String>, prev: Option<String>, context: Vec<Value>) -> Self {
        Self {
            node: node.into(),
            prev,
            context,
            once: true,
            ..Self::default()
        }
    }

    pub fn with_visits(mut self, once: bool, visited: ValueMap) -> Self {
        self.once = once;
        self.visited = visited;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Scope for a node included as a macro: same node, predecessor and
    /// visit data, a fresh `_context`, and a copy of the includer's locals so
    /// nothing written during the inclusion flows back.
    pub fn derive(&self, context: Vec<Value>) -> Self {
        Self {
            node: self.node.clone(),
            prev: self.prev.clone(),
            context,
            once: self.once,
            visited: self.visited.clone(),
            status: self.status,
            locals: self.locals.clone(),
            bindings: Vec::new(),
        }
    }

    pub fn is_automatic(name: &str) -> bool {
        AUTOMATIC_NAMES.contains(&name)
    }

    pub fn automatic(&self, name: &str) -> Option<Value> {
        let value = match name {
            "_context" => Value::List(self.context.clone()),
            "_prev" => self.prev.clone().map_or(Value::Null, Value::Text),
            "_node" => Value::Text(self.node.clone()),
            "_once" => Value::Bool(self.once),
            "_visited_" => Value::Map(self.visited.clone()),
            "_status_" => Value::from(self.status.as_str()),
            _ => return None,
        };
        Some(value)
    }

    pub fn locals(&self) -> &StateStore {
        &self.locals
    }

    // ------------------------------------------------------------------------
    // Transient bindings
    // ------------------------------------------------------------------------

    pub fn push_bindings(&mut self, bindings: ValueMap) {
        self.bindings.push(bindings);
    }

    pub fn pop_bindings(&mut self) {
        self.bindings.pop();
    }

    fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings.iter().rev().find_map(|frame| frame.get(name))
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Reads a variable: transient bindings, then automatic variables, then
    /// locals, then the global store.
    pub fn resolve(&self, path: &Path, store: &StateStore) -> Result<Value, ErrorKind> {
        let head = path.head();
        if BINDING_NAMES.contains(&head) {
            let bound = self.binding(head).ok_or_else(|| ErrorKind::UndefinedPath {
                path: path.to_string(),
            })?;
            return descend(bound, path, 1).cloned();
        }
        if let Some(value) = self.automatic(head) {
            return descend(&value, path, 1).cloned();
        }
        if path.is_local() {
            return self.locals.get(path).cloned();
        }
        store.get(path).cloned()
    }

    /// The store a write to `path` lands in. Automatic variables and
    /// bindings cannot be written.
    pub fn scope_for<'s>(
        &'s mut self,
        path: &Path,
        store: &'s mut StateStore,
    ) -> Result<&'s mut StateStore, ErrorKind> {
        let head = path.head();
        if Self::is_automatic(head) || BINDING_NAMES.contains(&head) {
            return Err(ErrorKind::ReadOnly {
                name: head.to_string(),
            });
        }
        if path.is_local() {
            Ok(&mut self.locals)
        } else {
            Ok(store)
        }
    }
}
