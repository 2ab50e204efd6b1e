//! Runtime state and evaluation: dotted paths, the state store, node scopes
//! and the expression evaluator.

pub mod context;
pub mod eval;
pub mod path;
pub mod world;

pub use context::{NodeContext, Status};
pub use path::Path;
pub use world::{Snapshot, StateStore, World};
