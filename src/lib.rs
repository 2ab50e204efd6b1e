//! Firelight: an embeddable interpreter for macro-driven interactive fiction.
//!
//! A story is a set of named nodes whose text mixes prose, macro calls
//! `(name~ arg ~ arg)` and links `[[label|target|commands]]`. A [`Session`]
//! renders nodes against a persistent state store and follows links.
//!
//! ```rust
//! use firelight::{Session, Story};
//!
//! let story = Story::new("hall")
//!     .with_node("hall", "(set~ lamp ~ true)A hall. [[Leave|out]]")
//!     .with_node("out", "Outside, the lamp is (if~ lamp ~ lit ~ else ~ dark).");
//! let mut session = Session::new(story).unwrap();
//! let hall = session.start().unwrap();
//! assert_eq!(hall.text, "A hall. Leave");
//! let out = session.traverse(&hall.links[0]).unwrap();
//! assert_eq!(out.text, "Outside, the lamp is lit.");
//! ```

pub mod ast;
pub mod atoms;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod macros;
pub mod runtime;
pub mod story;
pub mod syntax;

pub use crate::ast::value::Value;
pub use crate::config::EngineConfig;
pub use crate::engine::{Rendered, Session};
pub use crate::errors::{ErrorCategory, ErrorKind, FirelightError};
pub use crate::story::{Link, Node, Story};
