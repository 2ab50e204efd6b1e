//! Everything that turns text into structure: node markup, expressions and
//! whole story files. Nothing here evaluates or touches state.

pub mod lexer;
pub mod markup;
pub mod parser;
pub mod story;

pub use markup::{parse_markup, Fragment, MacroCall, Segment};
