//! AST module for Firelight expressions
//!
//! This module provides the span type shared by every parser in the crate and
//! the Abstract Syntax Tree produced by the expression parser. Markup (node
//! text) is not represented here: it is scanned into segments by
//! [`crate::syntax::markup`] and expanded on the fly.

pub mod value;

// ============================================================================
// IMPORTS
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::value::Value;
use crate::runtime::path::Path;
use crate::syntax::markup::Fragment;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Represents a span in the source code.
///
/// Offsets are byte offsets into the text a diagnostic is reported against
/// (a node body, a link's traversal text, or an ad-hoc expression).
///
/// # Examples
///
/// ```rust
/// use firelight::ast::Span;
/// let span = Span::new(2, 7);
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Wrapper for carrying source span information with any value
#[derive(Debug, Clone, PartialEq)]
pub struct WithSpan<T> {
    pub value: T,
    pub span: Span,
}

/// Canonical expression node type.
pub type AstNode<'a> = WithSpan<Expr<'a>>;

/// Binary operators of the expression language.
///
/// One variant per spelling; what an operator does depends on its operand
/// kinds and is decided in [`crate::atoms`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoublePercent,
    Power,
    Caret,
    DoubleCaret,
    Dot,
    Pipe,
    Amp,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// The operator as authors write it.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Star => "*",
            BinaryOp::Slash => "/",
            BinaryOp::DoubleSlash => "//",
            BinaryOp::Percent => "%",
            BinaryOp::DoublePercent => "%%",
            BinaryOp::Power => "**",
            BinaryOp::Caret => "^",
            BinaryOp::DoubleCaret => "^^",
            BinaryOp::Dot => ".",
            BinaryOp::Pipe => "|",
            BinaryOp::Amp => "&",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    /// Looks up an operator by its spelling.
    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        let op = match symbol {
            "+" => BinaryOp::Plus,
            "-" => BinaryOp::Minus,
            "*" => BinaryOp::Star,
            "/" => BinaryOp::Slash,
            "//" => BinaryOp::DoubleSlash,
            "%" => BinaryOp::Percent,
            "%%" => BinaryOp::DoublePercent,
            "**" => BinaryOp::Power,
            "^" => BinaryOp::Caret,
            "^^" => BinaryOp::DoubleCaret,
            "." => BinaryOp::Dot,
            "|" => BinaryOp::Pipe,
            "&" => BinaryOp::Amp,
            "=" | "==" => BinaryOp::Eq,
            "!=" => BinaryOp::NotEq,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "not",
        }
    }
}

/// The body of a `!` map operation.
///
/// A macro call directly after `!` is kept unexpanded so it can run once per
/// element; anything else is an ordinary expression.
#[derive(Debug, Clone, PartialEq)]
pub enum MapBody<'a> {
    Macro(Fragment<'a>),
    Expr(Box<AstNode<'a>>),
}

/// The core AST node for Firelight expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    Literal(Value),
    Var(Path),
    List(Vec<AstNode<'a>>),
    Map(Vec<(AstNode<'a>, AstNode<'a>)>),
    Unary(UnaryOp, Box<AstNode<'a>>),
    Binary {
        op: BinaryOp,
        lhs: Box<AstNode<'a>>,
        rhs: Box<AstNode<'a>>,
        op_span: Span,
    },
    /// `lhs % pattern ~ replacement`, `lhs %% pattern ~ replacement` and
    /// `mapping . key ~ value`.
    Ternary {
        op: BinaryOp,
        lhs: Box<AstNode<'a>>,
        mid: Box<AstNode<'a>>,
        rhs: Box<AstNode<'a>>,
        op_span: Span,
    },
    Index {
        target: Box<AstNode<'a>>,
        index: Box<AstNode<'a>>,
    },
    /// `list | op seed`
    Reduce {
        list: Box<AstNode<'a>>,
        op: BinaryOp,
        seed: Box<AstNode<'a>>,
        op_span: Span,
        /// For `-` and `+`, the right-hand side read as a signed operand,
        /// used when the left side is not a list (`5 | -1`).
        signed: Option<Box<AstNode<'a>>>,
    },
    /// `collection ! body`
    MapEach {
        collection: Box<AstNode<'a>>,
        body: MapBody<'a>,
    },
}

impl<'a> Expr<'a> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "Literal",
            Expr::Var(_) => "Var",
            Expr::List(_) => "List",
            Expr::Map(_) => "Map",
            Expr::Unary(..) => "Unary",
            Expr::Binary { .. } => "Binary",
            Expr::Ternary { .. } => "Ternary",
            Expr::Index { .. } => "Index",
            Expr::Reduce { .. } => "Reduce",
            Expr::MapEach { .. } => "MapEach",
        }
    }
}
