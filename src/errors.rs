//! Firelight Error Handling - Unified Diagnostic API
//!
//! Every failure the engine can produce is a [`FirelightError`]: what went
//! wrong ([`ErrorKind`]), the text it went wrong in ([`SourceInfo`]), where in
//! the story it happened ([`ErrorOrigin`]) and how to help
//! ([`DiagnosticInfo`]). Errors are created through the [`ErrorReporting`]
//! trait by whichever context owns the source text, so spans always point
//! into the right buffer.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::ast::Span;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Named text a diagnostic points into.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Used when no real source exists (I/O failures, configuration).
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: context.to_string(),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("")
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// The single error type surfaced to hosts.
#[derive(Debug)]
pub struct FirelightError {
    pub kind: ErrorKind,
    pub source_info: SourceInfo,
    pub origin: ErrorOrigin,
    pub diagnostic_info: DiagnosticInfo,
}

/// All failure modes, grouped by [`ErrorCategory`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Syntax errors - malformed macro, link or expression markup
    #[error("unterminated call to macro '{name}'")]
    UnterminatedMacro { name: String },
    #[error("unterminated link")]
    UnterminatedLink,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unbalanced '{delimiter}'")]
    UnbalancedDelimiter { delimiter: char },
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("empty expression")]
    EmptyExpression,
    #[error("malformed call to '{macro_name}': {reason}")]
    MalformedMacro { macro_name: String, reason: String },
    #[error("malformed link: {reason}")]
    MalformedLink { reason: String },
    #[error("invalid {literal_type} '{value}'")]
    InvalidLiteral { literal_type: String, value: String },

    // Type errors - operator applied to incompatible kinds
    #[error("operator '{operation}' does not apply to {operands}")]
    TypeMismatch { operation: String, operands: String },
    #[error("expected {expected}, got {actual}")]
    ExpectedKind { expected: String, actual: String },

    // Value errors - right kinds, unusable values
    #[error("division by zero in '{operation}'")]
    DivisionByZero { operation: String },
    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error("{message}")]
    InvalidValue { message: String },

    // Path errors - dotted-path resolution
    #[error("'{path}' is not defined")]
    UndefinedPath { path: String },
    #[error("cannot traverse '{path}': '{segment}' is a {found}, not a mapping")]
    NotAMapping {
        path: String,
        segment: String,
        found: String,
    },
    #[error("'{name}' is read-only")]
    ReadOnly { name: String },
    #[error("invalid path '{path}'")]
    InvalidPath { path: String },

    // Recursion errors
    #[error("recursion limit of {limit} exceeded")]
    RecursionLimit { limit: usize },

    // Story errors - resolution, loading, session state
    #[error("unknown macro or node '{name}'")]
    UnknownMacro { name: String },
    #[error("unknown node '{name}'")]
    UnknownNode { name: String },
    #[error("unknown module '{name}'")]
    UnknownModule { name: String },
    #[error("invalid story: {message}")]
    InvalidStory { message: String },
    #[error("this telling has come to an end")]
    StoryFinished,
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
    #[error("i/o failure: {message}")]
    Io { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Syntax,
    Type,
    Value,
    Path,
    Recursion,
    Story,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Type => "type",
            ErrorCategory::Value => "value",
            ErrorCategory::Path => "path",
            ErrorCategory::Recursion => "recursion",
            ErrorCategory::Story => "story",
        }
    }
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnterminatedMacro { .. }
            | Self::UnterminatedLink
            | Self::UnterminatedString
            | Self::UnbalancedDelimiter { .. }
            | Self::UnexpectedToken { .. }
            | Self::EmptyExpression
            | Self::MalformedMacro { .. }
            | Self::MalformedLink { .. }
            | Self::InvalidLiteral { .. } => ErrorCategory::Syntax,

            Self::TypeMismatch { .. } | Self::ExpectedKind { .. } => ErrorCategory::Type,

            Self::DivisionByZero { .. } | Self::InvalidRegex { .. } | Self::InvalidValue { .. } => {
                ErrorCategory::Value
            }

            Self::UndefinedPath { .. }
            | Self::NotAMapping { .. }
            | Self::ReadOnly { .. }
            | Self::InvalidPath { .. } => ErrorCategory::Path,

            Self::RecursionLimit { .. } => ErrorCategory::Recursion,

            Self::UnknownMacro { .. }
            | Self::UnknownNode { .. }
            | Self::UnknownModule { .. }
            | Self::InvalidStory { .. }
            | Self::StoryFinished
            | Self::InvalidConfig { .. }
            | Self::Io { .. } => ErrorCategory::Story,
        }
    }

    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::UnterminatedMacro { .. } => "unterminated_macro",
            Self::UnterminatedLink => "unterminated_link",
            Self::UnterminatedString => "unterminated_string",
            Self::UnbalancedDelimiter { .. } => "unbalanced_delimiter",
            Self::UnexpectedToken { .. } => "unexpected_token",
            Self::EmptyExpression => "empty_expression",
            Self::MalformedMacro { .. } => "malformed_macro",
            Self::MalformedLink { .. } => "malformed_link",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::ExpectedKind { .. } => "expected_kind",
            Self::DivisionByZero { .. } => "division_by_zero",
            Self::InvalidRegex { .. } => "invalid_regex",
            Self::InvalidValue { .. } => "invalid_value",
            Self::UndefinedPath { .. } => "undefined_path",
            Self::NotAMapping { .. } => "not_a_mapping",
            Self::ReadOnly { .. } => "read_only",
            Self::InvalidPath { .. } => "invalid_path",
            Self::RecursionLimit { .. } => "recursion_limit",
            Self::UnknownMacro { .. } => "unknown_macro",
            Self::UnknownNode { .. } => "unknown_node",
            Self::UnknownModule { .. } => "unknown_module",
            Self::InvalidStory { .. } => "invalid_story",
            Self::StoryFinished => "story_finished",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Io { .. } => "io",
        }
    }

    fn primary_label(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Syntax => "malformed here",
            ErrorCategory::Type => "type mismatch",
            ErrorCategory::Value => "invalid value",
            ErrorCategory::Path => "path failure",
            ErrorCategory::Recursion => "recursion limit hit here",
            ErrorCategory::Story => "story error",
        }
    }
}

/// Where the failing text lives.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Node and macro the failure happened in. The innermost values win: once
/// set they are not overwritten while the error propagates outward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorOrigin {
    pub node: Option<String>,
    pub macro_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

impl FirelightError {
    /// Builds an error directly from a source context.
    pub fn new(kind: ErrorKind, source: &SourceContext, span: Span, phase: &str) -> Self {
        let error_code = format!(
            "firelight::{}::{}",
            kind.category().as_str(),
            kind.code_suffix()
        );
        FirelightError {
            kind,
            source_info: SourceInfo {
                source: source.to_named_source(),
                primary_span: to_source_span(span),
                phase: phase.to_string(),
            },
            origin: ErrorOrigin::default(),
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
        }
    }

    /// An error with no meaningful source text (I/O, configuration).
    pub fn unsourced(kind: ErrorKind, phase: &str) -> Self {
        Self::new(kind, &SourceContext::default(), Span::default(), phase)
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Byte offset of the failure in its source text.
    pub fn offset(&self) -> usize {
        self.source_info.primary_span.offset()
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    pub fn in_node(mut self, node: &str) -> Self {
        if self.origin.node.is_none() {
            self.origin.node = Some(node.to_string());
        }
        self
    }

    pub fn in_macro(mut self, macro_name: &str) -> Self {
        if self.origin.macro_name.is_none() {
            self.origin.macro_name = Some(macro_name.to_string());
        }
        self
    }
}

impl std::error::Error for FirelightError {}

impl fmt::Display for FirelightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = match self.kind.category() {
            ErrorCategory::Syntax => "Syntax error",
            ErrorCategory::Type => "Type error",
            ErrorCategory::Value => "Value error",
            ErrorCategory::Path => "Path error",
            ErrorCategory::Recursion => "Recursion error",
            ErrorCategory::Story => "Story error",
        };
        write!(f, "{category}: {}", self.kind)?;
        match (&self.origin.node, &self.origin.macro_name) {
            (Some(node), Some(name)) => write!(f, " (in '{name}' on node '{node}')"),
            (Some(node), None) => write!(f, " (on node '{node}')"),
            (None, Some(name)) => write!(f, " (in '{name}')"),
            (None, None) => Ok(()),
        }
    }
}

impl Diagnostic for FirelightError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.primary_label().to_string()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

// ============================================================================
// ERROR REPORTING TRAIT
// ============================================================================

/// Context-aware error creation. Whoever owns the text being processed
/// implements this, so spans and sources stay consistent.
pub trait ErrorReporting {
    fn report(&self, kind: ErrorKind, span: Span) -> FirelightError;

    fn type_mismatch(&self, operation: &str, operands: &[&crate::ast::value::Value], span: Span) -> FirelightError {
        let operands = operands
            .iter()
            .map(|v| v.type_name())
            .collect::<Vec<_>>()
            .join(" and ");
        self.report(
            ErrorKind::TypeMismatch {
                operation: operation.into(),
                operands,
            },
            span,
        )
    }

    fn expected_kind(&self, expected: &str, actual: &str, span: Span) -> FirelightError {
        self.report(
            ErrorKind::ExpectedKind {
                expected: expected.into(),
                actual: actual.into(),
            },
            span,
        )
    }

    fn malformed_macro(&self, macro_name: &str, reason: &str, span: Span) -> FirelightError {
        self.report(
            ErrorKind::MalformedMacro {
                macro_name: macro_name.into(),
                reason: reason.into(),
            },
            span,
        )
    }

    fn invalid_value(&self, message: &str, span: Span) -> FirelightError {
        self.report(
            ErrorKind::InvalidValue {
                message: message.into(),
            },
            span,
        )
    }
}

/// A source context reports errors for the given phase.
pub struct PhaseReporter<'a> {
    pub source: &'a SourceContext,
    pub phase: &'static str,
}

impl ErrorReporting for PhaseReporter<'_> {
    fn report(&self, kind: ErrorKind, span: Span) -> FirelightError {
        FirelightError::new(kind, self.source, span, self.phase)
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::from(span.start..span.end)
}

/// Prints an error with full miette diagnostics.
pub fn print_error(error: FirelightError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
