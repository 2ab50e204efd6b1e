//! Markup scanner for node text.
//!
//! Node text is prose with two kinds of embedded markup:
//!
//! - macro calls `(name~ arg ~ arg)`, which may nest inside each other's
//!   arguments;
//! - links `[[label|target|traversal]]`.
//!
//! Scanning never evaluates anything. It yields an ordered list of
//! [`Segment`]s whose fragments still point into the original text, so every
//! later error can be reported at its absolute offset.

use crate::ast::Span;
use crate::errors::{ErrorKind, ErrorReporting, FirelightError};

// ============================================================================
// FRAGMENTS
// ============================================================================

/// A borrowed slice of source text together with its absolute offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub text: &'a str,
    pub offset: usize,
}

impl<'a> Fragment<'a> {
    pub fn new(text: &'a str, offset: usize) -> Self {
        Self { text, offset }
    }

    pub fn span(&self) -> Span {
        Span::new(self.offset, self.offset + self.text.len())
    }

    /// Sub-fragment for a byte range of this fragment.
    pub fn slice(&self, start: usize, end: usize) -> Fragment<'a> {
        Fragment::new(&self.text[start..end], self.offset + start)
    }

    pub fn trim(&self) -> Fragment<'a> {
        let start = self.text.len() - self.text.trim_start().len();
        let end = self.text.trim_end().len().max(start);
        self.slice(start, end)
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Inner text of a fragment that is exactly one double-quoted literal,
    /// e.g. the body of `(once~ "X")`.
    pub fn quoted_body(&self) -> Option<Fragment<'a>> {
        let trimmed = self.trim();
        let text = trimmed.text;
        if text.len() < 2 || !text.starts_with('"') || !text.ends_with('"') {
            return None;
        }
        let inner = &text[1..text.len() - 1];
        let mut escaped = false;
        for c in inner.chars() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => return None,
                _ => {}
            }
        }
        if escaped {
            return None;
        }
        Some(trimmed.slice(1, text.len() - 1))
    }
}

// ============================================================================
// SEGMENTS
// ============================================================================

/// A parsed macro call. Arguments are raw, unexpanded fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroCall<'a> {
    pub name: &'a str,
    pub args: Vec<Fragment<'a>>,
    /// The whole call, parentheses included.
    pub source: Fragment<'a>,
}

impl MacroCall<'_> {
    pub fn span(&self) -> Span {
        self.source.span()
    }
}

/// Link markup as written; nothing inside it has been expanded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkMarkup<'a> {
    pub label: Fragment<'a>,
    pub target: Fragment<'a>,
    pub traversal: Option<Fragment<'a>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Text(Fragment<'a>),
    Macro(MacroCall<'a>),
    Link(LinkMarkup<'a>),
}

/// Characters a backslash turns into literal text when markup is rendered.
pub const ESCAPABLE: &[char] = &['~', ':', '(', ')', '[', ']', '"', '\\', '|', '&'];

// ============================================================================
// PUBLIC API
// ============================================================================

/// Splits markup into text, macro and link segments.
///
/// ```rust
/// use firelight::errors::{PhaseReporter, SourceContext};
/// use firelight::syntax::markup::{parse_markup, Fragment, Segment};
///
/// let src = SourceContext::from_file("demo", "Hi (eval~ 1 + 1)!");
/// let reporter = PhaseReporter { source: &src, phase: "parse" };
/// let segments = parse_markup(Fragment::new(&src.content, 0), &reporter).unwrap();
/// assert_eq!(segments.len(), 3);
/// assert!(matches!(segments[1], Segment::Macro(ref call) if call.name == "eval"));
/// ```
pub fn parse_markup<'a>(
    frag: Fragment<'a>,
    reporter: &dyn ErrorReporting,
) -> Result<Vec<Segment<'a>>, FirelightError> {
    let text = frag.text;
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += escape_width(text, i);
            }
            b'(' => match macro_name_at(text, i) {
                Some(name) => {
                    push_text(&mut segments, frag, text_start, i);
                    let end = find_call_end(frag, i, name, reporter)?;
                    segments.push(Segment::Macro(build_call(frag, i, end, name)));
                    i = end;
                    text_start = end;
                }
                None => i += 1,
            },
            b'[' if bytes.get(i + 1) == Some(&b'[') => {
                push_text(&mut segments, frag, text_start, i);
                let end = find_link_end(frag, i, reporter)?;
                segments.push(Segment::Link(build_link(frag, i, end, reporter)?));
                i = end;
                text_start = end;
            }
            _ => i += 1,
        }
    }
    push_text(&mut segments, frag, text_start, bytes.len());
    tracing::trace!(segments = segments.len(), offset = frag.offset, "scanned markup");
    Ok(segments)
}

/// Parses a fragment that must consist of exactly one macro call, such as
/// `(set~ x ~ 1)`.
pub fn parse_single_call<'a>(
    frag: Fragment<'a>,
    reporter: &dyn ErrorReporting,
) -> Result<Option<MacroCall<'a>>, FirelightError> {
    let trimmed = frag.trim();
    let Some(name) = macro_name_at(trimmed.text, 0) else {
        return Ok(None);
    };
    let end = find_call_end(trimmed, 0, name, reporter)?;
    if end != trimmed.text.len() {
        return Ok(None);
    }
    Ok(Some(build_call(trimmed, 0, end, name)))
}

/// Removes markup escapes from plain text: `\~` renders as `~` and so on.
/// A backslash before any other character is kept.
pub fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if ESCAPABLE.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Splits `text` on `delimiter` wherever it is at parenthesis depth 0,
/// outside double quotes and not escaped.
pub fn split_top_level<'a>(frag: Fragment<'a>, delimiter: u8) -> Vec<Fragment<'a>> {
    let text = frag.text;
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += escape_width(text, i);
            continue;
        }
        if in_quote {
            if b == b'"' {
                in_quote = false;
            }
        } else {
            match b {
                b'"' => in_quote = true,
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ if b == delimiter && depth == 0 => {
                    parts.push(frag.slice(start, i));
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    parts.push(frag.slice(start, bytes.len()));
    parts
}

// ============================================================================
// MACRO CALLS
// ============================================================================

/// Returns the macro name if a call starts at `at`: `(` then an identifier
/// immediately followed by `~`.
fn macro_name_at(text: &str, at: usize) -> Option<&str> {
    let rest = text.get(at + 1..)?;
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    for (idx, c) in chars {
        if c == '~' {
            return Some(&rest[..idx]);
        }
        if !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
            return None;
        }
    }
    None
}

fn find_call_end(
    frag: Fragment<'_>,
    open: usize,
    name: &str,
    reporter: &dyn ErrorReporting,
) -> Result<usize, FirelightError> {
    let text = frag.text;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut quote_start = open;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += escape_width(text, i);
            continue;
        }
        if in_quote {
            if b == b'"' {
                in_quote = false;
            }
        } else {
            match b {
                b'"' => {
                    in_quote = true;
                    quote_start = i;
                }
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i + 1);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    let base = frag.offset;
    if in_quote {
        Err(reporter
            .report(ErrorKind::UnterminatedString, Span::new(base + quote_start, base + text.len()))
            .in_macro(name))
    } else {
        Err(reporter
            .report(
                ErrorKind::UnterminatedMacro {
                    name: name.to_string(),
                },
                Span::new(base + open, base + text.len()),
            )
            .with_help("every '(' must be closed by a matching ')'"))
    }
}

fn build_call<'a>(frag: Fragment<'a>, open: usize, end: usize, name: &'a str) -> MacroCall<'a> {
    let body_start = open + 1 + name.len() + 1;
    let body = frag.slice(body_start, end - 1);

    // An extra separator is allowed before the first argument.
    let lead = body.text.len() - body.text.trim_start().len();
    let body = if body.text[lead..].starts_with('~') {
        body.slice(lead + 1, body.text.len())
    } else {
        body
    };

    let args = if body.is_blank() {
        Vec::new()
    } else {
        split_top_level(body, b'~')
    };
    MacroCall {
        name,
        args,
        source: frag.slice(open, end),
    }
}

// ============================================================================
// LINKS
// ============================================================================

fn find_link_end(
    frag: Fragment<'_>,
    open: usize,
    reporter: &dyn ErrorReporting,
) -> Result<usize, FirelightError> {
    let text = frag.text;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = open + 2;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += escape_width(text, i);
            continue;
        }
        if in_quote {
            if b == b'"' {
                in_quote = false;
            }
        } else {
            match b {
                b'"' if depth > 0 => in_quote = true,
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b']' if depth == 0 && bytes.get(i + 1) == Some(&b']') => return Ok(i + 2),
                _ => {}
            }
        }
        i += 1;
    }
    Err(reporter.report(
        ErrorKind::UnterminatedLink,
        Span::new(frag.offset + open, frag.offset + text.len()),
    ))
}

fn build_link<'a>(
    frag: Fragment<'a>,
    open: usize,
    end: usize,
    reporter: &dyn ErrorReporting,
) -> Result<LinkMarkup<'a>, FirelightError> {
    let inner = frag.slice(open + 2, end - 2);
    let span = Span::new(frag.offset + open, frag.offset + end);
    let parts = split_link_parts(inner);
    let (label, target, traversal) = match parts.as_slice() {
        [only] => (*only, *only, None),
        [label, target] => (*label, *target, None),
        [label, target, traversal] => (*label, *target, Some(*traversal)),
        _ => {
            return Err(reporter.report(
                ErrorKind::MalformedLink {
                    reason: format!("expected 1 to 3 '|'-separated parts, found {}", parts.len()),
                },
                span,
            ))
        }
    };
    if target.is_blank() {
        return Err(reporter.report(
            ErrorKind::MalformedLink {
                reason: "link has no target".into(),
            },
            span,
        ));
    }
    Ok(LinkMarkup {
        label,
        target,
        traversal,
        span,
    })
}

/// Link parts are separated by `|` outside macro calls. Quotes only matter
/// inside calls, so a `"` in a label needs no escaping.
fn split_link_parts(frag: Fragment<'_>) -> Vec<Fragment<'_>> {
    let text = frag.text;
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += escape_width(text, i);
            continue;
        }
        if in_quote {
            if b == b'"' {
                in_quote = false;
            }
        } else {
            match b {
                b'"' if depth > 0 => in_quote = true,
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b'|' if depth == 0 => {
                    parts.push(frag.slice(start, i));
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    parts.push(frag.slice(start, bytes.len()));
    parts
}

// ============================================================================
// HELPERS
// ============================================================================

fn push_text<'a>(segments: &mut Vec<Segment<'a>>, frag: Fragment<'a>, start: usize, end: usize) {
    if end > start {
        segments.push(Segment::Text(frag.slice(start, end)));
    }
}

/// Byte width of a backslash escape starting at `at`.
fn escape_width(text: &str, at: usize) -> usize {
    1 + text[at + 1..].chars().next().map_or(0, char::len_utf8)
}
