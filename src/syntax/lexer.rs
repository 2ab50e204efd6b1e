//! Expression tokenizer.
//!
//! Turns an expression fragment into spanned tokens. Macro calls are
//! recognised here and kept whole as [`Token::Macro`]; the evaluator expands
//! them into values before parsing.

use crate::ast::value::Value;
use crate::ast::Span;
use crate::errors::{ErrorKind, ErrorReporting, FirelightError};
use crate::syntax::markup::{parse_single_call, Fragment, MacroCall};

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Literal, or the value a macro call expanded to.
    Value(Value),
    /// Variable name or dotted path.
    Ident(&'a str),
    /// One of the transient bindings `?`, `@` and `#`.
    Binding(char),
    Macro(MacroCall<'a>),
    /// Operator spelling, including the keywords `and`, `or` and `not`.
    Op(&'static str),
    Bang,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Tilde,
}

impl Token<'_> {
    /// For a closing token, the closing character and the opener it pairs with.
    pub fn closing_pair(&self) -> Option<(char, char)> {
        match self {
            Token::RParen => Some(('(', ')')),
            Token::RBracket => Some(('[', ']')),
            Token::RBrace => Some(('{', '}')),
            _ => None,
        }
    }

    /// Short description for "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Value(v) => format!("value {}", v.repr()),
            Token::Ident(name) => format!("name '{name}'"),
            Token::Binding(c) => format!("'{c}'"),
            Token::Macro(call) => format!("macro '{}'", call.name),
            Token::Op(op) => format!("'{op}'"),
            Token::Bang => "'!'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::LBrace => "'{'".into(),
            Token::RBrace => "'}'".into(),
            Token::Comma => "','".into(),
            Token::Colon => "':'".into(),
            Token::Tilde => "'~'".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme<'a> {
    pub token: Token<'a>,
    pub span: Span,
}

/// Longest spellings first so that `**` wins over `*`.
const OPERATORS: &[&str] = &[
    "**", "//", "%%", "^^", "!=", "==", "<=", ">=", "*", "/", "%", "^", "+", "-", ".", "|", "&",
    "=", "<", ">",
];

// ============================================================================
// PUBLIC API
// ============================================================================

pub fn tokenize<'a>(
    frag: Fragment<'a>,
    reporter: &dyn ErrorReporting,
) -> Result<Vec<Lexeme<'a>>, FirelightError> {
    let mut lexer = Lexer {
        frag,
        pos: 0,
        reporter,
    };
    let mut out = Vec::new();
    while let Some(lexeme) = lexer.next_lexeme()? {
        out.push(lexeme);
    }
    if out.is_empty() {
        return Err(reporter.report(ErrorKind::EmptyExpression, frag.span()));
    }
    tracing::trace!(tokens = out.len(), offset = frag.offset, "tokenized expression");
    Ok(out)
}

// ============================================================================
// LEXER
// ============================================================================

struct Lexer<'a, 'r> {
    frag: Fragment<'a>,
    pos: usize,
    reporter: &'r dyn ErrorReporting,
}

impl<'a> Lexer<'a, '_> {
    fn rest(&self) -> &'a str {
        &self.frag.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.frag.offset + start, self.frag.offset + self.pos)
    }

    fn lexeme(&self, token: Token<'a>, start: usize) -> Option<Lexeme<'a>> {
        Some(Lexeme {
            token,
            span: self.span_from(start),
        })
    }

    fn next_lexeme(&mut self) -> Result<Option<Lexeme<'a>>, FirelightError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += self.peek().map_or(0, char::len_utf8);
        }
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        if c == '(' {
            let call_frag = self.frag.slice(self.pos, self.frag.text.len());
            if let Some(call) = self.call_at(call_frag)? {
                self.pos += call.source.text.len();
                return Ok(self.lexeme(Token::Macro(call), start));
            }
        }
        if c.is_ascii_digit() {
            return self.number(start).map(Some);
        }
        if c == '"' {
            return self.string(start).map(Some);
        }
        if c.is_alphabetic() || c == '_' {
            return Ok(self.word(start));
        }

        match c {
            '\\' => match self.peek_at(1) {
                Some('~') => {
                    self.pos += 2;
                    Ok(self.lexeme(Token::Tilde, start))
                }
                Some(':') => {
                    self.pos += 2;
                    Ok(self.lexeme(Token::Colon, start))
                }
                _ => Err(self.unexpected(start, "'\\'")),
            },
            '(' => self.single(Token::LParen, start),
            ')' => self.single(Token::RParen, start),
            '[' => self.single(Token::LBracket, start),
            ']' => self.single(Token::RBracket, start),
            '{' => self.single(Token::LBrace, start),
            '}' => self.single(Token::RBrace, start),
            ',' => self.single(Token::Comma, start),
            ':' => self.single(Token::Colon, start),
            '~' => self.single(Token::Tilde, start),
            '?' | '@' | '#' => self.single(Token::Binding(c), start),
            '!' if self.peek_at(1) != Some('=') => self.single(Token::Bang, start),
            _ => {
                let rest = self.rest();
                match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                    Some(op) => {
                        self.pos += op.len();
                        let op = if *op == "==" { "=" } else { op };
                        Ok(self.lexeme(Token::Op(op), start))
                    }
                    None => Err(self.unexpected(start, &format!("'{c}'"))),
                }
            }
        }
    }

    fn single(&mut self, token: Token<'a>, start: usize) -> Result<Option<Lexeme<'a>>, FirelightError> {
        self.pos += 1;
        Ok(self.lexeme(token, start))
    }

    fn call_at(&self, frag: Fragment<'a>) -> Result<Option<MacroCall<'a>>, FirelightError> {
        // Only the call itself is handed to the markup scanner; the text that
        // follows it belongs to the expression.
        let Some(len) = call_length(frag.text) else {
            return Ok(None);
        };
        parse_single_call(frag.slice(0, len), self.reporter)
    }

    fn number(&mut self, start: usize) -> Result<Lexeme<'a>, FirelightError> {
        let rest = self.rest();
        let mut len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let mut is_real = false;
        let bytes = rest.as_bytes();
        if bytes.get(len) == Some(&b'.') && bytes.get(len + 1).is_some_and(u8::is_ascii_digit) {
            is_real = true;
            len += 1 + rest[len + 1..].bytes().take_while(u8::is_ascii_digit).count();
        }
        if matches!(bytes.get(len), Some(b'e' | b'E')) {
            let mut exp = len + 1;
            if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
                is_real = true;
                len = exp + rest[exp..].bytes().take_while(u8::is_ascii_digit).count();
            }
        }
        let text = &rest[..len];
        self.pos += len;
        let value = if is_real {
            text.parse::<f64>().map(Value::Real).ok()
        } else {
            text.parse::<i64>().map(Value::Int).ok()
        };
        match value {
            Some(value) => Ok(Lexeme {
                token: Token::Value(value),
                span: self.span_from(start),
            }),
            None => Err(self.reporter.report(
                ErrorKind::InvalidLiteral {
                    literal_type: "number".into(),
                    value: text.into(),
                },
                self.span_from(start),
            )),
        }
    }

    fn string(&mut self, start: usize) -> Result<Lexeme<'a>, FirelightError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self
                    .reporter
                    .report(ErrorKind::UnterminatedString, self.span_from(start)));
            };
            self.pos += c.len_utf8();
            match c {
                '"' => break,
                '\\' => {
                    let Some(next) = self.peek() else {
                        continue;
                    };
                    self.pos += next.len_utf8();
                    match next {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        '"' | '\\' => out.push(next),
                        // Regex escapes such as `\d` pass through untouched.
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                other => out.push(other),
            }
        }
        Ok(Lexeme {
            token: Token::Value(Value::Text(out)),
            span: self.span_from(start),
        })
    }

    fn word(&mut self, start: usize) -> Option<Lexeme<'a>> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut len = 0;
        for (idx, c) in rest.char_indices() {
            let continues = c.is_alphanumeric()
                || c == '_'
                || (c == '-' && next_is(bytes, idx + 1, |b| b.is_ascii_alphabetic() || b == b'_'))
                || (c == '.' && next_is(bytes, idx + 1, |b| b.is_ascii_alphanumeric() || b == b'_'));
            if !continues {
                break;
            }
            len = idx + c.len_utf8();
        }
        let word = &rest[..len];
        self.pos += len;
        let token = match word {
            "and" => Token::Op("and"),
            "or" => Token::Op("or"),
            "not" => Token::Op("not"),
            "true" | "True" => Token::Value(Value::Bool(true)),
            "false" | "False" => Token::Value(Value::Bool(false)),
            "null" | "None" => Token::Value(Value::Null),
            _ => Token::Ident(word),
        };
        self.lexeme(token, start)
    }

    fn unexpected(&self, start: usize, found: &str) -> FirelightError {
        let end = start + self.frag.text[start..].chars().next().map_or(1, char::len_utf8);
        self.reporter.report(
            ErrorKind::UnexpectedToken {
                expected: "an expression".into(),
                found: found.into(),
            },
            Span::new(self.frag.offset + start, self.frag.offset + end),
        )
    }
}

fn next_is(bytes: &[u8], at: usize, pred: impl Fn(u8) -> bool) -> bool {
    bytes.get(at).copied().is_some_and(pred)
}

/// Byte length of the macro call starting at the beginning of `text`, or
/// `None` if `text` does not start with `(name~`. An unterminated call
/// reports its full remaining length so the scanner can diagnose it.
fn call_length(text: &str) -> Option<usize> {
    let after = text.strip_prefix('(')?;
    let name_len = after
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        .map_or(after.len(), |(i, _)| i);
    let first = after.chars().next()?;
    if name_len == 0 || !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if after[name_len..].chars().next() != Some('~') {
        return None;
    }
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 1 + text[i + 1..].chars().next().map_or(0, char::len_utf8);
            continue;
        }
        if in_quote {
            in_quote = b != b'"';
        } else {
            match b {
                b'"' => in_quote = true,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    Some(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PhaseReporter, SourceContext};

    fn lex(text: &str) -> Vec<Token<'_>> {
        let src = SourceContext::from_file("test", text);
        let reporter = PhaseReporter {
            source: &src,
            phase: "parse",
        };
        tokenize(Fragment::new(text, 0), &reporter)
            .unwrap()
            .into_iter()
            .map(|l| l.token)
            .collect()
    }

    #[test]
    fn hyphenated_and_dotted_names() {
        assert_eq!(
            lex("properties.turkey-tail - 1"),
            vec![
                Token::Ident("properties.turkey-tail"),
                Token::Op("-"),
                Token::Value(Value::Int(1)),
            ]
        );
        assert_eq!(
            lex("xs . x"),
            vec![Token::Ident("xs"), Token::Op("."), Token::Ident("x")]
        );
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            lex("a ** 2 // 3 != b"),
            vec![
                Token::Ident("a"),
                Token::Op("**"),
                Token::Value(Value::Int(2)),
                Token::Op("//"),
                Token::Value(Value::Int(3)),
                Token::Op("!="),
                Token::Ident("b"),
            ]
        );
    }

    #[test]
    fn escaped_delimiters_are_tokens() {
        assert_eq!(
            lex(r#"s % "a" \~ "b""#),
            vec![
                Token::Ident("s"),
                Token::Op("%"),
                Token::Value(Value::from("a")),
                Token::Tilde,
                Token::Value(Value::from("b")),
            ]
        );
    }

    #[test]
    fn macro_calls_are_kept_whole() {
        let tokens = lex("1 + (eval~ 2 * (eval~ 3)) + 4");
        assert_eq!(tokens.len(), 5);
        assert!(matches!(tokens[2], Token::Macro(ref call) if call.name == "eval"));
    }

    #[test]
    fn keywords_and_literals() {
        assert_eq!(
            lex("not True or None"),
            vec![
                Token::Op("not"),
                Token::Value(Value::Bool(true)),
                Token::Op("or"),
                Token::Value(Value::Null),
            ]
        );
        assert_eq!(lex("2.5"), vec![Token::Value(Value::Real(2.5))]);
    }

    #[test]
    fn empty_expression_is_rejected() {
        let src = SourceContext::from_file("test", "   ");
        let reporter = PhaseReporter {
            source: &src,
            phase: "parse",
        };
        let err = tokenize(Fragment::new("   ", 0), &reporter).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyExpression);
    }
}
