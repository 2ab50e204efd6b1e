//! Expression parser.
//!
//! A binding-power (Pratt) parser over the tokens produced by
//! [`crate::syntax::lexer`]. It is purely syntactic: operator meaning depends
//! on operand kinds and is decided at evaluation time.
//!
//! Precedence, loosest first:
//!
//! | Level | Operators |
//! |---|---|
//! | 1 | `or` |
//! | 2 | `and` |
//! | 3 | `not` (prefix) |
//! | 4 | `= != < > <= >=` |
//! | 5 | `\| &` and `\| op seed` reductions |
//! | 6 | `+ - .` |
//! | 7 | `* / // % %% ^ ^^ !` |
//! | 8 | unary `-` `+` |
//! | 9 | `**` (right associative) |
//! | 10 | indexing `[ ]` |

use crate::ast::{AstNode, BinaryOp, Expr, MapBody, Span, UnaryOp, WithSpan};
use crate::errors::{ErrorKind, ErrorReporting, FirelightError};
use crate::runtime::path::Path;
use crate::syntax::lexer::{Lexeme, Token};

// ============================================================================
// BINDING POWERS
// ============================================================================

const NOT_BP: u8 = 5;
const UNARY_BP: u8 = 15;
const INDEX_BP: u8 = 20;
const MAP_BP: (u8, u8) = (13, 14);

fn infix_binding_power(op: &str) -> Option<(u8, u8)> {
    let bp = match op {
        "or" => (1, 2),
        "and" => (3, 4),
        "=" | "!=" | "<" | ">" | "<=" | ">=" => (7, 8),
        "|" | "&" => (9, 10),
        "+" | "-" | "." => (11, 12),
        "*" | "/" | "//" | "%" | "%%" | "^" | "^^" => (13, 14),
        "**" => (18, 17),
        _ => return None,
    };
    Some(bp)
}

/// Operators that take a second right-hand operand after `~`.
fn takes_third_operand(op: BinaryOp) -> bool {
    matches!(op, BinaryOp::Percent | BinaryOp::DoublePercent | BinaryOp::Dot)
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a complete token stream into one expression. `whole` is the span of
/// the source text, used for errors at the end of input.
pub fn parse_expression<'a>(
    tokens: Vec<Lexeme<'a>>,
    whole: Span,
    reporter: &dyn ErrorReporting,
) -> Result<AstNode<'a>, FirelightError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: Span::new(whole.end, whole.end),
        reporter,
    };
    if parser.tokens.is_empty() {
        return Err(reporter.report(ErrorKind::EmptyExpression, whole));
    }
    let expr = parser.expr(0)?;
    if let Some(extra) = parser.peek() {
        if let Some((_, closer)) = extra.token.closing_pair() {
            return Err(reporter.report(ErrorKind::UnbalancedDelimiter { delimiter: closer }, extra.span));
        }
        return Err(parser.unexpected("end of expression", extra.clone()));
    }
    Ok(expr)
}

// ============================================================================
// PARSER
// ============================================================================

struct Parser<'a, 'r> {
    tokens: Vec<Lexeme<'a>>,
    pos: usize,
    end: Span,
    reporter: &'r dyn ErrorReporting,
}

impl<'a> Parser<'a, '_> {
    fn peek(&self) -> Option<&Lexeme<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token<'a>> {
        self.peek().map(|l| &l.token)
    }

    fn advance(&mut self) -> Option<Lexeme<'a>> {
        let lexeme = self.tokens.get(self.pos).cloned();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn expect(&mut self, token: Token<'a>, what: &str) -> Result<Span, FirelightError> {
        match self.advance() {
            Some(lexeme) if lexeme.token == token => Ok(lexeme.span),
            Some(lexeme) => Err(self.unexpected(what, lexeme)),
            None => match token.closing_pair() {
                Some((opener, _)) => Err(self
                    .reporter
                    .report(ErrorKind::UnbalancedDelimiter { delimiter: opener }, self.end)),
                None => Err(self.end_of_input(what)),
            },
        }
    }

    fn unexpected(&self, expected: &str, found: Lexeme<'a>) -> FirelightError {
        self.reporter.report(
            ErrorKind::UnexpectedToken {
                expected: expected.into(),
                found: found.token.describe(),
            },
            found.span,
        )
    }

    fn end_of_input(&self, expected: &str) -> FirelightError {
        self.reporter.report(
            ErrorKind::UnexpectedToken {
                expected: expected.into(),
                found: "end of expression".into(),
            },
            self.end,
        )
    }

    fn expr(&mut self, min_bp: u8) -> Result<AstNode<'a>, FirelightError> {
        let mut lhs = self.prefix()?;

        loop {
            let Some(token) = self.peek_token() else {
                break;
            };
            match token {
                Token::LBracket => {
                    if INDEX_BP < min_bp {
                        break;
                    }
                    self.advance();
                    let index = self.expr(0)?;
                    let close = self.expect(Token::RBracket, "']'")?;
                    let span = lhs.span.join(close);
                    lhs = WithSpan {
                        value: Expr::Index {
                            target: Box::new(lhs),
                            index: Box::new(index),
                        },
                        span,
                    };
                }
                Token::Bang => {
                    if MAP_BP.0 < min_bp {
                        break;
                    }
                    self.advance();
                    lhs = self.map_each(lhs)?;
                }
                Token::Op(symbol) => {
                    let symbol = *symbol;
                    let Some((l_bp, r_bp)) = infix_binding_power(symbol) else {
                        break;
                    };
                    if l_bp < min_bp {
                        break;
                    }
                    let Some(op_lexeme) = self.advance() else {
                        break;
                    };
                    lhs = self.infix(lhs, symbol, op_lexeme.span, r_bp)?;
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<AstNode<'a>, FirelightError> {
        let Some(lexeme) = self.advance() else {
            return Err(self.end_of_input("an expression"));
        };
        let span = lexeme.span;
        let expr = match lexeme.token {
            Token::Value(value) => Expr::Literal(value),
            Token::Ident(name) => {
                Expr::Var(Path::parse(name).map_err(|kind| self.reporter.report(kind, span))?)
            }
            Token::Binding(c) => Expr::Var(Path::single(c.to_string())),
            Token::Op("not") => return self.unary(UnaryOp::Not, span, NOT_BP),
            Token::Op("-") => return self.unary(UnaryOp::Neg, span, UNARY_BP),
            Token::Op("+") => return self.unary(UnaryOp::Pos, span, UNARY_BP),
            Token::LParen => {
                let inner = self.expr(0)?;
                let close = self.expect(Token::RParen, "')'")?;
                return Ok(WithSpan {
                    value: inner.value,
                    span: span.join(close),
                });
            }
            Token::LBracket => return self.list(span),
            Token::LBrace => return self.map(span),
            other => {
                return Err(self.unexpected(
                    "an expression",
                    Lexeme {
                        token: other,
                        span,
                    },
                ))
            }
        };
        Ok(WithSpan { value: expr, span })
    }

    fn unary(&mut self, op: UnaryOp, span: Span, bp: u8) -> Result<AstNode<'a>, FirelightError> {
        let operand = self.expr(bp)?;
        let span = span.join(operand.span);
        Ok(WithSpan {
            value: Expr::Unary(op, Box::new(operand)),
            span,
        })
    }

    fn infix(
        &mut self,
        lhs: AstNode<'a>,
        symbol: &'static str,
        op_span: Span,
        r_bp: u8,
    ) -> Result<AstNode<'a>, FirelightError> {
        let op = BinaryOp::from_symbol(symbol).ok_or_else(|| {
            self.reporter.report(
                ErrorKind::UnexpectedToken {
                    expected: "a binary operator".into(),
                    found: format!("'{symbol}'"),
                },
                op_span,
            )
        })?;

        // `list | op seed` folds the list with `op`.
        if op == BinaryOp::Pipe {
            if let Some(&Token::Op(inner)) = self.peek_token() {
                if let Some(fold_op) = BinaryOp::from_symbol(inner) {
                    let start = self.pos;
                    let signed = match inner {
                        "-" | "+" => self.expr(r_bp).ok().map(|operand| (operand, self.pos)),
                        _ => None,
                    };
                    self.pos = start;
                    let fold_span = self.advance().map_or(op_span, |l| l.span);
                    let seed = self.expr(r_bp)?;
                    let signed = signed
                        .filter(|(_, end)| *end == self.pos)
                        .map(|(operand, _)| Box::new(operand));
                    let span = lhs.span.join(seed.span);
                    return Ok(WithSpan {
                        value: Expr::Reduce {
                            list: Box::new(lhs),
                            op: fold_op,
                            seed: Box::new(seed),
                            op_span: op_span.join(fold_span),
                            signed,
                        },
                        span,
                    });
                }
            }
        }

        let rhs = self.expr(r_bp)?;
        if takes_third_operand(op) && self.peek_token() == Some(&Token::Tilde) {
            self.advance();
            let third = self.expr(r_bp)?;
            let span = lhs.span.join(third.span);
            return Ok(WithSpan {
                value: Expr::Ternary {
                    op,
                    lhs: Box::new(lhs),
                    mid: Box::new(rhs),
                    rhs: Box::new(third),
                    op_span,
                },
                span,
            });
        }

        let span = lhs.span.join(rhs.span);
        Ok(WithSpan {
            value: Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                op_span,
            },
            span,
        })
    }

    fn map_each(&mut self, collection: AstNode<'a>) -> Result<AstNode<'a>, FirelightError> {
        if let Some(Token::Macro(call)) = self.peek_token() {
            let body = call.source;
            let end = self.advance().map_or(body.span(), |l| l.span);
            let span = collection.span.join(end);
            return Ok(WithSpan {
                value: Expr::MapEach {
                    collection: Box::new(collection),
                    body: MapBody::Macro(body),
                },
                span,
            });
        }
        let body = self.expr(MAP_BP.1)?;
        let span = collection.span.join(body.span);
        Ok(WithSpan {
            value: Expr::MapEach {
                collection: Box::new(collection),
                body: MapBody::Expr(Box::new(body)),
            },
            span,
        })
    }

    fn list(&mut self, open: Span) -> Result<AstNode<'a>, FirelightError> {
        let mut items = Vec::new();
        loop {
            if self.peek_token() == Some(&Token::RBracket) {
                break;
            }
            items.push(self.expr(0)?);
            if self.peek_token() == Some(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        let close = self.expect(Token::RBracket, "',' or ']'")?;
        Ok(WithSpan {
            value: Expr::List(items),
            span: open.join(close),
        })
    }

    fn map(&mut self, open: Span) -> Result<AstNode<'a>, FirelightError> {
        let mut entries = Vec::new();
        loop {
            if self.peek_token() == Some(&Token::RBrace) {
                break;
            }
            let key = self.expr(0)?;
            self.expect(Token::Colon, "':'")?;
            let value = self.expr(0)?;
            entries.push((key, value));
            if self.peek_token() == Some(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        let close = self.expect(Token::RBrace, "',' or '}'")?;
        Ok(WithSpan {
            value: Expr::Map(entries),
            span: open.join(close),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::value::Value;
    use crate::errors::{PhaseReporter, SourceContext};
    use crate::syntax::lexer::tokenize;
    use crate::syntax::markup::Fragment;

    fn parse(text: &str) -> Result<AstNode<'_>, FirelightError> {
        let src = SourceContext::from_file("test", text);
        let reporter = PhaseReporter {
            source: &src,
            phase: "parse",
        };
        let frag = Fragment::new(text, 0);
        let tokens = tokenize(frag, &reporter)?;
        parse_expression(tokens, frag.span(), &reporter)
    }

    fn binary_op(node: &AstNode<'_>) -> Option<BinaryOp> {
        match &node.value {
            Expr::Binary { op, .. } => Some(*op),
            _ => None,
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let node = parse("1 + 2 * 3").unwrap();
        let Expr::Binary { op, rhs, .. } = &node.value else {
            panic!("expected a binary node");
        };
        assert_eq!(*op, BinaryOp::Plus);
        assert_eq!(binary_op(rhs), Some(BinaryOp::Star));
    }

    #[test]
    fn power_is_right_associative() {
        let node = parse("2 ** 3 ** 2").unwrap();
        let Expr::Binary { lhs, rhs, .. } = &node.value else {
            panic!("expected a binary node");
        };
        assert_eq!(lhs.value, Expr::Literal(Value::Int(2)));
        assert_eq!(binary_op(rhs), Some(BinaryOp::Power));
    }

    #[test]
    fn replacement_takes_a_third_operand() {
        let node = parse(r#"s % "a" ~ "b" % "c" ~ "d""#).unwrap();
        let Expr::Ternary { op, lhs, .. } = &node.value else {
            panic!("expected a ternary node");
        };
        assert_eq!(*op, BinaryOp::Percent);
        assert!(matches!(lhs.value, Expr::Ternary { .. }));
    }

    #[test]
    fn pipe_followed_by_operator_is_a_reduction() {
        let node = parse("[1, 2, 3] | + 0").unwrap();
        assert!(matches!(node.value, Expr::Reduce { op: BinaryOp::Plus, .. }));
        let node = parse("a | b").unwrap();
        assert_eq!(binary_op(&node), Some(BinaryOp::Pipe));
    }

    #[test]
    fn signed_reduction_keeps_the_operand_reading() {
        let node = parse("n | -1 + 2").unwrap();
        let Expr::Reduce { op, seed, signed, .. } = &node.value else {
            panic!("expected a reduce node");
        };
        assert_eq!(*op, BinaryOp::Minus);
        assert_eq!(binary_op(seed), Some(BinaryOp::Plus));
        let signed = signed.as_ref().expect("signed operand");
        assert_eq!(binary_op(signed), Some(BinaryOp::Plus));

        let node = parse("xs | * 1").unwrap();
        assert!(matches!(node.value, Expr::Reduce { signed: None, .. }));
    }

    #[test]
    fn literals_and_indexing() {
        let node = parse(r#"{"a": [1, 2,], "b": 3}["a"][0]"#).unwrap();
        let Expr::Index { target, .. } = &node.value else {
            panic!("expected an index node");
        };
        assert!(matches!(target.value, Expr::Index { .. }));
    }

    #[test]
    fn not_binds_looser_than_comparison() {
        let node = parse("not x = 1").unwrap();
        let Expr::Unary(UnaryOp::Not, inner) = &node.value else {
            panic!("expected a unary node");
        };
        assert_eq!(binary_op(inner), Some(BinaryOp::Eq));
    }

    #[test]
    fn map_body_macro_is_deferred() {
        let node = parse("xs ! (eval~ ? + 1)").unwrap();
        let Expr::MapEach { body, .. } = &node.value else {
            panic!("expected a map node");
        };
        assert!(matches!(body, MapBody::Macro(frag) if frag.text == "(eval~ ? + 1)"));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse("1 2").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnexpectedToken { .. }));
        assert_eq!(err.offset(), 2);
    }

    #[test]
    fn unbalanced_delimiters_are_named() {
        let err = parse("(1 + 2").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnbalancedDelimiter { delimiter: '(' }));
        let err = parse("[1, 2").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnbalancedDelimiter { delimiter: '[' }));
        let err = parse("1 + 2)").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnbalancedDelimiter { delimiter: ')' }));
        assert_eq!(err.offset(), 5);
    }
}
