//! Expression evaluator.
//!
//! Evaluation runs in three steps: tokenize the fragment, expand every macro
//! call in it to a value (left to right, except a call directly after `!`,
//! which is deferred to run once per element), then parse and reduce the
//! tree bottom-up.
//!
//! The evaluator itself never mutates state. Only the macros it expands do,
//! through whatever [`EvalContext`] it is given.

use crate::ast::value::{Value, ValueMap};
use crate::ast::{AstNode, BinaryOp, Expr, MapBody, Span};
use crate::atoms::{self, collections};
use crate::errors::{ErrorKind, ErrorReporting, FirelightError};
use crate::runtime::path::Path;
use crate::syntax::lexer::{tokenize, Lexeme, Token};
use crate::syntax::markup::{Fragment, MacroCall};
use crate::syntax::parser::parse_expression;

// ============================================================================
// EVALUATION CONTEXT
// ============================================================================

/// Services the evaluator needs from whoever drives it.
pub trait EvalContext {
    /// Reports errors against the text currently being evaluated.
    fn reporter(&self) -> &dyn ErrorReporting;

    fn resolve(&self, path: &Path) -> Result<Value, ErrorKind>;

    /// Fully expands a macro call to its value.
    fn expand_call(&mut self, call: &MacroCall<'_>) -> Result<Value, FirelightError>;

    fn push_bindings(&mut self, bindings: ValueMap);

    fn pop_bindings(&mut self);
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Evaluates an expression fragment to a value.
pub fn evaluate(frag: Fragment<'_>, ctx: &mut dyn EvalContext) -> Result<Value, FirelightError> {
    let tokens = tokenize(frag, ctx.reporter())?;
    let tokens = expand_macros(tokens, ctx)?;
    let ast = parse_expression(tokens, frag.span(), ctx.reporter())?;
    eval_node(&ast, ctx)
}

/// Replaces macro tokens with the values they expand to.
fn expand_macros<'a>(
    tokens: Vec<Lexeme<'a>>,
    ctx: &mut dyn EvalContext,
) -> Result<Vec<Lexeme<'a>>, FirelightError> {
    let mut out: Vec<Lexeme<'a>> = Vec::with_capacity(tokens.len());
    for lexeme in tokens {
        let after_bang = matches!(out.last(), Some(Lexeme { token: Token::Bang, .. }));
        match lexeme.token {
            Token::Macro(call) if !after_bang => {
                let value = ctx.expand_call(&call)?;
                out.push(Lexeme {
                    token: Token::Value(value),
                    span: lexeme.span,
                });
            }
            token => out.push(Lexeme {
                token,
                span: lexeme.span,
            }),
        }
    }
    Ok(out)
}

// ============================================================================
// TREE EVALUATION
// ============================================================================

/// Attaches `span` to a bare atom error.
fn at<'c>(ctx: &'c dyn EvalContext, span: Span) -> impl Fn(ErrorKind) -> FirelightError + 'c {
    move |kind| ctx.reporter().report(kind, span)
}

pub fn eval_node(node: &AstNode<'_>, ctx: &mut dyn EvalContext) -> Result<Value, FirelightError> {
    match &node.value {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(path) => ctx.resolve(path).map_err(at(ctx, node.span)),
        Expr::List(items) => items
            .iter()
            .map(|item| eval_node(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Map(entries) => {
            let mut map = ValueMap::new();
            for (key_node, value_node) in entries {
                let key = match eval_node(key_node, ctx)? {
                    Value::Text(key) => key,
                    other => {
                        return Err(ctx.reporter().expected_kind(
                            "text key",
                            other.type_name(),
                            key_node.span,
                        ))
                    }
                };
                let value = eval_node(value_node, ctx)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        Expr::Unary(op, operand) => {
            let value = eval_node(operand, ctx)?;
            atoms::apply_unary(*op, &value).map_err(at(ctx, node.span))
        }
        Expr::Binary {
            op: BinaryOp::And,
            lhs,
            rhs,
            ..
        } => {
            let left = eval_node(lhs, ctx)?;
            if left.is_truthy() {
                eval_node(rhs, ctx)
            } else {
                Ok(left)
            }
        }
        Expr::Binary {
            op: BinaryOp::Or,
            lhs,
            rhs,
            ..
        } => {
            let left = eval_node(lhs, ctx)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                eval_node(rhs, ctx)
            }
        }
        Expr::Binary {
            op,
            lhs,
            rhs,
            op_span,
        } => {
            let left = eval_node(lhs, ctx)?;
            let right = eval_node(rhs, ctx)?;
            atoms::apply_binary(*op, &left, &right).map_err(at(ctx, *op_span))
        }
        Expr::Ternary {
            op,
            lhs,
            mid,
            rhs,
            op_span,
        } => {
            let target = eval_node(lhs, ctx)?;
            let middle = eval_node(mid, ctx)?;
            let right = eval_node(rhs, ctx)?;
            atoms::apply_ternary(*op, &target, &middle, &right).map_err(at(ctx, *op_span))
        }
        Expr::Index { target, index } => {
            let container = eval_node(target, ctx)?;
            let key = eval_node(index, ctx)?;
            collections::index(&container, &key).map_err(at(ctx, node.span))
        }
        Expr::Reduce {
            list,
            op,
            seed,
            op_span,
            signed,
        } => {
            let folded = eval_node(list, ctx)?;
            match (&folded, signed) {
                (Value::List(items), _) => {
                    let seed = eval_node(seed, ctx)?;
                    atoms::reduce(items, *op, &seed).map_err(at(ctx, *op_span))
                }
                (_, Some(operand)) => {
                    let right = eval_node(operand, ctx)?;
                    atoms::apply_binary(BinaryOp::Pipe, &folded, &right).map_err(at(ctx, *op_span))
                }
                (other, None) => {
                    let seed = eval_node(seed, ctx)?;
                    Err(ctx.reporter().type_mismatch(
                        &format!("| {}", op.symbol()),
                        &[other, &seed],
                        *op_span,
                    ))
                }
            }
        }
        Expr::MapEach { collection, body } => {
            let whole = eval_node(collection, ctx)?;
            map_each(&whole, body, collection.span, ctx)
        }
    }
}

/// Runs `body` once per element of `whole`.
fn map_each(
    whole: &Value,
    body: &MapBody<'_>,
    span: Span,
    ctx: &mut dyn EvalContext,
) -> Result<Value, FirelightError> {
    match whole {
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let index = i64::try_from(i).unwrap_or(i64::MAX);
                out.push(run_body(body, whole, item, Value::Int(index), ctx)?);
            }
            Ok(Value::List(out))
        }
        Value::Map(map) => {
            let mut out = ValueMap::with_capacity(map.len());
            for (key, item) in map {
                let value = run_body(body, whole, item, Value::from(key.as_str()), ctx)?;
                out.insert(key.clone(), value);
            }
            Ok(Value::Map(out))
        }
        other => Err(ctx
            .reporter()
            .expected_kind("list or mapping", other.type_name(), span)),
    }
}

/// One iteration of a map, with `?`, `@` and `#` bound.
fn run_body(
    body: &MapBody<'_>,
    whole: &Value,
    element: &Value,
    key: Value,
    ctx: &mut dyn EvalContext,
) -> Result<Value, FirelightError> {
    let mut bindings = ValueMap::new();
    bindings.insert("?".into(), element.clone());
    bindings.insert("@".into(), whole.clone());
    bindings.insert("#".into(), key);
    ctx.push_bindings(bindings);
    let result = match body {
        MapBody::Macro(frag) => evaluate(*frag, ctx),
        MapBody::Expr(expr) => eval_node(expr, ctx),
    };
    ctx.pop_bindings();
    result
}
