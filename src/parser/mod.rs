//! Kernel parser - PEST-based parser for lane script
//!
//! Produces the executor's AST, with span information for error reporting.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};

use crate::executor::types::ast::{
    is_default_span, AssignOp, BinaryOp, CatchClause, Expr, Param, Span, Stmt, UnaryOp,
};

pub mod printer;
pub mod semantic_validator;

#[cfg(test)]
mod tests;

/* ===================== Kernel Definition ===================== */

/// Kernel definition - the scalar per-lane function of a `.lane` file
///
/// Example:
/// ```js
/// function reduce(offsets, content) {
///     let total = 0
///     for (let i of range(offsets[lane], offsets[lane + 1])) {
///         total += content[i]
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelDef {
    /// Function name
    pub name: String,
    /// Declared parameters (the lane id is bound separately as `lane`)
    pub params: Vec<Param>,
    /// Function body (statements to execute)
    pub body: Vec<Stmt>,
    /// Span of the entire function
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/kernel.pest"]
struct KernelParser;

/* ===================== Error Types ===================== */

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    PestError(String, Option<Span>),
    #[error("{0}")]
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        ParseError::PestError(err.to_string(), span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, source: &str) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = pest_span.end();

    let (start_line, start_col) = offset_to_line_col(source, start);
    let (end_line, end_col) = offset_to_line_col(source, end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

/// Convert byte offset to (line, column) - 0-indexed
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

/// Take the next inner pair, failing with a build error if the grammar
/// produced fewer children than expected
fn next_pair<'i>(inner: &mut Pairs<'i, Rule>, what: &str, span: Span) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Expected {}", what), Some(span)))
}

/* ===================== Public API ===================== */

/// Parse a lane script source string into a kernel definition
pub fn parse_kernel(source: &str) -> ParseResult<KernelDef> {
    let mut pairs = KernelParser::parse(Rule::program, source)?;
    let whole = Span::default();

    let program = next_pair(&mut pairs, "program", whole)?;
    let program_span = pair_to_span(&program, source);
    let mut inner = program.into_inner();
    let function = next_pair(&mut inner, "function definition", program_span)?;

    build_kernel(function, source)
}

/// Parse a single statement wrapped in an anonymous kernel (testing API)
pub fn parse_statement(source: &str) -> ParseResult<Stmt> {
    let wrapped = format!("function __stmt() {{\n{}\n}}", source);
    let mut kernel = parse_kernel(&wrapped)?;
    if kernel.body.len() != 1 {
        return Err(ParseError::BuildError(
            format!("Expected exactly one statement, found {}", kernel.body.len()),
            None,
        ));
    }
    Ok(kernel.body.remove(0))
}

/* ===================== AST Builder ===================== */

fn build_kernel(pair: Pair<Rule>, source: &str) -> ParseResult<KernelDef> {
    let span = pair_to_span(&pair, source);
    let (name, params, body) = build_function_parts(pair, source)?;
    Ok(KernelDef {
        name,
        params,
        body,
        span,
    })
}

fn build_function_parts(
    pair: Pair<Rule>,
    source: &str,
) -> ParseResult<(String, Vec<Param>, Vec<Stmt>)> {
    // function_def = { "function" ~ identifier ~ "(" ~ param_list? ~ ")" ~ block }
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let name = next_pair(&mut inner, "function name", span)?.as_str().to_string();

    let next = next_pair(&mut inner, "parameters or body", span)?;
    let (params, block_pair) = if next.as_rule() == Rule::param_list {
        let params = build_param_list(next, source)?;
        let block = next_pair(&mut inner, "function body", span)?;
        (params, block)
    } else {
        (vec![], next)
    };

    let body = build_block(block_pair, source)?;
    Ok((name, params, body))
}

fn build_param_list(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Param>> {
    pair.into_inner()
        .map(|param_pair| {
            let span = pair_to_span(&param_pair, source);
            let mut inner = param_pair.into_inner();
            let name = next_pair(&mut inner, "parameter name", span)?.as_str().to_string();
            let default = match inner.next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Param {
                name,
                default,
                span,
            })
        })
        .collect()
}

fn build_block(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Stmt>> {
    // block = { "{" ~ statement* ~ "}" }
    pair.into_inner()
        .map(|stmt_pair| build_statement(stmt_pair, source))
        .collect()
}

/// Build a body that is either a braced block or a single statement
fn build_body(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Stmt>> {
    match pair.as_rule() {
        Rule::block => build_block(pair, source),
        _ => Ok(vec![build_statement(pair, source)?]),
    }
}

fn build_statement(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    match pair.as_rule() {
        Rule::statement => {
            let inner = next_pair(&mut pair.into_inner(), "statement", span)?;
            build_statement(inner, source)
        }
        Rule::function_def => {
            let (name, params, body) = build_function_parts(pair, source)?;
            Ok(Stmt::FunctionDef {
                name,
                params,
                body,
                span,
            })
        }
        Rule::class_def => {
            let mut inner = pair.into_inner();
            let name = next_pair(&mut inner, "class name", span)?.as_str().to_string();
            let body = build_block(next_pair(&mut inner, "class body", span)?, source)?;
            Ok(Stmt::ClassDef { name, body, span })
        }
        Rule::import_stmt => {
            let path = pair.into_inner().map(|p| p.as_str().to_string()).collect();
            Ok(Stmt::Import { path, span })
        }
        Rule::return_stmt => {
            let value = match pair.into_inner().next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Return { value, span })
        }
        Rule::if_stmt => build_if_stmt(pair, source),
        Rule::while_stmt => build_while_stmt(pair, source),
        Rule::for_stmt => build_for_stmt(pair, source),
        Rule::try_stmt => build_try_stmt(pair, source),
        Rule::with_stmt => build_with_stmt(pair, source),
        Rule::throw_stmt => {
            let value = match pair.into_inner().next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Throw { value, span })
        }
        Rule::break_stmt => Ok(Stmt::Break { span }),
        Rule::continue_stmt => Ok(Stmt::Continue { span }),
        Rule::assert_stmt => {
            let mut inner = pair.into_inner();
            let test = build_expression(next_pair(&mut inner, "assert condition", span)?, source)?;
            let message = match inner.next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Assert {
                test,
                message,
                span,
            })
        }
        Rule::let_stmt => {
            let mut inner = pair.into_inner();
            let name = next_pair(&mut inner, "variable name", span)?.as_str().to_string();
            let init = match inner.next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Let { name, init, span })
        }
        Rule::assign_stmt => build_assign_stmt(pair, source),
        Rule::expr_stmt => {
            let expr = build_expression(next_pair(&mut pair.into_inner(), "expression", span)?, source)?;
            Ok(Stmt::Expr { expr, span })
        }
        _ => Err(ParseError::BuildError(
            format!("Unexpected statement rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_if_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let test = build_expression(next_pair(&mut inner, "if condition", span)?, source)?;
    let then_body = build_body(next_pair(&mut inner, "if body", span)?, source)?;

    let else_body = match inner.next() {
        Some(else_clause) => {
            let else_inner = next_pair(&mut else_clause.into_inner(), "else body", span)?;
            match else_inner.as_rule() {
                // `else if` nests the chained if as the only else statement
                Rule::if_stmt => vec![build_if_stmt(else_inner, source)?],
                _ => build_body(else_inner, source)?,
            }
        }
        None => vec![],
    };

    Ok(Stmt::If {
        test,
        then_body,
        else_body,
        span,
    })
}

/// Build an optional loop/try `else` clause
fn build_else(pair: Option<Pair<Rule>>, source: &str, span: Span) -> ParseResult<Vec<Stmt>> {
    match pair {
        Some(clause) => {
            let body_pair = next_pair(&mut clause.into_inner(), "else body", span)?;
            build_body(body_pair, source)
        }
        None => Ok(vec![]),
    }
}

fn build_while_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let test = build_expression(next_pair(&mut inner, "while condition", span)?, source)?;
    let body = build_body(next_pair(&mut inner, "while body", span)?, source)?;
    let else_body = build_else(inner.next(), source, span)?;

    Ok(Stmt::While {
        test,
        body,
        else_body,
        span,
    })
}

fn build_for_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let binding = next_pair(&mut inner, "loop variable", span)?.as_str().to_string();
    let iterable = build_expression(next_pair(&mut inner, "loop iterable", span)?, source)?;
    let body = build_body(next_pair(&mut inner, "loop body", span)?, source)?;
    let else_body = build_else(inner.next(), source, span)?;

    Ok(Stmt::For {
        binding,
        iterable,
        body,
        else_body,
        span,
    })
}

fn build_try_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let body = build_block(next_pair(&mut inner, "try body", span)?, source)?;

    let mut catch = None;
    let mut else_body = vec![];
    let mut finally_body = None;
    let mut has_else = false;

    for clause in inner {
        match clause.as_rule() {
            Rule::catch_clause => {
                let mut parts: Vec<Pair<Rule>> = clause.into_inner().collect();
                let block = parts.pop().ok_or_else(|| {
                    ParseError::BuildError("Expected catch body".to_string(), Some(span))
                })?;
                let binding = parts.pop().map(|p| p.as_str().to_string());
                catch = Some(CatchClause {
                    binding,
                    body: build_block(block, source)?,
                });
            }
            Rule::try_else => {
                has_else = true;
                let block = next_pair(&mut clause.into_inner(), "else body", span)?;
                else_body = build_block(block, source)?;
            }
            Rule::finally_clause => {
                let block = next_pair(&mut clause.into_inner(), "finally body", span)?;
                finally_body = Some(build_block(block, source)?);
            }
            _ => {
                return Err(ParseError::BuildError(
                    format!("Unexpected try clause: {:?}", clause.as_rule()),
                    Some(span),
                ))
            }
        }
    }

    if catch.is_none() && finally_body.is_none() {
        return Err(ParseError::BuildError(
            "try statement requires a catch or finally clause".to_string(),
            Some(span),
        ));
    }
    if has_else && catch.is_none() {
        return Err(ParseError::BuildError(
            "try/else requires a catch clause".to_string(),
            Some(span),
        ));
    }

    Ok(Stmt::Try {
        body,
        catch,
        else_body,
        finally_body,
        span,
    })
}

fn build_with_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let parts: Vec<Pair<Rule>> = pair.into_inner().collect();

    // with_stmt = { "with" ~ "(" ~ expression ~ ("as" ~ identifier)? ~ ")" ~ body }
    let (resource_pair, binding, body_pair) = match parts.len() {
        2 => (parts[0].clone(), None, parts[1].clone()),
        3 => (
            parts[0].clone(),
            Some(parts[1].as_str().to_string()),
            parts[2].clone(),
        ),
        n => {
            return Err(ParseError::BuildError(
                format!("Malformed with statement ({} parts)", n),
                Some(span),
            ))
        }
    };

    Ok(Stmt::With {
        resource: build_expression(resource_pair, source)?,
        binding,
        body: build_body(body_pair, source)?,
        span,
    })
}

fn build_assign_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let var = next_pair(&mut inner, "assignment target", span)?.as_str().to_string();

    let mut path = Vec::new();
    let mut op = None;
    let mut value = None;

    for part in inner {
        match part.as_rule() {
            Rule::assign_index => {
                let index_span = pair_to_span(&part, source);
                let index_pair = next_pair(&mut part.into_inner(), "index expression", index_span)?;
                path.push(build_expression(index_pair, source)?);
            }
            Rule::assign_op => {
                op = Some(match part.as_str() {
                    "+=" => AssignOp::Add,
                    "-=" => AssignOp::Sub,
                    "*=" => AssignOp::Mul,
                    "/=" => AssignOp::Div,
                    _ => AssignOp::Set,
                });
            }
            Rule::expression => {
                value = Some(build_expression(part, source)?);
            }
            _ => {}
        }
    }

    match (op, value) {
        (Some(op), Some(value)) => Ok(Stmt::Assign {
            var,
            path,
            op,
            value,
            span,
        }),
        _ => Err(ParseError::BuildError(
            "Malformed assignment".to_string(),
            Some(span),
        )),
    }
}

/* ===================== Expressions ===================== */

fn binary_op(symbol: &str) -> Option<BinaryOp> {
    Some(match symbol {
        "||" => BinaryOp::Or,
        "&&" => BinaryOp::And,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        _ => return None,
    })
}

/// Fold `operand (op operand)*` left-associatively
fn build_binary_chain(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let mut left = build_expression(next_pair(&mut inner, "operand", span)?, source)?;

    while let Some(op_pair) = inner.next() {
        let op = binary_op(op_pair.as_str()).ok_or_else(|| {
            ParseError::BuildError(
                format!("Unknown operator '{}'", op_pair.as_str()),
                Some(pair_to_span(&op_pair, source)),
            )
        })?;
        let right = build_expression(next_pair(&mut inner, "right operand", span)?, source)?;
        let merged = Span::new(
            left.span().start,
            right.span().end,
            left.span().start_line,
            left.span().start_col,
            right.span().end_line,
            right.span().end_col,
        );
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: merged,
        };
    }

    Ok(left)
}

fn build_expression(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    match pair.as_rule() {
        Rule::expression | Rule::paren => {
            let inner = next_pair(&mut pair.into_inner(), "expression", span)?;
            build_expression(inner, source)
        }
        Rule::lambda_expr => {
            let mut inner = pair.into_inner();
            let params_pair = next_pair(&mut inner, "lambda parameters", span)?;
            let params = params_pair
                .into_inner()
                .map(|p| p.as_str().to_string())
                .collect();
            let body = build_expression(next_pair(&mut inner, "lambda body", span)?, source)?;
            Ok(Expr::Lambda {
                params,
                body: Box::new(body),
                span,
            })
        }
        Rule::ternary => {
            let mut inner = pair.into_inner();
            let condition = build_expression(next_pair(&mut inner, "condition", span)?, source)?;
            match inner.next() {
                None => Ok(condition),
                Some(consequent_pair) => {
                    let consequent = build_expression(consequent_pair, source)?;
                    let alternate =
                        build_expression(next_pair(&mut inner, "alternate", span)?, source)?;
                    Ok(Expr::Ternary {
                        condition: Box::new(condition),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                        span,
                    })
                }
            }
        }
        Rule::logic_or
        | Rule::logic_and
        | Rule::equality
        | Rule::comparison
        | Rule::additive
        | Rule::multiplicative => build_binary_chain(pair, source),
        Rule::unary => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner, "operand", span)?;
            match first.as_rule() {
                Rule::unary_op => {
                    let op = if first.as_str() == "-" {
                        UnaryOp::Neg
                    } else {
                        UnaryOp::Not
                    };
                    let operand = build_expression(next_pair(&mut inner, "operand", span)?, source)?;
                    Ok(Expr::Unary {
                        op,
                        operand: Box::new(operand),
                        span,
                    })
                }
                _ => build_expression(first, source),
            }
        }
        Rule::yield_expr => {
            let value = match pair.into_inner().next() {
                Some(value_pair) => Some(Box::new(build_expression(value_pair, source)?)),
                None => None,
            };
            Ok(Expr::Yield { value, span })
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let mut expr = build_expression(next_pair(&mut inner, "primary", span)?, source)?;
            for suffix in inner {
                let suffix_span = pair_to_span(&suffix, source);
                let full = Span::new(
                    span.start,
                    suffix_span.end,
                    span.start_line,
                    span.start_col,
                    suffix_span.end_line,
                    suffix_span.end_col,
                );
                expr = match suffix.as_rule() {
                    Rule::call_args => {
                        let args = suffix
                            .into_inner()
                            .map(|arg| build_expression(arg, source))
                            .collect::<ParseResult<Vec<_>>>()?;
                        Expr::Call {
                            callee: Box::new(expr),
                            args,
                            span: full,
                        }
                    }
                    Rule::index => {
                        let index_pair = next_pair(&mut suffix.into_inner(), "index", suffix_span)?;
                        Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(build_expression(index_pair, source)?),
                            span: full,
                        }
                    }
                    other => {
                        return Err(ParseError::BuildError(
                            format!("Unexpected postfix rule: {:?}", other),
                            Some(suffix_span),
                        ))
                    }
                };
            }
            Ok(expr)
        }
        Rule::list_comp => {
            let mut inner = pair.into_inner();
            let element = build_expression(next_pair(&mut inner, "element", span)?, source)?;
            let binding = next_pair(&mut inner, "loop variable", span)?.as_str().to_string();
            let iterable = build_expression(next_pair(&mut inner, "iterable", span)?, source)?;
            let condition = match inner.next() {
                Some(comp_if) => {
                    let cond_pair = next_pair(&mut comp_if.into_inner(), "condition", span)?;
                    Some(Box::new(build_expression(cond_pair, source)?))
                }
                None => None,
            };
            Ok(Expr::Comprehension {
                element: Box::new(element),
                binding,
                iterable: Box::new(iterable),
                condition,
                span,
            })
        }
        Rule::list_lit => {
            let elements = pair
                .into_inner()
                .map(|element| build_expression(element, source))
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::LitList { elements, span })
        }
        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
            span,
        }),
        Rule::number => {
            let num_str = pair.as_str();
            let v = num_str.parse::<f64>().map_err(|e| {
                ParseError::BuildError(
                    format!("Failed to parse number '{}': {}", num_str, e),
                    Some(span),
                )
            })?;
            Ok(Expr::LitNum { v, span })
        }
        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str() == "true",
            span,
        }),
        Rule::string => {
            // string = ${ "\"" ~ string_inner ~ "\"" }
            let content = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Expr::LitStr {
                v: unescape(content),
                span,
            })
        }
        Rule::null_lit => Ok(Expr::LitNull { span }),
        _ => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
