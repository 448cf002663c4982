//! Source reconstruction for AST nodes
//!
//! The instrumenter records the printed form of every statement as its
//! step text, so kernels built directly from AST values (without source)
//! get the same diagnostics as parsed ones.

use std::fmt::{self, Write};

use crate::executor::types::ast::{BinaryOp, Expr, Param, Stmt, UnaryOp};
use crate::executor::types::values::write_num;

const INDENT: &str = "    ";

/// Print a statement as lane script source
pub fn print_stmt(stmt: &Stmt) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_stmt(&mut out, stmt, 0);
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, 0)
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_stmt(self))
    }
}

/* ===================== Statements ===================== */

fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) -> fmt::Result {
    match stmt {
        Stmt::Block { body, .. } => write_block(out, body, depth),
        Stmt::Let { name, init, .. } => match init {
            Some(init) => write!(out, "let {} = {}", name, init),
            None => write!(out, "let {}", name),
        },
        Stmt::Assign {
            var,
            path,
            op,
            value,
            ..
        } => {
            out.push_str(var);
            for index in path {
                write!(out, "[{}]", index)?;
            }
            write!(out, " {} {}", op.symbol(), value)
        }
        Stmt::Expr { expr, .. } => write!(out, "{}", expr),
        Stmt::Assert { test, message, .. } => match message {
            Some(message) => write!(out, "assert {}, {}", test, message),
            None => write!(out, "assert {}", test),
        },
        Stmt::Throw { value, .. } => match value {
            Some(value) => write!(out, "throw {}", value),
            None => write!(out, "throw"),
        },
        Stmt::If {
            test,
            then_body,
            else_body,
            ..
        } => {
            write!(out, "if ({}) ", test)?;
            write_block(out, then_body, depth)?;
            match else_body.as_slice() {
                [] => Ok(()),
                [chained @ Stmt::If { .. }] => {
                    out.push_str(" else ");
                    write_stmt(out, chained, depth)
                }
                body => {
                    out.push_str(" else ");
                    write_block(out, body, depth)
                }
            }
        }
        Stmt::While {
            test,
            body,
            else_body,
            ..
        } => {
            write!(out, "while ({}) ", test)?;
            write_block(out, body, depth)?;
            write_else(out, else_body, depth)
        }
        Stmt::For {
            binding,
            iterable,
            body,
            else_body,
            ..
        } => {
            write!(out, "for (let {} of {}) ", binding, iterable)?;
            write_block(out, body, depth)?;
            write_else(out, else_body, depth)
        }
        Stmt::Try {
            body,
            catch,
            else_body,
            finally_body,
            ..
        } => {
            out.push_str("try ");
            write_block(out, body, depth)?;
            if let Some(catch) = catch {
                match &catch.binding {
                    Some(binding) => write!(out, " catch ({}) ", binding)?,
                    None => out.push_str(" catch "),
                }
                write_block(out, &catch.body, depth)?;
            }
            write_else(out, else_body, depth)?;
            if let Some(finally_body) = finally_body {
                out.push_str(" finally ");
                write_block(out, finally_body, depth)?;
            }
            Ok(())
        }
        Stmt::With {
            resource,
            binding,
            body,
            ..
        } => {
            match binding {
                Some(binding) => write!(out, "with ({} as {}) ", resource, binding)?,
                None => write!(out, "with ({}) ", resource)?,
            }
            write_block(out, body, depth)
        }
        Stmt::Break { .. } => write!(out, "break"),
        Stmt::Continue { .. } => write!(out, "continue"),
        Stmt::FunctionDef {
            name, params, body, ..
        } => {
            write!(out, "function {}(", name)?;
            write_params(out, params)?;
            out.push_str(") ");
            write_block(out, body, depth)
        }
        Stmt::ClassDef { name, body, .. } => {
            write!(out, "class {} ", name)?;
            write_block(out, body, depth)
        }
        Stmt::Import { path, .. } => write!(out, "import {}", path.join(".")),
        Stmt::Return { value, .. } => match value {
            Some(value) => write!(out, "return {}", value),
            None => write!(out, "return"),
        },
    }
}

fn write_block(out: &mut String, body: &[Stmt], depth: usize) -> fmt::Result {
    if body.is_empty() {
        out.push_str("{}");
        return Ok(());
    }
    out.push_str("{\n");
    for stmt in body {
        for _ in 0..=depth {
            out.push_str(INDENT);
        }
        write_stmt(out, stmt, depth + 1)?;
        out.push('\n');
    }
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push('}');
    Ok(())
}

fn write_else(out: &mut String, else_body: &[Stmt], depth: usize) -> fmt::Result {
    if else_body.is_empty() {
        return Ok(());
    }
    out.push_str(" else ");
    write_block(out, else_body, depth)
}

fn write_params(out: &mut String, params: &[Param]) -> fmt::Result {
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&param.name);
        if let Some(default) = &param.default {
            write!(out, " = {}", default)?;
        }
    }
    Ok(())
}

/* ===================== Expressions ===================== */

/// Precedence of the loosest operator in an expression
fn expr_precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Lambda { .. } | Expr::Yield { .. } => 0,
        Expr::Ternary { .. } => 0,
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { .. } => 7,
        _ => 8,
    }
}

/// Write `expr`, parenthesized if it binds looser than `min_precedence`
fn write_expr<W: Write>(f: &mut W, expr: &Expr, min_precedence: u8) -> fmt::Result {
    if expr_precedence(expr) < min_precedence {
        f.write_char('(')?;
        write_expr(f, expr, 0)?;
        return f.write_char(')');
    }

    match expr {
        Expr::LitBool { v, .. } => write!(f, "{}", v),
        Expr::LitNum { v, .. } => write!(f, "{}", NumText(*v)),
        Expr::LitStr { v, .. } => write_string(f, v),
        Expr::LitNull { .. } => f.write_str("null"),
        Expr::LitList { elements, .. } => {
            f.write_char('[')?;
            write_list(f, elements)?;
            f.write_char(']')
        }
        Expr::Ident { name, .. } => f.write_str(name),
        Expr::Index { object, index, .. } => {
            write_expr(f, object, 8)?;
            f.write_char('[')?;
            write_expr(f, index, 0)?;
            f.write_char(']')
        }
        Expr::Call { callee, args, .. } => {
            write_expr(f, callee, 8)?;
            f.write_char('(')?;
            write_list(f, args)?;
            f.write_char(')')
        }
        Expr::Unary { op, operand, .. } => {
            f.write_str(match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            })?;
            write_expr(f, operand, 7)
        }
        Expr::Binary {
            op, left, right, ..
        } => {
            let precedence = op.precedence();
            write_expr(f, left, precedence)?;
            write!(f, " {} ", op.symbol())?;
            // Left-associative: an equal-precedence right operand needs parens
            write_expr(f, right, precedence + 1)
        }
        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            write_expr(f, condition, BinaryOp::Or.precedence())?;
            f.write_str(" ? ")?;
            write_expr(f, consequent, 0)?;
            f.write_str(" : ")?;
            write_expr(f, alternate, 0)
        }
        Expr::Lambda { params, body, .. } => {
            if params.len() == 1 {
                f.write_str(&params[0])?;
            } else {
                write!(f, "({})", params.join(", "))?;
            }
            f.write_str(" => ")?;
            write_expr(f, body, 0)
        }
        Expr::Comprehension {
            element,
            binding,
            iterable,
            condition,
            ..
        } => {
            f.write_char('[')?;
            write_expr(f, element, 0)?;
            write!(f, " for {} of ", binding)?;
            write_expr(f, iterable, 0)?;
            if let Some(condition) = condition {
                f.write_str(" if ")?;
                write_expr(f, condition, 0)?;
            }
            f.write_char(']')
        }
        Expr::Yield { value, .. } => match value {
            Some(value) => {
                f.write_str("yield ")?;
                write_expr(f, value, 7)
            }
            None => f.write_str("yield"),
        },
    }
}

fn write_list<W: Write>(f: &mut W, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_expr(f, item, 0)?;
    }
    Ok(())
}

fn write_string<W: Write>(f: &mut W, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            other => f.write_char(other)?,
        }
    }
    f.write_char('"')
}

struct NumText(f64);

impl fmt::Display for NumText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_num(f, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_kernel, parse_statement};

    fn round_trip(source: &str) -> String {
        print_stmt(&parse_statement(source).expect("Should parse"))
    }

    #[test]
    fn test_print_simple_statements() {
        assert_eq!(round_trip("let x = 1"), "let x = 1");
        assert_eq!(round_trip("xs[i][j] += 2.5"), "xs[i][j] += 2.5");
        assert_eq!(round_trip("print(\"a\\n\", [1, 2])"), "print(\"a\\n\", [1, 2])");
        assert_eq!(round_trip("assert x > 0, \"positive\""), "assert x > 0, \"positive\"");
    }

    #[test]
    fn test_print_keeps_needed_parentheses() {
        assert_eq!(round_trip("x = (a + b) * c"), "x = (a + b) * c");
        assert_eq!(round_trip("x = a - (b - c)"), "x = a - (b - c)");
        assert_eq!(round_trip("x = a - b - c"), "x = a - b - c");
        assert_eq!(round_trip("x = -(a + 1)"), "x = -(a + 1)");
        assert_eq!(round_trip("x = a || b && c"), "x = a || b && c");
    }

    #[test]
    fn test_print_compound_statement() {
        let source = "if (x < 3) { y = 1 } else if (x < 5) { y = 2 } else { y = 3 }";
        let expected = "if (x < 3) {\n    y = 1\n} else if (x < 5) {\n    y = 2\n} else {\n    y = 3\n}";
        assert_eq!(round_trip(source), expected);
    }

    #[test]
    fn test_print_nested_indentation() {
        let kernel = parse_kernel(
            r#"
            function f(xs) {
                for (let x of xs) {
                    while (x > 0) { x -= 1 }
                }
            }
            "#,
        )
        .expect("Should parse");
        let expected = "for (let x of xs) {\n    while (x > 0) {\n        x -= 1\n    }\n}";
        assert_eq!(print_stmt(&kernel.body[0]), expected);
    }

    #[test]
    fn test_print_rejected_forms() {
        assert_eq!(round_trip("y = c ? a : b"), "y = c ? a : b");
        assert_eq!(round_trip("f = x => x + 1"), "f = x => x + 1");
        assert_eq!(
            round_trip("ys = [x * 2 for x of xs if x > 1]"),
            "ys = [x * 2 for x of xs if x > 1]"
        );
    }
}
