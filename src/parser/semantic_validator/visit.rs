//! Shared AST traversal for validation rules
//!
//! Nested function and class definitions are reported as a whole, so the
//! walkers never descend into their bodies.

use crate::executor::types::ast::{Expr, Stmt};

/// Structural position of a statement during a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkContext {
    /// Number of enclosing loops whose body (not else clause) contains the statement
    pub loop_depth: usize,
}

impl WalkContext {
    fn in_loop(self) -> Self {
        Self {
            loop_depth: self.loop_depth + 1,
        }
    }
}

/// Visit every statement of a body in pre-order
pub fn walk_body<'a, F>(body: &'a [Stmt], ctx: WalkContext, f: &mut F)
where
    F: FnMut(&'a Stmt, WalkContext),
{
    for stmt in body {
        walk_stmt(stmt, ctx, f);
    }
}

/// Visit a statement, then every statement nested inside it
pub fn walk_stmt<'a, F>(stmt: &'a Stmt, ctx: WalkContext, f: &mut F)
where
    F: FnMut(&'a Stmt, WalkContext),
{
    f(stmt, ctx);

    match stmt {
        Stmt::Block { body, .. } | Stmt::With { body, .. } => walk_body(body, ctx, f),
        Stmt::If {
            then_body,
            else_body,
            ..
        } => {
            walk_body(then_body, ctx, f);
            walk_body(else_body, ctx, f);
        }
        Stmt::While {
            body, else_body, ..
        }
        | Stmt::For {
            body, else_body, ..
        } => {
            walk_body(body, ctx.in_loop(), f);
            walk_body(else_body, ctx, f);
        }
        Stmt::Try {
            body,
            catch,
            else_body,
            finally_body,
            ..
        } => {
            walk_body(body, ctx, f);
            if let Some(catch) = catch {
                walk_body(&catch.body, ctx, f);
            }
            walk_body(else_body, ctx, f);
            if let Some(finally_body) = finally_body {
                walk_body(finally_body, ctx, f);
            }
        }
        Stmt::Let { .. }
        | Stmt::Assign { .. }
        | Stmt::Expr { .. }
        | Stmt::Assert { .. }
        | Stmt::Throw { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. }
        | Stmt::FunctionDef { .. }
        | Stmt::ClassDef { .. }
        | Stmt::Import { .. }
        | Stmt::Return { .. } => {}
    }
}

/// Expressions that belong to the statement itself (not to nested bodies)
pub fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match stmt {
        Stmt::Let { init, .. } => init.iter().collect(),
        Stmt::Assign { path, value, .. } => path.iter().chain(std::iter::once(value)).collect(),
        Stmt::Expr { expr, .. } => vec![expr],
        Stmt::Assert { test, message, .. } => std::iter::once(test).chain(message.iter()).collect(),
        Stmt::Throw { value, .. } | Stmt::Return { value, .. } => value.iter().collect(),
        Stmt::If { test, .. } | Stmt::While { test, .. } => vec![test],
        Stmt::For { iterable, .. } => vec![iterable],
        Stmt::With { resource, .. } => vec![resource],
        Stmt::Block { .. }
        | Stmt::Try { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. }
        | Stmt::FunctionDef { .. }
        | Stmt::ClassDef { .. }
        | Stmt::Import { .. } => vec![],
    }
}

/// Visit an expression and all of its subexpressions in pre-order
pub fn walk_expr<'a, F>(expr: &'a Expr, f: &mut F)
where
    F: FnMut(&'a Expr),
{
    f(expr);

    match expr {
        Expr::LitList { elements, .. } => {
            for element in elements {
                walk_expr(element, f);
            }
        }
        Expr::Index { object, index, .. } => {
            walk_expr(object, f);
            walk_expr(index, f);
        }
        Expr::Call { callee, args, .. } => {
            walk_expr(callee, f);
            for arg in args {
                walk_expr(arg, f);
            }
        }
        Expr::Unary { operand, .. } => walk_expr(operand, f),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            walk_expr(condition, f);
            walk_expr(consequent, f);
            walk_expr(alternate, f);
        }
        Expr::Lambda { body, .. } => walk_expr(body, f),
        Expr::Comprehension {
            element,
            iterable,
            condition,
            ..
        } => {
            walk_expr(element, f);
            walk_expr(iterable, f);
            if let Some(condition) = condition {
                walk_expr(condition, f);
            }
        }
        Expr::Yield { value, .. } => {
            if let Some(value) = value {
                walk_expr(value, f);
            }
        }
        Expr::LitBool { .. }
        | Expr::LitNum { .. }
        | Expr::LitStr { .. }
        | Expr::LitNull { .. }
        | Expr::Ident { .. } => {}
    }
}
