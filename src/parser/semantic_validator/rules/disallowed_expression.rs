//! Rule: Disallowed Expression
//!
//! Reports expressions that would let several logical steps collapse into
//! one suspension point, or hide control flow the scheduler cannot observe.
//! Checked everywhere an expression can appear, including parameter
//! defaults and loop headers.
//!
//! # Invalid
//!
//! ```lane
//! let y = x > 0 ? x : -x          // conditional expression
//! let f = v => v * 2              // lambda
//! let ys = [v * 2 for v of xs]    // comprehension
//! yield x                         // inline suspension
//! ```

use crate::executor::types::ast::Expr;
use crate::parser::KernelDef;

use super::super::visit::{stmt_exprs, walk_body, walk_expr, WalkContext};
use super::super::{NodeKind, StructuralViolation, ValidationRule};

/// Rule that rejects ternaries, lambdas, comprehensions and yield.
pub struct DisallowedExpressionRule;

impl ValidationRule for DisallowedExpressionRule {
    fn id(&self) -> &'static str {
        "disallowed-expression"
    }

    fn description(&self) -> &'static str {
        "Conditional expressions, lambdas, comprehensions and yield cannot be instrumented"
    }

    fn validate(&self, kernel: &KernelDef) -> Vec<StructuralViolation> {
        let mut violations = Vec::new();
        let rule_id = self.id();

        let mut check = |expr: &Expr| {
            walk_expr(expr, &mut |node| {
                let kind = match node {
                    Expr::Ternary { .. } => NodeKind::Ternary,
                    Expr::Lambda { .. } => NodeKind::Lambda,
                    Expr::Comprehension { .. } => NodeKind::Comprehension,
                    Expr::Yield { .. } => NodeKind::Yield,
                    _ => return,
                };
                violations.push(StructuralViolation::new(
                    kind,
                    node.span(),
                    format!("{} expressions are not allowed", kind),
                    rule_id,
                ));
            });
        };

        for param in &kernel.params {
            if let Some(default) = &param.default {
                check(default);
            }
        }

        walk_body(&kernel.body, WalkContext::default(), &mut |stmt, _ctx| {
            for expr in stmt_exprs(stmt) {
                check(expr);
            }
        });

        violations
    }
}
