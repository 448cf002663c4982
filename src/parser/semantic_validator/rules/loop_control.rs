//! Rule: Loop Control
//!
//! Reports `break` and `continue` that are not inside a loop body. A loop's
//! `else` clause does not count as inside the loop.

use crate::executor::types::ast::Stmt;
use crate::parser::KernelDef;

use super::super::visit::{walk_body, WalkContext};
use super::super::{NodeKind, StructuralViolation, ValidationRule};

/// Rule that checks break/continue placement.
pub struct LoopControlRule;

impl ValidationRule for LoopControlRule {
    fn id(&self) -> &'static str {
        "loop-control"
    }

    fn description(&self) -> &'static str {
        "break and continue must appear inside a loop body"
    }

    fn validate(&self, kernel: &KernelDef) -> Vec<StructuralViolation> {
        let mut violations = Vec::new();

        walk_body(&kernel.body, WalkContext::default(), &mut |stmt, ctx| {
            let node = match stmt {
                Stmt::Break { .. } => NodeKind::Break,
                Stmt::Continue { .. } => NodeKind::Continue,
                _ => return,
            };
            if ctx.loop_depth == 0 {
                violations.push(StructuralViolation::new(
                    node,
                    stmt.span(),
                    format!("'{}' outside loop", node),
                    self.id(),
                ));
            }
        });

        violations
    }
}
