//! Rule: Disallowed Statement
//!
//! Reports statements that cannot be flattened into one suspension point per
//! statement.
//!
//! # Invalid
//!
//! ```lane
//! function inner() { }   // nested definition
//! class Point { }        // class definition
//! import math            // import
//! return x               // early return
//! throw                  // bare re-raise
//! ```

use crate::executor::types::ast::Stmt;
use crate::parser::KernelDef;

use super::super::visit::{walk_body, WalkContext};
use super::super::{NodeKind, StructuralViolation, ValidationRule};

/// Rule that rejects definitions, imports, returns and re-raises.
pub struct DisallowedStatementRule;

impl ValidationRule for DisallowedStatementRule {
    fn id(&self) -> &'static str {
        "disallowed-statement"
    }

    fn description(&self) -> &'static str {
        "Nested definitions, imports, return and re-raise cannot be instrumented"
    }

    fn validate(&self, kernel: &KernelDef) -> Vec<StructuralViolation> {
        let mut violations = Vec::new();

        walk_body(&kernel.body, WalkContext::default(), &mut |stmt, _ctx| {
            let node = match stmt {
                Stmt::FunctionDef { .. } => NodeKind::FunctionDef,
                Stmt::ClassDef { .. } => NodeKind::ClassDef,
                Stmt::Import { .. } => NodeKind::Import,
                Stmt::Return { .. } => NodeKind::Return,
                Stmt::Throw { value: None, .. } => NodeKind::Reraise,
                _ => return,
            };
            violations.push(StructuralViolation::new(
                node,
                stmt.span(),
                format!("{} statements are not allowed", node),
                self.id(),
            ));
        });

        violations
    }
}
