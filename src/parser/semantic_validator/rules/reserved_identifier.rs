//! Rule: Reserved Identifier
//!
//! Every lane receives its ordinal under the name `lane`; the kernel may
//! read it but never rebind it. Parameters must also be unique.
//!
//! # Invalid
//!
//! ```lane
//! function f(lane) { }       // parameter shadows the lane id
//! function f(x, x) { }       // duplicate parameter
//! lane = 3                   // rebinding the lane id
//! for (let lane of xs) { }   // loop variable shadows the lane id
//! ```

use std::collections::HashSet;

use crate::executor::types::ast::{Span, Stmt};
use crate::parser::KernelDef;

use super::super::visit::{walk_body, WalkContext};
use super::super::{NodeKind, StructuralViolation, ValidationRule};

/// Name every lane's ordinal is bound to
pub const LANE_ID: &str = "lane";

/// Rule that protects the lane id binding.
pub struct ReservedIdentifierRule;

impl ReservedIdentifierRule {
    fn reserved(&self, span: Span, what: &str) -> StructuralViolation {
        StructuralViolation::new(
            NodeKind::ReservedName,
            span,
            format!("'{}' is reserved for the lane id and cannot be used as {}", LANE_ID, what),
            self.id(),
        )
    }
}

impl ValidationRule for ReservedIdentifierRule {
    fn id(&self) -> &'static str {
        "reserved-identifier"
    }

    fn description(&self) -> &'static str {
        "The lane id cannot be rebound and parameters must be unique"
    }

    fn validate(&self, kernel: &KernelDef) -> Vec<StructuralViolation> {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        for param in &kernel.params {
            if param.name == LANE_ID {
                violations.push(self.reserved(param.span, "a parameter name"));
            } else if !seen.insert(param.name.as_str()) {
                violations.push(StructuralViolation::new(
                    NodeKind::DuplicateParam,
                    param.span,
                    format!("duplicate parameter '{}'", param.name),
                    self.id(),
                ));
            }
        }

        walk_body(&kernel.body, WalkContext::default(), &mut |stmt, _ctx| {
            let binding = match stmt {
                Stmt::Let { name, .. } => Some((name.as_str(), "a variable name")),
                Stmt::Assign { var, .. } => Some((var.as_str(), "an assignment target")),
                Stmt::For { binding, .. } => Some((binding.as_str(), "a loop variable")),
                Stmt::With {
                    binding: Some(name),
                    ..
                } => Some((name.as_str(), "a resource name")),
                Stmt::Try {
                    catch: Some(catch), ..
                } => catch
                    .binding
                    .as_deref()
                    .map(|name| (name, "an exception name")),
                _ => None,
            };
            if let Some((name, what)) = binding {
                if name == LANE_ID {
                    violations.push(self.reserved(stmt.span(), what));
                }
            }
        });

        violations
    }
}
