//! Validation Rules
//!
//! Each file in this module contains one validation rule:
//!
//! - `disallowed_statement.rs` - Statements that hide control flow (definitions, imports, return, re-raise)
//! - `disallowed_expression.rs` - Expressions that fold several steps into one (ternary, lambda, comprehension, yield)
//! - `loop_control.rs` - break/continue outside a loop
//! - `reserved_identifier.rs` - Rebinding the lane id or repeating a parameter

mod disallowed_expression;
mod disallowed_statement;
mod loop_control;
mod reserved_identifier;

pub use disallowed_expression::DisallowedExpressionRule;
pub use disallowed_statement::DisallowedStatementRule;
pub use loop_control::LoopControlRule;
pub use reserved_identifier::{ReservedIdentifierRule, LANE_ID};
