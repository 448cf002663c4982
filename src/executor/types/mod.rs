//! Type definitions for the executor
//!
//! This module contains all the core types used by the executor:
//! - AST nodes (Stmt, Expr)
//! - Runtime values (Val)
//! - Lowered programs (Op, Program)
//! - Control stack frames (Frame, Completion)

pub mod ast;
pub mod control;
pub mod program;
pub mod values;

// Re-export all types for convenient access
pub use ast::{AssignOp, BinaryOp, CatchClause, Expr, Param, Span, Stmt, UnaryOp};
pub use control::{Completion, Frame};
pub use program::{CatchTarget, Op, Program, StepIndex};
pub use values::Val;
