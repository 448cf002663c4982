//! Structural Validation for Kernels
//!
//! This module provides an extensible rule-based validation system that runs
//! after parsing and before instrumentation. It rejects every construct the
//! instrumenter cannot turn into a flat, statement-by-statement resumable
//! sequence.
//!
//! # Usage
//!
//! ```ignore
//! use lockstep_core::parser::{parse_kernel, semantic_validator::validate_kernel};
//!
//! let kernel = parse_kernel(source)?;
//! validate_kernel(&kernel)?;
//! ```
//!
//! # Architecture
//!
//! 1. **ValidationRule trait** - Each rule implements this trait
//! 2. **Validator** - Collects and runs all rules
//! 3. **StructuralViolation** - The output of validation
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `semantic_validator/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod rules;
pub mod visit;

use std::fmt;

use crate::executor::types::ast::Span;

use super::KernelDef;

// ============================================================================
// Violation Types
// ============================================================================

/// Kind of syntax node that made a kernel unresumable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    FunctionDef,
    ClassDef,
    Import,
    Return,
    Reraise,
    Ternary,
    Lambda,
    Comprehension,
    Yield,
    Break,
    Continue,
    ReservedName,
    DuplicateParam,
}

impl NodeKind {
    /// Whether the node is a statement (as opposed to an expression or binding)
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDef
                | NodeKind::ClassDef
                | NodeKind::Import
                | NodeKind::Return
                | NodeKind::Reraise
                | NodeKind::Break
                | NodeKind::Continue
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::FunctionDef => "function definition",
            NodeKind::ClassDef => "class definition",
            NodeKind::Import => "import",
            NodeKind::Return => "return",
            NodeKind::Reraise => "re-raise",
            NodeKind::Ternary => "conditional expression",
            NodeKind::Lambda => "lambda",
            NodeKind::Comprehension => "comprehension",
            NodeKind::Yield => "yield",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::ReservedName => "reserved name",
            NodeKind::DuplicateParam => "duplicate parameter",
        })
    }
}

/// A construct that cannot be instrumented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{message} at line {}, col {} [{rule_id}]",
    .span.start_line + 1,
    .span.start_col + 1
)]
pub struct StructuralViolation {
    /// The offending node kind
    pub node: NodeKind,
    /// The source location of the node
    pub span: Span,
    /// Human-readable message
    pub message: String,
    /// Which rule produced this violation
    pub rule_id: &'static str,
}

impl StructuralViolation {
    pub fn new(node: NodeKind, span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            node,
            span,
            message: message.into(),
            rule_id,
        }
    }
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all validation rules must implement.
///
/// Each rule is responsible for checking one specific aspect of the code.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "disallowed-statement")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the validation and return any violations found.
    fn validate(&self, kernel: &KernelDef) -> Vec<StructuralViolation>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

/// The main validator that orchestrates all validation rules.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(rules::DisallowedStatementRule),
                Box::new(rules::DisallowedExpressionRule),
                Box::new(rules::LoopControlRule),
                Box::new(rules::ReservedIdentifierRule),
            ],
        }
    }

    /// Run all validation rules and collect violations in source order.
    pub fn validate(&self, kernel: &KernelDef) -> Vec<StructuralViolation> {
        let mut violations: Vec<StructuralViolation> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(kernel))
            .collect();
        // Stable: equal positions keep rule order
        violations.sort_by_key(|v| (v.span.start, v.span.start_line, v.span.start_col));
        violations
    }

    /// Get a list of all registered rules (useful for documentation)
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Return every structural violation in the kernel, earliest first.
pub fn check_kernel(kernel: &KernelDef) -> Vec<StructuralViolation> {
    Validator::new().validate(kernel)
}

/// Validate a kernel, failing with its earliest structural violation.
///
/// Pure check; the kernel is left untouched either way.
pub fn validate_kernel(kernel: &KernelDef) -> Result<(), StructuralViolation> {
    match check_kernel(kernel).into_iter().next() {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}
