//! Flat instruction list produced by the instrumenter
//!
//! Every source statement is preceded by a `Suspend` carrying its step
//! index; control structures are lowered to jumps and control-stack
//! operations so a lane can stop at any statement boundary and be resumed
//! later with nothing but its program counter and stacks.

use super::ast::{AssignOp, Expr};

/// Step index into the flattened statement sequence
pub type StepIndex = usize;

/// Catch target registered by a try statement
#[derive(Debug, Clone, PartialEq)]
pub struct CatchTarget {
    /// First op of the catch body
    pub pc: usize,
    /// Name the raised value is bound to
    pub binding: Option<String>,
}

/// One instruction of a lowered kernel
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Stop here and report the step index to the scheduler
    Suspend(StepIndex),

    /* ===================== Simple statements ===================== */
    Let {
        name: String,
        init: Option<Expr>,
    },
    Assign {
        var: String,
        path: Vec<Expr>,
        op: AssignOp,
        value: Expr,
    },
    Eval(Expr),
    Assert {
        test: Expr,
        message: Option<Expr>,
    },
    Throw(Expr),

    /* ===================== Control flow ===================== */
    /// Jump to `otherwise` when `test` is falsy
    Branch {
        test: Expr,
        otherwise: usize,
    },
    Jump(usize),
    /// Evaluate an iterable and push an iterator frame
    IterStart(Expr),
    /// Bind the next item, or pop the iterator and jump to `exhausted`
    IterNext {
        binding: String,
        exhausted: usize,
    },
    /// Push a handler frame for a try statement
    PushHandler {
        catch: Option<CatchTarget>,
        finally: Option<usize>,
    },
    /// Leave the protected body: later errors skip the catch clause
    DisarmCatch,
    /// Pop the handler frame, entering the finally body if there is one
    PopHandler,
    /// End of a finally body: resume the pending completion
    EndFinally,
    /// Evaluate a resource and push a scope frame
    EnterScope {
        resource: Expr,
        binding: Option<String>,
    },
    ExitScope,
    /// Break/continue: unwind the control stack to `depth`, then jump
    Unwind {
        depth: usize,
        target: usize,
    },
}

/// A lowered kernel body
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub ops: Vec<Op>,
    /// Number of statements; also the sentinel step index
    pub num_steps: usize,
}

impl Program {
    pub fn sentinel(&self) -> StepIndex {
        self.num_steps
    }
}
