//! Control stack frame types
//!
//! A lane keeps one frame per active loop iterator, try statement and
//! scoped resource. Raised errors and break/continue unwind this stack
//! instead of the host call stack, which is what keeps a lane suspendable.

use super::super::errors::RuntimeError;
use super::values::Val;

/// What to do once a finally body completes
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Fall through to the statement after the try
    Normal,
    /// Continue a break/continue that crossed the finally
    Unwind { depth: usize, target: usize },
    /// Re-raise the error that crossed the finally
    Raise(RuntimeError),
}

/// Control stack frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Active for-loop iterator
    Iter { items: Vec<Val>, next: usize },
    /// Active try statement
    Handler {
        catch: Option<super::program::CatchTarget>,
        finally: Option<usize>,
    },
    /// Executing a finally body
    Finally { pending: Completion },
    /// Active with-statement; restores `previous` on exit
    Scope {
        binding: Option<String>,
        previous: Option<Val>,
    },
}
