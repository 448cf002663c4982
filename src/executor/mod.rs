//! # Executor - Resumable Lane Interpreter
//!
//! Turns a validated kernel into a flat op list (`instrument`) and runs one
//! `Lane` per data item over it.
//!
//! ## Core Principles
//!
//! 1. **One suspension point per statement**: every statement is preceded by
//!    `Op::Suspend(step)`, and the program ends with `Op::Suspend(sentinel)`
//! 2. **No host recursion across suspensions**: loops, handlers and scoped
//!    resources live on the lane's own control stack
//! 3. **Lane isolation**: each lane owns its environment; shared argument
//!    lists are copy-on-write
//! 4. **Pure executor**: no I/O besides `print` logging, no threads

pub mod args;
pub mod errors;
pub mod exec_loop;
pub mod expressions;
pub mod instrument;
pub mod statements;
pub mod stdlib;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use args::Args;
pub use errors::{BindError, RuntimeError};
pub use expressions::{Env, EvalResult};
pub use instrument::{instrument, InstrumentedKernel};
pub use types::{Op, Program, StepIndex, Val};
pub use vm::Lane;
