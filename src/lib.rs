//! # Lockstep
//!
//! Estimates how much a scalar kernel would cost on a SIMD machine when its
//! lanes diverge. A kernel is a single function in a small statement
//! language. Every statement becomes a suspension point; one interpreter
//! lane runs per data item and the scheduler advances lanes in lockstep,
//! counting the resumes needed to drive them all to the end.
//!
//! ```rust,no_run
//! use lockstep_core::{parse_kernel, vectorize, Args};
//!
//! let kernel = parse_kernel("function f() { if (lane == 0) { let a = 1 } let b = 2 }")?;
//! let iterations = vectorize(&kernel, 4, &Args::new())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod dataset;
pub mod executor;
pub mod parser;
pub mod scheduler;

pub use executor::{instrument, Args, InstrumentedKernel, Lane, RuntimeError, StepIndex, Val};
pub use parser::semantic_validator::{NodeKind, StructuralViolation};
pub use parser::{parse_kernel, KernelDef, ParseError};
pub use scheduler::{
    run_lockstep, vectorize, vectorize_with, LockstepOptions, LockstepReport, Resume, ScheduleError,
    VectorizeError,
};
