//! Kernel-level entry points
//!
//! Instrument a kernel, start one lane per data item with the same
//! arguments, and drive them through the lockstep scheduler.

use tracing::info;

use super::{run_lockstep, LockstepOptions, LockstepReport, ScheduleError};
use crate::executor::{instrument, Args, BindError, InstrumentedKernel, RuntimeError, StepIndex};
use crate::parser::semantic_validator::StructuralViolation;
use crate::parser::KernelDef;

#[derive(Debug, thiserror::Error)]
pub enum VectorizeError {
    #[error("kernel cannot be vectorized: {0}")]
    Structure(#[from] StructuralViolation),

    #[error("lane count must be at least 1")]
    NoLanes,

    #[error("cannot bind arguments for lane {lane}: {source}")]
    Arguments {
        lane: usize,
        #[source]
        source: BindError,
    },

    #[error("lane {lane} failed at step {step}: {source}")]
    LaneFailure {
        lane: usize,
        step: StepIndex,
        #[source]
        source: RuntimeError,
    },

    #[error("resume budget of {budget} exhausted")]
    BudgetExhausted { budget: u64 },
}

impl From<ScheduleError<RuntimeError>> for VectorizeError {
    fn from(err: ScheduleError<RuntimeError>) -> Self {
        match err {
            ScheduleError::LaneFailure { lane, step, source } => {
                VectorizeError::LaneFailure { lane, step, source }
            }
            ScheduleError::BudgetExhausted { budget } => VectorizeError::BudgetExhausted { budget },
        }
    }
}

/// Run `kernel` on `lanes` lanes and return the total lane resumes
///
/// Non-divergent kernels cost exactly `lanes * num_steps`.
pub fn vectorize(kernel: &KernelDef, lanes: usize, args: &Args) -> Result<u64, VectorizeError> {
    vectorize_with(kernel, lanes, args, &LockstepOptions::default()).map(|report| report.iterations)
}

/// Like [`vectorize`], returning the full report
pub fn vectorize_with(
    kernel: &KernelDef,
    lanes: usize,
    args: &Args,
    options: &LockstepOptions,
) -> Result<LockstepReport, VectorizeError> {
    let instrumented = instrument(kernel)?;
    vectorize_instrumented(&instrumented, lanes, args, options)
}

/// Run an already instrumented kernel
///
/// Every lane is bound before any of them runs.
pub fn vectorize_instrumented(
    kernel: &InstrumentedKernel,
    lanes: usize,
    args: &Args,
    options: &LockstepOptions,
) -> Result<LockstepReport, VectorizeError> {
    if lanes == 0 {
        return Err(VectorizeError::NoLanes);
    }

    let mut running = (0..lanes)
        .map(|lane| {
            kernel
                .spawn(lane, args)
                .map_err(|source| VectorizeError::Arguments { lane, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        kernel = kernel.name(),
        lanes,
        num_steps = kernel.num_steps(),
        "Starting lockstep run"
    );

    let report = run_lockstep(&mut running, kernel.sentinel(), kernel.step_text(), options)?;

    info!(
        kernel = kernel.name(),
        iterations = report.iterations,
        waves = report.waves,
        utilization = report.utilization(),
        "Lockstep run complete"
    );
    Ok(report)
}
