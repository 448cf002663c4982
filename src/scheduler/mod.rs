//! Lockstep Scheduler
//!
//! Drives one resumable lane per data item the way a SIMD unit would
//! issue instructions: all lanes execute the *leading* statement together,
//! and lanes that fell behind on a divergent branch are replayed alone
//! until they rejoin.
//!
//! Each pass of the main loop:
//!
//! 1. `leading` = the furthest step any lane reached
//! 2. stop once every lane reports the sentinel
//! 3. **catch-up**: while some lane is behind `leading`, resume every lane
//!    behind it once (one wave per pass)
//! 4. **advance**: resume every lane exactly at `leading` once (one wave)
//!
//! A lane that reaches `leading` during catch-up waits for the advance
//! wave instead of running ahead, so it pays one extra wave of divergence.
//!
//! The divergence cost is the total number of lane resumes in both phases.

mod vectorize;

#[cfg(test)]
mod tests;

use serde::Serialize;
use tracing::{debug, trace};

use crate::executor::{Lane, RuntimeError, StepIndex};

pub use vectorize::{vectorize, vectorize_instrumented, vectorize_with, VectorizeError};

/* ===================== Resume Trait ===================== */

/// A computation that runs to its next statement boundary on request
///
/// Once finished it must keep returning the sentinel.
pub trait Resume {
    type Error;

    fn resume(&mut self) -> Result<StepIndex, Self::Error>;
}

impl Resume for Lane {
    type Error = RuntimeError;

    fn resume(&mut self) -> Result<StepIndex, RuntimeError> {
        Lane::resume(self)
    }
}

/* ===================== Options & Report ===================== */

/// Scheduler options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockstepOptions {
    /// Abort once this many counted resumes have been performed
    pub max_resumes: Option<u64>,
}

/// Outcome of a lockstep run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockstepReport {
    /// Number of lanes driven
    pub lanes: usize,
    /// Statements in the kernel (the sentinel step)
    pub num_steps: usize,
    /// Total lane resumes in catch-up and advance phases
    pub iterations: u64,
    /// Catch-up and advance passes; one simulated instruction issue each
    pub waves: u64,
    /// Catch-up passes among `waves`
    pub catch_up_passes: u64,
    /// Waves in which not every lane took part
    pub divergent_waves: u64,
}

impl LockstepReport {
    /// Fraction of lane slots doing work across all waves
    pub fn utilization(&self) -> f64 {
        if self.waves == 0 || self.lanes == 0 {
            return 1.0;
        }
        self.iterations as f64 / (self.waves as f64 * self.lanes as f64)
    }
}

/* ===================== Errors ===================== */

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError<E: std::error::Error + 'static> {
    /// A lane raised an error nothing inside it caught
    #[error("lane {lane} failed at step {step}: {source}")]
    LaneFailure {
        lane: usize,
        /// Step the lane was resumed from
        step: StepIndex,
        #[source]
        source: E,
    },

    #[error("resume budget of {budget} exhausted")]
    BudgetExhausted { budget: u64 },
}

/* ===================== Scheduler ===================== */

/// Drive `lanes` in lockstep until every one reports `sentinel`
///
/// `step_text` is only used for diagnostics. Resumes within a phase go in
/// ascending lane order.
///
/// # Panics
///
/// Panics if a lane reports a step beyond `sentinel`.
pub fn run_lockstep<L>(
    lanes: &mut [L],
    sentinel: StepIndex,
    step_text: &[String],
    options: &LockstepOptions,
) -> Result<LockstepReport, ScheduleError<L::Error>>
where
    L: Resume,
    L::Error: std::error::Error + 'static,
{
    let mut run = Run {
        report: LockstepReport {
            lanes: lanes.len(),
            num_steps: sentinel,
            ..Default::default()
        },
        sentinel,
        budget: options.max_resumes,
    };

    // Priming resumes position every lane at its first step and are not counted
    let mut frontier = Vec::with_capacity(lanes.len());
    for (i, lane) in lanes.iter_mut().enumerate() {
        frontier.push(run.checked(i, 0, lane.resume())?);
    }

    loop {
        let Some(leading) = frontier.iter().copied().max() else {
            break;
        };
        if frontier.iter().all(|&step| step == sentinel) {
            break;
        }

        let at_leading = frontier.iter().filter(|&&step| step == leading).count();
        debug!(
            leading,
            at_leading,
            percent = 100.0 * at_leading as f64 / frontier.len() as f64,
            text = describe(step_text, leading),
            "Leading step"
        );

        // Catch-up phase
        while frontier.iter().any(|&step| step < leading) {
            let mut resumed = 0;
            for (i, lane) in lanes.iter_mut().enumerate() {
                if frontier[i] < leading {
                    frontier[i] = run.resume(i, frontier[i], lane)?;
                    resumed += 1;
                }
            }
            run.record_wave(resumed, true);
            trace!(
                pass = run.report.catch_up_passes,
                resumed,
                at_leading = frontier.iter().filter(|&&step| step == leading).count(),
                "Catching up"
            );
        }

        if leading == sentinel {
            continue;
        }

        // Advance phase
        let mut resumed = 0;
        for (i, lane) in lanes.iter_mut().enumerate() {
            if frontier[i] == leading {
                frontier[i] = run.resume(i, leading, lane)?;
                resumed += 1;
            }
        }
        run.record_wave(resumed, false);
        trace!(resumed, "Advancing");
    }

    debug!(
        iterations = run.report.iterations,
        waves = run.report.waves,
        divergent_waves = run.report.divergent_waves,
        "Lockstep run finished"
    );
    Ok(run.report)
}

/// Bookkeeping for one scheduler run
struct Run {
    report: LockstepReport,
    sentinel: StepIndex,
    budget: Option<u64>,
}

impl Run {
    /// Counted resume of lane `i`, currently at `step`
    fn resume<L>(&mut self, i: usize, step: StepIndex, lane: &mut L) -> Result<StepIndex, ScheduleError<L::Error>>
    where
        L: Resume,
        L::Error: std::error::Error + 'static,
    {
        if let Some(budget) = self.budget {
            if self.report.iterations >= budget {
                return Err(ScheduleError::BudgetExhausted { budget });
            }
        }
        self.report.iterations += 1;
        self.checked(i, step, lane.resume())
    }

    fn checked<E>(&self, i: usize, step: StepIndex, result: Result<StepIndex, E>) -> Result<StepIndex, ScheduleError<E>>
    where
        E: std::error::Error + 'static,
    {
        let next = result.map_err(|source| ScheduleError::LaneFailure {
            lane: i,
            step,
            source,
        })?;
        assert!(
            next <= self.sentinel,
            "lane {} reported step {} beyond sentinel {}",
            i,
            next,
            self.sentinel
        );
        Ok(next)
    }

    fn record_wave(&mut self, resumed: usize, catch_up: bool) {
        self.report.waves += 1;
        if catch_up {
            self.report.catch_up_passes += 1;
        }
        if resumed < self.report.lanes {
            self.report.divergent_waves += 1;
        }
    }
}

/// First line of a step's text, for log output
fn describe(step_text: &[String], step: StepIndex) -> &str {
    step_text
        .get(step)
        .and_then(|text| text.lines().next())
        .unwrap_or("<end>")
}
