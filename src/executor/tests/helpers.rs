//! Test helpers for executor tests
//!
//! Common utilities for instrumenting kernels and driving single lanes

use crate::executor::{instrument, Args, InstrumentedKernel, Lane, StepIndex, Val};
use crate::parser::{parse_kernel, KernelDef};

/// Parse kernel source, round-trip it through JSON and instrument it
///
/// The JSON round trip checks that serialized kernels instrument the same
/// way as freshly parsed ones.
pub fn instrument_source(source: &str) -> InstrumentedKernel {
    let kernel = parse_kernel(source).expect("Parse kernel failed");
    let json = serde_json::to_string(&kernel).expect("Kernel serialization failed");
    let kernel: KernelDef = serde_json::from_str(&json).expect("Kernel deserialization failed");
    instrument(&kernel).expect("Instrumentation failed")
}

/// Spawn lane 0 with the given arguments
pub fn spawn(source: &str, args: &Args) -> Lane {
    instrument_source(source)
        .spawn(0, args)
        .expect("Argument binding failed")
}

/// Run lane 0 to completion and return it for inspection
pub fn run(source: &str) -> Lane {
    let mut lane = spawn(source, &Args::new());
    lane.run_to_end().expect("Lane failed");
    lane
}

/// Every step index a lane reports, including the priming resume and the sentinel
pub fn trace(lane: &mut Lane, sentinel: StepIndex) -> Vec<StepIndex> {
    let mut steps = Vec::new();
    loop {
        let step = lane.resume().expect("Lane failed");
        steps.push(step);
        if step == sentinel {
            return steps;
        }
    }
}

/// Build a list of strings and numbers from literals
pub fn list(items: &[Val]) -> Val {
    Val::list(items.to_vec())
}
