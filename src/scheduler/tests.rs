use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::executor::{instrument, Args, Lane, RuntimeError, StepIndex, Val};
use crate::parser::semantic_validator::NodeKind;
use crate::parser::{parse_kernel, KernelDef};

const BRANCHY: &str = r#"
    function f() {
        if (lane == 0) {
            let a = 1
        } else {
            let b = 1
            let c = 1
            let d = 1
        }
        let e = 1
    }
"#;

fn kernel(source: &str) -> KernelDef {
    parse_kernel(source).expect("Parse kernel failed")
}

fn report(source: &str, lanes: usize) -> LockstepReport {
    vectorize_with(&kernel(source), lanes, &Args::new(), &LockstepOptions::default())
        .expect("Vectorize failed")
}

/* ===================== Scripted Lanes ===================== */

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("scripted failure")]
struct ScriptError;

type ResumeLog = Rc<RefCell<Vec<(usize, StepIndex)>>>;

/// A lane that replays a fixed list of steps and logs every resume
struct ScriptedLane {
    id: usize,
    script: Vec<Result<StepIndex, ScriptError>>,
    next: usize,
    sentinel: StepIndex,
    log: ResumeLog,
}

impl Resume for ScriptedLane {
    type Error = ScriptError;

    fn resume(&mut self) -> Result<StepIndex, ScriptError> {
        let result = self.script.get(self.next).cloned().unwrap_or(Ok(self.sentinel));
        self.next += 1;
        if let Ok(step) = result {
            self.log.borrow_mut().push((self.id, step));
        }
        result
    }
}

fn scripted(scripts: Vec<Vec<Result<StepIndex, ScriptError>>>, sentinel: StepIndex) -> (Vec<ScriptedLane>, ResumeLog) {
    let log = ResumeLog::default();
    let lanes = scripts
        .into_iter()
        .enumerate()
        .map(|(id, script)| ScriptedLane {
            id,
            script,
            next: 0,
            sentinel,
            log: Rc::clone(&log),
        })
        .collect();
    (lanes, log)
}

/* ===================== Cost ===================== */

#[test]
fn test_single_lane_costs_one_resume_per_statement() {
    let source = r#"
        function f() {
            let a = 1
            let b = 2
            let c = a + b
        }
    "#;
    let iterations = vectorize(&kernel(source), 1, &Args::new()).expect("Vectorize failed");
    assert_eq!(iterations, 3);
}

#[test]
fn test_uniform_control_flow_costs_lanes_times_steps() {
    let source = r#"
        function f(xs) {
            let total = 0
            if (len(xs) > 0) {
                total = sum(xs)
            }
            let mean = total / max(len(xs), 1)
        }
    "#;
    let args = Args::positional(vec![Val::list(vec![Val::Num(1.0), Val::Num(3.0)])]);
    for lanes in [1, 2, 5, 16] {
        let report = vectorize_with(&kernel(source), lanes, &args, &LockstepOptions::default())
            .expect("Vectorize failed");
        assert_eq!(report.iterations, (lanes * 4) as u64);
        assert_eq!(report.waves, 4);
        assert_eq!(report.catch_up_passes, 0);
        assert_eq!(report.divergent_waves, 0);
        assert_eq!(report.utilization(), 1.0);
    }
}

#[test]
fn test_uniform_loops_stay_converged() {
    let source = r#"
        function f() {
            let acc = 0
            for (let i of range(3)) {
                acc += i
            }
        }
    "#;
    // let, for, then the body three times
    let report = report(source, 4);
    assert_eq!(report.num_steps, 3);
    assert_eq!(report.iterations, 4 * 5);
    assert_eq!(report.divergent_waves, 0);
}

#[test]
fn test_divergent_branch_costs_more_than_uniform() {
    let report = report(BRANCHY, 2);

    assert_eq!(report.num_steps, 6);
    assert_eq!(report.iterations, 8);
    assert!(report.iterations > (2 * 3) as u64);
    assert_eq!(report.waves, 6);
    assert_eq!(report.catch_up_passes, 3);
    assert_eq!(report.divergent_waves, 4);
    assert!((report.utilization() - 8.0 / 12.0).abs() < 1e-9);
}

#[test]
fn test_branch_taken_by_some_lanes_adds_catch_up() {
    let diverging = r#"
        function f() {
            if (lane == 1) {
                let x = 1
            }
            let y = 2
        }
    "#;
    let uniform = r#"
        function f() {
            if (lane == 5) {
                let x = 1
            }
            let y = 2
        }
    "#;
    assert_eq!(report(diverging, 2).iterations, 5);
    assert_eq!(report(uniform, 2).iterations, 4);
}

#[test]
fn test_data_dependent_loop_counts() {
    // Lane i runs the loop body i times
    let source = r#"
        function f() {
            let n = 0
            while (n < lane) {
                n += 1
            }
        }
    "#;
    let report = report(source, 3);
    // Lane i resumes once for `let`, once for `while`, then i times for the body
    assert_eq!(report.iterations, 2 + 3 + 4);
    assert!(report.divergent_waves > 0);
}

/* ===================== Termination ===================== */

#[test]
fn test_every_lane_finishes() {
    let instrumented = instrument(&kernel(BRANCHY)).expect("Instrument failed");
    let mut lanes: Vec<Lane> = (0..3)
        .map(|id| instrumented.spawn(id, &Args::new()).expect("Spawn failed"))
        .collect();

    run_lockstep(
        &mut lanes,
        instrumented.sentinel(),
        instrumented.step_text(),
        &LockstepOptions::default(),
    )
    .expect("Lockstep failed");

    assert!(lanes.iter().all(Lane::is_done));
    assert_eq!(lanes[0].get("a"), Some(&Val::Num(1.0)));
    assert_eq!(lanes[2].get("d"), Some(&Val::Num(1.0)));
    assert!(lanes.iter().all(|lane| lane.get("e") == Some(&Val::Num(1.0))));
}

#[test]
fn test_lane_finishing_first_does_not_stop_others() {
    // Lane 0 reaches the sentinel while lane 1 is still mid-kernel
    let (mut lanes, log) = scripted(vec![vec![Ok(0), Ok(3)], vec![Ok(0), Ok(1), Ok(2), Ok(3)]], 3);

    let report = run_lockstep(&mut lanes, 3, &[], &LockstepOptions::default()).expect("Lockstep failed");

    assert_eq!(report.iterations, 4);
    assert_eq!(log.borrow().last(), Some(&(1, 3)));
}

#[test]
fn test_empty_kernel_costs_nothing() {
    let report = report("function f() { }", 4);
    assert_eq!(report.iterations, 0);
    assert_eq!(report.waves, 0);
    assert_eq!(report.utilization(), 1.0);
}

/* ===================== Phase Ordering ===================== */

#[test]
fn test_caught_up_lane_waits_for_advance_wave() {
    let (mut lanes, log) = scripted(vec![vec![Ok(0), Ok(3), Ok(4)], vec![Ok(0), Ok(1), Ok(3), Ok(4)]], 4);

    let report = run_lockstep(&mut lanes, 4, &[], &LockstepOptions::default()).expect("Lockstep failed");

    assert_eq!(
        *log.borrow(),
        vec![
            // priming
            (0, 0),
            (1, 0),
            // advance at 0
            (0, 3),
            (1, 1),
            // catch-up to 3
            (1, 3),
            // advance at 3
            (0, 4),
            (1, 4),
        ]
    );
    assert_eq!(report.iterations, 5);
    assert_eq!(report.waves, 3);
    assert_eq!(report.catch_up_passes, 1);
}

#[test]
fn test_priming_is_not_counted() {
    let (mut lanes, log) = scripted(vec![vec![Ok(0)], vec![Ok(0)]], 1);
    let report = run_lockstep(&mut lanes, 1, &[], &LockstepOptions::default()).expect("Lockstep failed");

    assert_eq!(log.borrow().len(), 4);
    assert_eq!(report.iterations, 2);
}

/* ===================== Failures ===================== */

#[test]
fn test_scripted_failure_names_lane_and_step() {
    let (mut lanes, _) = scripted(vec![vec![Ok(0), Ok(1)], vec![Ok(0), Err(ScriptError)]], 2);

    let err = run_lockstep(&mut lanes, 2, &[], &LockstepOptions::default()).expect_err("Should fail");
    assert!(matches!(
        err,
        ScheduleError::LaneFailure {
            lane: 1,
            step: 0,
            source: ScriptError
        }
    ));
}

#[test]
fn test_uncaught_kernel_error_aborts_run() {
    let source = r#"
        function f() {
            if (lane == 1) {
                throw "bad lane"
            }
        }
    "#;
    let err = vectorize(&kernel(source), 2, &Args::new()).expect_err("Should fail");
    match err {
        VectorizeError::LaneFailure { lane, step, source } => {
            assert_eq!(lane, 1);
            assert_eq!(step, 1);
            assert_eq!(source, RuntimeError::Thrown { value: Val::from("bad lane") });
        }
        other => panic!("Expected lane failure, got {:?}", other),
    }
}

#[test]
fn test_oversized_range_fails_the_lane() {
    let source = r#"
        function f() {
            let xs = range(9000000000000000000, 9223372036854775807, 1000000000000000000)
        }
    "#;
    let err = vectorize(&kernel(source), 1, &Args::new()).expect_err("Should fail");
    match err {
        VectorizeError::LaneFailure { lane, step, source } => {
            assert_eq!((lane, step), (0, 0));
            assert!(matches!(source, RuntimeError::Type { .. }));
        }
        other => panic!("Expected lane failure, got {:?}", other),
    }
}

#[test]
fn test_caught_kernel_error_does_not_abort() {
    let source = r#"
        function f() {
            let status = "ok"
            try {
                let x = 1 / lane
            } catch (e) {
                status = e
            }
        }
    "#;
    assert!(report(source, 3).iterations > 0);
}

#[test]
fn test_budget_stops_runaway_kernel() {
    let source = r#"
        function f() {
            let n = 0
            while (true) {
                n += 1
            }
        }
    "#;
    let options = LockstepOptions { max_resumes: Some(50) };
    let err = vectorize_with(&kernel(source), 2, &Args::new(), &options).expect_err("Should fail");
    assert!(matches!(err, VectorizeError::BudgetExhausted { budget: 50 }));
}

#[test]
fn test_budget_large_enough_is_not_hit() {
    let options = LockstepOptions { max_resumes: Some(8) };
    let report = vectorize_with(&kernel(BRANCHY), 2, &Args::new(), &options).expect("Vectorize failed");
    assert_eq!(report.iterations, 8);
}

#[test]
#[should_panic(expected = "beyond sentinel")]
fn test_step_past_sentinel_panics() {
    let (mut lanes, _) = scripted(vec![vec![Ok(0), Ok(7)]], 2);
    let _ = run_lockstep(&mut lanes, 2, &[], &LockstepOptions::default());
}

/* ===================== Entry Point Errors ===================== */

#[test]
fn test_comprehension_is_rejected_before_running() {
    let source = r#"
        function f(xs) {
            let ys = [x * 2 for x of xs]
        }
    "#;
    let err = vectorize(&kernel(source), 2, &Args::new()).expect_err("Should fail");
    match err {
        VectorizeError::Structure(violation) => assert_eq!(violation.node, NodeKind::Comprehension),
        other => panic!("Expected structural violation, got {:?}", other),
    }
}

#[test]
fn test_zero_lanes_is_rejected() {
    let err = vectorize(&kernel(BRANCHY), 0, &Args::new()).expect_err("Should fail");
    assert!(matches!(err, VectorizeError::NoLanes));
}

#[test]
fn test_bad_arguments_name_the_lane() {
    let err = vectorize(&kernel("function f(xs) { }"), 2, &Args::new()).expect_err("Should fail");
    assert!(matches!(err, VectorizeError::Arguments { lane: 0, .. }));
    assert_eq!(
        err.to_string(),
        "cannot bind arguments for lane 0: missing required argument 'xs'"
    );
}
