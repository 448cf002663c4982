//! Tests for try/catch/else/finally and unwinding

use super::helpers::{list, run, spawn};
use crate::executor::{Args, RuntimeError, Val};

fn strs(items: &[&str]) -> Val {
    Val::list(items.iter().map(|s| Val::from(*s)).collect())
}

const ORDERING: &str = r#"
    function f(fail) {
        let log = []
        try {
            log = append(log, "body")
            if (fail) { throw "boom" }
            log = append(log, "body end")
        } catch (e) {
            log = append(log, e)
        } else {
            log = append(log, "else")
        } finally {
            log = append(log, "finally")
        }
        log = append(log, "after")
    }
"#;

#[test]
fn test_try_catch_finally_order() {
    let mut lane = spawn(ORDERING, &Args::positional(vec![Val::Bool(true)]));
    lane.run_to_end().expect("Lane failed");
    assert_eq!(lane.get("log"), Some(&strs(&["body", "boom", "finally", "after"])));
    assert_eq!(lane.stack_depth(), 0);
}

#[test]
fn test_try_else_runs_without_error() {
    let mut lane = spawn(ORDERING, &Args::positional(vec![Val::Bool(false)]));
    lane.run_to_end().expect("Lane failed");
    assert_eq!(
        lane.get("log"),
        Some(&strs(&["body", "body end", "else", "finally", "after"]))
    );
}

#[test]
fn test_catch_runtime_error_message() {
    let lane = run(
        r#"
        function f() {
            let caught = null
            try {
                let x = 1 / 0
            } catch (e) {
                caught = e
            }
        }
        "#,
    );
    assert_eq!(lane.get("caught"), Some(&Val::from("division by zero")));
}

#[test]
fn test_finally_runs_before_error_escapes() {
    let mut lane = spawn(
        r#"
        function f() {
            let log = []
            try {
                throw "boom"
            } finally {
                log = append(log, "finally")
            }
            log = append(log, "unreached")
        }
        "#,
        &Args::new(),
    );
    let err = lane.run_to_end().expect_err("Should fail");
    assert_eq!(err, RuntimeError::Thrown { value: Val::from("boom") });
    assert_eq!(lane.get("log"), Some(&strs(&["finally"])));
}

#[test]
fn test_error_in_catch_goes_through_finally() {
    let mut lane = spawn(
        r#"
        function f() {
            let log = []
            try {
                throw 1
            } catch (e) {
                throw e + 1
            } finally {
                log = append(log, "finally")
            }
        }
        "#,
        &Args::new(),
    );
    let err = lane.run_to_end().expect_err("Should fail");
    assert_eq!(err, RuntimeError::Thrown { value: Val::Num(2.0) });
    assert_eq!(lane.get("log"), Some(&strs(&["finally"])));
}

#[test]
fn test_nested_try_inner_finally_then_outer_catch() {
    let lane = run(
        r#"
        function f() {
            let log = []
            try {
                try {
                    throw "inner"
                } finally {
                    log = append(log, "inner finally")
                }
            } catch (e) {
                log = append(log, e)
            }
        }
        "#,
    );
    assert_eq!(lane.get("log"), Some(&strs(&["inner finally", "inner"])));
    assert_eq!(lane.stack_depth(), 0);
}

#[test]
fn test_break_runs_finally() {
    let lane = run(
        r#"
        function f() {
            let log = []
            for (let i of range(3)) {
                try {
                    if (i == 1) { break }
                    log = append(log, i)
                } finally {
                    log = append(log, "f")
                }
            }
        }
        "#,
    );
    assert_eq!(
        lane.get("log"),
        Some(&list(&[Val::Num(0.0), Val::from("f"), Val::from("f")]))
    );
    assert_eq!(lane.stack_depth(), 0);
}

#[test]
fn test_continue_runs_finally() {
    let lane = run(
        r#"
        function f() {
            let log = []
            for (let i of range(3)) {
                try {
                    if (i == 1) { continue }
                    log = append(log, i)
                } finally {
                    log = append(log, "f")
                }
            }
        }
        "#,
    );
    assert_eq!(
        lane.get("log"),
        Some(&list(&[
            Val::Num(0.0),
            Val::from("f"),
            Val::from("f"),
            Val::Num(2.0),
            Val::from("f"),
        ]))
    );
}

#[test]
fn test_break_in_finally_discards_error() {
    let lane = run(
        r#"
        function f() {
            let n = 0
            while (true) {
                try {
                    throw "lost"
                } finally {
                    n += 1
                    break
                }
            }
        }
        "#,
    );
    assert_eq!(lane.get("n"), Some(&Val::Num(1.0)));
    assert_eq!(lane.stack_depth(), 0);
}

#[test]
fn test_catch_without_binding() {
    let lane = run(
        r#"
        function f() {
            let ok = false
            try { assert false } catch { ok = true }
        }
        "#,
    );
    assert_eq!(lane.get("ok"), Some(&Val::Bool(true)));
}
