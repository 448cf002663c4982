//! Tests for statement instrumentation

use std::rc::Rc;

use super::helpers::{instrument_source, spawn, trace};
use crate::executor::types::{Expr, Op, Span, Stmt};
use crate::executor::{instrument, Args, BindError, Val};
use crate::parser::semantic_validator::NodeKind;
use crate::parser::{parse_kernel, KernelDef};

const NESTED: &str = r#"
    function f(xs) {
        let total = 0
        for (let x of xs) {
            if (x > 1) {
                total += x
            } else {
                continue
            }
        }
        print(total)
    }
"#;

#[test]
fn test_steps_numbered_in_preorder() {
    let kernel = instrument_source(NESTED);

    assert_eq!(kernel.num_steps(), 6);
    assert_eq!(kernel.sentinel(), 6);

    let text = kernel.step_text();
    assert_eq!(text.len(), 6);
    assert_eq!(text[0], "let total = 0");
    assert!(text[1].starts_with("for (let x of xs) {"));
    assert!(text[2].starts_with("if (x > 1) {"));
    assert_eq!(text[3], "total += x");
    assert_eq!(text[4], "continue");
    assert_eq!(text[5], "print(total)");
}

#[test]
fn test_program_ends_with_sentinel() {
    let kernel = instrument_source(NESTED);
    let ops = &kernel.program().ops;

    assert_eq!(ops.last(), Some(&Op::Suspend(6)));

    let suspensions: Vec<usize> = ops
        .iter()
        .filter_map(|op| match op {
            Op::Suspend(step) => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(suspensions, vec![0, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_empty_body() {
    let kernel = instrument_source("function noop() {}");
    assert_eq!(kernel.num_steps(), 0);
    assert_eq!(kernel.program().ops, vec![Op::Suspend(0)]);

    let mut lane = kernel.spawn(0, &Args::new()).expect("Should spawn");
    assert_eq!(lane.resume(), Ok(0));
    assert!(lane.is_done());
}

#[test]
fn test_step_count_matches_statements() {
    let kernel = instrument_source(
        r#"
        function f(n) {
            let i = 0
            while (i < n) {
                try {
                    i += 1
                } catch (e) {
                    throw e
                } finally {
                    assert i > 0
                }
            } else {
                with (i as j) {
                    print(j)
                }
            }
        }
        "#,
    );
    // let, while, try, i += 1, throw, assert, with, print
    assert_eq!(kernel.num_steps(), 8);
}

#[test]
fn test_instrument_twice_is_independent() {
    let kernel = parse_kernel(NESTED).expect("Parse should succeed");
    let first = instrument(&kernel).expect("Should instrument");
    let second = instrument(&kernel).expect("Should instrument");

    assert_eq!(first, second);
    assert!(!Rc::ptr_eq(first.step_text(), second.step_text()));
}

#[test]
fn test_rejected_kernel_produces_nothing() {
    let kernel = parse_kernel(
        r#"
        function f(xs) {
            let ys = [x * 2 for x of xs]
        }
        "#,
    )
    .expect("Parse should succeed");
    let before = kernel.clone();

    let violation = instrument(&kernel).expect_err("Should be rejected");
    assert_eq!(violation.node, NodeKind::Comprehension);
    assert_eq!(kernel, before);
}

#[test]
fn test_blocks_are_not_steps() {
    let kernel = KernelDef {
        name: "f".to_string(),
        params: vec![],
        body: vec![Stmt::Block {
            body: vec![
                Stmt::Let {
                    name: "a".to_string(),
                    init: Some(Expr::num(1.0)),
                    span: Span::default(),
                },
                Stmt::Let {
                    name: "b".to_string(),
                    init: Some(Expr::ident("a")),
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        }],
        span: Span::default(),
    };

    let instrumented = instrument(&kernel).expect("Should instrument");
    assert_eq!(instrumented.num_steps(), 2);

    let mut lane = instrumented.spawn(0, &Args::new()).expect("Should spawn");
    lane.run_to_end().expect("Should run");
    assert_eq!(lane.get("b"), Some(&Val::Num(1.0)));
}

#[test]
fn test_spawn_binds_lane_and_params() {
    let kernel = instrument_source("function f(xs, k = lane * 10) { }");

    let lane = kernel
        .spawn(3, &Args::positional(vec![Val::Null]))
        .expect("Should spawn");
    assert_eq!(lane.id(), 3);
    assert_eq!(lane.get("lane"), Some(&Val::Num(3.0)));
    assert_eq!(lane.get("k"), Some(&Val::Num(30.0)));

    let err = kernel.spawn(0, &Args::new()).expect_err("Should fail");
    assert_eq!(err, BindError::Missing { name: "xs".to_string() });
}

#[test]
fn test_loop_free_trace_is_monotonic() {
    let mut lane = spawn(
        r#"
        function f(x) {
            let y = 0
            if (x > 0) {
                y = 1
                y += 1
            } else {
                y = -1
            }
            try { y *= 2 } finally { y -= 1 }
        }
        "#,
        &Args::positional(vec![Val::Num(5.0)]),
    );

    let steps = trace(&mut lane, 8);
    assert_eq!(steps, vec![0, 1, 2, 3, 5, 6, 7, 8]);
    assert!(steps.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(lane.get("y"), Some(&Val::Num(3.0)));
}

#[test]
fn test_try_else_without_catch_is_lowered() {
    // The grammar requires a catch before else; serialized trees may omit it
    let mut kernel = parse_kernel(
        r#"
        function f() {
            try {
                let a = 1
            } catch {
            } else {
                let b = 2
            } finally {
                let c = 3
            }
        }
        "#,
    )
    .expect("Parse should succeed");
    match &mut kernel.body[0] {
        Stmt::Try { catch, .. } => *catch = None,
        other => panic!("Expected try, got {:?}", other),
    }

    let instrumented = instrument(&kernel).expect("Should instrument");
    assert_eq!(instrumented.num_steps(), 4);
    assert_eq!(instrumented.step_text()[2], "let b = 2");

    let mut lane = instrumented.spawn(0, &Args::new()).expect("Should spawn");
    assert_eq!(trace(&mut lane, 4), vec![0, 1, 2, 3, 4]);
    assert_eq!(lane.get("b"), Some(&Val::Num(2.0)));
    assert_eq!(lane.get("c"), Some(&Val::Num(3.0)));
    assert_eq!(lane.stack_depth(), 0);
}
