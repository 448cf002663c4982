//! Tests for the kernel parser

use super::*;

// ============================================================================
// Helper Functions
// ============================================================================

fn parse(source: &str) -> KernelDef {
    parse_kernel(source).expect("Parse should succeed")
}

fn stmt(source: &str) -> Stmt {
    parse_statement(source).expect("Statement should parse")
}

fn expr_of(source: &str) -> Expr {
    match stmt(source) {
        Stmt::Expr { expr, .. } => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

// ============================================================================
// Kernel Structure
// ============================================================================

#[test]
fn test_parse_kernel_signature() {
    let kernel = parse(
        r#"
        function reduce(offsets, content, scale = 2) {
            let total = 0
        }
        "#,
    );

    assert_eq!(kernel.name, "reduce");
    let names: Vec<&str> = kernel.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["offsets", "content", "scale"]);
    assert!(kernel.params[0].default.is_none());
    assert!(matches!(
        kernel.params[2].default,
        Some(Expr::LitNum { v, .. }) if v == 2.0
    ));
    assert_eq!(kernel.body.len(), 1);
}

#[test]
fn test_parse_empty_kernel() {
    let kernel = parse("function noop() {}");
    assert_eq!(kernel.name, "noop");
    assert!(kernel.params.is_empty());
    assert!(kernel.body.is_empty());
}

#[test]
fn test_parse_comments_and_semicolons() {
    let kernel = parse(
        r#"
        // leading comment
        function f(x) {
            let a = 1; /* inline */ let b = 2;
            a += b // trailing
        }
        "#,
    );
    assert_eq!(kernel.body.len(), 3);
}

#[test]
fn test_parse_requires_single_function() {
    assert!(parse_kernel("let x = 1").is_err());
    assert!(parse_kernel("function a() {} function b() {}").is_err());
}

#[test]
fn test_parse_span_positions() {
    let kernel = parse("function f() {\n    let x = 1\n}");
    let span = kernel.body[0].span();
    assert_eq!(span.start_line, 1);
    assert_eq!(span.start_col, 4);
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_parse_assignments() {
    match stmt("xs[i][0] -= 1") {
        Stmt::Assign { var, path, op, .. } => {
            assert_eq!(var, "xs");
            assert_eq!(path.len(), 2);
            assert_eq!(op, AssignOp::Sub);
        }
        other => panic!("Expected assignment, got {:?}", other),
    }

    assert!(matches!(stmt("x = 1"), Stmt::Assign { op: AssignOp::Set, .. }));
    // Comparison is an expression statement, not an assignment
    assert!(matches!(stmt("x == 1"), Stmt::Expr { .. }));
}

#[test]
fn test_parse_if_else_chain() {
    let parsed = stmt("if (x < 1) { a = 1 } else if (x < 2) b = 2 else { c = 3 }");
    match parsed {
        Stmt::If {
            then_body,
            else_body,
            ..
        } => {
            assert_eq!(then_body.len(), 1);
            assert_eq!(else_body.len(), 1);
            match &else_body[0] {
                Stmt::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    assert_eq!(then_body.len(), 1);
                    assert_eq!(else_body.len(), 1);
                }
                other => panic!("Expected chained if, got {:?}", other),
            }
        }
        other => panic!("Expected if, got {:?}", other),
    }
}

#[test]
fn test_parse_loops_with_else() {
    match stmt("for (let x of xs) { total += x } else { done = true }") {
        Stmt::For {
            binding,
            body,
            else_body,
            ..
        } => {
            assert_eq!(binding, "x");
            assert_eq!(body.len(), 1);
            assert_eq!(else_body.len(), 1);
        }
        other => panic!("Expected for, got {:?}", other),
    }

    match stmt("while (i > 0) i -= 1") {
        Stmt::While {
            body, else_body, ..
        } => {
            assert_eq!(body.len(), 1);
            assert!(else_body.is_empty());
        }
        other => panic!("Expected while, got {:?}", other),
    }
}

#[test]
fn test_parse_try_clauses() {
    match stmt("try { a = 1 } catch (e) { b = e } else { c = 1 } finally { d = 1 }") {
        Stmt::Try {
            body,
            catch,
            else_body,
            finally_body,
            ..
        } => {
            assert_eq!(body.len(), 1);
            let catch = catch.expect("catch clause");
            assert_eq!(catch.binding.as_deref(), Some("e"));
            assert_eq!(else_body.len(), 1);
            assert_eq!(finally_body.map(|b| b.len()), Some(1));
        }
        other => panic!("Expected try, got {:?}", other),
    }

    assert!(matches!(
        stmt("try { a = 1 } finally { }"),
        Stmt::Try { catch: None, finally_body: Some(_), .. }
    ));
}

#[test]
fn test_parse_try_requires_handler() {
    let err = parse_statement("try { a = 1 }").expect_err("Should fail");
    assert!(err.message().contains("catch or finally"));

    let err = parse_statement("try { a = 1 } else { b = 1 } finally { }").expect_err("Should fail");
    assert!(err.message().contains("requires a catch"));
}

#[test]
fn test_parse_with_statement() {
    match stmt("with (open(path) as f) { n = len(f) }") {
        Stmt::With { binding, body, .. } => {
            assert_eq!(binding.as_deref(), Some("f"));
            assert_eq!(body.len(), 1);
        }
        other => panic!("Expected with, got {:?}", other),
    }
    assert!(matches!(stmt("with (lock) { }"), Stmt::With { binding: None, .. }));
}

#[test]
fn test_parse_throw_and_assert() {
    assert!(matches!(stmt("throw \"bad\""), Stmt::Throw { value: Some(_), .. }));
    assert!(matches!(stmt("throw"), Stmt::Throw { value: None, .. }));
    assert!(matches!(
        stmt("assert x > 0, \"positive\""),
        Stmt::Assert { message: Some(_), .. }
    ));
}

#[test]
fn test_parse_rejected_statement_forms() {
    assert!(matches!(stmt("function g() { }"), Stmt::FunctionDef { .. }));
    assert!(matches!(stmt("class Point { }"), Stmt::ClassDef { .. }));
    match stmt("import numpy.linalg") {
        Stmt::Import { path, .. } => assert_eq!(path, vec!["numpy", "linalg"]),
        other => panic!("Expected import, got {:?}", other),
    }
    assert!(matches!(stmt("return x"), Stmt::Return { value: Some(_), .. }));
}

// ============================================================================
// Keywords and Identifiers
// ============================================================================

#[test]
fn test_keyword_prefixes_are_identifiers() {
    for name in ["letter", "offsets", "format", "iffy", "assertion", "asymmetry", "classes", "nullable"] {
        match stmt(&format!("{} = 1", name)) {
            Stmt::Assign { var, .. } => assert_eq!(var, name),
            other => panic!("Expected assignment to {}, got {:?}", name, other),
        }
    }
}

#[test]
fn test_keywords_are_not_identifiers() {
    assert!(parse_statement("let if = 1").is_err());
    assert!(parse_statement("let of = 1").is_err());
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_parse_operator_precedence() {
    match expr_of("a + b * c") {
        Expr::Binary { op, right, .. } => {
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("Expected binary, got {:?}", other),
    }

    match expr_of("a || b && c == d") {
        Expr::Binary { op, right, .. } => {
            assert_eq!(op, BinaryOp::Or);
            assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
        }
        other => panic!("Expected binary, got {:?}", other),
    }
}

#[test]
fn test_parse_left_associative() {
    match expr_of("a - b - c") {
        Expr::Binary { left, right, .. } => {
            assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
            assert!(matches!(*right, Expr::Ident { .. }));
        }
        other => panic!("Expected binary, got {:?}", other),
    }
}

#[test]
fn test_parse_postfix_chain() {
    match expr_of("f(xs)[0][1]") {
        Expr::Index { object, .. } => match *object {
            Expr::Index { object, .. } => {
                assert!(matches!(*object, Expr::Call { .. }));
            }
            other => panic!("Expected index, got {:?}", other),
        },
        other => panic!("Expected index, got {:?}", other),
    }
}

#[test]
fn test_parse_literals() {
    assert!(matches!(expr_of("1.5e3"), Expr::LitNum { v, .. } if v == 1500.0));
    assert!(matches!(expr_of("true"), Expr::LitBool { v: true, .. }));
    assert!(matches!(expr_of("null"), Expr::LitNull { .. }));
    match expr_of(r#""a\"b\n""#) {
        Expr::LitStr { v, .. } => assert_eq!(v, "a\"b\n"),
        other => panic!("Expected string, got {:?}", other),
    }
    match expr_of("[1, [2, 3], ]") {
        Expr::LitList { elements, .. } => assert_eq!(elements.len(), 2),
        other => panic!("Expected list, got {:?}", other),
    }
    assert!(matches!(
        expr_of("-x"),
        Expr::Unary { op: UnaryOp::Neg, .. }
    ));
}

#[test]
fn test_parse_rejected_expression_forms() {
    assert!(matches!(expr_of("c ? a : b"), Expr::Ternary { .. }));
    assert!(matches!(expr_of("(a, b) => a + b"), Expr::Lambda { .. }));
    match expr_of("x => x * 2") {
        Expr::Lambda { params, .. } => assert_eq!(params, vec!["x"]),
        other => panic!("Expected lambda, got {:?}", other),
    }
    match expr_of("[x for x of xs if x > 0]") {
        Expr::Comprehension {
            binding, condition, ..
        } => {
            assert_eq!(binding, "x");
            assert!(condition.is_some());
        }
        other => panic!("Expected comprehension, got {:?}", other),
    }
    assert!(matches!(expr_of("yield x"), Expr::Yield { value: Some(_), .. }));
}

// ============================================================================
// Serialization and Errors
// ============================================================================

#[test]
fn test_kernel_json_round_trip() {
    let kernel = parse(
        r#"
        function f(xs, k = 1) {
            let total = 0
            for (let x of xs) {
                if (x > k) { total += x } else { continue }
            }
            try { assert total > 0 } catch (e) { total = -1 } finally { }
        }
        "#,
    );

    let json = serde_json::to_string(&kernel).expect("Serialize should succeed");
    let back: KernelDef = serde_json::from_str(&json).expect("Deserialize should succeed");
    assert_eq!(back, kernel);
}

#[test]
fn test_kernel_json_without_spans() {
    let json = r#"{
        "name": "f",
        "params": [{"name": "x", "default": null}],
        "body": [
            {"t": "Let", "name": "y", "init": {"t": "Ident", "name": "x"}}
        ]
    }"#;
    let kernel: KernelDef = serde_json::from_str(json).expect("Deserialize should succeed");
    assert_eq!(kernel.body, vec![Stmt::Let {
        name: "y".to_string(),
        init: Some(Expr::ident("x")),
        span: Span::default(),
    }]);
}

#[test]
fn test_parse_error_location() {
    let err = parse_kernel("function f() {\n    let = 1\n}").expect_err("Should fail");
    assert!(matches!(err, ParseError::PestError(..)));
    let span = err.span().expect("Error should carry a location");
    assert_eq!(span.start_line, 1);
}
