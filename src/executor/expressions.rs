//! Expression evaluation
//!
//! Evaluates expressions against a lane's environment. Evaluation never
//! suspends: a whole expression runs inside one step.

use std::collections::HashMap;

use super::errors::RuntimeError;
use super::stdlib::{call_builtin, Builtin};
use super::types::{BinaryOp, Expr, UnaryOp, Val};

/// Function-wide variable environment of a lane
pub type Env = HashMap<String, Val>;

/// Result of evaluating an expression
pub type EvalResult = Result<Val, RuntimeError>;

/// Evaluate an expression to a value
pub fn eval_expr(expr: &Expr, env: &Env, lane_id: usize) -> EvalResult {
    match expr {
        Expr::LitBool { v, .. } => Ok(Val::Bool(*v)),

        Expr::LitNum { v, .. } => Ok(Val::Num(*v)),

        Expr::LitStr { v, .. } => Ok(Val::Str(v.clone())),

        Expr::LitNull { .. } => Ok(Val::Null),

        Expr::LitList { elements, .. } => {
            let items = elements
                .iter()
                .map(|element| eval_expr(element, env, lane_id))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Val::list(items))
        }

        Expr::Ident { name, .. } => env
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable { name: name.clone() }),

        Expr::Index { object, index, .. } => {
            let object = eval_expr(object, env, lane_id)?;
            let index = eval_expr(index, env, lane_id)?;
            index_value(&object, &index)
        }

        Expr::Call { callee, args, .. } => {
            let name = match callee.as_ref() {
                Expr::Ident { name, .. } => name,
                other => {
                    return Err(RuntimeError::type_error(format!(
                        "'{}' is not callable",
                        other
                    )))
                }
            };
            let builtin = Builtin::from_name(name).ok_or_else(|| RuntimeError::UnknownFunction {
                name: name.clone(),
            })?;
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, env, lane_id))
                .collect::<Result<Vec<_>, _>>()?;
            call_builtin(builtin, &args, lane_id)
        }

        Expr::Unary { op, operand, .. } => {
            let value = eval_expr(operand, env, lane_id)?;
            match op {
                UnaryOp::Not => Ok(Val::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    Val::Num(n) => Ok(Val::Num(-n)),
                    other => Err(RuntimeError::type_error(format!(
                        "bad operand type for unary -: {}",
                        other.type_name()
                    ))),
                },
            }
        }

        Expr::Binary {
            op, left, right, ..
        } => {
            let left = eval_expr(left, env, lane_id)?;
            // Short-circuit operators yield the deciding operand
            match op {
                BinaryOp::And if !left.is_truthy() => return Ok(left),
                BinaryOp::Or if left.is_truthy() => return Ok(left),
                BinaryOp::And | BinaryOp::Or => return eval_expr(right, env, lane_id),
                _ => {}
            }
            let right = eval_expr(right, env, lane_id)?;
            apply_binary(*op, &left, &right)
        }

        Expr::Ternary { .. } => Err(RuntimeError::Unsupported {
            construct: "conditional expression",
        }),

        Expr::Lambda { .. } => Err(RuntimeError::Unsupported { construct: "lambda" }),

        Expr::Comprehension { .. } => Err(RuntimeError::Unsupported {
            construct: "comprehension",
        }),

        Expr::Yield { .. } => Err(RuntimeError::Unsupported { construct: "yield" }),
    }
}

/* ===================== Operators ===================== */

/// Apply a non-short-circuit binary operator
pub fn apply_binary(op: BinaryOp, left: &Val, right: &Val) -> EvalResult {
    match (op, left, right) {
        (BinaryOp::Eq, l, r) => Ok(Val::Bool(l == r)),
        (BinaryOp::Ne, l, r) => Ok(Val::Bool(l != r)),

        (BinaryOp::Add, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a + b)),
        (BinaryOp::Add, Val::Str(a), Val::Str(b)) => Ok(Val::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, Val::List(a), Val::List(b)) => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend(a.iter().cloned());
            items.extend(b.iter().cloned());
            Ok(Val::list(items))
        }

        (BinaryOp::Sub, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a - b)),
        (BinaryOp::Mul, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a * b)),

        (BinaryOp::Div, Val::Num(_), Val::Num(b)) if *b == 0.0 => Err(RuntimeError::DivisionByZero),
        (BinaryOp::Div, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a / b)),

        // Remainder takes the sign of the divisor
        (BinaryOp::Rem, Val::Num(_), Val::Num(b)) if *b == 0.0 => Err(RuntimeError::DivisionByZero),
        (BinaryOp::Rem, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a - b * (a / b).floor())),

        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, Val::Num(a), Val::Num(b)) => {
            Ok(Val::Bool(compare(op, a.partial_cmp(b))))
        }
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, Val::Str(a), Val::Str(b)) => {
            Ok(Val::Bool(compare(op, Some(a.cmp(b)))))
        }

        (op, l, r) => Err(RuntimeError::OperandTypes {
            op: op.symbol(),
            left: l.type_name(),
            right: r.type_name(),
        }),
    }
}

fn compare(op: BinaryOp, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ordering) {
        // NaN compares false to everything
        (_, None) => false,
        (BinaryOp::Lt, Some(o)) => o == Less,
        (BinaryOp::Le, Some(o)) => o != Greater,
        (BinaryOp::Gt, Some(o)) => o == Greater,
        (BinaryOp::Ge, Some(o)) => o != Less,
        _ => false,
    }
}

/* ===================== Indexing ===================== */

/// Resolve a (possibly negative) index against a sequence length
pub fn resolve_index(index: &Val, len: usize) -> Result<usize, RuntimeError> {
    let n = match index {
        Val::Num(n) if n.fract() == 0.0 => *n as i64,
        other => {
            return Err(RuntimeError::type_error(format!(
                "indices must be integers, not {}",
                other.type_name()
            )))
        }
    };
    let resolved = if n < 0 { n + len as i64 } else { n };
    if resolved < 0 || resolved >= len as i64 {
        return Err(RuntimeError::IndexOutOfRange { index: n, len });
    }
    Ok(resolved as usize)
}

fn index_value(object: &Val, index: &Val) -> EvalResult {
    match object {
        Val::List(items) => {
            let i = resolve_index(index, items.len())?;
            Ok(items[i].clone())
        }
        Val::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = resolve_index(index, chars.len())?;
            Ok(Val::Str(chars[i].to_string()))
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}
