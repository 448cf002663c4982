//! Simple statement execution
//!
//! Handlers for the ops that run a single statement's effect: declarations,
//! assignments, expression statements, assertions and throws. Control-flow
//! ops are handled by the exec loop.

use std::rc::Rc;

use super::errors::RuntimeError;
use super::expressions::{apply_binary, eval_expr, resolve_index};
use super::types::{AssignOp, Expr, Val};
use super::vm::Lane;

/// `let name = init`; without an initializer the variable starts as null
pub fn execute_let(lane: &mut Lane, name: &str, init: Option<&Expr>) -> Result<(), RuntimeError> {
    let value = match init {
        Some(init) => eval_expr(init, &lane.env, lane.id)?,
        None => Val::Null,
    };
    lane.env.insert(name.to_string(), value);
    Ok(())
}

/// `var[path..] op= value`
///
/// The target must already be bound. Writes through a path copy the
/// affected lists first if another lane still shares them.
pub fn execute_assign(
    lane: &mut Lane,
    var: &str,
    path: &[Expr],
    op: AssignOp,
    value: &Expr,
) -> Result<(), RuntimeError> {
    let value = eval_expr(value, &lane.env, lane.id)?;
    let indices = path
        .iter()
        .map(|index| eval_expr(index, &lane.env, lane.id))
        .collect::<Result<Vec<_>, _>>()?;

    let target = lane
        .env
        .get_mut(var)
        .ok_or_else(|| RuntimeError::UndefinedVariable {
            name: var.to_string(),
        })?;
    assign_path(target, &indices, op, value)
}

fn assign_path(target: &mut Val, indices: &[Val], op: AssignOp, value: Val) -> Result<(), RuntimeError> {
    let Some((index, rest)) = indices.split_first() else {
        *target = match op.binary() {
            Some(binary) => apply_binary(binary, target, &value)?,
            None => value,
        };
        return Ok(());
    };

    let items = match target {
        Val::List(items) => Rc::make_mut(items),
        other => {
            return Err(RuntimeError::type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            )))
        }
    };
    let i = resolve_index(index, items.len())?;
    assign_path(&mut items[i], rest, op, value)
}

/// Expression statement; the value is discarded
pub fn execute_eval(lane: &mut Lane, expr: &Expr) -> Result<(), RuntimeError> {
    eval_expr(expr, &lane.env, lane.id)?;
    Ok(())
}

pub fn execute_assert(lane: &mut Lane, test: &Expr, message: Option<&Expr>) -> Result<(), RuntimeError> {
    if eval_expr(test, &lane.env, lane.id)?.is_truthy() {
        return Ok(());
    }
    let message = match message {
        Some(message) => eval_expr(message, &lane.env, lane.id)?.to_string(),
        None => test.to_string(),
    };
    Err(RuntimeError::AssertionFailed { message })
}

/// `throw value`; always produces an error for the exec loop to raise
pub fn execute_throw(lane: &mut Lane, value: &Expr) -> RuntimeError {
    match eval_expr(value, &lane.env, lane.id) {
        Ok(value) => RuntimeError::Thrown { value },
        Err(err) => err,
    }
}
