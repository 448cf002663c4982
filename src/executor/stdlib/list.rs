//! Sequence builtins

use super::super::errors::RuntimeError;
use super::super::expressions::EvalResult;
use super::super::types::Val;
use super::{arity_error, expect_arity, expect_int};

/// Longest list `range` will build
pub const MAX_RANGE_LEN: i128 = 10_000_000;

pub fn len(args: &[Val]) -> EvalResult {
    expect_arity("len", args, "1", args.len() == 1)?;
    match &args[0] {
        Val::List(items) => Ok(Val::Num(items.len() as f64)),
        Val::Str(s) => Ok(Val::Num(s.chars().count() as f64)),
        other => Err(RuntimeError::type_error(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

/// `range(stop)`, `range(start, stop)` or `range(start, stop, step)`
pub fn range(args: &[Val]) -> EvalResult {
    let ints = args
        .iter()
        .map(|arg| expect_int("range", arg))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(arity_error("range", "1 to 3", args.len())),
    };
    if step == 0 {
        return Err(RuntimeError::type_error("range() arg 3 must not be zero"));
    }

    // Widened so no intermediate value can overflow
    let (start, span, step) = (i128::from(start), i128::from(stop) - i128::from(start), i128::from(step));
    let count = if span != 0 && (span > 0) == (step > 0) {
        (span + step - step.signum()) / step
    } else {
        0
    };
    if count > MAX_RANGE_LEN {
        return Err(RuntimeError::type_error(format!(
            "range() would produce {} items, more than the limit of {}",
            count, MAX_RANGE_LEN
        )));
    }

    let items = (0..count).map(|k| Val::Num((start + k * step) as f64)).collect();
    Ok(Val::list(items))
}

/// Return a new list with `value` appended; the input list is not modified
pub fn append(args: &[Val]) -> EvalResult {
    expect_arity("append", args, "2", args.len() == 2)?;
    match &args[0] {
        Val::List(items) => {
            let mut items = items.as_ref().clone();
            items.push(args[1].clone());
            Ok(Val::list(items))
        }
        other => Err(RuntimeError::type_error(format!(
            "append() expects a list, got {}",
            other.type_name()
        ))),
    }
}
