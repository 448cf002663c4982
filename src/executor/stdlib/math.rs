//! Numeric builtins

use super::super::errors::RuntimeError;
use super::super::expressions::EvalResult;
use super::super::types::Val;
use super::{expect_arity, expect_num};

fn unary(name: &'static str, args: &[Val], f: impl Fn(f64) -> f64) -> EvalResult {
    expect_arity(name, args, "1", args.len() == 1)?;
    Ok(Val::Num(f(expect_num(name, &args[0])?)))
}

pub fn abs(args: &[Val]) -> EvalResult {
    unary("abs", args, f64::abs)
}

pub fn sqrt(args: &[Val]) -> EvalResult {
    expect_arity("sqrt", args, "1", args.len() == 1)?;
    let n = expect_num("sqrt", &args[0])?;
    if n < 0.0 {
        return Err(RuntimeError::type_error("math domain error"));
    }
    Ok(Val::Num(n.sqrt()))
}

pub fn floor(args: &[Val]) -> EvalResult {
    unary("floor", args, f64::floor)
}

pub fn ceil(args: &[Val]) -> EvalResult {
    unary("ceil", args, f64::ceil)
}

/// Numbers to reduce: either a single list argument or the arguments themselves
fn operands<'a>(name: &'static str, args: &'a [Val]) -> Result<Vec<f64>, RuntimeError> {
    let values: &'a [Val] = match args {
        [Val::List(items)] => items.as_slice(),
        _ => args,
    };
    values.iter().map(|v| expect_num(name, v)).collect()
}

fn extremum(name: &'static str, args: &[Val], pick: fn(f64, f64) -> f64) -> EvalResult {
    expect_arity(name, args, "at least 1", !args.is_empty())?;
    let values = operands(name, args)?;
    values
        .into_iter()
        .reduce(pick)
        .map(Val::Num)
        .ok_or_else(|| RuntimeError::type_error(format!("{}() arg is an empty sequence", name)))
}

pub fn min(args: &[Val]) -> EvalResult {
    extremum("min", args, f64::min)
}

pub fn max(args: &[Val]) -> EvalResult {
    extremum("max", args, f64::max)
}

pub fn sum(args: &[Val]) -> EvalResult {
    expect_arity("sum", args, "1", args.len() == 1)?;
    match &args[0] {
        Val::List(_) => Ok(Val::Num(operands("sum", args)?.into_iter().sum())),
        other => Err(RuntimeError::type_error(format!(
            "sum() expects a list, got {}",
            other.type_name()
        ))),
    }
}
