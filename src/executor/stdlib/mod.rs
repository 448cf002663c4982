//! Standard library function implementations
//!
//! Builtins are resolved by name at the call site; they are not values and
//! cannot be rebound by a kernel.

pub mod list;
pub mod math;

use super::errors::RuntimeError;
use super::expressions::EvalResult;
use super::types::Val;

/* ===================== Builtin Identifiers ===================== */

/// Standard library function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Abs,
    Sqrt,
    Floor,
    Ceil,
    Min,
    Max,
    Sum,
    Range,
    Append,
    Print,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Len,
        Builtin::Abs,
        Builtin::Sqrt,
        Builtin::Floor,
        Builtin::Ceil,
        Builtin::Min,
        Builtin::Max,
        Builtin::Sum,
        Builtin::Range,
        Builtin::Append,
        Builtin::Print,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Abs => "abs",
            Builtin::Sqrt => "sqrt",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Range => "range",
            Builtin::Append => "append",
            Builtin::Print => "print",
        }
    }
}

/* ===================== Stdlib Dispatcher ===================== */

/// Call a standard library function with evaluated arguments
pub fn call_builtin(builtin: Builtin, args: &[Val], lane_id: usize) -> EvalResult {
    match builtin {
        Builtin::Len => list::len(args),
        Builtin::Abs => math::abs(args),
        Builtin::Sqrt => math::sqrt(args),
        Builtin::Floor => math::floor(args),
        Builtin::Ceil => math::ceil(args),
        Builtin::Min => math::min(args),
        Builtin::Max => math::max(args),
        Builtin::Sum => math::sum(args),
        Builtin::Range => list::range(args),
        Builtin::Append => list::append(args),
        Builtin::Print => print(args, lane_id),
    }
}

fn print(args: &[Val], lane_id: usize) -> EvalResult {
    let line = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!(target: "lockstep::kernel", lane = lane_id, "{}", line);
    Ok(Val::Null)
}

/* ===================== Argument Helpers ===================== */

/// Check the argument count of a fixed-arity builtin
pub(crate) fn expect_arity(
    name: &'static str,
    args: &[Val],
    expected: &'static str,
    ok: bool,
) -> Result<(), RuntimeError> {
    if ok {
        Ok(())
    } else {
        Err(arity_error(name, expected, args.len()))
    }
}

pub(crate) fn arity_error(name: &'static str, expected: &'static str, got: usize) -> RuntimeError {
    RuntimeError::Arity {
        name,
        expected,
        got,
    }
}

pub(crate) fn expect_num(name: &str, value: &Val) -> Result<f64, RuntimeError> {
    match value {
        Val::Num(n) => Ok(*n),
        other => Err(RuntimeError::type_error(format!(
            "{}() expects a number, got {}",
            name,
            other.type_name()
        ))),
    }
}

pub(crate) fn expect_int(name: &str, value: &Val) -> Result<i64, RuntimeError> {
    let n = expect_num(name, value)?;
    if n.fract() != 0.0 {
        return Err(RuntimeError::type_error(format!(
            "{}() expects an integer, got {}",
            name, n
        )));
    }
    if n.abs() > MAX_EXACT_INT {
        return Err(RuntimeError::type_error(format!(
            "{}() integer argument {} is too large",
            name, n
        )));
    }
    Ok(n as i64)
}

/// Largest magnitude at which every integer is exactly representable as f64
pub(crate) const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;
