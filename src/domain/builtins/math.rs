//! Element-wise math. Scalars stay scalars.

use super::{Builtin, CallContext};
use crate::domain::error::FormulaError;
use crate::domain::value::{Value, truthy};

pub const BUILTINS: &[Builtin] = &[
    Builtin::fixed("LOG", 1, "LOG(X)", builtin_log),
    Builtin::fixed("EXP", 1, "EXP(X)", builtin_exp),
    Builtin::fixed("SQRT", 1, "SQRT(X)", builtin_sqrt),
    Builtin::fixed("POW", 2, "POW(X, Y)", builtin_pow),
    Builtin::fixed("ABS", 1, "ABS(X)", builtin_abs),
    Builtin::fixed("IF", 3, "IF(COND, A, B)", builtin_if),
];

fn builtin_log(args: &[Value], _ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    Ok(args[0].clone().map(f64::ln))
}

fn builtin_exp(args: &[Value], _ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    Ok(args[0].clone().map(f64::exp))
}

fn builtin_sqrt(args: &[Value], _ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    Ok(args[0].clone().map(f64::sqrt))
}

fn builtin_abs(args: &[Value], _ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    Ok(args[0].clone().map(f64::abs))
}

fn builtin_pow(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    Ok(args[0].zip_with(&args[1], ctx.len, f64::powf))
}

/// Row-wise select: `A` where `COND` is non-zero and not `NaN`, else `B`.
fn builtin_if(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let pick = |i: usize| {
        if truthy(args[0].at(i)) {
            args[1].at(i)
        } else {
            args[2].at(i)
        }
    };
    if args.iter().any(Value::is_series) {
        Ok(Value::Series((0..ctx.len).map(pick).collect()))
    } else {
        Ok(Value::Scalar(pick(0)))
    }
}
