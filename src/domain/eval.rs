//! Formula evaluation.
//!
//! Walks a parsed [`Expr`] against an [`EvaluationContext`]. Identifiers only
//! resolve through the context; there is no other way for a formula to reach
//! data or functions.
//!
//! # Evaluation Semantics
//!
//! - Arithmetic broadcasts scalars against series, row by row
//! - Comparisons yield `1.0`/`0.0`; any comparison involving `NaN` is `0.0`
//! - `&` and `|` treat non-zero, non-`NaN` values as true
//! - Calls check arity before their arguments are evaluated
//! - The formula's final column must not contain `±inf`

use crate::domain::builtins::CallContext;
use crate::domain::context::{ContextEntry, EvaluationContext};
use crate::domain::error::FormulaError;
use crate::domain::formula::{BinaryOp, Expr, UnaryOp};
use crate::domain::formula_parser::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_FORMULA_LEN, ParseLimits};
use crate::domain::value::{Value, from_bool, truthy};

pub const DEFAULT_MAX_WINDOW: usize = 5000;
pub const DEFAULT_MAX_NODES: usize = 1024;

/// Per-engine limits on what a single formula may cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalBudget {
    /// Largest window or lag any builtin may be asked for.
    pub max_window: usize,
    /// Tallest expression tree the parser accepts.
    pub max_depth: usize,
    /// Longest formula text, in bytes.
    pub max_formula_len: usize,
    /// Most AST nodes a single formula may contain.
    pub max_nodes: usize,
}

impl Default for EvalBudget {
    fn default() -> Self {
        Self {
            max_window: DEFAULT_MAX_WINDOW,
            max_depth: DEFAULT_MAX_DEPTH,
            max_formula_len: DEFAULT_MAX_FORMULA_LEN,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl EvalBudget {
    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_len: self.max_formula_len,
            max_depth: self.max_depth,
        }
    }
}

/// Evaluate `expr` to a column of `ctx.len()` rows.
pub fn evaluate_column(
    expr: &Expr,
    ctx: &EvaluationContext<'_>,
    budget: &EvalBudget,
) -> Result<Vec<f64>, FormulaError> {
    let nodes = expr.node_count();
    if nodes > budget.max_nodes {
        return Err(FormulaError::BudgetExceeded {
            reason: format!(
                "formula has {} nodes, maximum is {}",
                nodes, budget.max_nodes
            ),
        });
    }
    let column = evaluate(expr, ctx, budget)?.into_series(ctx.len());
    if let Some(row) = column.iter().position(|v| v.is_infinite()) {
        return Err(FormulaError::NonFinite { row });
    }
    Ok(column)
}

/// Evaluate `expr` to a scalar or series value.
pub fn evaluate(
    expr: &Expr,
    ctx: &EvaluationContext<'_>,
    budget: &EvalBudget,
) -> Result<Value, FormulaError> {
    match expr {
        Expr::Number(v) => Ok(Value::Scalar(*v)),
        Expr::Ident(name) => match ctx.lookup(name) {
            Some(ContextEntry::Series(values)) => Ok(Value::Series(values.to_vec())),
            Some(ContextEntry::Function(_)) => Err(FormulaError::NotAValue(name.clone())),
            Some(ContextEntry::Unbound) => Err(FormulaError::UnboundVariable(name.clone())),
            None => Err(FormulaError::UnknownIdentifier(name.clone())),
        },
        Expr::Call { name, args } => {
            let builtin = match ctx.lookup(name) {
                Some(ContextEntry::Function(builtin)) => *builtin,
                Some(_) => return Err(FormulaError::NotAFunction(name.clone())),
                None => return Err(FormulaError::UnknownIdentifier(name.clone())),
            };
            builtin.check_arity(args.len())?;
            let values = args
                .iter()
                .map(|arg| evaluate(arg, ctx, budget))
                .collect::<Result<Vec<_>, _>>()?;
            let call = CallContext {
                name: builtin.name,
                len: ctx.len(),
                max_window: budget.max_window,
            };
            (builtin.func)(&values, &call)
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, ctx, budget)?;
            Ok(match op {
                UnaryOp::Neg => value.map(|v| -v),
                UnaryOp::Plus => value,
            })
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, ctx, budget)?;
            let r = evaluate(right, ctx, budget)?;
            Ok(l.zip_with(&r, ctx.len(), binary_fn(*op)))
        }
    }
}

fn binary_fn(op: BinaryOp) -> fn(f64, f64) -> f64 {
    match op {
        BinaryOp::Add => |a, b| a + b,
        BinaryOp::Sub => |a, b| a - b,
        BinaryOp::Mul => |a, b| a * b,
        BinaryOp::Div => |a, b| a / b,
        BinaryOp::Pow => f64::powf,
        BinaryOp::Lt => |a, b| from_bool(a < b),
        BinaryOp::Le => |a, b| from_bool(a <= b),
        BinaryOp::Gt => |a, b| from_bool(a > b),
        BinaryOp::Ge => |a, b| from_bool(a >= b),
        BinaryOp::Eq => |a, b| from_bool(a == b),
        BinaryOp::Ne => |a: f64, b: f64| from_bool(!a.is_nan() && !b.is_nan() && a != b),
        BinaryOp::And => |a, b| from_bool(truthy(a) && truthy(b)),
        BinaryOp::Or => |a, b| from_bool(truthy(a) || truthy(b)),
    }
}
