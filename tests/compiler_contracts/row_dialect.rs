//! A dialect that lowers into closures evaluated against in-memory rows.
//!
//! Used to check that compiled fragments mean what the source text says:
//! comparisons and `null` follow SQL's three-valued logic.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use fieldc::parser::{ArithmeticOp, ComparisonOp, Function, LogicalOp};
use fieldc::{Dialect, Feature, FieldcError, ResolvedType, Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

pub type Row = HashMap<String, Datum>;

/// Builds a row from `(column, number)` pairs; `None` stores nothing,
/// so the column reads as null.
pub fn row(values: &[(&str, Option<f64>)]) -> Row {
    values
        .iter()
        .filter_map(|(name, value)| value.map(|v| ((*name).to_string(), Datum::Number(v))))
        .collect()
}

#[derive(Clone)]
pub struct Eval(Arc<dyn Fn(&Row) -> Datum + Send + Sync>);

impl Eval {
    fn new(f: impl Fn(&Row) -> Datum + Send + Sync + 'static) -> Self {
        Eval(Arc::new(f))
    }

    pub fn eval(&self, row: &Row) -> Datum {
        (self.0)(row)
    }
}

impl fmt::Debug for Eval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Eval")
    }
}

fn unsupported(what: &str) -> FieldcError {
    FieldcError::UnsupportedFeature {
        expression: String::new(),
        feature: what.to_string(),
        dialect: "rows".to_string(),
    }
}

fn compare(left: &Datum, right: &Datum) -> Option<Ordering> {
    match (left, right) {
        (Datum::Number(a), Datum::Number(b)) => a.partial_cmp(b),
        (Datum::Text(a), Datum::Text(b)) => Some(a.cmp(b)),
        (Datum::Bool(a), Datum::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn truth(datum: &Datum) -> Option<bool> {
    match datum {
        Datum::Bool(b) => Some(*b),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RowDialect;

impl Dialect for RowDialect {
    type Handle = Eval;

    fn id(&self) -> &str {
        "rows"
    }

    fn supports(&self, _feature: Feature) -> bool {
        false
    }

    fn emit_literal(&self, value: &Value) -> Result<Eval> {
        #[allow(clippy::cast_precision_loss)]
        let datum = match value {
            Value::Integer(i) => Datum::Number(*i as f64),
            Value::Float(f) => Datum::Number(*f),
            Value::String(s) => Datum::Text(s.clone()),
            Value::Bool(b) => Datum::Bool(*b),
            Value::Null => Datum::Null,
            Value::Date(_) | Value::Datetime(_) => return Err(unsupported("temporal literals")),
        };
        Ok(Eval::new(move |_| datum.clone()))
    }

    fn emit_column(&self, name: &str) -> Result<Eval> {
        let name = name.to_string();
        Ok(Eval::new(move |row| row.get(&name).cloned().unwrap_or(Datum::Null)))
    }

    fn emit_binary_op(&self, op: ArithmeticOp, left: Eval, right: Eval) -> Result<Eval> {
        let apply: fn(f64, f64) -> f64 = match op {
            ArithmeticOp::Add => |a, b| a + b,
            ArithmeticOp::Sub => |a, b| a - b,
            ArithmeticOp::Mul => |a, b| a * b,
            ArithmeticOp::Div => |a, b| a / b,
        };
        Ok(Eval::new(move |row| match (left.eval(row), right.eval(row)) {
            (Datum::Number(a), Datum::Number(b)) => Datum::Number(apply(a, b)),
            _ => Datum::Null,
        }))
    }

    fn emit_comparison(&self, op: ComparisonOp, left: Eval, right: Vec<Eval>) -> Result<Eval> {
        match op {
            ComparisonOp::In => Ok(Eval::new(move |row| {
                let value = left.eval(row);
                if value == Datum::Null {
                    return Datum::Null;
                }
                Datum::Bool(right.iter().any(|r| compare(&value, &r.eval(row)) == Some(Ordering::Equal)))
            })),
            ComparisonOp::Between => {
                let [low, high]: [Eval; 2] = right.try_into().map_err(|_| unsupported("between arity"))?;
                Ok(Eval::new(move |row| {
                    let value = left.eval(row);
                    match (compare(&value, &low.eval(row)), compare(&value, &high.eval(row))) {
                        (Some(lo), Some(hi)) => Datum::Bool(lo.is_ge() && hi.is_le()),
                        _ => Datum::Null,
                    }
                }))
            }
            ComparisonOp::Like | ComparisonOp::ILike | ComparisonOp::NotIn => Err(unsupported(op.as_str())),
            ComparisonOp::Eq
            | ComparisonOp::Ne
            | ComparisonOp::Gt
            | ComparisonOp::Gte
            | ComparisonOp::Lt
            | ComparisonOp::Lte => {
                let check: fn(Ordering) -> bool = match op {
                    ComparisonOp::Eq => Ordering::is_eq,
                    ComparisonOp::Ne => Ordering::is_ne,
                    ComparisonOp::Gt => Ordering::is_gt,
                    ComparisonOp::Gte => Ordering::is_ge,
                    ComparisonOp::Lt => Ordering::is_lt,
                    _ => Ordering::is_le,
                };
                let right = right.into_iter().next().ok_or_else(|| unsupported("missing operand"))?;
                Ok(Eval::new(move |row| {
                    compare(&left.eval(row), &right.eval(row)).map_or(Datum::Null, |o| Datum::Bool(check(o)))
                }))
            }
        }
    }

    fn emit_boolean_op(&self, op: LogicalOp, operands: Vec<Eval>) -> Result<Eval> {
        Ok(Eval::new(move |row| {
            let values: Vec<Option<bool>> = operands.iter().map(|o| truth(&o.eval(row))).collect();
            let (dominant, rest) = match op {
                LogicalOp::Not => return values[0].map_or(Datum::Null, |b| Datum::Bool(!b)),
                LogicalOp::And => (false, true),
                LogicalOp::Or => (true, false),
            };
            if values.contains(&Some(dominant)) {
                Datum::Bool(dominant)
            } else if values.contains(&None) {
                Datum::Null
            } else {
                Datum::Bool(rest)
            }
        }))
    }

    fn emit_conditional(&self, branches: Vec<(Eval, Eval)>, else_value: Eval) -> Result<Eval> {
        Ok(Eval::new(move |row| {
            branches
                .iter()
                .find(|(condition, _)| condition.eval(row) == Datum::Bool(true))
                .map_or_else(|| else_value.eval(row), |(_, value)| value.eval(row))
        }))
    }

    fn emit_function_call(&self, function: Function, args: Vec<Eval>, _arg_types: &[ResolvedType]) -> Result<Eval> {
        match function {
            Function::Coalesce => Ok(Eval::new(move |row| {
                args.iter()
                    .map(|a| a.eval(row))
                    .find(|d| *d != Datum::Null)
                    .unwrap_or(Datum::Null)
            })),
            other => Err(unsupported(&other.to_string())),
        }
    }

    fn emit_is_null(&self, operand: Eval, negated: bool) -> Result<Eval> {
        Ok(Eval::new(move |row| Datum::Bool((operand.eval(row) == Datum::Null) != negated)))
    }
}
