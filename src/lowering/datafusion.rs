//! Lowering into `DataFusion` logical expressions.

use chrono::NaiveDate;
use datafusion::arrow::datatypes::DataType;
use datafusion::common::ScalarValue;
use datafusion::functions::expr_fn::{coalesce, date_trunc};
use datafusion::functions_aggregate::expr_fn::{avg, count, count_distinct, max, median, min, sum};
use datafusion::logical_expr::{binary_expr, cast, ident, lit, not, when, Expr, Operator};

use crate::error::{FieldcError, Result};
use crate::lowering::dialect::{Dialect, Feature};
use crate::parser::{ArithmeticOp, ComparisonOp, Function, LogicalOp};
use crate::types::{ResolvedType, Value};

/// Dialect producing `DataFusion` [`Expr`] trees instead of SQL text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataFusionDialect;

impl DataFusionDialect {
    fn comparison_to_df_op(op: ComparisonOp) -> Option<Operator> {
        match op {
            ComparisonOp::Eq => Some(Operator::Eq),
            ComparisonOp::Ne => Some(Operator::NotEq),
            ComparisonOp::Lt => Some(Operator::Lt),
            ComparisonOp::Lte => Some(Operator::LtEq),
            ComparisonOp::Gt => Some(Operator::Gt),
            ComparisonOp::Gte => Some(Operator::GtEq),
            _ => None,
        }
    }

    fn arithmetic_to_df_op(op: ArithmeticOp) -> Operator {
        match op {
            ArithmeticOp::Add => Operator::Plus,
            ArithmeticOp::Sub => Operator::Minus,
            ArithmeticOp::Mul => Operator::Multiply,
            ArithmeticOp::Div => Operator::Divide,
        }
    }

    fn days_since_epoch(date: NaiveDate) -> Result<i32> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        i32::try_from((date - epoch).num_days())
            .map_err(|_| FieldcError::type_mismatch(format!("{date} is out of range")))
    }

    /// Folds operands into a left-deep chain of `op`.
    fn build_logical_chain(operands: Vec<Expr>, op: Operator) -> Result<Expr> {
        let mut operands = operands.into_iter();
        let first = operands
            .next()
            .ok_or_else(|| FieldcError::type_mismatch("logical expression requires at least one operand"))?;
        Ok(operands.fold(first, |acc, next| binary_expr(acc, op.clone(), next)))
    }
}

fn single(function: Function, args: Vec<Expr>) -> Result<Expr> {
    args.into_iter()
        .next()
        .ok_or_else(|| FieldcError::type_mismatch(format!("{function} requires an argument")))
}

impl Dialect for DataFusionDialect {
    type Handle = Expr;

    fn id(&self) -> &str {
        "datafusion"
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(feature, Feature::Median | Feature::Truncate(_))
    }

    fn emit_literal(&self, value: &Value) -> Result<Expr> {
        let scalar = match value {
            Value::Integer(v) => ScalarValue::Int64(Some(*v)),
            Value::Float(v) => ScalarValue::Float64(Some(*v)),
            Value::String(v) => ScalarValue::Utf8(Some(v.clone())),
            Value::Bool(v) => ScalarValue::Boolean(Some(*v)),
            Value::Date(v) => ScalarValue::Date32(Some(Self::days_since_epoch(*v)?)),
            Value::Datetime(v) => ScalarValue::TimestampMicrosecond(Some(v.and_utc().timestamp_micros()), None),
            Value::Null => ScalarValue::Null,
        };
        Ok(lit(scalar))
    }

    fn emit_column(&self, name: &str) -> Result<Expr> {
        Ok(ident(name))
    }

    fn emit_binary_op(&self, op: ArithmeticOp, left: Expr, right: Expr) -> Result<Expr> {
        Ok(binary_expr(left, Self::arithmetic_to_df_op(op), right))
    }

    fn emit_comparison(&self, op: ComparisonOp, left: Expr, right: Vec<Expr>) -> Result<Expr> {
        let count = right.len();
        let arity_error = || FieldcError::type_mismatch(format!("{} received {count} right operands", op.as_str()));
        match op {
            ComparisonOp::In | ComparisonOp::NotIn if count > 0 => {
                Ok(left.in_list(right, op == ComparisonOp::NotIn))
            }
            ComparisonOp::Between => {
                let mut bounds = right.into_iter();
                match (bounds.next(), bounds.next(), bounds.next()) {
                    (Some(low), Some(high), None) => Ok(left.between(low, high)),
                    _ => Err(arity_error()),
                }
            }
            ComparisonOp::Like | ComparisonOp::ILike if count == 1 => {
                let pattern = right.into_iter().next().ok_or_else(arity_error)?;
                if op == ComparisonOp::Like {
                    Ok(left.like(pattern))
                } else {
                    Ok(left.ilike(pattern))
                }
            }
            _ => {
                let df_op = Self::comparison_to_df_op(op).ok_or_else(arity_error)?;
                if count != 1 {
                    return Err(arity_error());
                }
                let operand = right.into_iter().next().ok_or_else(arity_error)?;
                Ok(binary_expr(left, df_op, operand))
            }
        }
    }

    fn emit_boolean_op(&self, op: LogicalOp, operands: Vec<Expr>) -> Result<Expr> {
        match op {
            LogicalOp::And => Self::build_logical_chain(operands, Operator::And),
            LogicalOp::Or => Self::build_logical_chain(operands, Operator::Or),
            LogicalOp::Not => operands
                .into_iter()
                .next()
                .map(not)
                .ok_or_else(|| FieldcError::type_mismatch("NOT expression requires an operand")),
        }
    }

    fn emit_conditional(&self, branches: Vec<(Expr, Expr)>, else_value: Expr) -> Result<Expr> {
        let mut branches = branches.into_iter();
        let (condition, value) = branches
            .next()
            .ok_or_else(|| FieldcError::type_mismatch("conditional requires a branch"))?;
        let mut builder = when(condition, value);
        for (condition, value) in branches {
            builder = builder.when(condition, value);
        }
        builder
            .otherwise(else_value)
            .map_err(|e| FieldcError::type_mismatch(e.to_string()))
    }

    fn emit_function_call(&self, function: Function, args: Vec<Expr>, arg_types: &[ResolvedType]) -> Result<Expr> {
        let expr = match function {
            Function::Sum => sum(single(function, args)?),
            Function::Avg => avg(single(function, args)?),
            Function::Min => min(single(function, args)?),
            Function::Max => max(single(function, args)?),
            Function::Count if args.is_empty() => count(lit(1_i64)),
            Function::Count => count(single(function, args)?),
            Function::CountDistinct => count_distinct(single(function, args)?),
            Function::Median => median(single(function, args)?),
            Function::Day | Function::Week | Function::Month | Function::Quarter | Function::Year => {
                let unit = function.date_unit().map_or("day", |u| u.name());
                let truncated = date_trunc(lit(unit), single(function, args)?);
                if arg_types.first() == Some(&ResolvedType::Date) {
                    cast(truncated, DataType::Date32)
                } else {
                    truncated
                }
            }
            Function::Coalesce => coalesce(args),
            Function::ToString => cast(single(function, args)?, DataType::Utf8),
            Function::ToInt => cast(single(function, args)?, DataType::Int64),
            Function::Percentile(_) | Function::Age => {
                let feature = Feature::required_by(function).unwrap_or(Feature::Age);
                return Err(FieldcError::unsupported(feature.to_string(), self.id()));
            }
        };
        Ok(expr)
    }

    fn emit_is_null(&self, operand: Expr, negated: bool) -> Result<Expr> {
        if negated {
            Ok(operand.is_not_null())
        } else {
            Ok(operand.is_null())
        }
    }
}
