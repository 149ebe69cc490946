//! Field contexts and the default aggregation policy.

use serde::{Deserialize, Serialize};

use crate::binder::expression::BoundExpression;
use crate::error::{FieldcError, Result};
use crate::parser::ArithmeticOp;
use crate::types::ResolvedType;

/// Where a compiled fragment will be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldContext {
    /// Aggregated value; scalar numeric expressions are summed.
    Metric,
    /// Grouping value; must not aggregate.
    Dimension,
    /// Row filter (WHERE); boolean and scalar.
    Filter,
    /// Group filter (HAVING); boolean.
    Having,
    /// Bucket or quickselect condition; boolean and scalar.
    Condition,
}

impl FieldContext {
    /// Returns the lowercase context name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FieldContext::Metric => "metric",
            FieldContext::Dimension => "dimension",
            FieldContext::Filter => "filter",
            FieldContext::Having => "having",
            FieldContext::Condition => "condition",
        }
    }

    /// Returns true if the fragment is used as a predicate (WHERE, HAVING,
    /// CASE WHEN).
    #[must_use]
    pub fn expects_predicate(&self) -> bool {
        matches!(self, FieldContext::Filter | FieldContext::Having | FieldContext::Condition)
    }
}

/// Applies the context's aggregation rules to a validated root.
///
/// This is the only place default aggregation happens. In a metric context
/// a scalar numeric root is summed once: a chain of `+`/`-` whose terms all
/// reference columns is summed term by term (`a - b` becomes
/// `sum(a) - sum(b)`), anything else is wrapped whole.
///
/// # Errors
///
/// Returns `AggregationContext` if the expression cannot be used in the
/// context.
pub fn apply_context(expr: BoundExpression, context: FieldContext) -> Result<BoundExpression> {
    match context {
        FieldContext::Metric => {
            if expr.is_aggregate() {
                require_grouped(&expr, context)?;
                return Ok(expr);
            }
            if expr.data_type() != ResolvedType::Number {
                return Err(FieldcError::aggregation_context(format!(
                    "a metric must aggregate to a number, found a {} expression",
                    expr.data_type()
                )));
            }
            if is_additive_over_columns(&expr) {
                Ok(distribute_sum(expr))
            } else {
                Ok(expr.sum())
            }
        }
        FieldContext::Dimension => {
            if expr.is_aggregate() {
                return Err(FieldcError::aggregation_context(
                    "a dimension cannot contain an aggregation",
                ));
            }
            Ok(expr)
        }
        FieldContext::Filter | FieldContext::Condition => {
            require_boolean(&expr, context)?;
            if expr.is_aggregate() {
                return Err(FieldcError::aggregation_context(format!(
                    "a {} cannot contain an aggregation; use a having instead",
                    context.name()
                )));
            }
            Ok(expr)
        }
        FieldContext::Having => {
            require_boolean(&expr, context)?;
            if expr.is_aggregate() {
                require_grouped(&expr, context)?;
            }
            Ok(expr)
        }
    }
}

/// Rejects aggregated expressions that still use a bare column.
fn require_grouped(expr: &BoundExpression, context: FieldContext) -> Result<()> {
    match expr.ungrouped_column() {
        Some(column) => Err(FieldcError::aggregation_context(format!(
            "a {} mixes aggregations with the bare column '{column}'; aggregate it too",
            context.name()
        ))),
        None => Ok(()),
    }
}

fn require_boolean(expr: &BoundExpression, context: FieldContext) -> Result<()> {
    if expr.data_type() == ResolvedType::Boolean {
        Ok(())
    } else {
        Err(FieldcError::aggregation_context(format!(
            "a {} must be a boolean condition, found a {} expression",
            context.name(),
            expr.data_type()
        )))
    }
}

fn is_additive(expr: &BoundExpression) -> bool {
    matches!(
        expr,
        BoundExpression::Arithmetic {
            op: ArithmeticOp::Add | ArithmeticOp::Sub,
            ..
        }
    )
}

/// True for a `+`/`-` chain whose every term references a column.
fn is_additive_over_columns(expr: &BoundExpression) -> bool {
    fn terms_reference_columns(expr: &BoundExpression) -> bool {
        match expr {
            BoundExpression::Arithmetic {
                op: ArithmeticOp::Add | ArithmeticOp::Sub,
                left,
                right,
                ..
            } => terms_reference_columns(left) && terms_reference_columns(right),
            other => other.references_column(),
        }
    }
    is_additive(expr) && terms_reference_columns(expr)
}

fn distribute_sum(expr: BoundExpression) -> BoundExpression {
    match expr {
        BoundExpression::Arithmetic {
            op: op @ (ArithmeticOp::Add | ArithmeticOp::Sub),
            left,
            right,
            ..
        } => BoundExpression::arithmetic(op, distribute_sum(*left), distribute_sum(*right)),
        term => term.sum(),
    }
}
