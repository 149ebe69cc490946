//! Lowering of bound expressions into dialect handles.

mod dialect;
pub mod sql;

#[cfg(feature = "datafusion")]
mod datafusion;

#[cfg(feature = "datafusion")]
pub use self::datafusion::DataFusionDialect;
pub use dialect::{Dialect, Feature};
pub use sql::{dialect_for_driver, BigQuery, MsSql, Postgres, Redshift, SqlBackend, SqlDialect, SqlFragment, Sqlite};

use serde::{Deserialize, Serialize};

use crate::binder::BoundExpression;
use crate::config::DEFAULT_SAFE_DIVISION_EPSILON;
use crate::error::{FieldcError, Result};
use crate::parser::{ArithmeticOp, ComparisonOp, Function, LogicalOp};
use crate::types::{ResolvedType, Value};

/// Output of a compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFragment<H> {
    /// Backend expression handle.
    pub sql_fragment: H,
    /// Type of the expression's values.
    pub inferred_type: ResolvedType,
    /// True if the fragment aggregates (SELECT with GROUP BY, or HAVING).
    pub is_aggregate: bool,
    /// Sort expression for bucketed dimensions.
    pub default_order_fragment: Option<H>,
}

/// Post-order translation of a bound expression through a [`Dialect`].
pub struct Lowerer<'d, D: Dialect + ?Sized> {
    dialect: &'d D,
    epsilon: f64,
    predicate_root: bool,
}

impl<'d, D: Dialect + ?Sized> Lowerer<'d, D> {
    /// Creates a lowerer with the default safe-division epsilon.
    #[must_use]
    pub fn new(dialect: &'d D) -> Self {
        Lowerer {
            dialect,
            epsilon: DEFAULT_SAFE_DIVISION_EPSILON,
            predicate_root: false,
        }
    }

    /// Sets the constant added to every division denominator.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Lowers the root as a predicate, for WHERE, HAVING and CASE WHEN use.
    #[must_use]
    pub fn with_predicate_root(mut self, predicate_root: bool) -> Self {
        self.predicate_root = predicate_root;
        self
    }

    /// Lowers a bound expression into a fragment.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFeature` if the expression needs something the
    /// dialect lacks, or any error raised by the dialect itself.
    pub fn lower_fragment(&self, expr: &BoundExpression) -> Result<CompiledFragment<D::Handle>> {
        let sql_fragment = if self.predicate_root {
            self.lower_predicate(expr)?
        } else {
            self.lower(expr)?
        };
        Ok(CompiledFragment {
            sql_fragment,
            inferred_type: expr.data_type(),
            is_aggregate: expr.is_aggregate(),
            default_order_fragment: None,
        })
    }

    /// Lowers a bound expression into a dialect handle.
    ///
    /// # Errors
    ///
    /// See [`Lowerer::lower_fragment`].
    pub fn lower(&self, expr: &BoundExpression) -> Result<D::Handle> {
        let d = self.dialect;
        match expr {
            BoundExpression::Literal { value, .. } => d.emit_literal(value),
            BoundExpression::Column { name, .. } => d.emit_column(name),
            BoundExpression::Function { function, args, .. } => {
                if let Some(feature) = Feature::required_by(*function) {
                    if !d.supports(feature) {
                        return Err(FieldcError::unsupported(feature.to_string(), d.id()));
                    }
                }
                let arg_types: Vec<ResolvedType> = args.iter().map(BoundExpression::data_type).collect();
                let args = self.lower_all(args)?;
                d.emit_function_call(*function, args, &arg_types)
            }
            BoundExpression::Arithmetic { op, left, right, .. } => {
                let left = self.lower(left)?;
                let right = self.lower(right)?;
                if *op == ArithmeticOp::Div {
                    return self.safe_divide(left, right);
                }
                d.emit_binary_op(*op, left, right)
            }
            BoundExpression::Comparison { op, left, right, .. } => {
                let left = self.lower(left)?;
                let right = self.lower_all(right)?;
                if *op == ComparisonOp::NotIn {
                    let membership = d.emit_comparison(ComparisonOp::In, left, right)?;
                    return d.emit_boolean_op(LogicalOp::Not, vec![membership]);
                }
                d.emit_comparison(*op, left, right)
            }
            BoundExpression::Logical { op, operands, .. } => {
                let operands = operands
                    .iter()
                    .map(|o| self.lower_predicate(o))
                    .collect::<Result<Vec<_>>>()?;
                d.emit_boolean_op(*op, operands)
            }
            BoundExpression::Conditional {
                branches,
                else_value,
                ..
            } => {
                let branches = branches
                    .iter()
                    .map(|(c, v)| Ok((self.lower_predicate(c)?, self.lower(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                d.emit_conditional(branches, self.lower(else_value)?)
            }
            BoundExpression::IsNull { operand, negated, .. } => d.emit_is_null(self.lower(operand)?, *negated),
        }
    }

    /// Lowers an expression in predicate position.
    fn lower_predicate(&self, expr: &BoundExpression) -> Result<D::Handle> {
        let lowered = self.lower(expr)?;
        if expr.data_type() == ResolvedType::Boolean && !expr.is_predicate() {
            self.dialect.emit_predicate(lowered)
        } else {
            Ok(lowered)
        }
    }

    fn lower_all(&self, exprs: &[BoundExpression]) -> Result<Vec<D::Handle>> {
        exprs.iter().map(|e| self.lower(e)).collect()
    }

    /// `numerator / (coalesce(denominator, 0) + epsilon)`
    fn safe_divide(&self, numerator: D::Handle, denominator: D::Handle) -> Result<D::Handle> {
        let d = self.dialect;
        let zero = d.emit_literal(&Value::Integer(0))?;
        let guarded = d.emit_function_call(
            Function::Coalesce,
            vec![denominator, zero],
            &[ResolvedType::Number, ResolvedType::Number],
        )?;
        let epsilon = d.emit_literal(&Value::Float(self.epsilon))?;
        let denominator = d.emit_binary_op(ArithmeticOp::Add, guarded, epsilon)?;
        d.emit_binary_op(ArithmeticOp::Div, numerator, denominator)
    }
}
