//! Type validation of resolved expressions against a catalog.

use chrono::NaiveDate;

use crate::binder::expression::BoundExpression;
use crate::catalog::CatalogAdapter;
use crate::config::CompilerConfig;
use crate::error::{FieldcError, Result};
use crate::parser::dates::{end_of_day, parse_date_value, start_of_day};
use crate::parser::{ComparisonOp, Expr, Function, LogicalOp};
use crate::types::{ResolvedType, Value};

/// Validation settings derived from the compiler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Check every element of `in`/`between` lists, not just the first.
    pub strict_list_homogeneity: bool,
    /// Widen `like` patterns without wildcards to `%pattern%`.
    pub like_auto_wildcard: bool,
    /// Reference date for relative date strings.
    pub today: NaiveDate,
}

impl ValidationOptions {
    /// Derives options from a compiler configuration.
    #[must_use]
    pub fn from_config(config: &CompilerConfig) -> Self {
        ValidationOptions {
            strict_list_homogeneity: config.strict_list_homogeneity,
            like_auto_wildcard: config.like_auto_wildcard,
            today: config.reference_date(),
        }
    }
}

/// Which end of a comparison a literal sits on, for datetime widening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundRole {
    Single,
    Lower,
    Upper,
}

/// Assigns a [`ResolvedType`] to every node, bottom-up.
pub struct Validator<'a> {
    catalog: &'a dyn CatalogAdapter,
    options: ValidationOptions,
}

impl<'a> Validator<'a> {
    /// Creates a validator over the given catalog.
    #[must_use]
    pub fn new(catalog: &'a dyn CatalogAdapter, options: ValidationOptions) -> Self {
        Validator { catalog, options }
    }

    /// Validates a fully resolved expression.
    ///
    /// # Errors
    ///
    /// Returns `UnknownColumn`, `TypeMismatch` or `NestedAggregation` for the
    /// first offending node, and `UnknownReference` if a `@name` reference
    /// was left unresolved.
    pub fn validate(&self, expr: &Expr) -> Result<BoundExpression> {
        match expr {
            Expr::Literal {
                value,
                inferred_type,
            } => Ok(BoundExpression::Literal {
                value: value.clone(),
                data_type: *inferred_type,
            }),
            Expr::Column { name } => {
                let data_type = self
                    .catalog
                    .column_type(name)
                    .ok_or_else(|| FieldcError::UnknownColumn {
                        expression: String::new(),
                        column: name.clone(),
                        position: None,
                    })?;
                let name = self.catalog.canonical_name(name).unwrap_or_else(|| name.clone());
                Ok(BoundExpression::Column { name, data_type })
            }
            Expr::CrossRef { fragment_name } => Err(FieldcError::UnknownReference {
                expression: String::new(),
                name: fragment_name.clone(),
            }),
            Expr::FunctionCall { function, args } => self.bind_function(*function, args),
            Expr::BinaryOp { op, left, right } => {
                let left = self.validate(left)?;
                let right = self.validate(right)?;
                if left.data_type() != ResolvedType::Number || right.data_type() != ResolvedType::Number {
                    return Err(FieldcError::type_mismatch(format!(
                        "arithmetic requires numbers, found {} {} {}",
                        left.data_type(),
                        op.as_str(),
                        right.data_type()
                    )));
                }
                Ok(BoundExpression::arithmetic(*op, left, right))
            }
            Expr::Comparison { op, left, right } => self.bind_comparison(*op, left, right),
            Expr::BooleanOp { op, operands } => {
                if *op == LogicalOp::Not && operands.len() != 1 {
                    return Err(FieldcError::type_mismatch("not takes exactly one operand"));
                }
                let operands = operands
                    .iter()
                    .map(|o| self.validate(o))
                    .collect::<Result<Vec<_>>>()?;
                if let Some(bad) = operands.iter().find(|o| o.data_type() != ResolvedType::Boolean) {
                    return Err(FieldcError::type_mismatch(format!(
                        "{} requires boolean operands, found {}",
                        logical_name(*op),
                        bad.data_type()
                    )));
                }
                Ok(BoundExpression::logical(*op, operands))
            }
            Expr::Conditional {
                branches,
                else_value,
            } => self.bind_conditional(branches, else_value),
            Expr::IsNull { operand, negated } => {
                Ok(BoundExpression::is_null(self.validate(operand)?, *negated))
            }
        }
    }

    fn bind_function(&self, function: Function, args: &[Expr]) -> Result<BoundExpression> {
        let args = args
            .iter()
            .map(|a| self.validate(a))
            .collect::<Result<Vec<_>>>()?;
        let count_star = function == Function::Count && args.is_empty();
        if !count_star && args.len() != function.arity() {
            return Err(FieldcError::type_mismatch(format!(
                "{function} expects {} argument(s), found {}",
                function.arity(),
                args.len()
            )));
        }
        let arg_type = args.first().map_or(ResolvedType::Unknown, BoundExpression::data_type);

        let data_type = match function {
            Function::Sum
            | Function::Avg
            | Function::Min
            | Function::Max
            | Function::Median
            | Function::Percentile(_)
            | Function::Count
            | Function::CountDistinct => {
                if args.iter().any(BoundExpression::is_aggregate) {
                    return Err(FieldcError::NestedAggregation {
                        expression: String::new(),
                        function: function.to_string(),
                    });
                }
                let any_type = matches!(function, Function::Count | Function::CountDistinct);
                if !any_type && arg_type != ResolvedType::Number {
                    return Err(FieldcError::type_mismatch(format!(
                        "{function} requires a number argument, found {arg_type}"
                    )));
                }
                ResolvedType::Number
            }
            Function::Day | Function::Week | Function::Month | Function::Quarter | Function::Year => {
                require_temporal(function, arg_type)?;
                arg_type
            }
            Function::Age => {
                require_temporal(function, arg_type)?;
                ResolvedType::Number
            }
            Function::Coalesce => {
                let other = args.get(1).map_or(ResolvedType::Unknown, BoundExpression::data_type);
                if !arg_type.is_comparable_with(other) {
                    return Err(FieldcError::type_mismatch(format!(
                        "coalesce arguments must share one type, found {arg_type} and {other}"
                    )));
                }
                let unified = if arg_type == ResolvedType::Unknown { other } else { arg_type };
                if unified == ResolvedType::Unknown {
                    return Err(FieldcError::type_mismatch("coalesce needs at least one non-null argument"));
                }
                unified
            }
            Function::ToString => ResolvedType::String,
            Function::ToInt => {
                if arg_type.is_temporal() {
                    return Err(FieldcError::type_mismatch(format!(
                        "int cannot convert a {arg_type} argument"
                    )));
                }
                ResolvedType::Number
            }
        };
        Ok(BoundExpression::function(function, args, data_type))
    }

    fn bind_comparison(&self, op: ComparisonOp, left: &Expr, right: &[Expr]) -> Result<BoundExpression> {
        let mut left = self.validate(left)?;
        let right = right
            .iter()
            .map(|r| self.validate(r))
            .collect::<Result<Vec<_>>>()?;

        let binary = !op.takes_list() && op != ComparisonOp::Between;
        if binary && right.len() != 1 {
            return Err(FieldcError::type_mismatch(format!(
                "{} compares exactly two operands",
                op.as_str()
            )));
        }
        if binary {
            if let Some(other) = right.first().map(BoundExpression::data_type) {
                left = self.coerce_temporal(left, other, BoundRole::Single)?;
            }
        }
        let target = left.data_type();

        let right = match op {
            ComparisonOp::Between => {
                if right.len() != 2 {
                    return Err(FieldcError::type_mismatch("between requires exactly two bounds"));
                }
                let mut bounds = right.into_iter();
                let mut coerced = Vec::with_capacity(2);
                for role in [BoundRole::Lower, BoundRole::Upper] {
                    if let Some(bound) = bounds.next() {
                        coerced.push(self.coerce_temporal(bound, target, role)?);
                    }
                }
                coerced
            }
            _ => right
                .into_iter()
                .map(|r| self.coerce_temporal(r, target, BoundRole::Single))
                .collect::<Result<Vec<_>>>()?,
        };

        match op {
            ComparisonOp::Like | ComparisonOp::ILike => {
                let pattern_type = right[0].data_type();
                if target != ResolvedType::String || pattern_type != ResolvedType::String {
                    return Err(FieldcError::type_mismatch(format!(
                        "{} requires strings, found {target} and {pattern_type}",
                        op.as_str()
                    )));
                }
                let right = right.into_iter().map(|r| self.widen_pattern(r)).collect();
                return Ok(BoundExpression::comparison(op, left, right));
            }
            ComparisonOp::In | ComparisonOp::NotIn if right.is_empty() => {
                return Err(FieldcError::type_mismatch(format!(
                    "{} requires at least one value",
                    op.as_str()
                )));
            }
            _ => {}
        }

        if binary && (is_null_literal(&left) || is_null_literal(&right[0])) {
            return Err(FieldcError::type_mismatch(format!(
                "cannot use {} with null; use 'is null' or 'is not null'",
                op.as_str()
            )));
        }

        let right: Vec<BoundExpression> = if op.takes_list() && target != ResolvedType::Unknown {
            right
                .into_iter()
                .map(|r| {
                    if is_null_literal(&r) {
                        BoundExpression::Literal {
                            value: Value::Null,
                            data_type: target,
                        }
                    } else {
                        r
                    }
                })
                .collect()
        } else {
            right
        };

        let checked = if binary || self.options.strict_list_homogeneity {
            right.len()
        } else {
            1
        };
        if let Some(bad) = right
            .iter()
            .take(checked)
            .find(|r| !target.is_comparable_with(r.data_type()))
        {
            return Err(FieldcError::type_mismatch(format!(
                "cannot compare {target} with {} using {}",
                bad.data_type(),
                op.as_str()
            )));
        }
        Ok(BoundExpression::comparison(op, left, right))
    }

    fn bind_conditional(&self, branches: &[(Expr, Expr)], else_value: &Expr) -> Result<BoundExpression> {
        let mut bound = Vec::with_capacity(branches.len());
        for (condition, value) in branches {
            let condition = self.validate(condition)?;
            if condition.data_type() != ResolvedType::Boolean {
                return Err(FieldcError::type_mismatch(format!(
                    "if conditions must be boolean, found {}",
                    condition.data_type()
                )));
            }
            bound.push((condition, self.validate(value)?));
        }
        let else_value = self.validate(else_value)?;

        let unified = bound
            .iter()
            .map(|(_, v)| v.data_type())
            .chain(std::iter::once(else_value.data_type()))
            .find(|t| *t != ResolvedType::Unknown)
            .ok_or_else(|| FieldcError::type_mismatch("if values cannot all be null"))?;

        let retag = |value: BoundExpression| -> Result<BoundExpression> {
            match value.data_type() {
                ResolvedType::Unknown => Ok(BoundExpression::Literal {
                    value: Value::Null,
                    data_type: unified,
                }),
                t if t == unified => Ok(value),
                t => Err(FieldcError::type_mismatch(format!(
                    "if values must share one type: expected {unified}, found {t}"
                ))),
            }
        };
        let branches = bound
            .into_iter()
            .map(|(c, v)| -> Result<(BoundExpression, BoundExpression)> { Ok((c, retag(v)?)) })
            .collect::<Result<Vec<_>>>()?;
        let else_value = retag(else_value)?;
        Ok(BoundExpression::conditional(branches, else_value, unified))
    }

    /// Interprets string and date literals compared against temporal operands.
    fn coerce_temporal(&self, expr: BoundExpression, target: ResolvedType, role: BoundRole) -> Result<BoundExpression> {
        if !target.is_temporal() {
            return Ok(expr);
        }
        let BoundExpression::Literal { value, .. } = &expr else {
            return Ok(expr);
        };
        let value = match value {
            Value::String(s) => parse_date_value(s, self.options.today).ok_or_else(|| {
                FieldcError::type_mismatch(format!("cannot compare {target} with \"{s}\": not a date"))
            })?,
            Value::Date(_) => value.clone(),
            _ => return Ok(expr),
        };
        let value = match (value, target, role) {
            (Value::Date(d), ResolvedType::Datetime, BoundRole::Lower) => Value::Datetime(start_of_day(d)),
            (Value::Date(d), ResolvedType::Datetime, BoundRole::Upper) => Value::Datetime(end_of_day(d)),
            (other, _, _) => other,
        };
        Ok(BoundExpression::literal(value))
    }

    fn widen_pattern(&self, expr: BoundExpression) -> BoundExpression {
        if !self.options.like_auto_wildcard {
            return expr;
        }
        match expr {
            BoundExpression::Literal {
                value: Value::String(pattern),
                data_type,
            } if !pattern.contains(['%', '_']) => BoundExpression::Literal {
                value: Value::String(format!("%{pattern}%")),
                data_type,
            },
            other => other,
        }
    }
}

fn require_temporal(function: Function, arg_type: ResolvedType) -> Result<()> {
    if arg_type.is_temporal() {
        Ok(())
    } else {
        Err(FieldcError::type_mismatch(format!(
            "{function} requires a date or datetime argument, found {arg_type}"
        )))
    }
}

fn is_null_literal(expr: &BoundExpression) -> bool {
    matches!(expr, BoundExpression::Literal { value: Value::Null, .. })
}

fn logical_name(op: LogicalOp) -> &'static str {
    match op {
        LogicalOp::And => "and",
        LogicalOp::Or => "or",
        LogicalOp::Not => "not",
    }
}
