//! SQL text dialects.
//!
//! [`SqlDialect`] renders the structure shared by every SQL backend
//! (operators, CASE, IN lists, aggregates). The parts that differ between
//! databases go through a [`SqlBackend`], whose defaults follow PostgreSQL.

mod bigquery;
mod mssql;
mod postgres;
mod redshift;
mod sqlite;

pub use bigquery::BigQuery;
pub use mssql::MsSql;
pub use postgres::Postgres;
pub use redshift::Redshift;
pub use sqlite::Sqlite;

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{FieldcError, Result};
use crate::lowering::dialect::{Dialect, Feature};
use crate::parser::{ArithmeticOp, ComparisonOp, DateUnit, Function, LogicalOp};
use crate::types::{ResolvedType, Value};

/// A rendered SQL expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlFragment(String);

impl SqlFragment {
    /// Wraps rendered SQL text.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        SqlFragment(sql.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-database SQL rendering.
///
/// `arg` parameters are already-rendered SQL. Unsupported capabilities
/// return `false` from [`SqlBackend::supports`] and an error from the
/// matching method.
pub trait SqlBackend: Send + Sync {
    /// Driver name, e.g. `postgresql`.
    fn id(&self) -> &'static str;

    fn supports(&self, _feature: Feature) -> bool {
        true
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn bool_literal(&self, value: bool) -> String {
        let literal = if value { "TRUE" } else { "FALSE" };
        literal.to_string()
    }

    fn date_literal(&self, date: NaiveDate) -> String {
        format!("DATE '{}'", date.format("%Y-%m-%d"))
    }

    fn datetime_literal(&self, datetime: NaiveDateTime) -> String {
        format!("TIMESTAMP '{}'", datetime.format("%Y-%m-%d %H:%M:%S%.f"))
    }

    fn ilike(&self, left: &str, pattern: &str) -> String {
        format!("{left} ILIKE {pattern}")
    }

    /// Truncates a date or datetime, keeping the input's type.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFeature` if the unit cannot be expressed.
    fn truncate(&self, unit: DateUnit, input: ResolvedType, arg: &str) -> Result<String> {
        let truncated = format!("date_trunc('{}', {arg})", unit.name());
        if input == ResolvedType::Date {
            Ok(format!("CAST({truncated} AS DATE)"))
        } else {
            Ok(truncated)
        }
    }

    /// Whole years elapsed since `arg`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFeature` if the backend has no age computation.
    fn age(&self, arg: &str) -> Result<String> {
        Ok(format!("DATE_PART('year', AGE(CURRENT_DATE, {arg}))"))
    }

    /// # Errors
    ///
    /// Returns `UnsupportedFeature` if the backend has no median.
    fn median(&self, arg: &str) -> Result<String> {
        Ok(format!("percentile_cont(0.5) WITHIN GROUP (ORDER BY {arg})"))
    }

    /// # Errors
    ///
    /// Returns `UnsupportedFeature` if the backend has no percentiles.
    fn percentile(&self, percentile: u8, arg: &str) -> Result<String> {
        Ok(format!(
            "percentile_cont(0.{percentile:02}) WITHIN GROUP (ORDER BY {arg})"
        ))
    }

    fn cast_string(&self, arg: &str) -> String {
        format!("CAST({arg} AS VARCHAR)")
    }

    fn cast_int(&self, arg: &str) -> String {
        format!("CAST({arg} AS INTEGER)")
    }

    /// Renders a boolean value where a predicate is expected.
    fn predicate(&self, value: &str) -> String {
        value.to_string()
    }

    /// Shorthand for an unsupported-feature error naming this backend.
    fn unsupported(&self, feature: Feature) -> FieldcError {
        FieldcError::unsupported(feature.to_string(), self.id())
    }
}

/// A [`Dialect`] producing SQL text through a [`SqlBackend`].
#[derive(Debug, Clone, Default)]
pub struct SqlDialect<B> {
    backend: B,
}

impl<B: SqlBackend> SqlDialect<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        SqlDialect { backend }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn string_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

fn single<H>(function: Function, args: Vec<H>) -> Result<H> {
    args.into_iter().next().ok_or_else(|| {
        FieldcError::type_mismatch(format!("{function} requires an argument"))
    })
}

fn comparison_symbol(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "<>",
        ComparisonOp::Gt => ">",
        ComparisonOp::Gte => ">=",
        ComparisonOp::Lt => "<",
        ComparisonOp::Lte => "<=",
        ComparisonOp::Like => "LIKE",
        ComparisonOp::ILike => "ILIKE",
        ComparisonOp::In => "IN",
        ComparisonOp::NotIn => "NOT IN",
        ComparisonOp::Between => "BETWEEN",
    }
}

fn join(fragments: &[SqlFragment]) -> String {
    fragments
        .iter()
        .map(SqlFragment::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl<B: SqlBackend> Dialect for SqlDialect<B> {
    type Handle = SqlFragment;

    fn id(&self) -> &str {
        self.backend.id()
    }

    fn supports(&self, feature: Feature) -> bool {
        self.backend.supports(feature)
    }

    fn emit_literal(&self, value: &Value) -> Result<SqlFragment> {
        let sql = match value {
            Value::Integer(i) => i.to_string(),
            Value::Float(f) if f.is_finite() => format!("{f:?}"),
            Value::Float(f) => {
                return Err(FieldcError::type_mismatch(format!("{f} has no SQL representation")))
            }
            Value::String(s) => Self::string_literal(s),
            Value::Bool(b) => self.backend.bool_literal(*b),
            Value::Date(d) => self.backend.date_literal(*d),
            Value::Datetime(dt) => self.backend.datetime_literal(*dt),
            Value::Null => "NULL".to_string(),
        };
        Ok(SqlFragment(sql))
    }

    fn emit_column(&self, name: &str) -> Result<SqlFragment> {
        Ok(SqlFragment(self.backend.quote_identifier(name)))
    }

    fn emit_binary_op(&self, op: ArithmeticOp, left: SqlFragment, right: SqlFragment) -> Result<SqlFragment> {
        let symbol = match op {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        };
        Ok(SqlFragment(format!("({left} {symbol} {right})")))
    }

    fn emit_comparison(&self, op: ComparisonOp, left: SqlFragment, right: Vec<SqlFragment>) -> Result<SqlFragment> {
        let arity_error = || {
            FieldcError::type_mismatch(format!(
                "{} received {} right operands",
                op.as_str(),
                right.len()
            ))
        };
        let sql = match op {
            ComparisonOp::In | ComparisonOp::NotIn => {
                if right.is_empty() {
                    return Err(arity_error());
                }
                let list = format!("{left} IN ({})", join(&right));
                if op == ComparisonOp::NotIn {
                    format!("NOT ({list})")
                } else {
                    list
                }
            }
            ComparisonOp::Between => match right.as_slice() {
                [low, high] => format!("{left} BETWEEN {low} AND {high}"),
                _ => return Err(arity_error()),
            },
            _ => {
                let [operand] = right.as_slice() else {
                    return Err(arity_error());
                };
                if op == ComparisonOp::ILike {
                    self.backend.ilike(left.as_str(), operand.as_str())
                } else {
                    format!("{left} {} {operand}", comparison_symbol(op))
                }
            }
        };
        Ok(SqlFragment(sql))
    }

    fn emit_boolean_op(&self, op: LogicalOp, operands: Vec<SqlFragment>) -> Result<SqlFragment> {
        if operands.is_empty() {
            return Err(FieldcError::type_mismatch("boolean operator without operands"));
        }
        let sql = match op {
            LogicalOp::Not => {
                let [operand] = operands.as_slice() else {
                    return Err(FieldcError::type_mismatch("not takes a single operand"));
                };
                format!("NOT ({operand})")
            }
            LogicalOp::And | LogicalOp::Or if operands.len() == 1 => operands[0].to_string(),
            LogicalOp::And | LogicalOp::Or => {
                let keyword = if op == LogicalOp::And { " AND " } else { " OR " };
                let joined = operands
                    .iter()
                    .map(SqlFragment::as_str)
                    .collect::<Vec<_>>()
                    .join(keyword);
                format!("({joined})")
            }
        };
        Ok(SqlFragment(sql))
    }

    fn emit_conditional(&self, branches: Vec<(SqlFragment, SqlFragment)>, else_value: SqlFragment) -> Result<SqlFragment> {
        let whens: String = branches
            .iter()
            .map(|(condition, value)| format!(" WHEN {condition} THEN {value}"))
            .collect();
        Ok(SqlFragment(format!("CASE{whens} ELSE {else_value} END")))
    }

    fn emit_function_call(&self, function: Function, args: Vec<SqlFragment>, arg_types: &[ResolvedType]) -> Result<SqlFragment> {
        let backend = &self.backend;
        let sql = match function {
            Function::Sum => format!("SUM({})", single(function, args)?),
            Function::Avg => format!("AVG({})", single(function, args)?),
            Function::Min => format!("MIN({})", single(function, args)?),
            Function::Max => format!("MAX({})", single(function, args)?),
            Function::Count if args.is_empty() => "COUNT(*)".to_string(),
            Function::Count => format!("COUNT({})", single(function, args)?),
            Function::CountDistinct => format!("COUNT(DISTINCT {})", single(function, args)?),
            Function::Median => backend.median(single(function, args)?.as_str())?,
            Function::Percentile(p) => backend.percentile(p, single(function, args)?.as_str())?,
            Function::Day | Function::Week | Function::Month | Function::Quarter | Function::Year => {
                let input = arg_types.first().copied().unwrap_or(ResolvedType::Date);
                let unit = function.date_unit().unwrap_or(DateUnit::Day);
                backend.truncate(unit, input, single(function, args)?.as_str())?
            }
            Function::Age => backend.age(single(function, args)?.as_str())?,
            Function::Coalesce => format!("COALESCE({})", join(&args)),
            Function::ToString => backend.cast_string(single(function, args)?.as_str()),
            Function::ToInt => backend.cast_int(single(function, args)?.as_str()),
        };
        Ok(SqlFragment(sql))
    }

    fn emit_is_null(&self, operand: SqlFragment, negated: bool) -> Result<SqlFragment> {
        let check = if negated { "IS NOT NULL" } else { "IS NULL" };
        Ok(SqlFragment(format!("{operand} {check}")))
    }

    fn emit_predicate(&self, value: SqlFragment) -> Result<SqlFragment> {
        Ok(SqlFragment(self.backend.predicate(value.as_str())))
    }
}

/// Returns the SQL dialect for a driver name such as `postgresql`,
/// `redshift+psycopg2` or `mssql+pyodbc`. Unknown drivers get PostgreSQL.
#[must_use]
pub fn dialect_for_driver(driver: &str) -> Box<dyn Dialect<Handle = SqlFragment>> {
    let driver = driver.to_ascii_lowercase();
    let base = driver.split('+').next().unwrap_or_default();
    match base {
        "redshift" => Box::new(SqlDialect::new(Redshift)),
        "bigquery" => Box::new(SqlDialect::new(BigQuery)),
        "sqlite" => Box::new(SqlDialect::new(Sqlite)),
        b if b.starts_with("mssql") => Box::new(SqlDialect::new(MsSql)),
        _ => Box::new(SqlDialect::new(Postgres)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(s: &str) -> SqlFragment {
        SqlFragment::new(s)
    }

    #[test]
    fn test_literals() {
        let d = SqlDialect::new(Postgres);
        assert_eq!(d.emit_literal(&Value::String("O'Brien".into())).unwrap().as_str(), "'O''Brien'");
        assert_eq!(d.emit_literal(&Value::Float(2.5)).unwrap().as_str(), "2.5");
        assert_eq!(d.emit_literal(&Value::Null).unwrap().as_str(), "NULL");
        assert!(d.emit_literal(&Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_comparisons() {
        let d = SqlDialect::new(Postgres);
        let between = d
            .emit_comparison(ComparisonOp::Between, frag("\"age\""), vec![frag("13"), frag("19")])
            .unwrap();
        assert_eq!(between.as_str(), "\"age\" BETWEEN 13 AND 19");

        let ne = d.emit_comparison(ComparisonOp::Ne, frag("a"), vec![frag("b")]).unwrap();
        assert_eq!(ne.as_str(), "a <> b");

        assert!(d.emit_comparison(ComparisonOp::Eq, frag("a"), vec![]).is_err());
        assert!(d.emit_comparison(ComparisonOp::In, frag("a"), vec![]).is_err());
    }

    #[test]
    fn test_boolean_ops() {
        let d = SqlDialect::new(Postgres);
        let and = d.emit_boolean_op(LogicalOp::And, vec![frag("a"), frag("b"), frag("c")]).unwrap();
        assert_eq!(and.as_str(), "(a AND b AND c)");
        let single = d.emit_boolean_op(LogicalOp::Or, vec![frag("a")]).unwrap();
        assert_eq!(single.as_str(), "a");
        assert!(d.emit_boolean_op(LogicalOp::And, vec![]).is_err());
    }

    #[test]
    fn test_conditional() {
        let d = SqlDialect::new(Postgres);
        let case = d
            .emit_conditional(vec![(frag("x > 1"), frag("'big'"))], frag("'small'"))
            .unwrap();
        assert_eq!(case.as_str(), "CASE WHEN x > 1 THEN 'big' ELSE 'small' END");
    }

    #[test]
    fn test_counts() {
        let d = SqlDialect::new(Postgres);
        let star = d.emit_function_call(Function::Count, vec![], &[]).unwrap();
        assert_eq!(star.as_str(), "COUNT(*)");
        let distinct = d
            .emit_function_call(Function::CountDistinct, vec![frag("\"id\"")], &[ResolvedType::String])
            .unwrap();
        assert_eq!(distinct.as_str(), "COUNT(DISTINCT \"id\")");
    }

    #[test]
    fn test_dialect_for_driver() {
        assert_eq!(dialect_for_driver("postgresql").id(), "postgresql");
        assert_eq!(dialect_for_driver("redshift+psycopg2").id(), "redshift");
        assert_eq!(dialect_for_driver("BigQuery").id(), "bigquery");
        assert_eq!(dialect_for_driver("mssql+pyodbc").id(), "mssql");
        assert_eq!(dialect_for_driver("sqlite").id(), "sqlite");
        assert_eq!(dialect_for_driver("duckdb").id(), "postgresql");
    }
}
