//! Microsoft SQL Server backend.

use chrono::{NaiveDate, NaiveDateTime};

use super::SqlBackend;
use crate::error::Result;
use crate::lowering::dialect::Feature;
use crate::parser::DateUnit;
use crate::types::ResolvedType;

/// SQL Server (T-SQL).
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSql;

impl SqlBackend for MsSql {
    fn id(&self) -> &'static str {
        "mssql"
    }

    fn supports(&self, feature: Feature) -> bool {
        !matches!(
            feature,
            Feature::Median
                | Feature::Percentile(_)
                | Feature::Truncate(DateUnit::Week | DateUnit::Quarter)
        )
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn bool_literal(&self, value: bool) -> String {
        u8::from(value).to_string()
    }

    fn date_literal(&self, date: NaiveDate) -> String {
        format!("CAST('{}' AS DATE)", date.format("%Y-%m-%d"))
    }

    fn datetime_literal(&self, datetime: NaiveDateTime) -> String {
        format!("CAST('{}' AS DATETIME2)", datetime.format("%Y-%m-%dT%H:%M:%S%.f"))
    }

    fn ilike(&self, left: &str, pattern: &str) -> String {
        format!("LOWER({left}) LIKE LOWER({pattern})")
    }

    fn truncate(&self, unit: DateUnit, input: ResolvedType, arg: &str) -> Result<String> {
        let (month, day) = match unit {
            DateUnit::Day => (format!("MONTH({arg})"), format!("DAY({arg})")),
            DateUnit::Month => (format!("MONTH({arg})"), "1".to_string()),
            DateUnit::Year => ("1".to_string(), "1".to_string()),
            DateUnit::Week | DateUnit::Quarter => return Err(self.unsupported(Feature::Truncate(unit))),
        };
        if input == ResolvedType::Datetime {
            Ok(format!("DATETIMEFROMPARTS(YEAR({arg}), {month}, {day}, 0, 0, 0, 0)"))
        } else {
            Ok(format!("DATEFROMPARTS(YEAR({arg}), {month}, {day})"))
        }
    }

    fn age(&self, arg: &str) -> Result<String> {
        Ok(format!(
            "(DATEDIFF(year, {arg}, GETDATE()) - CASE WHEN \
             MONTH(GETDATE()) + DAY(GETDATE()) / 100.0 < MONTH({arg}) + DAY({arg}) / 100.0 \
             THEN 1 ELSE 0 END)"
        ))
    }

    fn median(&self, _arg: &str) -> Result<String> {
        Err(self.unsupported(Feature::Median))
    }

    fn percentile(&self, percentile: u8, _arg: &str) -> Result<String> {
        Err(self.unsupported(Feature::Percentile(percentile)))
    }

    fn cast_string(&self, arg: &str) -> String {
        format!("CAST({arg} AS NVARCHAR(MAX))")
    }

    fn cast_int(&self, arg: &str) -> String {
        format!("CAST({arg} AS INT)")
    }

    // BIT values are not predicates in T-SQL.
    fn predicate(&self, value: &str) -> String {
        format!("({value} = 1)")
    }
}
