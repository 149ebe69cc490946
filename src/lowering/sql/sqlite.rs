//! SQLite backend.

use chrono::{NaiveDate, NaiveDateTime};

use super::SqlBackend;
use crate::error::Result;
use crate::lowering::dialect::Feature;
use crate::parser::DateUnit;
use crate::types::ResolvedType;

/// SQLite. Dates are ISO strings; there is no median, percentile or age.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl SqlBackend for Sqlite {
    fn id(&self) -> &'static str {
        "sqlite"
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(feature, Feature::Truncate(_))
    }

    fn bool_literal(&self, value: bool) -> String {
        u8::from(value).to_string()
    }

    fn date_literal(&self, date: NaiveDate) -> String {
        format!("'{}'", date.format("%Y-%m-%d"))
    }

    fn datetime_literal(&self, datetime: NaiveDateTime) -> String {
        format!("'{}'", datetime.format("%Y-%m-%d %H:%M:%S%.f"))
    }

    // LIKE is already case-insensitive for ASCII.
    fn ilike(&self, left: &str, pattern: &str) -> String {
        format!("{left} LIKE {pattern}")
    }

    fn truncate(&self, unit: DateUnit, input: ResolvedType, arg: &str) -> Result<String> {
        let function = if input == ResolvedType::Datetime { "datetime" } else { "date" };
        let sql = match unit {
            DateUnit::Day => format!("{function}({arg})"),
            DateUnit::Week => format!("{function}({arg}, '-6 days', 'weekday 1')"),
            DateUnit::Month => format!("{function}({arg}, 'start of month')"),
            DateUnit::Quarter => format!(
                "{function}({arg}, 'start of month', '-' || \
                 ((CAST(strftime('%m', {arg}) AS INTEGER) - 1) % 3) || ' months')"
            ),
            DateUnit::Year => format!("{function}({arg}, 'start of year')"),
        };
        Ok(sql)
    }

    fn age(&self, _arg: &str) -> Result<String> {
        Err(self.unsupported(Feature::Age))
    }

    fn median(&self, _arg: &str) -> Result<String> {
        Err(self.unsupported(Feature::Median))
    }

    fn percentile(&self, percentile: u8, _arg: &str) -> Result<String> {
        Err(self.unsupported(Feature::Percentile(percentile)))
    }

    fn cast_string(&self, arg: &str) -> String {
        format!("CAST({arg} AS TEXT)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports() {
        assert!(Sqlite.supports(Feature::Truncate(DateUnit::Quarter)));
        assert!(!Sqlite.supports(Feature::Median));
        assert!(!Sqlite.supports(Feature::Age));
        assert!(Sqlite.median("x").is_err());
    }

    #[test]
    fn test_truncation() {
        assert_eq!(
            Sqlite.truncate(DateUnit::Month, ResolvedType::Date, "\"d\"").unwrap(),
            "date(\"d\", 'start of month')"
        );
        assert_eq!(
            Sqlite.truncate(DateUnit::Week, ResolvedType::Datetime, "\"ts\"").unwrap(),
            "datetime(\"ts\", '-6 days', 'weekday 1')"
        );
        assert!(Sqlite
            .truncate(DateUnit::Quarter, ResolvedType::Date, "\"d\"")
            .unwrap()
            .contains("% 3"));
    }

    #[test]
    fn test_literals() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        assert_eq!(Sqlite.date_literal(date), "'2021-03-04'");
        assert_eq!(Sqlite.bool_literal(true), "1");
    }
}
