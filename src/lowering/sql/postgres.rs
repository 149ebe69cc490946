//! PostgreSQL backend.

use super::SqlBackend;

/// PostgreSQL. The [`SqlBackend`] defaults are written for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl SqlBackend for Postgres {
    fn id(&self) -> &'static str {
        "postgresql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DateUnit;
    use crate::types::ResolvedType;
    use chrono::NaiveDate;

    #[test]
    fn test_truncation_keeps_date_type() {
        let sql = Postgres.truncate(DateUnit::Month, ResolvedType::Date, "\"d\"").unwrap();
        assert_eq!(sql, "CAST(date_trunc('month', \"d\") AS DATE)");
        let sql = Postgres.truncate(DateUnit::Week, ResolvedType::Datetime, "\"ts\"").unwrap();
        assert_eq!(sql, "date_trunc('week', \"ts\")");
    }

    #[test]
    fn test_aggregates_and_literals() {
        assert_eq!(
            Postgres.percentile(5, "\"x\"").unwrap(),
            "percentile_cont(0.05) WITHIN GROUP (ORDER BY \"x\")"
        );
        assert_eq!(
            Postgres.median("\"x\"").unwrap(),
            "percentile_cont(0.5) WITHIN GROUP (ORDER BY \"x\")"
        );
        assert_eq!(
            Postgres.age("\"birth\"").unwrap(),
            "DATE_PART('year', AGE(CURRENT_DATE, \"birth\"))"
        );
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert_eq!(Postgres.date_literal(date), "DATE '2020-01-31'");
        assert_eq!(
            Postgres.datetime_literal(date.and_hms_opt(12, 30, 0).unwrap()),
            "TIMESTAMP '2020-01-31 12:30:00'"
        );
        assert_eq!(Postgres.quote_identifier("my\"col"), "\"my\"\"col\"");
    }
}
