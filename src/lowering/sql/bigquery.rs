//! Google BigQuery backend.

use chrono::NaiveDateTime;

use super::SqlBackend;
use crate::error::Result;
use crate::parser::DateUnit;
use crate::types::ResolvedType;

/// BigQuery standard SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigQuery;

/// `approx_quantiles` bucket count and offset for each percentile.
fn quantile_offset(percentile: u8) -> (u8, u8) {
    match percentile {
        1 => (100, 1),
        5 => (20, 1),
        10 => (10, 1),
        25 => (4, 1),
        50 => (2, 1),
        75 => (4, 3),
        90 => (10, 9),
        95 => (20, 19),
        99 => (100, 99),
        p => (100, p),
    }
}

fn unit_keyword(unit: DateUnit) -> &'static str {
    match unit {
        DateUnit::Day => "DAY",
        DateUnit::Week => "WEEK(MONDAY)",
        DateUnit::Month => "MONTH",
        DateUnit::Quarter => "QUARTER",
        DateUnit::Year => "YEAR",
    }
}

impl SqlBackend for BigQuery {
    fn id(&self) -> &'static str {
        "bigquery"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "\\`"))
    }

    fn datetime_literal(&self, datetime: NaiveDateTime) -> String {
        format!("DATETIME '{}'", datetime.format("%Y-%m-%d %H:%M:%S%.f"))
    }

    fn ilike(&self, left: &str, pattern: &str) -> String {
        format!("LOWER({left}) LIKE LOWER({pattern})")
    }

    fn truncate(&self, unit: DateUnit, input: ResolvedType, arg: &str) -> Result<String> {
        let unit = unit_keyword(unit);
        if input == ResolvedType::Datetime {
            Ok(format!("DATETIME(TIMESTAMP_TRUNC({arg}, {unit}))"))
        } else {
            Ok(format!("DATE_TRUNC({arg}, {unit})"))
        }
    }

    fn age(&self, arg: &str) -> Result<String> {
        Ok(format!(
            "(DATE_DIFF(CURRENT_DATE, {arg}, YEAR) - IF(\
             EXTRACT(MONTH FROM CURRENT_DATE)+EXTRACT(DAY FROM CURRENT_DATE)/100.0 < \
             EXTRACT(MONTH FROM {arg})+EXTRACT(DAY FROM {arg})/100.0, 1, 0))"
        ))
    }

    fn median(&self, arg: &str) -> Result<String> {
        self.percentile(50, arg)
    }

    fn percentile(&self, percentile: u8, arg: &str) -> Result<String> {
        let (buckets, offset) = quantile_offset(percentile);
        Ok(format!("approx_quantiles({arg}, {buckets})[OFFSET({offset})]"))
    }

    fn cast_string(&self, arg: &str) -> String {
        format!("CAST({arg} AS STRING)")
    }

    fn cast_int(&self, arg: &str) -> String {
        format!("CAST({arg} AS INT64)")
    }
}
