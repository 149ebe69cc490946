//! Shared fixtures for the compiler contract tests.

pub mod row_dialect;

use chrono::NaiveDate;
use fieldc::{Catalog, ColumnDef, Compiler, CompilerConfig, ResolvedType};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

pub fn compiler() -> Compiler {
    Compiler::new(CompilerConfig::new().with_today(today()))
}

/// A catalog of numeric columns.
pub fn numeric_catalog(names: &[&str]) -> Catalog {
    let columns = names
        .iter()
        .map(|name| ColumnDef::new(*name, ResolvedType::Number).unwrap())
        .collect();
    Catalog::with_columns("postgresql", columns).unwrap()
}
