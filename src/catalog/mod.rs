//! Catalog of columns available to expressions.

mod schema;

pub use schema::{Catalog, CatalogAdapter, ColumnDef};
