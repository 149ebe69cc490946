//! fieldc - Field Expression Compiler
//!
//! Compiles analyst-written metric, dimension and filter expressions such as
//! `sum(sales) - sum(expenses)` or `age between 13 and 19` into typed trees
//! and lowers them into SQL fragments (or any other dialect handle).

pub mod binder;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fragment;
pub mod lowering;
pub mod parser;
pub mod types;

pub use binder::{BoundExpression, EmptyRegistry, FieldContext, FragmentRegistry};
pub use catalog::{Catalog, CatalogAdapter, ColumnDef};
pub use compiler::Compiler;
pub use config::CompilerConfig;
pub use error::{FieldcError, Result};
pub use fragment::{
    BucketSpec, CompilationCache, FragmentDefinition, FragmentKind, QuickselectSet, QuickselectSpec, Shelf,
    ShelfEntry,
};
pub use lowering::{dialect_for_driver, CompiledFragment, Dialect, Feature, SqlDialect, SqlFragment};
pub use parser::{parse_expression, Expr};
pub use types::{ResolvedType, Value};
