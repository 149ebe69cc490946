//! Binder module for semantic analysis.
//!
//! The binder turns parsed expressions into typed, context-checked trees:
//! - `@name` references are inlined from a fragment registry
//! - Columns are resolved against the catalog and every node is typed
//! - The field context's aggregation rules are applied once at the root
//!
//! The output is a bound expression ready for lowering.

mod aggregation;
mod expression;
mod resolver;
mod scope;
mod semantic;

pub use aggregation::{apply_context, FieldContext};
pub use expression::BoundExpression;
pub use resolver::{resolve_references, EmptyRegistry, FragmentRegistry, ReferenceResolver};
pub use scope::ResolutionStack;
pub use semantic::{ValidationOptions, Validator};
