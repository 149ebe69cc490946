//! Primitive types and literal values.

mod value;

pub use value::{ResolvedType, Value};
