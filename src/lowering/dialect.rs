//! Dialect strategy interface.

use std::fmt;

use crate::error::Result;
use crate::parser::{ArithmeticOp, ComparisonOp, DateUnit, Function, LogicalOp};
use crate::types::{ResolvedType, Value};

/// Optional capabilities a backend may lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Median,
    Percentile(u8),
    /// Whole years since a date.
    Age,
    /// Date truncation to the given unit.
    Truncate(DateUnit),
}

impl Feature {
    /// Returns the feature a function needs, if any.
    #[must_use]
    pub fn required_by(function: Function) -> Option<Feature> {
        match function {
            Function::Median => Some(Feature::Median),
            Function::Percentile(p) => Some(Feature::Percentile(p)),
            Function::Age => Some(Feature::Age),
            other => other.date_unit().map(Feature::Truncate),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Median => f.write_str("median"),
            Feature::Percentile(p) => write!(f, "percentile{p}"),
            Feature::Age => f.write_str("age"),
            Feature::Truncate(unit) => write!(f, "{} truncation", unit.name()),
        }
    }
}

/// Backend-specific rendering of lowered expressions.
///
/// Each `emit_*` method receives already-lowered children. Callers consult
/// [`Dialect::supports`] before emitting anything that needs a [`Feature`];
/// `not in` and safe division are expressed through the other methods and
/// never reach the dialect directly.
pub trait Dialect: Send + Sync {
    /// Backend expression handle: SQL text, an expression tree, ...
    type Handle: Clone + fmt::Debug + Send + Sync;

    /// Driver name of the backend, e.g. `postgresql`.
    fn id(&self) -> &str;

    /// Returns true if the backend can express the feature.
    fn supports(&self, feature: Feature) -> bool;

    /// Emits a constant.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot represent the value.
    fn emit_literal(&self, value: &Value) -> Result<Self::Handle>;

    /// Emits a column reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot reference the column.
    fn emit_column(&self, name: &str) -> Result<Self::Handle>;

    /// Emits arithmetic.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot combine the operands.
    fn emit_binary_op(&self, op: ArithmeticOp, left: Self::Handle, right: Self::Handle) -> Result<Self::Handle>;

    /// Emits a comparison; `right` holds one operand, a list, or two bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand count does not fit the operator.
    fn emit_comparison(&self, op: ComparisonOp, left: Self::Handle, right: Vec<Self::Handle>) -> Result<Self::Handle>;

    /// Emits `and`/`or` over operands, or `not` over one.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no operands.
    fn emit_boolean_op(&self, op: LogicalOp, operands: Vec<Self::Handle>) -> Result<Self::Handle>;

    /// Emits a CASE-style conditional.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot build the conditional.
    fn emit_conditional(&self, branches: Vec<(Self::Handle, Self::Handle)>, else_value: Self::Handle) -> Result<Self::Handle>;

    /// Emits a function call. `arg_types` are the resolved argument types.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFeature` if the backend cannot express the function.
    fn emit_function_call(&self, function: Function, args: Vec<Self::Handle>, arg_types: &[ResolvedType]) -> Result<Self::Handle>;

    /// Emits `x IS [NOT] NULL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot build the check.
    fn emit_is_null(&self, operand: Self::Handle, negated: bool) -> Result<Self::Handle>;

    /// Turns a boolean value (a literal, column or conditional) into a
    /// predicate. Backends with a native boolean type return it unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot test the value.
    fn emit_predicate(&self, value: Self::Handle) -> Result<Self::Handle> {
        Ok(value)
    }
}
