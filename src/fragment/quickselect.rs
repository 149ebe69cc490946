//! Named conditions attached to a dimension.

use serde::{Deserialize, Serialize};

use crate::error::{FieldcError, Result};
use crate::lowering::CompiledFragment;
use crate::parser::{parse_condition, AstBuilder, Expr};

/// A labeled quickselect condition as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickselectSpec {
    pub label: String,
    pub condition: String,
}

impl QuickselectSpec {
    #[must_use]
    pub fn new(label: impl Into<String>, condition: impl Into<String>) -> Self {
        QuickselectSpec {
            label: label.into(),
            condition: condition.into(),
        }
    }
}

/// Parses each quickselect condition independently, completing partial
/// conditions with `field`.
///
/// # Errors
///
/// Returns `InvalidDefinition` for a repeated label, or the parse error of
/// the first bad condition.
pub fn build_quickselects(
    specs: &[QuickselectSpec],
    field: &Expr,
    builder: &AstBuilder,
) -> Result<Vec<(String, Expr)>> {
    let mut parsed: Vec<(String, Expr)> = Vec::with_capacity(specs.len());
    for spec in specs {
        if parsed.iter().any(|(label, _)| *label == spec.label) {
            return Err(FieldcError::InvalidDefinition(format!(
                "duplicate quickselect label '{}'",
                spec.label
            )));
        }
        let condition = parse_condition(&spec.condition, field, builder)
            .map_err(|e| e.with_expression(&spec.condition))?;
        parsed.push((spec.label.clone(), condition));
    }
    Ok(parsed)
}

/// Compiled quickselects, retrievable by label in definition order.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickselectSet<H> {
    entries: Vec<(String, CompiledFragment<H>)>,
}

impl<H> Default for QuickselectSet<H> {
    fn default() -> Self {
        QuickselectSet { entries: Vec::new() }
    }
}

impl<H> QuickselectSet<H> {
    pub(crate) fn new(entries: Vec<(String, CompiledFragment<H>)>) -> Self {
        QuickselectSet { entries }
    }

    /// Returns the compiled condition for a label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&CompiledFragment<H>> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, f)| f)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CompiledFragment<H>)> {
        self.entries.iter().map(|(l, f)| (l.as_str(), f))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
