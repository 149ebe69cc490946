//! Error types for field expression compilation.

use thiserror::Error;

/// Result type alias using [`FieldcError`].
pub type Result<T> = std::result::Result<T, FieldcError>;

/// Error types for field expression compilation.
///
/// Every compilation error carries the offending expression text. Inner
/// stages (parser, binder, lowering) create errors with an empty expression;
/// the compiler fills it in once through [`FieldcError::with_expression`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldcError {
    /// Malformed token stream or grammar violation.
    #[error("Syntax error in '{expression}' at position {position}: expected {expected}, found {found}")]
    SyntaxError {
        expression: String,
        position: usize,
        expected: String,
        found: String,
    },

    /// A column reference that is not present in the bound catalog.
    #[error("Unknown column '{column}' in '{expression}'{}", fmt_position(.position))]
    UnknownColumn {
        expression: String,
        column: String,
        position: Option<usize>,
    },

    /// A `@name` reference the fragment registry does not know.
    #[error("Unknown reference '@{name}' in '{expression}'")]
    UnknownReference { expression: String, name: String },

    /// `@name` resolution revisited a name already being resolved.
    #[error("Cyclic reference in '{expression}': {}", .chain.join(" -> "))]
    CyclicReference {
        expression: String,
        chain: Vec<String>,
    },

    /// Operator or function applied to incompatible operand types.
    #[error("Type mismatch in '{expression}': {message}")]
    TypeMismatch { expression: String, message: String },

    /// An aggregation nested inside another aggregation.
    #[error("Nested aggregation in '{expression}': {function} is applied to an aggregated value")]
    NestedAggregation { expression: String, function: String },

    /// Aggregation used (or missing) where the field context forbids it.
    #[error("Aggregation error in '{expression}': {message}")]
    AggregationContext { expression: String, message: String },

    /// A function or operator the active dialect cannot express.
    #[error("Unsupported feature in '{expression}': {feature} is not supported on {dialect}")]
    UnsupportedFeature {
        expression: String,
        feature: String,
        dialect: String,
    },

    /// A literal that could not be interpreted (bad number, bad date).
    #[error("Invalid literal in '{expression}' at position {position}: {message}")]
    InvalidLiteral {
        expression: String,
        position: usize,
        message: String,
    },

    /// Catalog snapshot errors.
    #[error("Catalog error: {0}")]
    CatalogError(String),

    /// A fragment definition that is structurally unusable.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),
}

fn fmt_position(position: &Option<usize>) -> String {
    position.map_or_else(String::new, |p| format!(" at position {p}"))
}

impl FieldcError {
    /// Attaches the expression text to an error raised by an inner stage.
    ///
    /// Errors that already carry an expression keep it, so an error raised
    /// while compiling a referenced fragment still names that fragment's text.
    #[must_use]
    pub fn with_expression(mut self, text: &str) -> Self {
        if let Some(slot) = self.expression_slot() {
            if slot.is_empty() {
                text.clone_into(slot);
            }
        }
        if let FieldcError::UnknownColumn {
            expression,
            column,
            position,
        } = &mut self
        {
            if position.is_none() {
                *position = crate::parser::locate_identifier(expression, column);
            }
        }
        self
    }

    fn expression_slot(&mut self) -> Option<&mut String> {
        match self {
            FieldcError::SyntaxError { expression, .. }
            | FieldcError::UnknownColumn { expression, .. }
            | FieldcError::UnknownReference { expression, .. }
            | FieldcError::CyclicReference { expression, .. }
            | FieldcError::TypeMismatch { expression, .. }
            | FieldcError::NestedAggregation { expression, .. }
            | FieldcError::AggregationContext { expression, .. }
            | FieldcError::UnsupportedFeature { expression, .. }
            | FieldcError::InvalidLiteral { expression, .. } => Some(expression),
            FieldcError::CatalogError(_) | FieldcError::InvalidDefinition(_) => None,
        }
    }

    /// Returns the expression text this error refers to, if any.
    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        match self {
            FieldcError::SyntaxError { expression, .. }
            | FieldcError::UnknownColumn { expression, .. }
            | FieldcError::UnknownReference { expression, .. }
            | FieldcError::CyclicReference { expression, .. }
            | FieldcError::TypeMismatch { expression, .. }
            | FieldcError::NestedAggregation { expression, .. }
            | FieldcError::AggregationContext { expression, .. }
            | FieldcError::UnsupportedFeature { expression, .. }
            | FieldcError::InvalidLiteral { expression, .. } => Some(expression.as_str()),
            FieldcError::CatalogError(_) | FieldcError::InvalidDefinition(_) => None,
        }
    }

    /// Returns the character position of the error, where one is known.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        match self {
            FieldcError::SyntaxError { position, .. }
            | FieldcError::InvalidLiteral { position, .. } => Some(*position),
            FieldcError::UnknownColumn { position, .. } => *position,
            _ => None,
        }
    }

    /// Creates a syntax error without expression text.
    pub(crate) fn syntax(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        FieldcError::SyntaxError {
            expression: String::new(),
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a type mismatch error without expression text.
    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        FieldcError::TypeMismatch {
            expression: String::new(),
            message: message.into(),
        }
    }

    /// Creates an aggregation context error without expression text.
    pub(crate) fn aggregation_context(message: impl Into<String>) -> Self {
        FieldcError::AggregationContext {
            expression: String::new(),
            message: message.into(),
        }
    }

    /// Creates an invalid literal error without expression text.
    pub(crate) fn invalid_literal(position: usize, message: impl Into<String>) -> Self {
        FieldcError::InvalidLiteral {
            expression: String::new(),
            position,
            message: message.into(),
        }
    }

    /// Creates an unsupported feature error without expression text.
    pub(crate) fn unsupported(feature: impl Into<String>, dialect: impl Into<String>) -> Self {
        FieldcError::UnsupportedFeature {
            expression: String::new(),
            feature: feature.into(),
            dialect: dialect.into(),
        }
    }
}
