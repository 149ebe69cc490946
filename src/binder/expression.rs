//! Bound expression definitions.

use serde::{Deserialize, Serialize};

use crate::parser::{ArithmeticOp, ComparisonOp, Function, LogicalOp};
use crate::types::{ResolvedType, Value};

/// Bound expression after semantic analysis.
///
/// Every node carries its resolved type and whether the subtree contains an
/// aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundExpression {
    /// Literal value (constant).
    Literal {
        value: Value,
        data_type: ResolvedType,
    },

    /// Reference to a catalog column, with its canonical name.
    Column {
        name: String,
        data_type: ResolvedType,
    },

    /// Function call. `count(*)` has no arguments.
    Function {
        function: Function,
        args: Vec<BoundExpression>,
        data_type: ResolvedType,
        aggregated: bool,
    },

    /// Arithmetic operations.
    Arithmetic {
        op: ArithmeticOp,
        left: Box<BoundExpression>,
        right: Box<BoundExpression>,
        aggregated: bool,
    },

    /// Comparison against one operand, a list, or `between` bounds.
    Comparison {
        op: ComparisonOp,
        left: Box<BoundExpression>,
        right: Vec<BoundExpression>,
        aggregated: bool,
    },

    /// Logical AND/OR/NOT.
    Logical {
        op: LogicalOp,
        operands: Vec<BoundExpression>,
        aggregated: bool,
    },

    /// `if(...)` chain.
    Conditional {
        branches: Vec<(BoundExpression, BoundExpression)>,
        else_value: Box<BoundExpression>,
        data_type: ResolvedType,
        aggregated: bool,
    },

    /// IS NULL / IS NOT NULL.
    IsNull {
        operand: Box<BoundExpression>,
        negated: bool,
        aggregated: bool,
    },
}

impl BoundExpression {
    /// Returns true for comparisons, logical operators and null checks.
    #[must_use]
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            BoundExpression::Comparison { .. } | BoundExpression::Logical { .. } | BoundExpression::IsNull { .. }
        )
    }

    /// Returns the data type of this expression.
    #[must_use]
    pub fn data_type(&self) -> ResolvedType {
        match self {
            BoundExpression::Literal { data_type, .. }
            | BoundExpression::Column { data_type, .. }
            | BoundExpression::Function { data_type, .. }
            | BoundExpression::Conditional { data_type, .. } => *data_type,
            BoundExpression::Arithmetic { .. } => ResolvedType::Number,
            BoundExpression::Comparison { .. }
            | BoundExpression::Logical { .. }
            | BoundExpression::IsNull { .. } => ResolvedType::Boolean,
        }
    }

    /// Returns true if this subtree contains an aggregation.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        match self {
            BoundExpression::Literal { .. } | BoundExpression::Column { .. } => false,
            BoundExpression::Function { aggregated, .. }
            | BoundExpression::Arithmetic { aggregated, .. }
            | BoundExpression::Comparison { aggregated, .. }
            | BoundExpression::Logical { aggregated, .. }
            | BoundExpression::Conditional { aggregated, .. }
            | BoundExpression::IsNull { aggregated, .. } => *aggregated,
        }
    }

    /// Returns true if any column is referenced in this subtree.
    #[must_use]
    pub fn references_column(&self) -> bool {
        match self {
            BoundExpression::Literal { .. } => false,
            BoundExpression::Column { .. } => true,
            BoundExpression::Function { args, .. } => args.iter().any(Self::references_column),
            BoundExpression::Arithmetic { left, right, .. } => {
                left.references_column() || right.references_column()
            }
            BoundExpression::Comparison { left, right, .. } => {
                left.references_column() || right.iter().any(Self::references_column)
            }
            BoundExpression::Logical { operands, .. } => operands.iter().any(Self::references_column),
            BoundExpression::Conditional {
                branches,
                else_value,
                ..
            } => {
                else_value.references_column()
                    || branches
                        .iter()
                        .any(|(c, v)| c.references_column() || v.references_column())
            }
            BoundExpression::IsNull { operand, .. } => operand.references_column(),
        }
    }

    /// Returns the first column referenced outside every aggregation.
    #[must_use]
    pub fn ungrouped_column(&self) -> Option<&str> {
        match self {
            BoundExpression::Literal { .. } => None,
            BoundExpression::Column { name, .. } => Some(name.as_str()),
            BoundExpression::Function { function, .. } if function.is_aggregate() => None,
            BoundExpression::Function { args, .. } => args.iter().find_map(Self::ungrouped_column),
            BoundExpression::Arithmetic { left, right, .. } => {
                left.ungrouped_column().or_else(|| right.ungrouped_column())
            }
            BoundExpression::Comparison { left, right, .. } => left
                .ungrouped_column()
                .or_else(|| right.iter().find_map(Self::ungrouped_column)),
            BoundExpression::Logical { operands, .. } => operands.iter().find_map(Self::ungrouped_column),
            BoundExpression::Conditional {
                branches,
                else_value,
                ..
            } => branches
                .iter()
                .find_map(|(c, v)| c.ungrouped_column().or_else(|| v.ungrouped_column()))
                .or_else(|| else_value.ungrouped_column()),
            BoundExpression::IsNull { operand, .. } => operand.ungrouped_column(),
        }
    }

    /// Creates a literal expression.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        let data_type = value.resolved_type();
        BoundExpression::Literal { value, data_type }
    }

    /// Creates a function call, deriving the aggregation flag.
    #[must_use]
    pub fn function(function: Function, args: Vec<BoundExpression>, data_type: ResolvedType) -> Self {
        let aggregated = function.is_aggregate() || args.iter().any(Self::is_aggregate);
        BoundExpression::Function {
            function,
            args,
            data_type,
            aggregated,
        }
    }

    /// Creates an arithmetic expression.
    #[must_use]
    pub fn arithmetic(op: ArithmeticOp, left: BoundExpression, right: BoundExpression) -> Self {
        let aggregated = left.is_aggregate() || right.is_aggregate();
        BoundExpression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            aggregated,
        }
    }

    /// Creates a comparison expression.
    #[must_use]
    pub fn comparison(op: ComparisonOp, left: BoundExpression, right: Vec<BoundExpression>) -> Self {
        let aggregated = left.is_aggregate() || right.iter().any(Self::is_aggregate);
        BoundExpression::Comparison {
            op,
            left: Box::new(left),
            right,
            aggregated,
        }
    }

    /// Creates a logical expression.
    #[must_use]
    pub fn logical(op: LogicalOp, operands: Vec<BoundExpression>) -> Self {
        let aggregated = operands.iter().any(Self::is_aggregate);
        BoundExpression::Logical {
            op,
            operands,
            aggregated,
        }
    }

    /// Creates a logical NOT expression.
    #[must_use]
    pub fn not(operand: BoundExpression) -> Self {
        Self::logical(LogicalOp::Not, vec![operand])
    }

    /// Creates a conditional. Aggregated if any condition or value is.
    #[must_use]
    pub fn conditional(
        branches: Vec<(BoundExpression, BoundExpression)>,
        else_value: BoundExpression,
        data_type: ResolvedType,
    ) -> Self {
        let aggregated = else_value.is_aggregate()
            || branches
                .iter()
                .any(|(c, v)| c.is_aggregate() || v.is_aggregate());
        BoundExpression::Conditional {
            branches,
            else_value: Box::new(else_value),
            data_type,
            aggregated,
        }
    }

    /// Creates a null check.
    #[must_use]
    pub fn is_null(operand: BoundExpression, negated: bool) -> Self {
        let aggregated = operand.is_aggregate();
        BoundExpression::IsNull {
            operand: Box::new(operand),
            negated,
            aggregated,
        }
    }

    /// Wraps this expression in `sum(...)`.
    #[must_use]
    pub fn sum(self) -> Self {
        Self::function(Function::Sum, vec![self], ResolvedType::Number)
    }
}
