//! Concrete syntax tree produced by the parser and consumed by the AST builder.

use crate::parser::ast::{ArithmeticOp, ComparisonOp};

/// A parse-tree node. Transient: discarded once the AST is built.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    /// Character position of the token that started this node.
    pub position: usize,
    pub children: Vec<SyntaxNode>,
}

/// Syntax node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxKind {
    /// Numeric literal text.
    Number(String),
    /// Unescaped string literal.
    String(String),
    /// Unescaped contents of `date("...")`.
    Date(String),
    Bool(bool),
    Null,
    /// Column name with brackets stripped.
    Identifier(String),
    /// `@name` with the marker stripped.
    CrossRef(String),
    /// Function call; children are the arguments. `star` marks `count(*)`.
    Call { name: String, star: bool },
    /// `if(...)`; children are the raw arguments.
    If,
    /// Unary minus over one child.
    Negate,
    /// `not` over one child.
    Not,
    /// Arithmetic over two children.
    Arithmetic(ArithmeticOp),
    /// Comparison; first child is the left operand, the rest are the
    /// right operand, list elements, or `between` bounds.
    Compare(ComparisonOp),
    /// `is [not] null` over one child.
    IsNull { negated: bool },
    /// `is <offset> <unit>` over one child.
    DateRange { offset: String, unit: String },
    /// `and` over two or more children.
    And,
    /// `or` over two or more children.
    Or,
    /// A comparison whose left operand is a [`SyntaxKind::Placeholder`].
    Partial,
    /// The missing left-hand field of a partial condition.
    Placeholder,
}

impl SyntaxNode {
    /// Creates a leaf node.
    #[must_use]
    pub fn leaf(kind: SyntaxKind, position: usize) -> Self {
        SyntaxNode {
            kind,
            position,
            children: Vec::new(),
        }
    }

    /// Creates an interior node.
    #[must_use]
    pub fn branch(kind: SyntaxKind, position: usize, children: Vec<SyntaxNode>) -> Self {
        SyntaxNode {
            kind,
            position,
            children,
        }
    }

    /// Returns true if this node is a condition over a missing field.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.kind == SyntaxKind::Partial
    }
}
