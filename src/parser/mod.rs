//! Field expression parsing: tokens, syntax trees, and AST construction.

pub mod ast;
mod builder;
pub mod dates;
mod grammar;
mod lexer;
mod syntax;
mod token;

pub use ast::{ArithmeticOp, ComparisonOp, DateUnit, Expr, Function, LogicalOp, PERCENTILES};
pub use builder::AstBuilder;
pub use grammar::{parse, parse_partial};
pub use lexer::{is_reserved_word, tokenize};
pub use syntax::{SyntaxKind, SyntaxNode};
pub use token::{Token, TokenKind};

use crate::error::Result;

/// Parses expression text into an [`Expr`].
///
/// # Errors
///
/// Returns a `SyntaxError` or `InvalidLiteral` describing the first problem.
pub fn parse_expression(text: &str, builder: &AstBuilder) -> Result<Expr> {
    let tokens = tokenize(text);
    let tree = parse(&tokens)?;
    builder.build(tree)
}

/// Parses a bucket or quickselect condition, completing a partial condition
/// with `field`.
///
/// # Errors
///
/// Returns a `SyntaxError` or `InvalidLiteral` describing the first problem.
pub fn parse_condition(text: &str, field: &Expr, builder: &AstBuilder) -> Result<Expr> {
    let tokens = tokenize(text);
    let tree = parse_partial(&tokens)?;
    builder.build_condition(tree, field)
}

/// Returns the character position of the first identifier naming `name`.
#[must_use]
pub fn locate_identifier(text: &str, name: &str) -> Option<usize> {
    tokenize(text)
        .iter()
        .filter(|t| !t.is_cross_reference())
        .find(|t| t.identifier_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
        .map(|t| t.position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_locate_identifier() {
        assert_eq!(locate_identifier("revenue - expenses", "expenses"), Some(10));
        assert_eq!(locate_identifier("sum([Unit Price])", "unit price"), Some(4));
        assert_eq!(locate_identifier("@expenses + 1", "expenses"), None);
    }

    #[test]
    fn test_parse_condition_full_and_partial() {
        let builder = AstBuilder::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        let field = Expr::column("sales");
        let partial = parse_condition(">1000", &field, &builder).unwrap();
        let full = parse_condition("sales > 1000", &field, &builder).unwrap();
        assert_eq!(partial, full);
    }
}
