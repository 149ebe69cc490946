//! Recursive-descent parser over the token stream.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparison, additive,
//! multiplicative, unary minus, primary.

use crate::error::{FieldcError, Result};
use crate::parser::ast::{ArithmeticOp, ComparisonOp, Function};
use crate::parser::dates::{RangeOffset, RangeUnit};
use crate::parser::syntax::{SyntaxKind, SyntaxNode};
use crate::parser::token::{unescape_string, Token, TokenKind};

/// Parses a complete expression.
///
/// # Errors
///
/// Returns a `SyntaxError` naming the position, the expected construct and
/// the token found instead.
pub fn parse(tokens: &[Token]) -> Result<SyntaxNode> {
    let mut parser = Parser::new(tokens);
    let node = parser.parse_or()?;
    parser.expect_end()?;
    Ok(node)
}

/// Parses a bucket or quickselect condition.
///
/// A condition that starts with a comparison operator (`>1000`,
/// `in ("A", "B")`, `is null`) is returned as a [`SyntaxKind::Partial`] node
/// whose left operand is a placeholder for the field. Anything else is parsed
/// as a complete expression.
///
/// # Errors
///
/// Returns a `SyntaxError` if the condition is malformed.
pub fn parse_partial(tokens: &[Token]) -> Result<SyntaxNode> {
    let mut parser = Parser::new(tokens);
    if !parser.at_comparison_operator() {
        let node = parser.parse_or()?;
        parser.expect_end()?;
        return Ok(node);
    }
    let position = parser.peek().position;
    let placeholder = SyntaxNode::leaf(SyntaxKind::Placeholder, position);
    let comparison = parser.parse_comparison_tail(placeholder)?;
    parser.expect_end()?;
    Ok(SyntaxNode::branch(SyntaxKind::Partial, position, vec![comparison]))
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    eof: Token,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        let end = tokens
            .last()
            .map_or(0, |t| t.position + t.text.chars().count());
        Parser {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, "", end),
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: &str) -> FieldcError {
        let found = self.peek();
        FieldcError::syntax(found.position, expected, found.describe())
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_end(&self) -> Result<()> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error("end of input"))
        }
    }

    fn parse_or(&mut self) -> Result<SyntaxNode> {
        let position = self.peek().position;
        let mut operands = vec![self.parse_and()?];
        while self.peek().is_operator("or") {
            self.advance();
            operands.push(self.parse_and()?);
        }
        Ok(fold_variadic(SyntaxKind::Or, position, operands))
    }

    fn parse_and(&mut self) -> Result<SyntaxNode> {
        let position = self.peek().position;
        let mut operands = vec![self.parse_not()?];
        while self.peek().is_operator("and") {
            self.advance();
            operands.push(self.parse_not()?);
        }
        Ok(fold_variadic(SyntaxKind::And, position, operands))
    }

    fn parse_not(&mut self) -> Result<SyntaxNode> {
        if self.peek().is_operator("not") {
            let position = self.advance().position;
            let operand = self.parse_not()?;
            return Ok(SyntaxNode::branch(SyntaxKind::Not, position, vec![operand]));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<SyntaxNode> {
        let left = self.parse_additive()?;
        if self.at_comparison_operator() {
            self.parse_comparison_tail(left)
        } else {
            Ok(left)
        }
    }

    fn at_comparison_operator(&self) -> bool {
        let token = self.peek();
        match token.kind {
            TokenKind::Operator => {
                ComparisonOp::from_symbol(&token.text).is_some()
                    || ["like", "ilike", "between", "in"]
                        .iter()
                        .any(|op| token.is_operator(op))
                    || (token.is_operator("not") && self.peek_at(1).is_operator("in"))
            }
            TokenKind::Keyword => token.is_keyword("is"),
            _ => false,
        }
    }

    /// Parses the operator and right-hand side of a comparison.
    fn parse_comparison_tail(&mut self, left: SyntaxNode) -> Result<SyntaxNode> {
        let op_token = self.advance();
        let position = left.position.min(op_token.position);

        if let Some(op) = ComparisonOp::from_symbol(&op_token.text) {
            let right = self.parse_additive()?;
            if right.kind == SyntaxKind::Null && matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) {
                let negated = op == ComparisonOp::Ne;
                return Ok(SyntaxNode::branch(SyntaxKind::IsNull { negated }, position, vec![left]));
            }
            return Ok(SyntaxNode::branch(SyntaxKind::Compare(op), position, vec![left, right]));
        }

        if op_token.is_operator("like") || op_token.is_operator("ilike") {
            let op = if op_token.is_operator("like") {
                ComparisonOp::Like
            } else {
                ComparisonOp::ILike
            };
            let right = self.parse_additive()?;
            return Ok(SyntaxNode::branch(SyntaxKind::Compare(op), position, vec![left, right]));
        }

        if op_token.is_operator("between") {
            let bounds = if self.peek().kind == TokenKind::LParen {
                let list_position = self.peek().position;
                let bounds = self.parse_list()?;
                if bounds.len() != 2 {
                    return Err(FieldcError::syntax(
                        list_position,
                        "exactly two values for between",
                        format!("{} values", bounds.len()),
                    ));
                }
                bounds
            } else {
                let low = self.parse_additive()?;
                if !self.peek().is_operator("and") {
                    return Err(self.error("'and'"));
                }
                self.advance();
                let high = self.parse_additive()?;
                vec![low, high]
            };
            let mut children = vec![left];
            children.extend(bounds);
            return Ok(SyntaxNode::branch(SyntaxKind::Compare(ComparisonOp::Between), position, children));
        }

        if op_token.is_operator("in") || op_token.is_operator("not") {
            let op = if op_token.is_operator("not") {
                self.advance();
                ComparisonOp::NotIn
            } else {
                ComparisonOp::In
            };
            let mut children = vec![left];
            children.extend(self.parse_list()?);
            return Ok(SyntaxNode::branch(SyntaxKind::Compare(op), position, children));
        }

        // `is`
        if self.peek().is_operator("not") && self.peek_at(1).is_keyword("null") {
            self.advance();
            self.advance();
            return Ok(SyntaxNode::branch(SyntaxKind::IsNull { negated: true }, position, vec![left]));
        }
        if self.peek().is_keyword("null") {
            self.advance();
            return Ok(SyntaxNode::branch(SyntaxKind::IsNull { negated: false }, position, vec![left]));
        }
        let offset = self.peek().clone();
        let unit = self.peek_at(1).clone();
        let is_range = offset.kind == TokenKind::Identifier
            && unit.kind == TokenKind::Identifier
            && RangeOffset::from_word(&offset.text).is_some()
            && RangeUnit::from_word(&unit.text).is_some();
        if !is_range {
            return Err(self.error("'null', 'not null' or a relative date such as 'last month'"));
        }
        self.advance();
        self.advance();
        Ok(SyntaxNode::branch(
            SyntaxKind::DateRange {
                offset: offset.text,
                unit: unit.text,
            },
            position,
            vec![left],
        ))
    }

    /// Parses `(a, b, ...)` with an optional trailing comma.
    fn parse_list(&mut self) -> Result<Vec<SyntaxNode>> {
        self.expect_kind(TokenKind::LParen, "'('")?;
        let mut items = Vec::new();
        loop {
            if self.peek().kind == TokenKind::RParen && !items.is_empty() {
                break;
            }
            items.push(self.parse_additive()?);
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen, "',' or ')'")?;
        Ok(items)
    }

    fn parse_additive(&mut self) -> Result<SyntaxNode> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.peek().is_operator("+") {
                ArithmeticOp::Add
            } else if self.peek().is_operator("-") {
                ArithmeticOp::Sub
            } else {
                return Ok(left);
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let position = left.position;
            left = SyntaxNode::branch(SyntaxKind::Arithmetic(op), position, vec![left, right]);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<SyntaxNode> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.peek().is_operator("*") {
                ArithmeticOp::Mul
            } else if self.peek().is_operator("/") {
                ArithmeticOp::Div
            } else {
                return Ok(left);
            };
            self.advance();
            let right = self.parse_unary()?;
            let position = left.position;
            left = SyntaxNode::branch(SyntaxKind::Arithmetic(op), position, vec![left, right]);
        }
    }

    fn parse_unary(&mut self) -> Result<SyntaxNode> {
        if self.peek().is_operator("-") {
            let position = self.advance().position;
            let operand = self.parse_unary()?;
            return Ok(SyntaxNode::branch(SyntaxKind::Negate, position, vec![operand]));
        }
        if self.peek().is_operator("+") {
            self.advance();
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<SyntaxNode> {
        let token = self.peek().clone();
        let position = token.position;
        match token.kind {
            TokenKind::Number => {
                self.advance();
                Ok(SyntaxNode::leaf(SyntaxKind::Number(token.text), position))
            }
            TokenKind::String => {
                self.advance();
                Ok(SyntaxNode::leaf(SyntaxKind::String(unescape_string(&token.text)), position))
            }
            TokenKind::DateLiteral => {
                self.advance();
                let inner = token
                    .text
                    .find('"')
                    .and_then(|start| token.text.rfind('"').map(|end| &token.text[start..=end]))
                    .unwrap_or_default();
                Ok(SyntaxNode::leaf(SyntaxKind::Date(unescape_string(inner)), position))
            }
            TokenKind::Keyword => self.parse_keyword(&token),
            TokenKind::Identifier => {
                if self.peek_at(1).kind == TokenKind::LParen {
                    return Err(FieldcError::syntax(
                        position,
                        "a known function",
                        format!("unknown function '{}'", token.text),
                    ));
                }
                self.advance();
                let name = token.identifier_name().unwrap_or_default().to_string();
                let kind = if token.is_cross_reference() {
                    SyntaxKind::CrossRef(name)
                } else {
                    SyntaxKind::Identifier(name)
                };
                Ok(SyntaxNode::leaf(kind, position))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect_kind(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.error("an expression")),
        }
    }

    fn parse_keyword(&mut self, token: &Token) -> Result<SyntaxNode> {
        let position = token.position;
        let word = token.text.to_ascii_lowercase();
        match word.as_str() {
            "true" | "false" => {
                self.advance();
                Ok(SyntaxNode::leaf(SyntaxKind::Bool(word == "true"), position))
            }
            "null" => {
                self.advance();
                Ok(SyntaxNode::leaf(SyntaxKind::Null, position))
            }
            "if" => {
                self.advance();
                let args = self.parse_arguments()?;
                if args.len() < 3 || args.len() % 2 == 0 {
                    return Err(FieldcError::syntax(
                        position,
                        "if(condition, value, [condition, value, ...] else_value)",
                        format!("if with {} arguments", args.len()),
                    ));
                }
                Ok(SyntaxNode::branch(SyntaxKind::If, position, args))
            }
            "is" => Err(self.error("an expression")),
            _ => self.parse_call(token),
        }
    }

    fn parse_call(&mut self, token: &Token) -> Result<SyntaxNode> {
        let position = token.position;
        let Some(function) = Function::from_name(&token.text) else {
            return Err(self.error("an expression"));
        };
        self.advance();

        if function == Function::Count
            && self.peek_at(1).is_operator("*")
            && self.peek_at(2).kind == TokenKind::RParen
        {
            self.advance();
            self.advance();
            self.advance();
            return Ok(SyntaxNode::leaf(
                SyntaxKind::Call {
                    name: token.text.clone(),
                    star: true,
                },
                position,
            ));
        }

        let args = self.parse_arguments()?;
        if args.len() != function.arity() {
            return Err(FieldcError::syntax(
                position,
                format!("{} argument(s) for {function}", function.arity()),
                format!("{} argument(s)", args.len()),
            ));
        }
        Ok(SyntaxNode::branch(
            SyntaxKind::Call {
                name: token.text.clone(),
                star: false,
            },
            position,
            args,
        ))
    }

    /// Parses a parenthesized, comma-separated argument list.
    fn parse_arguments(&mut self) -> Result<Vec<SyntaxNode>> {
        self.expect_kind(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen, "',' or ')'")?;
        Ok(args)
    }
}

fn fold_variadic(kind: SyntaxKind, position: usize, mut operands: Vec<SyntaxNode>) -> SyntaxNode {
    if operands.len() == 1 {
        if let Some(only) = operands.pop() {
            return only;
        }
    }
    SyntaxNode::branch(kind, position, operands)
}
