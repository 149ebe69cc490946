//! Conversion from syntax trees to [`Expr`] trees.

use chrono::NaiveDate;

use crate::error::{FieldcError, Result};
use crate::parser::ast::{ComparisonOp, Expr, Function};
use crate::parser::dates::{date_range, parse_date_value, RangeOffset, RangeUnit};
use crate::parser::syntax::{SyntaxKind, SyntaxNode};
use crate::types::Value;

/// Builds expression trees from syntax trees.
///
/// Relative dates (`is last month`, `date("today")`) are resolved against
/// the builder's reference date.
#[derive(Debug, Clone, Copy)]
pub struct AstBuilder {
    today: NaiveDate,
}

impl AstBuilder {
    /// Creates a builder with the given reference date.
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        AstBuilder { today }
    }

    /// Returns the reference date.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Builds a complete expression.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLiteral` for unparseable numbers or dates, and a
    /// `SyntaxError` if the tree is a partial condition.
    pub fn build(&self, node: SyntaxNode) -> Result<Expr> {
        self.build_node(node, None)
    }

    /// Builds a bucket or quickselect condition, filling the missing field
    /// of a partial condition with `field`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLiteral` for unparseable numbers or dates.
    pub fn build_condition(&self, node: SyntaxNode, field: &Expr) -> Result<Expr> {
        self.build_node(node, Some(field))
    }

    fn build_node(&self, node: SyntaxNode, field: Option<&Expr>) -> Result<Expr> {
        let SyntaxNode {
            kind,
            position,
            children,
        } = node;
        let mut children = children.into_iter();
        let next = |children: &mut std::vec::IntoIter<SyntaxNode>| -> Result<Expr> {
            let child = children
                .next()
                .ok_or_else(|| FieldcError::syntax(position, "an operand", "nothing"))?;
            self.build_node(child, field)
        };

        let expr = match kind {
            SyntaxKind::Number(text) => Expr::literal(parse_number(&text, position)?),
            SyntaxKind::String(s) => Expr::string(s),
            SyntaxKind::Date(s) => {
                let value = parse_date_value(&s, self.today).ok_or_else(|| {
                    FieldcError::invalid_literal(position, format!("cannot interpret \"{s}\" as a date"))
                })?;
                Expr::literal(value)
            }
            SyntaxKind::Bool(b) => Expr::literal(Value::Bool(b)),
            SyntaxKind::Null => Expr::literal(Value::Null),
            SyntaxKind::Identifier(name) => Expr::Column { name },
            SyntaxKind::CrossRef(fragment_name) => Expr::CrossRef { fragment_name },
            SyntaxKind::Call { name, star } => {
                let function = Function::from_name(&name).ok_or_else(|| {
                    FieldcError::syntax(position, "a known function", format!("unknown function '{name}'"))
                })?;
                let args = if star {
                    Vec::new()
                } else {
                    self.build_all(children, field)?
                };
                return Ok(Expr::call(function, args));
            }
            SyntaxKind::If => {
                let mut args = self.build_all(children, field)?;
                let else_value = args
                    .pop()
                    .ok_or_else(|| FieldcError::syntax(position, "an else value", "nothing"))?;
                let mut branches = Vec::with_capacity(args.len() / 2);
                let mut args = args.into_iter();
                while let (Some(condition), Some(value)) = (args.next(), args.next()) {
                    branches.push((condition, value));
                }
                return Ok(Expr::conditional(branches, else_value));
            }
            SyntaxKind::Negate => negate(next(&mut children)?),
            SyntaxKind::Not => Expr::not(next(&mut children)?),
            SyntaxKind::Arithmetic(op) => {
                let left = next(&mut children)?;
                let right = next(&mut children)?;
                Expr::binary(op, left, right)
            }
            SyntaxKind::Compare(op) => {
                let left = next(&mut children)?;
                let right = self.build_all(children, field)?;
                return Ok(Expr::compare(op, left, right));
            }
            SyntaxKind::IsNull { negated } => Expr::IsNull {
                operand: Box::new(next(&mut children)?),
                negated,
            },
            SyntaxKind::DateRange { offset, unit } => {
                let operand = next(&mut children)?;
                let range = RangeOffset::from_word(&offset)
                    .zip(RangeUnit::from_word(&unit))
                    .and_then(|(o, u)| date_range(o, u, self.today));
                let (start, end) = range.ok_or_else(|| {
                    FieldcError::invalid_literal(position, format!("cannot compute date range '{offset} {unit}'"))
                })?;
                Expr::compare(
                    ComparisonOp::Between,
                    operand,
                    vec![Expr::literal(Value::Date(start)), Expr::literal(Value::Date(end))],
                )
            }
            SyntaxKind::And => return Ok(Expr::and(self.build_all(children, field)?)),
            SyntaxKind::Or => return Ok(Expr::or(self.build_all(children, field)?)),
            SyntaxKind::Partial => next(&mut children)?,
            SyntaxKind::Placeholder => field.cloned().ok_or_else(|| {
                FieldcError::syntax(position, "an expression", "a condition without a field")
            })?,
        };
        Ok(expr)
    }

    fn build_all(
        &self,
        children: impl IntoIterator<Item = SyntaxNode>,
        field: Option<&Expr>,
    ) -> Result<Vec<Expr>> {
        children
            .into_iter()
            .map(|child| self.build_node(child, field))
            .collect()
    }
}

fn parse_number(text: &str, position: usize) -> Result<Value> {
    let is_float = text.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Integer(i));
        }
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Value::Float(f)),
        _ => Err(FieldcError::invalid_literal(
            position,
            format!("'{text}' is not a representable number"),
        )),
    }
}

/// Folds unary minus into numeric literals; anything else becomes `0 - x`.
fn negate(operand: Expr) -> Expr {
    match operand {
        Expr::Literal {
            value: Value::Integer(i),
            ..
        } if i != i64::MIN => Expr::literal(Value::Integer(-i)),
        Expr::Literal {
            value: Value::Float(f),
            ..
        } => Expr::literal(Value::Float(-f)),
        other => Expr::binary(crate::parser::ast::ArithmeticOp::Sub, Expr::int(0), other),
    }
}
