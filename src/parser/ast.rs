//! Abstract Syntax Tree definitions for field expressions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ResolvedType, Value};

/// Percentiles available as `percentileN` functions.
pub const PERCENTILES: [u8; 9] = [1, 5, 10, 25, 50, 75, 90, 95, 99];

/// A field expression.
///
/// Each node owns its children; after reference resolution the tree contains
/// no `CrossRef` nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value with the type inferred from its syntax.
    Literal {
        value: Value,
        inferred_type: ResolvedType,
    },
    /// Reference to a catalog column.
    Column { name: String },
    /// `@name` reference to another fragment.
    CrossRef { fragment_name: String },
    /// Aggregation or scalar function call. `count(*)` has no arguments.
    FunctionCall { function: Function, args: Vec<Expr> },
    /// Arithmetic.
    BinaryOp {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Comparison. `right` holds one operand for binary operators, the
    /// list for `in`/`not in`, and the two bounds for `between`.
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Vec<Expr>,
    },
    /// `and`/`or` over two or more operands, or `not` over one.
    BooleanOp { op: LogicalOp, operands: Vec<Expr> },
    /// `if(cond, value, ..., else)`; first matching branch wins.
    Conditional {
        branches: Vec<(Expr, Expr)>,
        else_value: Box<Expr>,
    },
    /// `x is null` / `x is not null`.
    IsNull { operand: Box<Expr>, negated: bool },
}

impl Expr {
    /// Creates a literal node.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        let inferred_type = value.resolved_type();
        Expr::Literal {
            value,
            inferred_type,
        }
    }

    /// Creates an integer literal.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Expr::literal(Value::Integer(value))
    }

    /// Creates a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Expr::literal(Value::String(value.into()))
    }

    /// Creates a column reference.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column { name: name.into() }
    }

    /// Creates a function call.
    #[must_use]
    pub fn call(function: Function, args: Vec<Expr>) -> Self {
        Expr::FunctionCall { function, args }
    }

    /// Creates an arithmetic node.
    #[must_use]
    pub fn binary(op: ArithmeticOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates a comparison node.
    #[must_use]
    pub fn compare(op: ComparisonOp, left: Expr, right: Vec<Expr>) -> Self {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right,
        }
    }

    /// Creates an `and` over the operands.
    #[must_use]
    pub fn and(operands: Vec<Expr>) -> Self {
        Expr::BooleanOp {
            op: LogicalOp::And,
            operands,
        }
    }

    /// Creates an `or` over the operands.
    #[must_use]
    pub fn or(operands: Vec<Expr>) -> Self {
        Expr::BooleanOp {
            op: LogicalOp::Or,
            operands,
        }
    }

    /// Creates a `not`.
    #[must_use]
    pub fn not(operand: Expr) -> Self {
        Expr::BooleanOp {
            op: LogicalOp::Not,
            operands: vec![operand],
        }
    }

    /// Creates a conditional.
    #[must_use]
    pub fn conditional(branches: Vec<(Expr, Expr)>, else_value: Expr) -> Self {
        Expr::Conditional {
            branches,
            else_value: Box::new(else_value),
        }
    }

    /// Returns the direct children of this node in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal { .. } | Expr::Column { .. } | Expr::CrossRef { .. } => vec![],
            Expr::FunctionCall { args, .. } => args.iter().collect(),
            Expr::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Comparison { left, right, .. } => {
                std::iter::once(left.as_ref()).chain(right.iter()).collect()
            }
            Expr::BooleanOp { operands, .. } => operands.iter().collect(),
            Expr::Conditional {
                branches,
                else_value,
            } => branches
                .iter()
                .flat_map(|(c, v)| [c, v])
                .chain(std::iter::once(else_value.as_ref()))
                .collect(),
            Expr::IsNull { operand, .. } => vec![operand.as_ref()],
        }
    }

    /// Rebuilds this node with each direct child replaced by `f(child)`.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map_children<E>(self, mut f: impl FnMut(Expr) -> Result<Expr, E>) -> Result<Expr, E> {
        let mapped = match self {
            leaf @ (Expr::Literal { .. } | Expr::Column { .. } | Expr::CrossRef { .. }) => leaf,
            Expr::FunctionCall { function, args } => Expr::FunctionCall {
                function,
                args: args.into_iter().map(&mut f).collect::<Result<_, E>>()?,
            },
            Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
                op,
                left: Box::new(f(*left)?),
                right: Box::new(f(*right)?),
            },
            Expr::Comparison { op, left, right } => Expr::Comparison {
                op,
                left: Box::new(f(*left)?),
                right: right.into_iter().map(&mut f).collect::<Result<_, E>>()?,
            },
            Expr::BooleanOp { op, operands } => Expr::BooleanOp {
                op,
                operands: operands.into_iter().map(&mut f).collect::<Result<_, E>>()?,
            },
            Expr::Conditional {
                branches,
                else_value,
            } => Expr::Conditional {
                branches: branches
                    .into_iter()
                    .map(|(c, v)| -> Result<(Expr, Expr), E> { Ok((f(c)?, f(v)?)) })
                    .collect::<Result<_, E>>()?,
                else_value: Box::new(f(*else_value)?),
            },
            Expr::IsNull { operand, negated } => Expr::IsNull {
                operand: Box::new(f(*operand)?),
                negated,
            },
        };
        Ok(mapped)
    }

    /// Visits every node in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Returns the names of all `@name` references, in order of appearance.
    #[must_use]
    pub fn cross_references(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.walk(&mut |e| {
            if let Expr::CrossRef { fragment_name } = e {
                names.push(fragment_name.as_str());
            }
        });
        names
    }

    /// Returns the names of all referenced columns, in order of appearance.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Column { name } = e {
                names.push(name.as_str());
            }
        });
        names
    }

    /// Returns true if any node is an aggregation function call.
    #[must_use]
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Expr::FunctionCall { function, .. } = e {
                found |= function.is_aggregate();
            }
        });
        found
    }
}

impl fmt::Display for Expr {
    /// Renders the expression back into grammar text that parses to the same tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value, .. } => write!(f, "{value}"),
            Expr::Column { name } => {
                if is_plain_identifier(name) {
                    f.write_str(name)
                } else {
                    write!(f, "[{name}]")
                }
            }
            Expr::CrossRef { fragment_name } => write!(f, "@{fragment_name}"),
            Expr::FunctionCall { function, args } => {
                if args.is_empty() {
                    return write!(f, "{function}(*)");
                }
                write!(f, "{function}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::BinaryOp { op, left, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
            Expr::Comparison { op, left, right } => match op {
                ComparisonOp::In | ComparisonOp::NotIn => {
                    write!(f, "({left} {} (", op.as_str())?;
                    write_list(f, right)?;
                    f.write_str("))")
                }
                ComparisonOp::Between => {
                    write!(f, "({left} between ")?;
                    write_list_with(f, right, " and ")?;
                    f.write_str(")")
                }
                _ => {
                    write!(f, "({left} {} ", op.as_str())?;
                    write_list(f, right)?;
                    f.write_str(")")
                }
            },
            Expr::BooleanOp { op, operands } => match op {
                LogicalOp::Not => {
                    f.write_str("(not ")?;
                    write_list(f, operands)?;
                    f.write_str(")")
                }
                LogicalOp::And | LogicalOp::Or => {
                    f.write_str("(")?;
                    write_list_with(f, operands, if *op == LogicalOp::And { " and " } else { " or " })?;
                    f.write_str(")")
                }
            },
            Expr::Conditional {
                branches,
                else_value,
            } => {
                f.write_str("if(")?;
                for (condition, value) in branches {
                    write!(f, "{condition}, {value}, ")?;
                }
                write!(f, "{else_value})")
            }
            Expr::IsNull { operand, negated } => {
                if *negated {
                    write!(f, "({operand} is not null)")
                } else {
                    write!(f, "({operand} is null)")
                }
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    write_list_with(f, items, ", ")
}

fn write_list_with(f: &mut fmt::Formatter<'_>, items: &[Expr], separator: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !super::lexer::is_reserved_word(name)
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    /// Returns the string representation of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Equal (=).
    Eq,
    /// Not equal (!=, <>).
    Ne,
    /// Greater than (>).
    Gt,
    /// Greater than or equal (>=).
    Gte,
    /// Less than (<).
    Lt,
    /// Less than or equal (<=).
    Lte,
    Like,
    ILike,
    In,
    NotIn,
    Between,
}

impl ComparisonOp {
    /// Returns the grammar spelling of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Like => "like",
            ComparisonOp::ILike => "ilike",
            ComparisonOp::In => "in",
            ComparisonOp::NotIn => "not in",
            ComparisonOp::Between => "between",
        }
    }

    /// Parses a symbolic comparison operator.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(ComparisonOp::Eq),
            "!=" | "<>" => Some(ComparisonOp::Ne),
            ">" => Some(ComparisonOp::Gt),
            ">=" => Some(ComparisonOp::Gte),
            "<" => Some(ComparisonOp::Lt),
            "<=" => Some(ComparisonOp::Lte),
            _ => None,
        }
    }

    /// Returns true for the list operators `in` and `not in`.
    #[must_use]
    pub fn takes_list(&self) -> bool {
        matches!(self, ComparisonOp::In | ComparisonOp::NotIn)
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// Date truncation units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateUnit {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl DateUnit {
    /// Returns the lowercase unit name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DateUnit::Day => "day",
            DateUnit::Week => "week",
            DateUnit::Month => "month",
            DateUnit::Quarter => "quarter",
            DateUnit::Year => "year",
        }
    }
}

/// Functions callable from field expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    CountDistinct,
    Median,
    /// `percentileN` for N in [`PERCENTILES`].
    Percentile(u8),
    Day,
    Week,
    Month,
    Quarter,
    Year,
    /// Whole years elapsed since the argument date.
    Age,
    Coalesce,
    /// `string(x)`
    ToString,
    /// `int(x)`
    ToInt,
}

impl Function {
    /// Looks up a function by its (case-insensitive) name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let function = match lower.as_str() {
            "sum" => Function::Sum,
            "avg" | "average" => Function::Avg,
            "min" => Function::Min,
            "max" => Function::Max,
            "count" => Function::Count,
            "count_distinct" => Function::CountDistinct,
            "median" => Function::Median,
            "day" => Function::Day,
            "week" => Function::Week,
            "month" => Function::Month,
            "quarter" => Function::Quarter,
            "year" => Function::Year,
            "age" => Function::Age,
            "coalesce" => Function::Coalesce,
            "string" => Function::ToString,
            "int" => Function::ToInt,
            other => {
                let n: u8 = other.strip_prefix("percentile")?.parse().ok()?;
                if !PERCENTILES.contains(&n) {
                    return None;
                }
                Function::Percentile(n)
            }
        };
        Some(function)
    }

    /// Returns the number of arguments the function takes.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Function::Coalesce => 2,
            _ => 1,
        }
    }

    /// Returns true for aggregation functions.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Function::Sum
                | Function::Avg
                | Function::Min
                | Function::Max
                | Function::Count
                | Function::CountDistinct
                | Function::Median
                | Function::Percentile(_)
        )
    }

    /// Returns the truncation unit for date-rounding functions.
    #[must_use]
    pub fn date_unit(&self) -> Option<DateUnit> {
        match self {
            Function::Day => Some(DateUnit::Day),
            Function::Week => Some(DateUnit::Week),
            Function::Month => Some(DateUnit::Month),
            Function::Quarter => Some(DateUnit::Quarter),
            Function::Year => Some(DateUnit::Year),
            _ => None,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Function::Sum => "sum",
            Function::Avg => "avg",
            Function::Min => "min",
            Function::Max => "max",
            Function::Count => "count",
            Function::CountDistinct => "count_distinct",
            Function::Median => "median",
            Function::Percentile(n) => return write!(f, "percentile{n}"),
            Function::Day => "day",
            Function::Week => "week",
            Function::Month => "month",
            Function::Quarter => "quarter",
            Function::Year => "year",
            Function::Age => "age",
            Function::Coalesce => "coalesce",
            Function::ToString => "string",
            Function::ToInt => "int",
        };
        f.write_str(name)
    }
}
