//! Value and `ResolvedType` definitions for field expressions.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// The primitive types an expression node can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolvedType {
    /// Integer or floating point.
    Number,
    /// UTF-8 string.
    String,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Date with a time component.
    Datetime,
    /// Not yet known (untyped `null` before unification).
    Unknown,
}

impl ResolvedType {
    /// Returns the name of the type as used in error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ResolvedType::Number => "number",
            ResolvedType::String => "string",
            ResolvedType::Boolean => "boolean",
            ResolvedType::Date => "date",
            ResolvedType::Datetime => "datetime",
            ResolvedType::Unknown => "unknown",
        }
    }

    /// Returns whether this type is a date or datetime.
    #[must_use]
    pub fn is_temporal(&self) -> bool {
        matches!(self, ResolvedType::Date | ResolvedType::Datetime)
    }

    /// Returns whether values of the two types may be compared with each other.
    ///
    /// Dates and datetimes compare freely; `Unknown` (a bare `null`) is
    /// compatible with everything.
    #[must_use]
    pub fn is_comparable_with(&self, other: ResolvedType) -> bool {
        match (self, other) {
            (ResolvedType::Unknown, _) | (_, ResolvedType::Unknown) => true,
            (a, b) if a.is_temporal() && b.is_temporal() => true,
            (a, b) => *a == b,
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A literal value appearing in an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer literal.
    Integer(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// String literal (unescaped).
    String(String),
    /// Boolean literal.
    Bool(bool),
    /// Date literal.
    Date(NaiveDate),
    /// Datetime literal.
    Datetime(NaiveDateTime),
    /// The `null` literal.
    Null,
}

impl Value {
    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to extract a numeric value as f64.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the resolved type of this value; `Unknown` for null.
    #[must_use]
    pub fn resolved_type(&self) -> ResolvedType {
        match self {
            Value::Integer(_) | Value::Float(_) => ResolvedType::Number,
            Value::String(_) => ResolvedType::String,
            Value::Bool(_) => ResolvedType::Boolean,
            Value::Date(_) => ResolvedType::Date,
            Value::Datetime(_) => ResolvedType::Datetime,
            Value::Null => ResolvedType::Unknown,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "date(\"{}\")", d.format("%Y-%m-%d")),
            Value::Datetime(dt) => write!(f, "date(\"{}\")", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Null => f.write_str("null"),
        }
    }
}
