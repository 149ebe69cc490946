//! Bucket expansion for dimensions.
//!
//! A bucketed dimension is a list of labeled conditions over the dimension's
//! field. The list becomes two `if` chains: one yielding the label of the
//! first matching bucket, and one yielding its position for ordering.

use serde::{Deserialize, Serialize};

use crate::error::{FieldcError, Result};
use crate::parser::{parse_condition, AstBuilder, Expr};

/// A labeled bucket condition as written by the user.
///
/// The condition may be partial (`< 18`), in which case the dimension's
/// field is its left-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub label: String,
    pub condition: String,
}

impl BucketSpec {
    #[must_use]
    pub fn new(label: impl Into<String>, condition: impl Into<String>) -> Self {
        BucketSpec {
            label: label.into(),
            condition: condition.into(),
        }
    }
}

/// A parsed bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub label: String,
    pub condition: Expr,
    /// Definition position, used as the sort key.
    pub order: i64,
}

/// The two expressions a bucket list expands into.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketExpansion {
    pub buckets: Vec<Bucket>,
    /// Label of the first matching bucket, else the default label.
    pub value: Expr,
    /// Position of the first matching bucket, else the sentinel.
    pub order: Expr,
}

/// Parses bucket conditions, completing partial ones with `field`.
///
/// # Errors
///
/// Returns `InvalidDefinition` for an empty list, or the parse error of the
/// first bad condition (carrying that condition's text).
pub fn build_buckets(specs: &[BucketSpec], field: &Expr, builder: &AstBuilder) -> Result<Vec<Bucket>> {
    if specs.is_empty() {
        return Err(FieldcError::InvalidDefinition(
            "a bucketed dimension needs at least one bucket".to_string(),
        ));
    }
    specs
        .iter()
        .zip(0_i64..)
        .map(|(spec, order)| {
            let condition = parse_condition(&spec.condition, field, builder)
                .map_err(|e| e.with_expression(&spec.condition))?;
            Ok(Bucket {
                label: spec.label.clone(),
                condition,
                order,
            })
        })
        .collect()
}

/// Expands buckets into the label and order conditionals.
///
/// # Errors
///
/// Returns `InvalidDefinition` if `buckets` is empty.
pub fn expand_buckets(buckets: Vec<Bucket>, default_label: &str, order_sentinel: i64) -> Result<BucketExpansion> {
    if buckets.is_empty() {
        return Err(FieldcError::InvalidDefinition(
            "a bucketed dimension needs at least one bucket".to_string(),
        ));
    }
    let value = Expr::conditional(
        buckets
            .iter()
            .map(|b| (b.condition.clone(), Expr::string(b.label.clone())))
            .collect(),
        Expr::string(default_label),
    );
    let order = Expr::conditional(
        buckets
            .iter()
            .map(|b| (b.condition.clone(), Expr::int(b.order)))
            .collect(),
        Expr::int(order_sentinel),
    );
    Ok(BucketExpansion { buckets, value, order })
}
