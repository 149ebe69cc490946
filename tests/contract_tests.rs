//! Contract tests: what compiled fragments mean, checked by evaluating them
//! against rows and by comparing equivalent source texts.

#[path = "compiler_contracts/mod.rs"]
mod compiler_contracts;

use chrono::{Datelike, NaiveDate};
use compiler_contracts::row_dialect::{row, Datum, Eval, RowDialect};
use compiler_contracts::{compiler, numeric_catalog};
use fieldc::parser::{is_reserved_word, ComparisonOp};
use fieldc::{
    BoundExpression, BucketSpec, Catalog, ColumnDef, Compiler, CompilerConfig, EmptyRegistry, FieldContext,
    ResolvedType, SqlDialect, Value,
};
use fieldc::lowering::Postgres;
use proptest::prelude::*;

fn evaluator(text: &str, context: FieldContext, columns: &[&str]) -> Eval {
    compiler()
        .compile(text, context, &numeric_catalog(columns), &RowDialect, &EmptyRegistry)
        .unwrap()
        .sql_fragment
}

fn postgres(text: &str, context: FieldContext, columns: &[&str]) -> String {
    compiler()
        .compile(text, context, &numeric_catalog(columns), &SqlDialect::new(Postgres), &EmptyRegistry)
        .unwrap()
        .sql_fragment
        .into_string()
}

fn column_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("reserved words are not column names", |name| !is_reserved_word(name))
}

fn two_columns() -> impl Strategy<Value = (String, String)> {
    (column_name(), column_name()).prop_filter("columns must differ", |(a, b)| a != b)
}

// =============================================================================
// Safe Division Contracts
// =============================================================================

mod division_contracts {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_division_is_guarded(
            a in -1.0e6f64..1.0e6,
            b in prop_oneof![Just(None), Just(Some(0.0)), (1.0f64..1.0e3).prop_map(Some), (-1.0e3f64..-1.0).prop_map(Some)],
        ) {
            let division = evaluator("a / b", FieldContext::Dimension, &["a", "b"]);
            let result = division.eval(&row(&[("a", Some(a)), ("b", b)]));
            prop_assert!(matches!(result, Datum::Number(v) if v.is_finite()));
            prop_assert_eq!(result, Datum::Number(a / (b.unwrap_or(0.0) + 1e-9)));
        }

        #[test]
        fn prop_literal_zero_denominator(a in -1.0e6f64..1.0e6) {
            let division = evaluator("a / 0", FieldContext::Dimension, &["a"]);
            prop_assert_eq!(division.eval(&row(&[("a", Some(a))])), Datum::Number(a / 1e-9));
        }
    }

    #[test]
    fn test_null_numerator_stays_null() {
        let division = evaluator("a / b", FieldContext::Dimension, &["a", "b"]);
        assert_eq!(division.eval(&row(&[("a", None), ("b", Some(2.0))])), Datum::Null);
    }
}

// =============================================================================
// Condition Contracts
// =============================================================================

mod condition_contracts {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_not_in_is_negated_in(
            x in proptest::option::of(0i32..10),
            list in prop::collection::vec(0i32..10, 1..5),
        ) {
            let items = list.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            let not_in = evaluator(&format!("x not in ({items})"), FieldContext::Filter, &["x"]);
            let negated = evaluator(&format!("not (x in ({items}))"), FieldContext::Filter, &["x"]);

            let r = row(&[("x", x.map(f64::from))]);
            let expected = x.map_or(Datum::Null, |v| Datum::Bool(!list.contains(&v)));
            prop_assert_eq!(not_in.eval(&r), negated.eval(&r));
            prop_assert_eq!(not_in.eval(&r), expected);
        }

        #[test]
        fn prop_de_morgan_forms_agree(x in proptest::option::of(-2000i32..2000)) {
            let direct = evaluator("x > 100 and x < 1000", FieldContext::Filter, &["x"]);
            let negated = evaluator("not (x <= 100 or x >= 1000)", FieldContext::Filter, &["x"]);
            let r = row(&[("x", x.map(f64::from))]);
            prop_assert_eq!(direct.eval(&r), negated.eval(&r));
        }

        #[test]
        fn prop_between_is_inclusive(x in -50i32..50, low in -20i32..0, high in 0i32..20) {
            let between = evaluator(&format!("x between {low} and {high}"), FieldContext::Filter, &["x"]);
            let r = row(&[("x", Some(f64::from(x)))]);
            prop_assert_eq!(between.eval(&r), Datum::Bool(low <= x && x <= high));
        }
    }

    #[test]
    fn test_first_true_branch_wins() {
        let sign = evaluator(
            r#"if(x > 0, "positive", x < 0, "negative", "zero")"#,
            FieldContext::Dimension,
            &["x"],
        );
        let label = |x: Option<f64>| sign.eval(&row(&[("x", x)]));
        assert_eq!(label(Some(3.0)), Datum::Text("positive".into()));
        assert_eq!(label(Some(-3.0)), Datum::Text("negative".into()));
        assert_eq!(label(Some(0.0)), Datum::Text("zero".into()));
        assert_eq!(label(None), Datum::Text("zero".into()));
    }

    #[test]
    fn test_null_checks() {
        let is_null = evaluator("x is null", FieldContext::Filter, &["x"]);
        let equals_null = evaluator("x = null", FieldContext::Filter, &["x"]);
        for x in [None, Some(1.0)] {
            let r = row(&[("x", x)]);
            assert_eq!(is_null.eval(&r), Datum::Bool(x.is_none()));
            assert_eq!(equals_null.eval(&r), is_null.eval(&r));
        }
    }
}

// =============================================================================
// Bucket Contracts
// =============================================================================

mod bucket_contracts {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_first_matching_bucket_wins(
            value in -30i32..30,
            thresholds in prop::collection::vec(-20i32..20, 1..5),
        ) {
            let specs: Vec<BucketSpec> = thresholds
                .iter()
                .enumerate()
                .map(|(i, t)| BucketSpec::new(format!("b{i}"), format!("<{t}")))
                .collect();
            let fragment = compiler()
                .compile_buckets(&specs, "x", None, &numeric_catalog(&["x"]), &RowDialect, &EmptyRegistry)
                .unwrap();
            let order = fragment.default_order_fragment.clone().unwrap();

            let r = row(&[("x", Some(f64::from(value)))]);
            let first = thresholds.iter().position(|t| value < *t);
            let expected_label = first.map_or_else(|| "Not found".to_string(), |i| format!("b{i}"));
            #[allow(clippy::cast_precision_loss)]
            let expected_order = first.map_or(9999.0, |i| i as f64);

            prop_assert_eq!(fragment.sql_fragment.eval(&r), Datum::Text(expected_label));
            prop_assert_eq!(order.eval(&r), Datum::Number(expected_order));
        }
    }
}

// =============================================================================
// Aggregation Contracts
// =============================================================================

mod aggregation_contracts {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_metric_column_defaults_to_sum(name in column_name()) {
            prop_assert_eq!(
                postgres(&name, FieldContext::Metric, &[name.as_str()]),
                postgres(&format!("sum({name})"), FieldContext::Metric, &[name.as_str()])
            );
        }

        #[test]
        fn prop_metric_sum_distributes_over_additive_chain((a, b) in two_columns()) {
            for op in ["+", "-"] {
                prop_assert_eq!(
                    postgres(&format!("{a} {op} {b}"), FieldContext::Metric, &[a.as_str(), b.as_str()]),
                    postgres(&format!("sum({a}) {op} sum({b})"), FieldContext::Metric, &[a.as_str(), b.as_str()])
                );
            }
        }

        #[test]
        fn prop_arithmetic_renders_parenthesized((a, b) in two_columns()) {
            for op in ["+", "-", "*"] {
                prop_assert_eq!(
                    postgres(&format!("{a} {op} {b}"), FieldContext::Dimension, &[a.as_str(), b.as_str()]),
                    format!("(\"{a}\" {op} \"{b}\")")
                );
            }
        }
    }
}

// =============================================================================
// Relative Date Contracts
// =============================================================================

mod relative_date_contracts {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_last_month_is_previous_calendar_month(year in 2000i32..2030, month in 1u32..=12, day in 1u32..=28) {
            let today = NaiveDate::from_ymd_opt(year, month, day).unwrap();
            let compiler = Compiler::new(CompilerConfig::new().with_today(today));
            let catalog = Catalog::with_columns("postgresql", vec![ColumnDef::new("d", ResolvedType::Date).unwrap()])
                .unwrap();
            let bound = compiler
                .bind("d is last month", FieldContext::Filter, &catalog, &EmptyRegistry)
                .unwrap();

            let end = today.with_day(1).unwrap().pred_opt().unwrap();
            let start = end.with_day(1).unwrap();
            let BoundExpression::Comparison { op, right, .. } = bound else {
                panic!("relative range should bind to a comparison");
            };
            prop_assert_eq!(op, ComparisonOp::Between);
            prop_assert_eq!(
                right,
                vec![
                    BoundExpression::literal(Value::Date(start)),
                    BoundExpression::literal(Value::Date(end)),
                ]
            );
        }
    }
}
