//! Unit tests for fieldc.

use chrono::NaiveDate;
use fieldc::lowering::{BigQuery, MsSql, Postgres, Redshift, Sqlite};
use fieldc::parser::{tokenize, AstBuilder, ArithmeticOp, ComparisonOp, Function, TokenKind};
use fieldc::{
    dialect_for_driver, parse_expression, Catalog, CatalogAdapter, ColumnDef, CompilerConfig, Dialect, Expr,
    Feature, FieldContext, FieldcError, ResolvedType, SqlDialect, SqlFragment, Value,
};

fn builder() -> AstBuilder {
    AstBuilder::new(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
}

// =============================================================================
// Error Tests
// =============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = FieldcError::SyntaxError {
            expression: "sum(a".into(),
            position: 5,
            expected: "')'".into(),
            found: "end of input".into(),
        };
        let message = err.to_string();
        assert!(message.contains("sum(a"));
        assert!(message.contains("position 5"));
        assert!(message.contains("end of input"));
    }

    #[test]
    fn test_unknown_column_display() {
        let err = FieldcError::UnknownColumn {
            expression: "a + b".into(),
            column: "b".into(),
            position: Some(4),
        };
        assert_eq!(err.to_string(), "Unknown column 'b' in 'a + b' at position 4");

        let err = FieldcError::UnknownColumn {
            expression: "a + b".into(),
            column: "b".into(),
            position: None,
        };
        assert_eq!(err.to_string(), "Unknown column 'b' in 'a + b'");
    }

    #[test]
    fn test_cyclic_reference_display() {
        let err = FieldcError::CyclicReference {
            expression: "@a".into(),
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_unsupported_feature_display() {
        let err = FieldcError::UnsupportedFeature {
            expression: "median(x)".into(),
            feature: "median".into(),
            dialect: "sqlite".into(),
        };
        assert!(err.to_string().contains("median is not supported on sqlite"));
    }

    #[test]
    fn test_with_expression_fills_once() {
        let err = FieldcError::UnknownColumn {
            expression: String::new(),
            column: "nope".into(),
            position: None,
        }
        .with_expression("sales + nope");
        assert_eq!(err.expression(), Some("sales + nope"));
        assert!(matches!(err, FieldcError::UnknownColumn { position: Some(8), .. }));

        let outer = err.clone().with_expression("@other");
        assert_eq!(outer, err);
    }

    #[test]
    fn test_definition_errors_have_no_expression() {
        let err = FieldcError::InvalidDefinition("no buckets".into()).with_expression("x");
        assert_eq!(err.expression(), None);
        assert!(err.to_string().contains("Invalid definition"));
    }
}

// =============================================================================
// Type Tests
// =============================================================================

mod types_tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Integer(1).resolved_type(), ResolvedType::Number);
        assert_eq!(Value::Float(1.5).resolved_type(), ResolvedType::Number);
        assert_eq!(Value::String("a".into()).resolved_type(), ResolvedType::String);
        assert_eq!(Value::Bool(true).resolved_type(), ResolvedType::Boolean);
        assert_eq!(Value::Null.resolved_type(), ResolvedType::Unknown);
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_comparable_types() {
        assert!(ResolvedType::Date.is_comparable_with(ResolvedType::Datetime));
        assert!(ResolvedType::Number.is_comparable_with(ResolvedType::Unknown));
        assert!(!ResolvedType::Number.is_comparable_with(ResolvedType::String));
    }

    #[test]
    fn test_value_display_parses_back() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Value::Date(date).to_string(), "date(\"2024-02-29\")");
        assert_eq!(Value::String("say \"hi\"".into()).to_string(), "\"say \\\"hi\\\"\"");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let config = CompilerConfig::new()
            .with_safe_division_epsilon(0.5)
            .with_bucket_default_label("Other")
            .with_bucket_order_sentinel(100)
            .with_strict_list_homogeneity(true)
            .with_like_auto_wildcard(false)
            .with_cache_enabled(false)
            .with_today(today);
        assert!((config.safe_division_epsilon - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.bucket_default_label, "Other");
        assert_eq!(config.bucket_order_sentinel, 100);
        assert!(config.strict_list_homogeneity);
        assert!(!config.like_auto_wildcard);
        assert!(!config.cache_enabled);
        assert_eq!(config.reference_date(), today);
    }

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.bucket_default_label, "Not found");
        assert_eq!(config.bucket_order_sentinel, 9999);
        assert!(config.like_auto_wildcard);
        assert!(config.cache_enabled);
        assert!(config.today.is_none());
    }
}

// =============================================================================
// Catalog Tests
// =============================================================================

mod catalog_tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::with_columns(
            "redshift",
            vec![
                ColumnDef::new("Sales", ResolvedType::Number).unwrap(),
                ColumnDef::new("state", ResolvedType::String).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.column_type("SALES"), Some(ResolvedType::Number));
        assert_eq!(catalog.canonical_name("sales").as_deref(), Some("Sales"));
        assert!(!catalog.has_column("profit"));
        assert_eq!(catalog.dialect_id(), "redshift");
    }

    #[test]
    fn test_invalid_columns() {
        assert!(ColumnDef::new("  ", ResolvedType::Number).is_err());
        assert!(ColumnDef::new("x", ResolvedType::Unknown).is_err());
        let mut catalog = catalog();
        let err = catalog
            .add_column(ColumnDef::new("SALES", ResolvedType::Number).unwrap())
            .unwrap_err();
        assert!(matches!(err, FieldcError::CatalogError(_)));
    }

    #[test]
    fn test_snapshot_preserves_version() {
        let catalog = catalog();
        let bytes = catalog.serialize().unwrap();
        let restored = Catalog::deserialize(&bytes).unwrap();
        assert_eq!(restored.version(), catalog.version());
        assert_eq!(restored.columns().count(), 2);
        assert!(Catalog::deserialize(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_version_changes_with_schema() {
        let mut catalog = catalog();
        let before = catalog.version();
        catalog
            .add_column(ColumnDef::new("region", ResolvedType::String).unwrap())
            .unwrap();
        assert_ne!(catalog.version(), before);
        catalog.remove_column("REGION");
        assert_eq!(catalog.version(), before);
    }
}

// =============================================================================
// Lexer Tests
// =============================================================================

mod lexer_tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_function_keyword_only_before_paren() {
        assert_eq!(
            kinds("month(d) + month"),
            vec![
                TokenKind::Keyword,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions_are_char_offsets() {
        let tokens = tokenize("\"é\" = x");
        assert_eq!(tokens[1].position, 4);
        assert_eq!(tokens[2].position, 6);
    }

    #[test]
    fn test_literals_and_references() {
        let tokens = tokenize(r#"@profit > 1.5e3 and d = date("2024-01-01")"#);
        assert!(tokens[0].is_cross_reference());
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[3].kind, TokenKind::Operator);
        assert_eq!(tokens[6].kind, TokenKind::DateLiteral);
    }

    #[test]
    fn test_invalid_input_never_fails() {
        let tokens = tokenize("a $ \"open");
        assert_eq!(tokens[1].kind, TokenKind::Invalid);
        assert_eq!(tokens[2].kind, TokenKind::Invalid);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }
}

// =============================================================================
// Parser Tests
// =============================================================================

mod parser_tests {
    use super::*;

    #[test]
    fn test_parse_function_call() {
        let expr = parse_expression("sum(sales)", &builder()).unwrap();
        assert_eq!(expr, Expr::call(Function::Sum, vec![Expr::column("sales")]));
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("a - b * c", &builder()).unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                ArithmeticOp::Sub,
                Expr::column("a"),
                Expr::binary(ArithmeticOp::Mul, Expr::column("b"), Expr::column("c"))
            )
        );
    }

    #[test]
    fn test_parse_bracketed_column() {
        let expr = parse_expression(r#"[first name] = "Ann""#, &builder()).unwrap();
        assert_eq!(
            expr,
            Expr::compare(ComparisonOp::Eq, Expr::column("first name"), vec![Expr::string("Ann")])
        );
    }

    #[test]
    fn test_parse_collects_references() {
        let expr = parse_expression("@revenue - @expenses + tax", &builder()).unwrap();
        assert_eq!(expr.cross_references(), vec!["revenue", "expenses"]);
        assert_eq!(expr.columns(), vec!["tax"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_expression("", &builder()),
            Err(FieldcError::SyntaxError { position: 0, .. })
        ));
        assert!(matches!(
            parse_expression("a +", &builder()),
            Err(FieldcError::SyntaxError { position: 3, .. })
        ));
        assert!(matches!(
            parse_expression("percentile30(x)", &builder()),
            Err(FieldcError::SyntaxError { .. })
        ));
    }
}

// =============================================================================
// Dialect Tests
// =============================================================================

mod dialect_tests {
    use super::*;

    #[test]
    fn test_driver_names() {
        assert_eq!(dialect_for_driver("postgresql+psycopg2").id(), "postgresql");
        assert_eq!(dialect_for_driver("Redshift").id(), "redshift");
        assert_eq!(dialect_for_driver("bigquery").id(), "bigquery");
        assert_eq!(dialect_for_driver("sqlite").id(), "sqlite");
        assert_eq!(dialect_for_driver("mssql+pyodbc").id(), "mssql");
        assert_eq!(dialect_for_driver("duckdb").id(), "postgresql");
    }

    #[test]
    fn test_feature_support_matrix() {
        assert!(SqlDialect::new(Postgres).supports(Feature::Median));
        assert!(SqlDialect::new(Redshift).supports(Feature::Percentile(90)));
        assert!(SqlDialect::new(BigQuery).supports(Feature::Age));
        assert!(!SqlDialect::new(Sqlite).supports(Feature::Median));
        assert!(!SqlDialect::new(MsSql).supports(Feature::Percentile(25)));
    }

    #[test]
    fn test_identifier_quoting() {
        let column = |d: &dyn Dialect<Handle = SqlFragment>| d.emit_column("state").map(SqlFragment::into_string);
        assert_eq!(column(&SqlDialect::new(Postgres)).unwrap(), "\"state\"");
        assert_eq!(column(&SqlDialect::new(BigQuery)).unwrap(), "`state`");
        assert_eq!(column(&SqlDialect::new(MsSql)).unwrap(), "[state]");
    }

    #[test]
    fn test_literal_rendering() {
        let pg = SqlDialect::new(Postgres);
        assert_eq!(pg.emit_literal(&Value::Bool(true)).unwrap().as_str(), "TRUE");
        assert_eq!(pg.emit_literal(&Value::String("it's".into())).unwrap().as_str(), "'it''s'");
        assert!(pg.emit_literal(&Value::Float(f64::NAN)).is_err());

        let sqlite = SqlDialect::new(Sqlite);
        assert_eq!(sqlite.emit_literal(&Value::Bool(false)).unwrap().as_str(), "0");
    }

    #[test]
    fn test_fragment_display() {
        let fragment = SqlFragment::new("COUNT(*)");
        assert_eq!(fragment.to_string(), "COUNT(*)");
        assert_eq!(fragment.as_str(), "COUNT(*)");
    }

    #[test]
    fn test_context_names() {
        assert_eq!(FieldContext::Metric.name(), "metric");
        assert_eq!(FieldContext::Having.name(), "having");
    }
}
