//! Compiler facade: text in, dialect fragment out.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::binder::{
    apply_context, resolve_references, BoundExpression, FieldContext, FragmentRegistry, ValidationOptions, Validator,
};
use crate::catalog::CatalogAdapter;
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::fragment::bucket::{build_buckets, expand_buckets, BucketSpec};
use crate::fragment::cache::{CacheKey, CompilationCache};
use crate::fragment::quickselect::{build_quickselects, QuickselectSet, QuickselectSpec};
use crate::lowering::{CompiledFragment, Dialect, Lowerer};
use crate::parser::{parse_condition, parse_expression, tokenize, AstBuilder, Expr, Token};

/// Compiles field expressions against a catalog for a dialect.
///
/// The compiler holds no per-call state; one instance can be shared across
/// threads. Each call runs tokenize, parse, build, resolve, validate, apply
/// context rules and lower, stopping at the first error. Errors carry the
/// text of the expression that failed.
///
/// # Example
///
/// ```
/// use fieldc::{Catalog, ColumnDef, Compiler, EmptyRegistry, FieldContext, ResolvedType};
/// use fieldc::lowering::{Postgres, SqlDialect};
///
/// let catalog = Catalog::with_columns(
///     "postgresql",
///     vec![
///         ColumnDef::new("revenue", ResolvedType::Number).unwrap(),
///         ColumnDef::new("expenses", ResolvedType::Number).unwrap(),
///     ],
/// )
/// .unwrap();
/// let compiler = Compiler::default();
/// let fragment = compiler
///     .compile(
///         "revenue - expenses",
///         FieldContext::Metric,
///         &catalog,
///         &SqlDialect::new(Postgres),
///         &EmptyRegistry,
///     )
///     .unwrap();
/// assert_eq!(fragment.sql_fragment.as_str(), r#"(SUM("revenue") - SUM("expenses"))"#);
/// assert!(fragment.is_aggregate);
/// ```
#[derive(Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
    cache: Option<CompilationCache>,
}

impl Compiler {
    /// Creates a compiler. The cache is created if the config enables it.
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        let cache = config.cache_enabled.then(CompilationCache::new);
        Compiler { config, cache }
    }

    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Returns the compilation cache, if enabled.
    #[must_use]
    pub fn cache(&self) -> Option<&CompilationCache> {
        self.cache.as_ref()
    }

    /// Compiles expression text in a field context.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any stage, carrying `text`.
    pub fn compile<D: Dialect + ?Sized>(
        &self,
        text: &str,
        context: FieldContext,
        catalog: &dyn CatalogAdapter,
        dialect: &D,
        registry: &dyn FragmentRegistry,
    ) -> Result<CompiledFragment<D::Handle>> {
        debug!(expression = text, context = context.name(), dialect = dialect.id(), "compiling field expression");
        let today = self.config.reference_date();
        let cached = self.cache.as_ref().and_then(|cache| {
            let registry_version = if has_cross_reference(text) {
                Some(registry.version()?)
            } else {
                None
            };
            let key = CacheKey {
                text: text.to_string(),
                context,
                dialect_id: dialect.id().to_string(),
                catalog_version: catalog.version(),
                catalog_lineage: catalog.lineage(),
                registry_version,
                today,
            };
            Some((cache, key))
        });
        let bound = match cached {
            Some((cache, key)) => {
                cache.get_or_compile(key, || self.bind_text(text, context, catalog, registry, today))?
            }
            None => Arc::new(self.bind_text(text, context, catalog, registry, today)?),
        };
        self.lower(&bound, context, dialect).map_err(|e| e.with_expression(text))
    }

    /// Binds expression text without lowering it.
    ///
    /// # Errors
    ///
    /// Returns the first parse, resolution, validation or context error,
    /// carrying `text`.
    pub fn bind(
        &self,
        text: &str,
        context: FieldContext,
        catalog: &dyn CatalogAdapter,
        registry: &dyn FragmentRegistry,
    ) -> Result<BoundExpression> {
        self.bind_text(text, context, catalog, registry, self.config.reference_date())
    }

    /// Compiles a bucket or quickselect condition. A partial condition
    /// (`> 1000`) takes `field` as its left-hand side.
    ///
    /// # Errors
    ///
    /// Returns the first error, carrying the text of the condition (or of
    /// the field, if the field itself does not parse).
    pub fn compile_condition<D: Dialect + ?Sized>(
        &self,
        condition: &str,
        field: &str,
        catalog: &dyn CatalogAdapter,
        dialect: &D,
        registry: &dyn FragmentRegistry,
    ) -> Result<CompiledFragment<D::Handle>> {
        debug!(condition, field, dialect = dialect.id(), "compiling condition");
        let today = self.config.reference_date();
        let builder = AstBuilder::new(today);
        let field = parse_field(field, &builder)?;
        let bound = parse_condition(condition, &field, &builder)
            .and_then(|expr| self.bind_expr(expr, FieldContext::Condition, catalog, registry, today))
            .map_err(|e| e.with_expression(condition))?;
        self.lower(&bound, FieldContext::Condition, dialect)
            .map_err(|e| e.with_expression(condition))
    }

    /// Compiles a bucketed dimension into the label conditional, with the
    /// order conditional as the fragment's `default_order_fragment`.
    ///
    /// # Errors
    ///
    /// Returns the first error. Errors in a bucket condition carry that
    /// condition's text; errors in the combined expression carry `field`.
    pub fn compile_buckets<D: Dialect + ?Sized>(
        &self,
        buckets: &[BucketSpec],
        field: &str,
        default_label: Option<&str>,
        catalog: &dyn CatalogAdapter,
        dialect: &D,
        registry: &dyn FragmentRegistry,
    ) -> Result<CompiledFragment<D::Handle>> {
        debug!(field, buckets = buckets.len(), dialect = dialect.id(), "compiling buckets");
        let today = self.config.reference_date();
        let builder = AstBuilder::new(today);
        let field_expr = parse_field(field, &builder)?;
        let parsed = build_buckets(buckets, &field_expr, &builder)?;
        for (bucket, spec) in parsed.iter().zip(buckets) {
            self.bind_expr(bucket.condition.clone(), FieldContext::Condition, catalog, registry, today)
                .map_err(|e| e.with_expression(&spec.condition))?;
        }

        let label = default_label.unwrap_or(&self.config.bucket_default_label);
        let expansion = expand_buckets(parsed, label, self.config.bucket_order_sentinel)?;
        let bind = |expr: Expr| {
            self.bind_expr(expr, FieldContext::Dimension, catalog, registry, today)
                .map_err(|e| e.with_expression(field))
        };
        let value = bind(expansion.value)?;
        let order = bind(expansion.order)?;

        let mut fragment = self
            .lower(&value, FieldContext::Dimension, dialect)
            .map_err(|e| e.with_expression(field))?;
        let order = self
            .lower(&order, FieldContext::Dimension, dialect)
            .map_err(|e| e.with_expression(field))?;
        fragment.default_order_fragment = Some(order.sql_fragment);
        Ok(fragment)
    }

    /// Compiles each quickselect condition independently.
    ///
    /// # Errors
    ///
    /// Returns the first error, carrying the failing condition's text.
    pub fn compile_quickselects<D: Dialect + ?Sized>(
        &self,
        quickselects: &[QuickselectSpec],
        field: &str,
        catalog: &dyn CatalogAdapter,
        dialect: &D,
        registry: &dyn FragmentRegistry,
    ) -> Result<QuickselectSet<D::Handle>> {
        let today = self.config.reference_date();
        let builder = AstBuilder::new(today);
        let field_expr = parse_field(field, &builder)?;
        let parsed = build_quickselects(quickselects, &field_expr, &builder)?;

        let mut entries = Vec::with_capacity(parsed.len());
        for ((label, condition), spec) in parsed.into_iter().zip(quickselects) {
            let fragment = self
                .bind_expr(condition, FieldContext::Condition, catalog, registry, today)
                .and_then(|bound| self.lower(&bound, FieldContext::Condition, dialect))
                .map_err(|e| e.with_expression(&spec.condition))?;
            entries.push((label, fragment));
        }
        Ok(QuickselectSet::new(entries))
    }

    fn bind_text(
        &self,
        text: &str,
        context: FieldContext,
        catalog: &dyn CatalogAdapter,
        registry: &dyn FragmentRegistry,
        today: NaiveDate,
    ) -> Result<BoundExpression> {
        parse_expression(text, &AstBuilder::new(today))
            .and_then(|expr| self.bind_expr(expr, context, catalog, registry, today))
            .map_err(|e| e.with_expression(text))
    }

    fn bind_expr(
        &self,
        expr: Expr,
        context: FieldContext,
        catalog: &dyn CatalogAdapter,
        registry: &dyn FragmentRegistry,
        today: NaiveDate,
    ) -> Result<BoundExpression> {
        let resolved = resolve_references(expr, registry)?;
        let options = ValidationOptions {
            today,
            ..ValidationOptions::from_config(&self.config)
        };
        let bound = Validator::new(catalog, options).validate(&resolved)?;
        apply_context(bound, context)
    }

    fn lower<D: Dialect + ?Sized>(
        &self,
        bound: &BoundExpression,
        context: FieldContext,
        dialect: &D,
    ) -> Result<CompiledFragment<D::Handle>> {
        Lowerer::new(dialect)
            .with_epsilon(self.config.safe_division_epsilon)
            .with_predicate_root(context.expects_predicate())
            .lower_fragment(bound)
    }
}

fn has_cross_reference(text: &str) -> bool {
    tokenize(text).iter().any(Token::is_cross_reference)
}

fn parse_field(field: &str, builder: &AstBuilder) -> Result<Expr> {
    parse_expression(field, builder).map_err(|e| e.with_expression(field))
}
