//! In-memory fragment registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::binder::{FieldContext, FragmentRegistry};
use crate::catalog::CatalogAdapter;
use crate::compiler::Compiler;
use crate::config::CompilerConfig;
use crate::error::{FieldcError, Result};
use crate::fragment::bucket::{build_buckets, expand_buckets, BucketSpec};
use crate::fragment::quickselect::{QuickselectSet, QuickselectSpec};
use crate::lowering::{CompiledFragment, Dialect};
use crate::parser::{parse_expression, AstBuilder, Expr};

/// Role of a named fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Metric,
    Dimension,
    Filter,
    Having,
}

impl FragmentKind {
    /// Returns the field context fragments of this kind compile in.
    #[must_use]
    pub fn context(self) -> FieldContext {
        match self {
            FragmentKind::Metric => FieldContext::Metric,
            FragmentKind::Dimension => FieldContext::Dimension,
            FragmentKind::Filter => FieldContext::Filter,
            FragmentKind::Having => FieldContext::Having,
        }
    }
}

/// A named fragment as written in user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDefinition {
    pub kind: FragmentKind,
    pub field: String,
    #[serde(default)]
    pub buckets: Vec<BucketSpec>,
    #[serde(default)]
    pub buckets_default_label: Option<String>,
    #[serde(default)]
    pub quickselects: Vec<QuickselectSpec>,
}

impl FragmentDefinition {
    #[must_use]
    pub fn new(kind: FragmentKind, field: impl Into<String>) -> Self {
        FragmentDefinition {
            kind,
            field: field.into(),
            buckets: Vec::new(),
            buckets_default_label: None,
            quickselects: Vec::new(),
        }
    }

    #[must_use]
    pub fn metric(field: impl Into<String>) -> Self {
        Self::new(FragmentKind::Metric, field)
    }

    #[must_use]
    pub fn dimension(field: impl Into<String>) -> Self {
        Self::new(FragmentKind::Dimension, field)
    }

    #[must_use]
    pub fn filter(field: impl Into<String>) -> Self {
        Self::new(FragmentKind::Filter, field)
    }

    #[must_use]
    pub fn having(field: impl Into<String>) -> Self {
        Self::new(FragmentKind::Having, field)
    }

    #[must_use]
    pub fn with_buckets(mut self, buckets: Vec<BucketSpec>) -> Self {
        self.buckets = buckets;
        self
    }

    #[must_use]
    pub fn with_buckets_default_label(mut self, label: impl Into<String>) -> Self {
        self.buckets_default_label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_quickselects(mut self, quickselects: Vec<QuickselectSpec>) -> Self {
        self.quickselects = quickselects;
        self
    }

    /// Returns true for a dimension compiled through buckets.
    #[must_use]
    pub fn is_bucketed(&self) -> bool {
        self.kind == FragmentKind::Dimension && !self.buckets.is_empty()
    }
}

/// Result of compiling one shelf entry.
#[derive(Debug, Clone)]
pub enum ShelfEntry<H> {
    Valid {
        name: String,
        kind: FragmentKind,
        fragment: CompiledFragment<H>,
        quickselects: QuickselectSet<H>,
    },
    /// Placeholder for a definition that failed to compile.
    Invalid { name: String, error: FieldcError },
}

impl<H> ShelfEntry<H> {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ShelfEntry::Valid { name, .. } | ShelfEntry::Invalid { name, .. } => name,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, ShelfEntry::Valid { .. })
    }

    #[must_use]
    pub fn fragment(&self) -> Option<&CompiledFragment<H>> {
        match self {
            ShelfEntry::Valid { fragment, .. } => Some(fragment),
            ShelfEntry::Invalid { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&FieldcError> {
        match self {
            ShelfEntry::Valid { .. } => None,
            ShelfEntry::Invalid { error, .. } => Some(error),
        }
    }
}

/// Stamps are unique per process; 0 is left for registries with no definitions.
static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

fn next_stamp() -> u64 {
    NEXT_STAMP.fetch_add(1, Ordering::Relaxed)
}

/// Named fragment definitions, resolvable through `@name`.
///
/// A reference to a bucketed dimension resolves to its label conditional.
/// Every mutation takes a fresh process-wide version stamp. A clone shares
/// its source's stamp until either one changes.
#[derive(Debug, Clone)]
pub struct Shelf {
    definitions: BTreeMap<String, FragmentDefinition>,
    version: u64,
    builder: AstBuilder,
    bucket_default_label: String,
    bucket_order_sentinel: i64,
}

impl Shelf {
    /// Creates an empty shelf using the config's reference date and bucket
    /// defaults.
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Shelf {
            definitions: BTreeMap::new(),
            version: next_stamp(),
            builder: AstBuilder::new(config.reference_date()),
            bucket_default_label: config.bucket_default_label.clone(),
            bucket_order_sentinel: config.bucket_order_sentinel,
        }
    }

    /// Adds or replaces a definition, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, definition: FragmentDefinition) -> Option<FragmentDefinition> {
        self.version = next_stamp();
        self.definitions.insert(name.into(), definition)
    }

    pub fn remove(&mut self, name: &str) -> Option<FragmentDefinition> {
        let removed = self.definitions.remove(name);
        if removed.is_some() {
            self.version = next_stamp();
        }
        removed
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FragmentDefinition> {
        self.definitions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Compiles every definition in parallel, in name order.
    ///
    /// A definition that fails becomes [`ShelfEntry::Invalid`]; the rest of
    /// the batch is unaffected.
    pub fn compile_all<D: Dialect + ?Sized>(
        &self,
        compiler: &Compiler,
        catalog: &dyn CatalogAdapter,
        dialect: &D,
    ) -> Vec<ShelfEntry<D::Handle>> {
        let definitions: Vec<(&String, &FragmentDefinition)> = self.definitions.iter().collect();
        debug!(fragments = definitions.len(), dialect = dialect.id(), "compiling shelf");
        definitions
            .par_iter()
            .map(|(name, definition)| match self.compile_one(compiler, definition, catalog, dialect) {
                Ok((fragment, quickselects)) => ShelfEntry::Valid {
                    name: (*name).clone(),
                    kind: definition.kind,
                    fragment,
                    quickselects,
                },
                Err(error) => {
                    warn!(fragment = name.as_str(), %error, "replacing fragment with invalid placeholder");
                    ShelfEntry::Invalid {
                        name: (*name).clone(),
                        error,
                    }
                }
            })
            .collect()
    }

    fn compile_one<D: Dialect + ?Sized>(
        &self,
        compiler: &Compiler,
        definition: &FragmentDefinition,
        catalog: &dyn CatalogAdapter,
        dialect: &D,
    ) -> Result<(CompiledFragment<D::Handle>, QuickselectSet<D::Handle>)> {
        let fragment = if definition.is_bucketed() {
            compiler.compile_buckets(
                &definition.buckets,
                &definition.field,
                definition.buckets_default_label.as_deref(),
                catalog,
                dialect,
                self,
            )?
        } else {
            compiler.compile(&definition.field, definition.kind.context(), catalog, dialect, self)?
        };
        let quickselects = if definition.quickselects.is_empty() {
            QuickselectSet::default()
        } else {
            compiler.compile_quickselects(&definition.quickselects, &definition.field, catalog, dialect, self)?
        };
        Ok((fragment, quickselects))
    }
}

impl FragmentRegistry for Shelf {
    fn lookup(&self, name: &str) -> Result<Expr> {
        let definition = self.definitions.get(name).ok_or_else(|| FieldcError::UnknownReference {
            expression: String::new(),
            name: name.to_string(),
        })?;
        let field = parse_expression(&definition.field, &self.builder)
            .map_err(|e| e.with_expression(&definition.field))?;
        if !definition.is_bucketed() {
            return Ok(field);
        }
        let buckets = build_buckets(&definition.buckets, &field, &self.builder)?;
        let label = definition
            .buckets_default_label
            .as_deref()
            .unwrap_or(&self.bucket_default_label);
        Ok(expand_buckets(buckets, label, self.bucket_order_sentinel)?.value)
    }

    fn version(&self) -> Option<u64> {
        Some(self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::EmptyRegistry;
    use crate::catalog::{Catalog, ColumnDef};
    use crate::lowering::{Postgres, SqlDialect, Sqlite};
    use crate::types::ResolvedType;
    use chrono::NaiveDate;

    fn config() -> CompilerConfig {
        CompilerConfig::new().with_today(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    }

    fn catalog() -> Catalog {
        Catalog::with_columns(
            "postgresql",
            vec![
                ColumnDef::new("revenue", ResolvedType::Number).unwrap(),
                ColumnDef::new("expenses", ResolvedType::Number).unwrap(),
                ColumnDef::new("age", ResolvedType::Number).unwrap(),
                ColumnDef::new("state", ResolvedType::String).unwrap(),
            ],
        )
        .unwrap()
    }

    fn shelf() -> Shelf {
        let mut shelf = Shelf::new(&config());
        shelf.insert("revenue", FragmentDefinition::metric("revenue"));
        shelf.insert("profit", FragmentDefinition::metric("@revenue - expenses"));
        shelf.insert("margin", FragmentDefinition::metric("@profit / @revenue"));
        shelf.insert(
            "age_group",
            FragmentDefinition::dimension("age")
                .with_buckets(vec![BucketSpec::new("minor", "<18"), BucketSpec::new("adult", ">=18")])
                .with_quickselects(vec![QuickselectSpec::new("Seniors", ">=65")]),
        );
        shelf.insert("bad", FragmentDefinition::metric("revenue +"));
        shelf
    }

    #[test]
    fn test_lookup_parses_field() {
        let shelf = shelf();
        assert_eq!(shelf.lookup("revenue").unwrap(), Expr::column("revenue"));
        assert!(matches!(
            shelf.lookup("missing"),
            Err(FieldcError::UnknownReference { name, .. }) if name == "missing"
        ));
        let err = shelf.lookup("bad").unwrap_err();
        assert_eq!(err.expression(), Some("revenue +"));
    }

    #[test]
    fn test_lookup_expands_buckets() {
        let expr = shelf().lookup("age_group").unwrap();
        assert!(matches!(expr, Expr::Conditional { ref branches, .. } if branches.len() == 2));
    }

    #[test]
    fn test_version_changes_on_mutation() {
        let mut shelf = Shelf::new(&config());
        let v0 = shelf.version();
        shelf.insert("a", FragmentDefinition::metric("revenue"));
        assert_ne!(shelf.version(), v0);
        let v1 = shelf.version();
        assert!(shelf.remove("missing").is_none());
        assert_eq!(shelf.version(), v1);
        assert!(shelf.remove("a").is_some());
        assert_ne!(shelf.version(), v1);
    }

    #[test]
    fn test_versions_are_unique_across_shelves() {
        let mut first = Shelf::new(&config());
        let mut second = Shelf::new(&config());
        assert_ne!(first.version(), second.version());
        first.insert("x", FragmentDefinition::dimension("revenue"));
        second.insert("x", FragmentDefinition::dimension("expenses"));
        assert_ne!(first.version(), second.version());
        assert_ne!(first.version(), EmptyRegistry.version());

        let copy = first.clone();
        assert_eq!(copy.version(), first.version());
        first.insert("y", FragmentDefinition::dimension("age"));
        assert_ne!(copy.version(), first.version());
    }

    #[test]
    fn test_compile_all_isolates_failures() {
        let shelf = shelf();
        let compiler = Compiler::new(config());
        let entries = shelf.compile_all(&compiler, &catalog(), &SqlDialect::new(Postgres));
        let names: Vec<_> = entries.iter().map(ShelfEntry::name).collect();
        assert_eq!(names, vec!["age_group", "bad", "margin", "profit", "revenue"]);

        let bad = &entries[1];
        assert!(!bad.is_valid());
        assert!(matches!(bad.error(), Some(FieldcError::SyntaxError { .. })));

        let profit = entries[3].fragment().unwrap();
        assert_eq!(profit.sql_fragment.as_str(), r#"(SUM("revenue") - SUM("expenses"))"#);

        let ShelfEntry::Valid { fragment, quickselects, .. } = &entries[0] else {
            panic!("age_group should compile");
        };
        assert!(fragment.default_order_fragment.is_some());
        assert_eq!(
            quickselects.get("Seniors").map(|f| f.sql_fragment.as_str()),
            Some(r#""age" >= 65"#)
        );
    }

    #[test]
    fn test_cross_reference_to_invalid_fragment_fails() {
        let mut shelf = shelf();
        shelf.insert("uses_bad", FragmentDefinition::metric("@bad * 2"));
        let compiler = Compiler::new(config());
        let entries = shelf.compile_all(&compiler, &catalog(), &SqlDialect::new(Sqlite));
        let uses_bad = entries.iter().find(|e| e.name() == "uses_bad").unwrap();
        assert!(!uses_bad.is_valid());
    }
}
