//! Compilation cache.
//!
//! Caches bound expressions (after context rules are applied) keyed by
//! everything that can change the result of binding. Lowering is not
//! cached; it is cheap and its output type depends on the dialect.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::trace;

use crate::binder::{BoundExpression, FieldContext};
use crate::error::Result;

/// Everything a cached bound expression depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub context: FieldContext,
    pub dialect_id: String,
    pub catalog_version: u32,
    /// See [`CatalogAdapter::lineage`](crate::catalog::CatalogAdapter::lineage).
    pub catalog_lineage: Option<u64>,
    /// Registry stamp, or `None` for text without `@name` references.
    pub registry_version: Option<u64>,
    /// Reference date used for relative dates.
    pub today: NaiveDate,
}

type Slot = Arc<OnceLock<Result<Arc<BoundExpression>>>>;

/// Thread-safe single-flight cache of bound expressions.
///
/// Concurrent requests for the same key block on one compilation. A key
/// carrying a catalog lineage evicts that lineage's entries for other
/// catalog versions.
#[derive(Debug, Default)]
pub struct CompilationCache {
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl CompilationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for `key`, running `compile` at most once
    /// per key.
    ///
    /// # Errors
    ///
    /// Returns the (cached) error of the compilation.
    pub fn get_or_compile(
        &self,
        key: CacheKey,
        compile: impl FnOnce() -> Result<BoundExpression>,
    ) -> Result<Arc<BoundExpression>> {
        let slot = {
            let mut entries = self.entries.lock();
            if let Some(slot) = entries.get(&key) {
                trace!(text = %key.text, context = key.context.name(), "compilation cache hit");
                Arc::clone(slot)
            } else {
                if key.catalog_lineage.is_some() {
                    entries.retain(|k, _| {
                        k.catalog_lineage != key.catalog_lineage || k.catalog_version == key.catalog_version
                    });
                }
                let slot: Slot = Arc::new(OnceLock::new());
                entries.insert(key, Arc::clone(&slot));
                slot
            }
        };
        slot.get_or_init(|| compile().map(Arc::new)).clone()
    }

    /// Drops every entry compiled against the given catalog version.
    pub fn invalidate_catalog(&self, catalog_version: u32) {
        self.entries
            .lock()
            .retain(|k, _| k.catalog_version != catalog_version);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
