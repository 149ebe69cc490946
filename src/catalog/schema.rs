//! Column catalog for a bound data source.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{FieldcError, Result};
use crate::types::ResolvedType;

/// Read-only view of the columns of a bound data source.
///
/// Implemented by the execution layer; the compiler only consumes it.
/// Implementations must be cheap to query and safe to share across threads.
pub trait CatalogAdapter: Send + Sync {
    /// Returns the type of a column, or `None` if it does not exist.
    fn column_type(&self, name: &str) -> Option<ResolvedType>;

    /// Returns the canonical spelling of a column name.
    ///
    /// Column lookups are case-insensitive; the canonical name is what gets
    /// emitted into SQL.
    fn canonical_name(&self, name: &str) -> Option<String> {
        self.column_type(name).map(|_| name.to_string())
    }

    /// Returns true if the column exists.
    fn has_column(&self, name: &str) -> bool {
        self.column_type(name).is_some()
    }

    /// Returns the driver name of the data source (e.g. `postgresql`).
    fn dialect_id(&self) -> &str;

    /// Returns a version that changes whenever the column set changes.
    fn version(&self) -> u32;

    /// Identifies this catalog across its versions.
    ///
    /// When present, compiling against a new version drops cache entries
    /// for the same lineage's older versions. Without it, stale entries stay
    /// until `CompilationCache::invalidate_catalog`.
    fn lineage(&self) -> Option<u64> {
        None
    }
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name as spelled by the data source.
    pub name: String,
    /// Resolved column type.
    pub data_type: ResolvedType,
}

impl ColumnDef {
    /// Creates a new column definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the type is `Unknown`.
    pub fn new(name: impl Into<String>, data_type: ResolvedType) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FieldcError::CatalogError("Column name cannot be empty".into()));
        }
        if data_type == ResolvedType::Unknown {
            return Err(FieldcError::CatalogError(format!(
                "Column '{name}' has no usable type"
            )));
        }
        Ok(ColumnDef { name, data_type })
    }
}

/// In-memory catalog snapshot.
///
/// Columns are keyed by lowercase name; the version is a CRC32 of the
/// serialized column set, so two catalogs with the same columns share a
/// version and any schema change produces a new one. Each instance,
/// including clones and deserialized copies, gets its own lineage.
#[derive(Debug, Serialize, Deserialize)]
pub struct Catalog {
    dialect: String,
    columns: BTreeMap<String, ColumnDef>,
    #[serde(skip)]
    version: u32,
    #[serde(skip, default = "next_lineage")]
    lineage: u64,
}

static NEXT_LINEAGE: AtomicU64 = AtomicU64::new(1);

fn next_lineage() -> u64 {
    NEXT_LINEAGE.fetch_add(1, Ordering::Relaxed)
}

impl Clone for Catalog {
    fn clone(&self) -> Self {
        Catalog {
            dialect: self.dialect.clone(),
            columns: self.columns.clone(),
            version: self.version,
            lineage: next_lineage(),
        }
    }
}

impl Catalog {
    /// Creates an empty catalog for the given driver name.
    #[must_use]
    pub fn new(dialect: impl Into<String>) -> Self {
        let mut catalog = Catalog {
            dialect: dialect.into(),
            columns: BTreeMap::new(),
            version: 0,
            lineage: next_lineage(),
        };
        catalog.refresh_version();
        catalog
    }

    /// Creates a catalog from a list of columns.
    ///
    /// # Errors
    ///
    /// Returns an error if two columns share a name (case-insensitively).
    pub fn with_columns(dialect: impl Into<String>, columns: Vec<ColumnDef>) -> Result<Self> {
        let mut catalog = Catalog::new(dialect);
        for column in columns {
            catalog.add_column(column)?;
        }
        Ok(catalog)
    }

    /// Adds a column to the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if a column with the same name already exists.
    pub fn add_column(&mut self, column: ColumnDef) -> Result<()> {
        let key = column.name.to_lowercase();
        if self.columns.contains_key(&key) {
            return Err(FieldcError::CatalogError(format!(
                "Column '{}' already exists",
                column.name
            )));
        }
        self.columns.insert(key, column);
        self.refresh_version();
        Ok(())
    }

    /// Removes a column from the catalog, returning its definition.
    pub fn remove_column(&mut self, name: &str) -> Option<ColumnDef> {
        let removed = self.columns.remove(&name.to_lowercase());
        if removed.is_some() {
            self.refresh_version();
        }
        removed
    }

    /// Retrieves a column definition by name (case-insensitive).
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(&name.to_lowercase())
    }

    /// Returns all columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.values()
    }

    /// Serializes the catalog to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| FieldcError::CatalogError(format!("Failed to serialize catalog: {e}")))
    }

    /// Deserializes a catalog from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut catalog: Catalog = bincode::deserialize(data)
            .map_err(|e| FieldcError::CatalogError(format!("Failed to deserialize catalog: {e}")))?;
        catalog.refresh_version();
        Ok(catalog)
    }

    fn refresh_version(&mut self) {
        let mut hasher = crc32fast::Hasher::new();
        for column in self.columns.values() {
            hasher.update(column.name.as_bytes());
            hasher.update(&[0, column.data_type as u8]);
        }
        self.version = hasher.finalize();
    }
}

impl CatalogAdapter for Catalog {
    fn column_type(&self, name: &str) -> Option<ResolvedType> {
        self.get_column(name).map(|c| c.data_type)
    }

    fn canonical_name(&self, name: &str) -> Option<String> {
        self.get_column(name).map(|c| c.name.clone())
    }

    fn dialect_id(&self) -> &str {
        &self.dialect
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn lineage(&self) -> Option<u64> {
        Some(self.lineage)
    }
}
