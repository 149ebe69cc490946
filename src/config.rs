//! Compiler configuration.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default epsilon added to every division denominator.
pub const DEFAULT_SAFE_DIVISION_EPSILON: f64 = 1e-9;

/// Default label for rows that match no bucket.
pub const DEFAULT_BUCKET_LABEL: &str = "Not found";

/// Default sort position for rows that match no bucket.
pub const DEFAULT_BUCKET_ORDER_SENTINEL: i64 = 9999;

/// Configuration for a [`Compiler`](crate::Compiler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Constant added to `coalesce(denominator, 0)` for every division.
    pub safe_division_epsilon: f64,
    /// Label of the implicit catch-all bucket.
    pub bucket_default_label: String,
    /// Order value of the implicit catch-all bucket.
    pub bucket_order_sentinel: i64,
    /// Widen `like` patterns without wildcards to `%pattern%`.
    pub like_auto_wildcard: bool,
    /// Check every element of an `in`/`between` list, not only the first.
    pub strict_list_homogeneity: bool,
    /// Reference date for relative dates (`is last month`, `"today"`).
    /// `None` uses the local date at compile time.
    pub today: Option<NaiveDate>,
    /// Enable the compilation cache.
    pub cache_enabled: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            safe_division_epsilon: DEFAULT_SAFE_DIVISION_EPSILON,
            bucket_default_label: DEFAULT_BUCKET_LABEL.to_string(),
            bucket_order_sentinel: DEFAULT_BUCKET_ORDER_SENTINEL,
            like_auto_wildcard: true,
            strict_list_homogeneity: false,
            today: None,
            cache_enabled: true,
        }
    }
}

impl CompilerConfig {
    /// Creates a new compiler configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the safe division epsilon.
    #[must_use]
    pub fn with_safe_division_epsilon(mut self, epsilon: f64) -> Self {
        self.safe_division_epsilon = epsilon;
        self
    }

    /// Sets the default bucket label.
    #[must_use]
    pub fn with_bucket_default_label(mut self, label: impl Into<String>) -> Self {
        self.bucket_default_label = label.into();
        self
    }

    /// Sets the order value of the default bucket.
    #[must_use]
    pub fn with_bucket_order_sentinel(mut self, sentinel: i64) -> Self {
        self.bucket_order_sentinel = sentinel;
        self
    }

    /// Enables or disables `like` pattern widening.
    #[must_use]
    pub fn with_like_auto_wildcard(mut self, enabled: bool) -> Self {
        self.like_auto_wildcard = enabled;
        self
    }

    /// Enables or disables strict list homogeneity checks.
    #[must_use]
    pub fn with_strict_list_homogeneity(mut self, enabled: bool) -> Self {
        self.strict_list_homogeneity = enabled;
        self
    }

    /// Pins the reference date used for relative dates.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Enables or disables the compilation cache.
    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Returns the reference date for relative dates.
    #[must_use]
    pub fn reference_date(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}
