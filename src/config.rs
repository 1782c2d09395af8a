//! Configuration for tables
//!
//! Provides a builder pattern for configuring statement synthesis.

use serde::{Deserialize, Serialize};

use crate::sql::clause::{DEFAULT_COUNT, FieldPolicy};
use crate::sql::dialect::Dialect;

/// Ordering applied by `list` when the request gives no usable sort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultSort {
    /// `ORDER BY _id ASC`
    #[default]
    PrimaryKeyAsc,
    /// No ORDER BY; row order is whatever the backend returns
    Unspecified,
}

/// Configuration shared by every table of one backend
#[derive(Debug, Clone)]
pub struct CrudConfig {
    /// Target SQL dialect
    pub dialect: Dialect,
    /// Page size when a request has no valid count (default: 30)
    pub default_count: i64,
    /// Reject unknown select/sort/filter/payload names instead of dropping them
    pub strict_fields: bool,
    /// Write escaped literals instead of bound parameters
    pub inline_literals: bool,
    pub default_sort: DefaultSort,
}

impl CrudConfig {
    /// Create a new configuration builder
    pub fn builder(dialect: Dialect) -> CrudConfigBuilder {
        CrudConfigBuilder::new(dialect)
    }

    pub(crate) fn field_policy(&self) -> FieldPolicy {
        if self.strict_fields {
            FieldPolicy::Reject
        } else {
            FieldPolicy::Ignore
        }
    }
}

impl Default for CrudConfig {
    fn default() -> Self {
        CrudConfigBuilder::new(Dialect::default()).build()
    }
}

/// Builder for CrudConfig
#[derive(Debug)]
pub struct CrudConfigBuilder {
    dialect: Dialect,
    default_count: i64,
    strict_fields: bool,
    inline_literals: bool,
    default_sort: DefaultSort,
}

impl CrudConfigBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            default_count: DEFAULT_COUNT,
            strict_fields: false,
            inline_literals: false,
            default_sort: DefaultSort::default(),
        }
    }

    /// Set the default page size; non-positive values keep 30
    pub fn default_count(mut self, count: i64) -> Self {
        if count > 0 {
            self.default_count = count;
        }
        self
    }

    /// Enable or disable strict field checking (default: false)
    pub fn strict_fields(mut self, enabled: bool) -> Self {
        self.strict_fields = enabled;
        self
    }

    /// Enable or disable inline literals (default: false)
    pub fn inline_literals(mut self, enabled: bool) -> Self {
        self.inline_literals = enabled;
        self
    }

    pub fn default_sort(mut self, sort: DefaultSort) -> Self {
        self.default_sort = sort;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrudConfig {
        CrudConfig {
            dialect: self.dialect,
            default_count: self.default_count,
            strict_fields: self.strict_fields,
            inline_literals: self.inline_literals,
            default_sort: self.default_sort,
        }
    }
}
