//! Catalog persistence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{MarketplaceSource, NewProductRecord, ProductRecord};
use crate::utils::error::Result;

pub mod sqlite;

pub use sqlite::SqliteCatalogStore;

/// Number of records returned by the popular listing.
pub const POPULAR_LIMIT: i64 = 30;

/// Lookup for one normalized query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCriteria {
    pub query: String,
    /// Lowercase tokens of the query; a record must mention at least one.
    pub keywords: Vec<String>,
    pub source: Option<MarketplaceSource>,
}

impl SearchCriteria {
    pub fn for_query(normalized_query: &str, source: Option<MarketplaceSource>) -> Self {
        Self {
            query: normalized_query.to_string(),
            keywords: normalized_query
                .split_whitespace()
                .map(str::to_lowercase)
                .collect(),
            source,
        }
    }

    pub fn matches(&self, record: &ProductRecord) -> bool {
        record.query == self.query
            && self.source.is_none_or(|source| record.source == source)
            && (self.keywords.is_empty() || self.keywords.iter().any(|k| record.mentions(k)))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find(&self, criteria: &SearchCriteria) -> Result<Vec<ProductRecord>>;

    async fn find_one(&self, link: &str, query: &str) -> Result<Option<ProductRecord>>;

    /// Fails with `AppError::ConstraintViolation` when `(link, query)` is already stored.
    async fn insert(&self, record: NewProductRecord) -> Result<ProductRecord>;

    /// Atomic insert keyed on `(link, query)`; `None` when the key already exists.
    async fn insert_if_absent(&self, record: NewProductRecord) -> Result<Option<ProductRecord>>;

    /// Most recently created records first.
    async fn recent(&self, limit: i64) -> Result<Vec<ProductRecord>>;

    async fn all(&self) -> Result<Vec<ProductRecord>>;

    async fn count(&self) -> Result<i64>;
}
