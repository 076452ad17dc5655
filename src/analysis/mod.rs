//! Query preprocessing and result ranking.
//!
//! Both are collaborators of the search flow. The local `KeywordAnalyzer`
//! needs no external service; `HttpAnalyzer` delegates to a remote text
//! analyzer.

use async_trait::async_trait;
use tracing::debug;

use crate::extract::collapse_whitespace;
use crate::models::ProductRecord;
use crate::utils::error::{AppError, Result};

pub mod http;

pub use http::HttpAnalyzer;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryPreprocessor: Send + Sync {
    /// Canonical form of a user query. Failure aborts the search.
    async fn normalize(&self, raw_query: &str) -> Result<String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ranker: Send + Sync {
    /// Inspects the candidate records before ranking.
    async fn analyze(&self, records: &[ProductRecord], raw_query: &str) -> Result<()>;

    /// Records in presentation order, possibly fewer than given.
    async fn rank(&self, records: Vec<ProductRecord>, raw_query: &str) -> Result<Vec<ProductRecord>>;
}

/// Local analyzer: lowercase keyword matching, title hits weigh double.
#[derive(Debug, Clone)]
pub struct KeywordAnalyzer {
    top_n: usize,
}

impl KeywordAnalyzer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    fn keywords(raw_query: &str) -> Vec<String> {
        raw_query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }

    pub fn score(record: &ProductRecord, keywords: &[String]) -> usize {
        let title = record.title.to_lowercase();
        keywords
            .iter()
            .map(|keyword| {
                let in_title = if title.contains(keyword.as_str()) { 2 } else { 0 };
                let elsewhere = [
                    record.description.as_deref(),
                    record.specifications.as_deref(),
                    record.reviews.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(keyword.as_str()));
                in_title + usize::from(elsewhere)
            })
            .sum()
    }
}

#[async_trait]
impl QueryPreprocessor for KeywordAnalyzer {
    async fn normalize(&self, raw_query: &str) -> Result<String> {
        let normalized = collapse_whitespace(raw_query).to_lowercase();
        if normalized.is_empty() {
            return Err(AppError::Preprocessor("query is empty".to_string()));
        }
        Ok(normalized)
    }
}

#[async_trait]
impl Ranker for KeywordAnalyzer {
    async fn analyze(&self, records: &[ProductRecord], raw_query: &str) -> Result<()> {
        let keywords = Self::keywords(raw_query);
        let relevant = records
            .iter()
            .filter(|record| Self::score(record, &keywords) > 0)
            .count();
        debug!(
            "Analyzed {} records for '{}': {} mention the query",
            records.len(),
            raw_query,
            relevant
        );
        Ok(())
    }

    async fn rank(&self, mut records: Vec<ProductRecord>, raw_query: &str) -> Result<Vec<ProductRecord>> {
        let keywords = Self::keywords(raw_query);
        // Stable sort keeps catalog order among equal scores.
        records.sort_by_cached_key(|record| std::cmp::Reverse(Self::score(record, &keywords)));
        records.truncate(self.top_n);
        Ok(records)
    }
}
