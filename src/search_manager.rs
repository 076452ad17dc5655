use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::analysis::{QueryPreprocessor, Ranker};
use crate::models::{MarketplaceSource, ProductRecord};
use crate::orchestrator::{OrchestrationReport, ScrapeOrchestrator};
use crate::store::{CatalogStore, POPULAR_LIMIT, SearchCriteria};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 200, message = "Query is required"))]
    #[serde(default)]
    pub query: String,
    /// Restricts the lookup to one marketplace.
    #[serde(default)]
    pub marketplace: Option<MarketplaceSource>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            marketplace: None,
        }
    }
}

/// Serves searches from the catalog, scraping the marketplaces on a miss.
pub struct SearchManager {
    preprocessor: Arc<dyn QueryPreprocessor>,
    ranker: Arc<dyn Ranker>,
    store: Arc<dyn CatalogStore>,
    orchestrator: ScrapeOrchestrator,
}

impl SearchManager {
    pub fn new(
        preprocessor: Arc<dyn QueryPreprocessor>,
        ranker: Arc<dyn Ranker>,
        store: Arc<dyn CatalogStore>,
        orchestrator: ScrapeOrchestrator,
    ) -> Self {
        Self {
            preprocessor,
            ranker,
            store,
            orchestrator,
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &ScrapeOrchestrator {
        &self.orchestrator
    }

    pub async fn normalize_query(&self, raw_query: &str) -> Result<String> {
        if raw_query.trim().is_empty() {
            return Err(AppError::Validation("Query is required".to_string()));
        }
        self.preprocessor.normalize(raw_query).await.map_err(|e| match e {
            AppError::Preprocessor(_) => e,
            other => AppError::Preprocessor(other.to_string()),
        })
    }

    /// Normalize, look up, scrape on a miss, then analyze and rank.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<ProductRecord>> {
        request.validate()?;
        let normalized = self.normalize_query(&request.query).await?;
        info!(query = %normalized, marketplace = ?request.marketplace, "Searching catalog");

        let criteria = SearchCriteria::for_query(&normalized, request.marketplace);
        let mut products = self.store.find(&criteria).await?;
        info!(query = %normalized, "Found {} products in the catalog", products.len());

        if products.is_empty() {
            info!(query = %normalized, "No cached products, scraping marketplaces");
            let report = self.orchestrator.run(&normalized).await;
            if report.requires_requery() {
                products = self.store.find(&criteria).await?;
            }
            info!(query = %normalized, "Found {} products after scraping", products.len());
        }

        if products.is_empty() {
            return Ok(products);
        }

        if let Err(e) = self.ranker.analyze(&products, &request.query).await {
            warn!(query = %normalized, "Analysis failed, continuing: {}", e);
        }

        match self.ranker.rank(products.clone(), &request.query).await {
            Ok(ranked) => Ok(ranked),
            Err(e) => {
                warn!(query = %normalized, "Ranking failed, returning catalog order: {}", e);
                Ok(products)
            }
        }
    }

    /// One ingestion pass without a catalog lookup.
    pub async fn scrape(&self, raw_query: &str) -> Result<OrchestrationReport> {
        let normalized = self.normalize_query(raw_query).await?;
        Ok(self.orchestrator.run(&normalized).await)
    }

    pub async fn popular(&self) -> Result<Vec<ProductRecord>> {
        self.store.recent(POPULAR_LIMIT).await
    }

    pub async fn all_products(&self) -> Result<Vec<ProductRecord>> {
        self.store.all().await
    }
}
