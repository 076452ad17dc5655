use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{QueryPreprocessor, Ranker};
use crate::models::ProductRecord;
use crate::utils::error::{AppError, Result};

/// Client for a remote text analyzer exposing `/normalize`, `/analyze` and `/rank`.
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

#[derive(Serialize)]
struct RecordsBody<'a> {
    query: &'a str,
    products: &'a [ProductRecord],
}

#[derive(Deserialize)]
struct NormalizeResponse {
    query: String,
}

/// Ranked record ids, best first.
#[derive(Deserialize)]
struct RankResponse {
    ids: Vec<String>,
}

impl HttpAnalyzer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        debug!("POST {}", self.url(path));
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }
}

#[async_trait]
impl QueryPreprocessor for HttpAnalyzer {
    async fn normalize(&self, raw_query: &str) -> Result<String> {
        let response: NormalizeResponse = self
            .post("normalize", &QueryBody { query: raw_query })
            .await
            .map_err(|e| AppError::Preprocessor(e.to_string()))?
            .json()
            .await
            .map_err(|e| AppError::Preprocessor(e.to_string()))?;

        let normalized = response.query.trim().to_string();
        if normalized.is_empty() {
            return Err(AppError::Preprocessor("analyzer returned an empty query".to_string()));
        }
        Ok(normalized)
    }
}

#[async_trait]
impl Ranker for HttpAnalyzer {
    async fn analyze(&self, records: &[ProductRecord], raw_query: &str) -> Result<()> {
        self.post(
            "analyze",
            &RecordsBody {
                query: raw_query,
                products: records,
            },
        )
        .await
        .map_err(|e| AppError::Ranker(e.to_string()))?;
        Ok(())
    }

    async fn rank(&self, records: Vec<ProductRecord>, raw_query: &str) -> Result<Vec<ProductRecord>> {
        let response: RankResponse = self
            .post(
                "rank",
                &RecordsBody {
                    query: raw_query,
                    products: &records,
                },
            )
            .await
            .map_err(|e| AppError::Ranker(e.to_string()))?
            .json()
            .await
            .map_err(|e| AppError::Ranker(e.to_string()))?;

        // Unknown ids are ignored; the analyzer may not return every record.
        let mut by_id: HashMap<String, ProductRecord> =
            records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Ok(response
            .ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }
}
