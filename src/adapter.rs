//! Generic marketplace adapter driven by an `ExtractionRuleSet`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::browser::{self, BrowserSession, SessionFactory, SessionOptions};
use crate::config::BrowserConfig;
use crate::ingest::{self, IngestGate, IngestOutcome};
use crate::models::{MarketplaceSource, RecordField};
use crate::rules::ExtractionRuleSet;
use crate::utils::error::{AppError, Result};
use crate::utils::logging::truncate_text;
use crate::utils::metrics;

/// What happened to one discovered link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Inserted,
    AlreadyPresent,
    Incomplete(Vec<RecordField>),
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReport {
    pub source: MarketplaceSource,
    pub discovered: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub incomplete: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl SourceReport {
    fn new(source: MarketplaceSource) -> Self {
        Self {
            source,
            discovered: 0,
            inserted: 0,
            already_present: 0,
            incomplete: 0,
            failed: 0,
            elapsed_ms: 0,
        }
    }

    fn record(&mut self, outcome: &LinkOutcome) {
        match outcome {
            LinkOutcome::Inserted => self.inserted += 1,
            LinkOutcome::AlreadyPresent => self.already_present += 1,
            LinkOutcome::Incomplete(_) => self.incomplete += 1,
            LinkOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Records of this source now in the catalog for the query.
    pub fn available(&self) -> usize {
        self.inserted + self.already_present
    }
}

#[derive(Clone)]
pub struct SourceAdapter {
    rules: Arc<ExtractionRuleSet>,
    session_options: SessionOptions,
    gate: IngestGate,
}

impl SourceAdapter {
    pub fn new(rules: ExtractionRuleSet, browser: &BrowserConfig, gate: IngestGate) -> Self {
        let session_options = SessionOptions::for_rules(browser, &rules);
        Self {
            rules: Arc::new(rules),
            session_options,
            gate,
        }
    }

    pub fn source(&self) -> MarketplaceSource {
        self.rules.source
    }

    /// One full pass for `query`: a single session, links processed in discovery order.
    pub async fn run(&self, factory: &dyn SessionFactory, query: &str) -> Result<SourceReport> {
        let source = self.source();
        let started = Instant::now();
        info!(source = %source, query, "Scraping marketplace");

        let mut session = factory
            .open(&self.session_options)
            .await
            .map_err(|e| AppError::ListPage {
                marketplace: source,
                message: format!("failed to open browser session: {}", e),
            })?;

        let result = self.run_in_session(session.as_mut(), query).await;
        session.close().await;

        let elapsed = started.elapsed();
        metrics::record_source_duration(source, elapsed);

        result.map(|mut report| {
            report.elapsed_ms = elapsed.as_millis() as u64;
            info!(
                source = %source,
                query,
                discovered = report.discovered,
                inserted = report.inserted,
                already_present = report.already_present,
                incomplete = report.incomplete,
                failed = report.failed,
                "Marketplace scrape finished"
            );
            report
        })
    }

    async fn run_in_session(
        &self,
        session: &mut dyn BrowserSession,
        query: &str,
    ) -> Result<SourceReport> {
        let links = self.discover_links(session, query).await?;
        let mut report = SourceReport::new(self.source());
        report.discovered = links.len();

        for link in &links {
            let outcome = self.scrape_and_persist(session, link, query).await;
            report.record(&outcome);
        }

        Ok(report)
    }

    /// Item links on the search results page, capped at the rule's `max_links`.
    pub async fn discover_links(
        &self,
        session: &mut dyn BrowserSession,
        query: &str,
    ) -> Result<Vec<String>> {
        let source = self.source();
        let list_url = self.rules.list_url(query);
        debug!(source = %source, url = %list_url, "Opening search results");

        let list_page_error = |e: AppError| AppError::ListPage {
            marketplace: source,
            message: e.to_string(),
        };

        session
            .navigate(&list_url, self.rules.timeout())
            .await
            .map_err(list_page_error)?;
        let links = browser::extract_links(session, &self.rules.links)
            .await
            .map_err(list_page_error)?;

        info!(source = %source, count = links.len(), "Discovered item links");
        metrics::record_links_discovered(source, links.len());
        Ok(links)
    }

    /// Extracts, normalizes and stores one item. Failures stay with the link.
    pub async fn scrape_and_persist(
        &self,
        session: &mut dyn BrowserSession,
        link: &str,
        query: &str,
    ) -> LinkOutcome {
        let source = self.source();
        match self.ingest_link(session, link, query).await {
            Ok(IngestOutcome::Inserted(record)) => {
                debug!(source = %source, link, "Saved product: {}", truncate_text(&record.title, 80));
                metrics::record_inserted(source);
                LinkOutcome::Inserted
            }
            Ok(IngestOutcome::AlreadyPresent) => {
                debug!(source = %source, link, "Product already in catalog");
                metrics::record_skipped(source);
                LinkOutcome::AlreadyPresent
            }
            Err(AppError::ExtractionIncomplete { missing, .. }) => {
                let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
                warn!(source = %source, link, missing = ?names, "Skipping product with missing required fields");
                metrics::record_incomplete(source);
                LinkOutcome::Incomplete(missing)
            }
            Err(e) => {
                warn!(source = %source, link, "Failed to scrape product: {}", e);
                metrics::record_link_failure(source);
                LinkOutcome::Failed(e.to_string())
            }
        }
    }

    async fn ingest_link(
        &self,
        session: &mut dyn BrowserSession,
        link: &str,
        query: &str,
    ) -> Result<IngestOutcome> {
        session.navigate(link, self.rules.timeout()).await?;
        let raw = browser::extract_detail(session, &self.rules.detail).await?;
        let record = ingest::normalize(raw, &self.rules, link, query)?;
        self.gate.admit(record).await
    }
}
