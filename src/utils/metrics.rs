//! Pipeline counters, exported in Prometheus text format.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::models::MarketplaceSource;
use crate::utils::error::{AppError, Result};

pub const LINKS_DISCOVERED: &str = "harvest_links_discovered_total";
pub const RECORDS_INSERTED: &str = "harvest_records_inserted_total";
pub const RECORDS_SKIPPED: &str = "harvest_records_skipped_total";
pub const RECORDS_INCOMPLETE: &str = "harvest_records_incomplete_total";
pub const LINK_FAILURES: &str = "harvest_link_failures_total";
pub const SOURCE_FAILURES: &str = "harvest_source_failures_total";
pub const SOURCE_DURATION: &str = "harvest_source_duration_seconds";

/// Installs the global recorder. Without it every macro below is a no-op.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Internal(format!("Failed to install metrics recorder: {}", e)))
}

pub fn record_links_discovered(source: MarketplaceSource, count: usize) {
    counter!(LINKS_DISCOVERED, "source" => source.as_str()).increment(count as u64);
}

pub fn record_inserted(source: MarketplaceSource) {
    counter!(RECORDS_INSERTED, "source" => source.as_str()).increment(1);
}

pub fn record_skipped(source: MarketplaceSource) {
    counter!(RECORDS_SKIPPED, "source" => source.as_str()).increment(1);
}

pub fn record_incomplete(source: MarketplaceSource) {
    counter!(RECORDS_INCOMPLETE, "source" => source.as_str()).increment(1);
}

pub fn record_link_failure(source: MarketplaceSource) {
    counter!(LINK_FAILURES, "source" => source.as_str()).increment(1);
}

pub fn record_source_failure(source: MarketplaceSource) {
    counter!(SOURCE_FAILURES, "source" => source.as_str()).increment(1);
}

pub fn record_source_duration(source: MarketplaceSource, elapsed: Duration) {
    histogram!(SOURCE_DURATION, "source" => source.as_str()).record(elapsed.as_secs_f64());
}
