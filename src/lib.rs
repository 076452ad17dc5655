pub mod adapter;
pub mod analysis;
pub mod app;
pub mod browser;
pub mod config;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod rules;
pub mod search_manager;
pub mod store;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{MarketplaceSource, ProductRecord};
pub use search_manager::{SearchManager, SearchRequest};
pub use utils::error::{AppError, Result};
