use thiserror::Error;

use crate::models::{MarketplaceSource, RecordField};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("List page for {marketplace} unavailable: {message}")]
    ListPage {
        marketplace: MarketplaceSource,
        message: String,
    },

    #[error("Incomplete extraction for {link}: missing {}", format_fields(.missing))]
    ExtractionIncomplete {
        link: String,
        missing: Vec<RecordField>,
    },

    #[error("Constraint violation: {link} already stored for query '{query}'")]
    ConstraintViolation { link: String, query: String },

    #[error("Invalid rule set for {marketplace}: {message}")]
    RuleSet {
        marketplace: MarketplaceSource,
        message: String,
    },

    #[error("Query preprocessing failed: {0}")]
    Preprocessor(String),

    #[error("Ranking failed: {0}")]
    Ranker(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_fields(fields: &[RecordField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Validation(format!("Invalid rule file: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
