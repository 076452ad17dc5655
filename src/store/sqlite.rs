use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::{CatalogStore, SearchCriteria};
use crate::config::DatabaseConfig;
use crate::models::{NewProductRecord, ProductRecord};
use crate::utils::error::{AppError, Result};

const INSERT_COLUMNS: &str = "INSERT INTO products \
    (id, title, price, description, image_src, link, source, query, specifications, reviews, created_at, updated_at) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        ensure_parent_dir(&config.url)?;

        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Catalog store ready at {}", config.url);
        Ok(store)
    }

    /// Private in-memory database. A single connection is kept open for the
    /// pool's lifetime, since the database vanishes with its last connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn execute_insert(&self, sql: &str, record: &ProductRecord) -> Result<u64> {
        let result = sqlx::query(sql)
            .bind(&record.id)
            .bind(&record.title)
            .bind(&record.price)
            .bind(&record.description)
            .bind(&record.image_src)
            .bind(&record.link)
            .bind(record.source)
            .bind(&record.query)
            .bind(&record.specifications)
            .bind(&record.reviews)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn ensure_parent_dir(url: &str) -> Result<()> {
    if url.contains(":memory:") || url.contains("mode=memory") {
        return Ok(());
    }
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn find(&self, criteria: &SearchCriteria) -> Result<Vec<ProductRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM products WHERE query = ");
        builder.push_bind(criteria.query.clone());
        if let Some(source) = criteria.source {
            builder.push(" AND source = ").push_bind(source);
        }
        builder.push(" ORDER BY created_at ASC, id ASC");

        let rows = builder
            .build_query_as::<ProductRecord>()
            .fetch_all(&self.pool)
            .await?;

        // Keyword matching needs Unicode case folding, which SQLite's LIKE lacks.
        let matched: Vec<ProductRecord> =
            rows.into_iter().filter(|r| criteria.matches(r)).collect();
        debug!("Catalog lookup for '{}' matched {} records", criteria.query, matched.len());
        Ok(matched)
    }

    async fn find_one(&self, link: &str, query: &str) -> Result<Option<ProductRecord>> {
        let record = sqlx::query_as::<_, ProductRecord>(
            "SELECT * FROM products WHERE link = ? AND query = ?",
        )
        .bind(link)
        .bind(query)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert(&self, record: NewProductRecord) -> Result<ProductRecord> {
        let record = ProductRecord::new(record);
        match self.execute_insert(INSERT_COLUMNS, &record).await {
            Ok(_) => Ok(record),
            Err(AppError::Database(e)) if is_unique_violation(&e) => {
                Err(AppError::ConstraintViolation {
                    link: record.link,
                    query: record.query,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn insert_if_absent(&self, record: NewProductRecord) -> Result<Option<ProductRecord>> {
        let record = ProductRecord::new(record);
        let sql = format!("{} ON CONFLICT (link, query) DO NOTHING", INSERT_COLUMNS);
        let inserted = self.execute_insert(&sql, &record).await?;
        Ok((inserted > 0).then_some(record))
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ProductRecord>> {
        let records = sqlx::query_as::<_, ProductRecord>(
            "SELECT * FROM products ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn all(&self) -> Result<Vec<ProductRecord>> {
        let records =
            sqlx::query_as::<_, ProductRecord>("SELECT * FROM products ORDER BY created_at ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
