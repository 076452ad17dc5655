use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::time::Instant;
use tracing::error;
use validator::Validate;

use super::AppState;
use super::responses::{
    ApiError, HealthCheck, HealthResponse, POPULAR_FAILED, PRODUCTS_FAILED, SEARCH_FAILED,
};
use crate::models::ProductRecord;
use crate::search_manager::SearchRequest;

type ApiResult<T> = Result<T, ApiError>;

pub async fn root() -> &'static str {
    "API is running..."
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let catalog = match state.search.store().count().await {
        Ok(count) => HealthCheck::healthy(
            "catalog",
            format!("{} products stored", count),
            start.elapsed().as_millis() as u64,
        ),
        Err(e) => HealthCheck::unhealthy("catalog", e.to_string(), start.elapsed().as_millis() as u64),
    };

    let health = HealthResponse::from_checks(vec![catalog], state.started_at.elapsed().as_secs());
    (health.status_code(), Json(health))
}

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<Vec<ProductRecord>>> {
    request
        .validate()
        .map_err(|_| ApiError::bad_request("Query is required"))?;

    state.search.search(&request).await.map(Json).map_err(|e| {
        error!(query = %request.query, "Error during scraping: {}", e);
        ApiError::from_app_error(&e, SEARCH_FAILED)
    })
}

pub async fn popular(State(state): State<AppState>) -> ApiResult<Json<Vec<ProductRecord>>> {
    state.search.popular().await.map(Json).map_err(|e| {
        error!("Error fetching popular products: {}", e);
        ApiError::internal(POPULAR_FAILED)
    })
}

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<ProductRecord>>> {
    state.search.all_products().await.map(Json).map_err(|e| {
        error!("Error fetching products: {}", e);
        ApiError::internal(PRODUCTS_FAILED)
    })
}

pub async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
