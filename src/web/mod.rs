use axum::{
    Router,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::AppConfig;
use crate::search_manager::SearchManager;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use handlers::{health_check, list_products, popular, render_metrics, root, search};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchManager>,
    pub metrics: Option<PrometheusHandle>,
    pub config: AppConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(search: Arc<SearchManager>, metrics: Option<PrometheusHandle>, config: AppConfig) -> Self {
        Self {
            search,
            metrics,
            config,
            started_at: Instant::now(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api", api_routes());

    if state.metrics.is_some() && state.config.metrics.port == state.config.server.port {
        router = router.route(&state.config.metrics.endpoint, get(render_metrics));
    }

    let request_timeout = Duration::from_secs(state.config.server.request_timeout);

    router
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Standalone router for a metrics port separate from the API.
pub fn metrics_router(state: AppState) -> Router {
    let endpoint = state.config.metrics.endpoint.clone();
    Router::new()
        .route(&endpoint, get(render_metrics))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(search))
        .route("/popular", get(popular))
        .route("/products", get(list_products))
}
