use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

/// Message shown to clients when a search fails for any reason other than input.
pub const SEARCH_FAILED: &str = "An error occurred while scraping data.";
pub const POPULAR_FAILED: &str = "An error occurred while fetching popular products.";
pub const PRODUCTS_FAILED: &str = "An error occurred while fetching products.";

/// Error body of the public API: `{"error": "...", "code": "..."}`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InternalServerError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::InternalServerError(msg) => msg.clone(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalServerError(msg.into())
    }

    /// Input errors keep their message; everything else gets `public_message`.
    pub fn from_app_error(err: &AppError, public_message: &str) -> Self {
        match err {
            AppError::Validation(msg) => Self::bad_request(msg.clone()),
            _ => Self::internal(public_message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.message(),
            code: self.error_code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
    pub duration_ms: Option<u64>,
}

impl HealthCheck {
    pub fn healthy(name: &str, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            status: "healthy".to_string(),
            message: Some(message.into()),
            duration_ms: Some(duration_ms),
        }
    }

    pub fn unhealthy(name: &str, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            status: "unhealthy".to_string(),
            message: Some(message.into()),
            duration_ms: Some(duration_ms),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

impl HealthResponse {
    pub fn from_checks(checks: Vec<HealthCheck>, uptime_seconds: u64) -> Self {
        let status = if checks.iter().all(HealthCheck::is_healthy) {
            "healthy"
        } else {
            "unhealthy"
        };
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds,
            checks,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if self.status == "healthy" {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
