//! Shared REST state, error mapping and operational endpoints.

use crate::jobs::DispatchJobRegistry;
use academy_core::error::AcademyError;
use academy_store::DirectoryStore;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use utoipa::ToSchema;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DirectoryStore>,
    pub jobs: Arc<DispatchJobRegistry>,
    /// Default for the `{school_name}` placeholder.
    pub school_name: String,
    pub start_time: Instant,
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

/// Map a domain error onto an HTTP status and JSON body.
pub fn api_error(e: AcademyError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        AcademyError::Validation(_) => StatusCode::BAD_REQUEST,
        AcademyError::NotFound(_) => StatusCode::NOT_FOUND,
        AcademyError::Provider(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, "Request failed");
        metrics::counter!("api.errors").increment(1);
    } else {
        metrics::counter!("api.client_errors").increment(1);
    }
    (
        status,
        Json(ErrorResponse {
            error: e.code().to_string(),
            message: e.to_string(),
        }),
    )
}

/// GET /health: Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: Readiness probe.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses((status = 200, description = "Ready to accept traffic"))
)]
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live: Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}
