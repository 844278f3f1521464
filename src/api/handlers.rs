use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::alerts::{Alert, NotifierError, PagerError, PagerHandle, ServiceError, ServiceStatus};

/// Application state shared across handlers
pub struct AppState {
    pub pager: PagerHandle,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Deserialize)]
pub struct AlertRequest {
    pub monitored_service_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
pub struct AlertResponse {
    pub accepted: bool,
}

pub async fn receive_alert(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AlertRequest>,
) -> Result<(StatusCode, Json<AlertResponse>), ApiError> {
    let alert = Alert::new(request.monitored_service_id, request.message);
    state.pager.receive(alert).await?;

    Ok((StatusCode::ACCEPTED, Json(AlertResponse { accepted: true })))
}

// ============================================================================
// Service Health
// ============================================================================

#[derive(Serialize)]
pub struct ServicesResponse {
    pub unhealthy: Vec<String>,
}

pub async fn list_unhealthy(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ServicesResponse>, ApiError> {
    let unhealthy = state.pager.unhealthy_services().await?;
    Ok(Json(ServicesResponse { unhealthy }))
}

pub async fn service_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ServiceStatus>, ApiError> {
    Ok(Json(state.pager.status(id).await?))
}

pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ServiceStatus>, ApiError> {
    state.pager.mark_as_healthy(id.as_str()).await?;
    Ok(Json(state.pager.status(id).await?))
}

pub async fn mark_unhealthy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ServiceStatus>, ApiError> {
    state.pager.mark_as_unhealthy(id.as_str()).await?;
    Ok(Json(state.pager.status(id).await?))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    Internal(String),
    Unavailable(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Pager(PagerError::UnmonitoredService(_)) => ApiError::NotFound(message),
            ServiceError::Pager(PagerError::NotUnhealthy(_)) => ApiError::Conflict(message),
            ServiceError::Pager(PagerError::Notifier(NotifierError::UnsupportedTarget(_))) => {
                ApiError::Internal(message)
            }
            ServiceError::Closed => ApiError::Unavailable(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
