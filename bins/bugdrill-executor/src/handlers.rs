// HTTP route handlers for the bugdrill executor

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bugdrill_common::{EngineError, ExecutionRequest, ExecutionResult, GradeRequest, GradingReport};
use bugdrill_engine::grade;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::metrics;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
}

/// Engine failure surfaced over HTTP
pub struct ApiError {
    endpoint: &'static str,
    error: EngineError,
}

impl ApiError {
    fn new(endpoint: &'static str, error: EngineError) -> Self {
        Self { endpoint, error }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, classification) = if self.error.is_client_error() {
            (StatusCode::BAD_REQUEST, None)
        } else {
            (StatusCode::BAD_GATEWAY, Some("launch_failure"))
        };

        match &self.error {
            EngineError::UnsupportedLanguage(_) => metrics::record_rejected("unsupported_language"),
            EngineError::Validation(_) => metrics::record_rejected("validation"),
            EngineError::Launch(_) => {}
        }
        metrics::record_request(self.endpoint, status.as_u16());

        if status.is_server_error() {
            warn!(endpoint = self.endpoint, "Sandbox launch failed: {}", self.error);
        } else {
            info!(endpoint = self.endpoint, "Rejected request: {}", self.error);
        }

        let body = ErrorResponse {
            error: self.error.to_string(),
            classification,
        };
        (status, Json(body)).into_response()
    }
}

/// POST /execute - Run code once and return the raw result
pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecutionRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    info!(
        language = %payload.language,
        source_bytes = payload.source.len(),
        "Received execution request"
    );

    let result = state
        .gateway
        .execute(&payload)
        .await
        .map_err(|e| ApiError::new("execute", e))?;

    metrics::record_request("execute", StatusCode::OK.as_u16());

    Ok(Json(result))
}

/// POST /grade - Baseline run plus one harnessed run per test case
pub async fn grade_submission(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<GradingReport>, ApiError> {
    info!(
        language = %payload.language,
        source_bytes = payload.code.len(),
        test_count = payload.test_cases.len(),
        "Received grading request"
    );

    let report = grade(state.gateway.as_ref(), &payload, state.grade_options)
        .await
        .map_err(|e| ApiError::new("grade", e))?;

    metrics::record_grading(&report);
    metrics::record_request("grade", StatusCode::OK.as_u16());

    Ok(Json(report))
}

/// GET|HEAD /health - Liveness of this service only
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        service: "executor",
        status: "healthy",
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}
