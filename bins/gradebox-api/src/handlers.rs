// HTTP route handlers for the Gradebox API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use gradebox_common::types::Submission;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::engine::ExecutionError;
use crate::executor::SubmitError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

/// HTTP status for a failed submission
pub fn status_for(error: &SubmitError) -> StatusCode {
    match error {
        SubmitError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
        SubmitError::Execution(ExecutionError::TimedOut(_)) => StatusCode::GATEWAY_TIMEOUT,
        SubmitError::Injection(_) | SubmitError::Execution(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// POST /run-test - Assemble, run and grade a submission
pub async fn run_submission(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Submission>, JsonRejection>,
) -> Response {
    let Json(submission) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Invalid submission body");
            return error_response(
                rejection.status(),
                format!("Invalid JSON format: {}", rejection.body_text()),
            );
        }
    };

    match state.pipeline.execute(&submission).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /languages - Configured languages and the grading strategy
pub async fn list_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "languages": state.pipeline.languages().names(),
        "grading_strategy": state.pipeline.options().strategy,
    }))
}
