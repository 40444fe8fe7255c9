use crate::api::MgmtState;
use crate::api::schemas::HealthResponse;
use crate::error::AppError;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks the content store and the recipient directory.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (store_res, directory_res) =
        tokio::join!(state.health_service.check_store(), state.health_service.check_directory());

    let mut status_code = StatusCode::OK;
    let store_status = if let Err(e) = store_res {
        tracing::warn!(error = %e, component = "content_store", "Readiness probe failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let directory_status = if let Err(e) = directory_res {
        tracing::warn!(error = %e, component = "directory", "Readiness probe failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" }.to_string(),
        store: store_status.to_string(),
        directory: directory_status.to_string(),
    };

    (status_code, Json(response))
}

/// Runs an expiry sweep now and returns its report.
///
/// Responds 409 while another sweep is still running.
pub async fn sweep(State(state): State<MgmtState>) -> Response {
    match state.sweeper.sweep().await {
        Some(report) => Json(report).into_response(),
        None => AppError::Conflict("A sweep is already in progress".into()).into_response(),
    }
}
