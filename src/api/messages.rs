use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::{CreatedResponse, SendMessageRequest};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Sends a direct message from the caller.
///
/// # Errors
/// Returns `AppError::InvalidArgument` for self-messaging, blank text, or text over the length cap.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let id = state.content_service.send_message(&auth_user.user_id, &request.to_id, &request.text).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Fetches a live message the caller sent or received.
///
/// # Errors
/// Returns `AppError::NotFound` if the message is missing, expired, or not the caller's.
pub async fn get_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let message = state.live_view.get_message(id).await?;
    // Other users' messages look exactly like missing ones.
    if !message.involves(&auth_user.user_id) {
        return Err(AppError::NotFound);
    }
    Ok(Json(message))
}

/// Marks a message addressed to the caller as read.
///
/// # Errors
/// Returns `AppError::NotFound` if the message is missing or expired.
/// Returns `AppError::PermissionDenied` if the caller is not the recipient.
pub async fn mark_read(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.content_service.mark_read(&auth_user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
