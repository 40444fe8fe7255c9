use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::{BroadcastRequest, CreatedResponse};
use crate::domain::content::Payload;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Posts a story to the caller's followers.
///
/// # Errors
/// Returns `AppError::InvalidArgument` if the request does not describe exactly one valid payload.
pub async fn post_broadcast(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<impl IntoResponse> {
    let payload = Payload::try_from(request)?;
    let id = state.content_service.post_broadcast(&auth_user.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Fetches a live story.
///
/// # Errors
/// Returns `AppError::NotFound` if the story is missing or expired.
pub async fn get_story(_auth_user: AuthUser, State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    Ok(Json(state.live_view.get_story(id).await?))
}
