use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::domain::sweep::SweepReport;
use crate::error::{AppError, Result};
use axum::{Json, extract::State};

/// Deletes every message and story involving the caller.
///
/// An incomplete purge answers 500 so the caller retries; purging is idempotent.
pub async fn purge_content(auth_user: AuthUser, State(state): State<AppState>) -> Result<Json<SweepReport>> {
    let report = state.account_service.purge_all_content_for(&auth_user.user_id).await;
    if !report.errors.is_empty() {
        return Err(AppError::Internal);
    }
    Ok(Json(report))
}
