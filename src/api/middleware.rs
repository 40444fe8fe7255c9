use crate::api::AppState;
use crate::domain::user::UserId;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{Request, request::Parts},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the caller's identity, set by the upstream auth gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(USER_ID_HEADER).ok_or(AppError::AuthError)?;
        let raw = header.to_str().map_err(|_| AppError::AuthError)?;
        let user_id = UserId::parse(raw).map_err(|_| AppError::AuthError)?;

        tracing::Span::current().record("user_id", tracing::field::display(&user_id));
        Ok(Self { user_id })
    }
}

/// Keeps a valid incoming `x-request-id`, otherwise generates a UUID v4.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        if let Some(existing) = request.headers().get("x-request-id")
            && existing.to_str().is_ok_and(|s| !s.is_empty() && s.len() <= 128)
        {
            return Some(RequestId::new(existing.clone()));
        }
        Uuid::new_v4().to_string().parse().ok().map(RequestId::new)
    }
}
