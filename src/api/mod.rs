use crate::services::account_service::AccountService;
use crate::services::content_service::ContentService;
use crate::services::health_service::HealthService;
use crate::services::live_view::LiveView;
use crate::services::sweeper::ExpirySweeper;
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod account;
pub mod broadcasts;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod schemas;
pub mod streams;

#[derive(Clone, Debug)]
pub struct AppState {
    pub content_service: ContentService,
    pub live_view: LiveView,
    pub account_service: AccountService,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
    pub sweeper: ExpirySweeper,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub content_service: ContentService,
    pub live_view: LiveView,
    pub account_service: AccountService,
}

/// Configures and returns the primary application router.
pub fn app_router(services: ServiceContainer, shutdown_rx: tokio::sync::watch::Receiver<bool>) -> Router {
    let state = AppState {
        content_service: services.content_service,
        live_view: services.live_view,
        account_service: services.account_service,
        shutdown_rx,
    };

    let api_routes = Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .route("/broadcasts", post(broadcasts::post_broadcast))
        .route("/stories/{id}", get(broadcasts::get_story))
        .route("/conversations/events", get(streams::user_conversation_events))
        .route("/conversations/{peer_id}/events", get(streams::conversation_events))
        .route("/unread/events", get(streams::unread_count_events))
        .route("/feed/events", get(streams::feed_events))
        .route("/vendors/{owner_id}/stories/events", get(streams::vendor_story_events))
        .route("/account/content", delete(account::purge_content));

    Router::new()
        .nest("/v1", api_routes)
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            middleware::MakeRequestUuidOrHeader,
        ))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .route("/sweep", post(health::sweep))
        .with_state(state)
}
