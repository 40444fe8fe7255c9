//! Server-sent event endpoints backed by live-view subscriptions.
//!
//! Each connection owns one subscription. When the client disconnects axum
//! drops the stream, which cancels the subscription task.

use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::PageParams;
use crate::domain::user::UserId;
use crate::services::live_view::LiveSubscription;
use axum::{
    extract::{Path, Query, State},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Live messages between the caller and one peer.
pub async fn conversation_events(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(peer_id): Path<UserId>,
    Query(page): Query<PageParams>,
) -> impl IntoResponse {
    let subscription = state.live_view.subscribe_conversation(&auth_user.user_id, &peer_id, page.limit);
    into_sse(state.shutdown_rx.clone(), "messages", subscription)
}

/// Live messages across all of the caller's conversations.
pub async fn user_conversation_events(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> impl IntoResponse {
    let subscription = state.live_view.subscribe_user_conversations(&auth_user.user_id, page.limit);
    into_sse(state.shutdown_rx.clone(), "messages", subscription)
}

/// Live count of the caller's unread messages.
pub async fn unread_count_events(auth_user: AuthUser, State(state): State<AppState>) -> impl IntoResponse {
    let subscription = state.live_view.subscribe_unread_count(&auth_user.user_id);
    into_sse(state.shutdown_rx.clone(), "unread_count", subscription)
}

/// Live stories from every vendor.
pub async fn feed_events(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> impl IntoResponse {
    let subscription = state.live_view.subscribe_feed(page.limit);
    into_sse(state.shutdown_rx.clone(), "stories", subscription)
}

/// Live stories from one vendor.
pub async fn vendor_story_events(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(owner_id): Path<UserId>,
    Query(page): Query<PageParams>,
) -> impl IntoResponse {
    let subscription = state.live_view.subscribe_vendor_stories(&owner_id, page.limit);
    into_sse(state.shutdown_rx.clone(), "stories", subscription)
}

/// Streams every snapshot as a JSON event until the client leaves or the server shuts down.
fn into_sse<T>(
    mut shutdown_rx: watch::Receiver<bool>,
    event: &'static str,
    subscription: LiveSubscription<T>,
) -> impl IntoResponse
where
    T: Serialize + Send + 'static,
{
    let shutdown = async move {
        let _ = shutdown_rx.wait_for(|&s| s).await;
    };

    let events = subscription.map(move |snapshot| Event::default().event(event).json_data(snapshot)).take_until(shutdown);

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
