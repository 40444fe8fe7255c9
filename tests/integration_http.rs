#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, missing_debug_implementations, clippy::clone_on_ref_ptr, unreachable_pub)]
use axum::http::StatusCode;
use futures::StreamExt;
use serde_json::{Value, json};
use std::time::Duration;
mod common;

impl common::TestApp {
    fn post_as(&self, user_id: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}/v1{path}", self.api_url)).header("x-user-id", user_id)
    }

    fn get_as(&self, user_id: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}/v1{path}", self.api_url)).header("x-user-id", user_id)
    }
}

#[tokio::test]
async fn test_message_lifecycle_over_http() {
    let app = common::TestApp::spawn().await;

    let resp = app.post_as("amy", "/messages").json(&json!({"to_id": "bob", "text": "Honey is back"})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = resp.json::<Value>().await.unwrap()["id"].as_str().unwrap().to_string();

    let resp = app.get_as("bob", &format!("/messages/{id}")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["payload"]["text"], "Honey is back");
    assert_eq!(body["owner_id"], "amy");
    assert_eq!(body["target_id"], "bob");
    assert_eq!(body["read"], false);

    let resp = app.get_as("cal", &format!("/messages/{id}")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.post_as("amy", &format!("/messages/{id}/read")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = app.post_as("bob", &format!("/messages/{id}/read")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    app.advance(time::Duration::hours(24));
    let resp = app.get_as("bob", &format!("/messages/{id}")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requests_without_identity_are_rejected() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/messages", app.api_url))
        .json(&json!({"to_id": "bob", "text": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app.post_as("a_b", "/messages").json(&json!({"to_id": "bob", "text": "hi"})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_input_is_a_bad_request() {
    let app = common::TestApp::spawn().await;

    let resp = app.post_as("amy", "/messages").json(&json!({"to_id": "amy", "text": "me"})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("yourself"));

    let resp = app.post_as("farm", "/broadcasts").json(&json!({"text": "x", "media_ref": "y"})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_story_is_readable_until_it_expires() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .post_as("farm", "/broadcasts")
        .json(&json!({"media_ref": "media/corn.jpg", "caption": "Sweet corn"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = resp.json::<Value>().await.unwrap()["id"].as_str().unwrap().to_string();

    let body: Value = app.get_as("ann", &format!("/stories/{id}")).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["kind"], "story");
    assert_eq!(body["payload"]["type"], "media");
    assert_eq!(body["payload"]["caption"], "Sweet corn");

    app.advance(time::Duration::hours(24));
    let resp = app.get_as("ann", &format!("/stories/{id}")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unread_count_streams_over_sse() {
    let app = common::TestApp::spawn().await;

    let resp = app.get_as("bob", "/unread/events").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let mut body = Box::pin(resp.bytes_stream());
    let mut seen = String::new();

    read_until(&mut body, &mut seen, "data: 0").await;
    app.content_service.send_message(&common::user("amy"), &common::user("bob"), "ping").await.unwrap();
    read_until(&mut body, &mut seen, "data: 1").await;
}

async fn read_until<S, B>(body: &mut S, seen: &mut String, needle: &str)
where
    S: futures::Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    while !seen.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(2), body.next()).await.unwrap().unwrap().unwrap();
        seen.push_str(&String::from_utf8_lossy(chunk.as_ref()));
    }
}

#[tokio::test]
async fn test_account_purge_over_http() {
    let app = common::TestApp::spawn().await;
    app.post_as("amy", "/messages").json(&json!({"to_id": "bob", "text": "one"})).send().await.unwrap();
    app.post_as("bob", "/messages").json(&json!({"to_id": "amy", "text": "two"})).send().await.unwrap();
    app.post_as("amy", "/broadcasts").json(&json!({"text": "stall closed"})).send().await.unwrap();

    let resp = app.client.delete(format!("{}/v1/account/content", app.api_url)).header("x-user-id", "amy").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["counts_by_kind"]["message"], 2);
    assert_eq!(report["counts_by_kind"]["story"], 1);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_management_probes_and_sweep() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/livez", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "ok");
    assert_eq!(body["directory"], "ok");

    app.content_service.send_message(&common::user("amy"), &common::user("bob"), "old news").await.unwrap();
    app.advance(time::Duration::hours(25));

    let resp = app.client.post(format!("{}/sweep", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["counts_by_kind"]["message"], 1);
    assert_eq!(report["counts_by_kind"]["story"], 0);
    assert!(app.store.is_empty());
}
