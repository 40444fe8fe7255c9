#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::clone_on_ref_ptr, unreachable_pub)]
#![allow(dead_code)]
use async_trait::async_trait;
use clap::Parser;
use market_ephemera::adapters::memory::{InMemoryContentStore, InMemoryDirectory};
use market_ephemera::adapters::push::{PushError, PushProvider};
use market_ephemera::api::{MgmtState, ServiceContainer};
use market_ephemera::config::Config;
use market_ephemera::domain::clock::ManualClock;
use market_ephemera::domain::notification::PushNotification;
use market_ephemera::domain::user::UserId;
use market_ephemera::services::content_service::ContentService;
use market_ephemera::services::live_view::LiveView;
use market_ephemera::services::sweeper::ExpirySweeper;
use market_ephemera::AppBuilder;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::watch;

static INIT: Once = Once::new();

pub const START: OffsetDateTime = datetime!(2026-06-06 07:00 UTC);

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("market_ephemera=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

pub fn get_test_config() -> Config {
    Config::parse_from([
        "market-ephemera",
        "--host",
        "127.0.0.1",
        "--port",
        "0",
        "--mgmt-port",
        "0",
        "--live-refresh-interval-ms",
        "20",
        "--sweep-interval-secs",
        "0",
        "--push-send-timeout-ms",
        "200",
        "--janitor-batch-size",
        "1",
    ])
}

pub fn user(raw: &str) -> UserId {
    UserId::parse(raw).unwrap()
}

/// Push provider that records every send and fails the tokens it is told to.
#[derive(Debug, Default)]
pub struct RecordingPushProvider {
    sent: Mutex<Vec<(String, PushNotification)>>,
    unregistered: Mutex<HashSet<String>>,
    broken: Mutex<HashSet<String>>,
}

impl RecordingPushProvider {
    pub fn unregister(&self, token: &str) {
        self.unregistered.lock().unwrap().insert(token.to_string());
    }

    pub fn break_token(&self, token: &str) {
        self.broken.lock().unwrap().insert(token.to_string());
    }

    pub fn sent(&self) -> Vec<(String, PushNotification)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.sent().into_iter().map(|(token, _)| token).collect();
        tokens.sort();
        tokens
    }
}

#[async_trait]
impl PushProvider for RecordingPushProvider {
    async fn send_push(&self, token: &str, notification: &PushNotification) -> Result<(), PushError> {
        self.sent.lock().unwrap().push((token.to_string(), notification.clone()));
        if self.unregistered.lock().unwrap().contains(token) {
            return Err(PushError::Unregistered);
        }
        if self.broken.lock().unwrap().contains(token) {
            return Err(PushError::Other(anyhow::anyhow!("provider rejected {token}")));
        }
        Ok(())
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub struct TestApp {
    pub config: Config,
    pub api_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub store: InMemoryContentStore,
    pub directory: InMemoryDirectory,
    pub push: Arc<RecordingPushProvider>,
    pub clock: ManualClock,
    pub content_service: ContentService,
    pub live_view: LiveView,
    pub sweeper: ExpirySweeper,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let store = InMemoryContentStore::new();
        let directory = InMemoryDirectory::new();
        let push = Arc::new(RecordingPushProvider::default());
        let clock = ManualClock::new(START);

        let app = AppBuilder::new(config.clone())
            .with_store(Arc::new(store.clone()))
            .with_directory(Arc::new(directory.clone()))
            .with_push_provider(push.clone())
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        let ServiceContainer { content_service, live_view, account_service } = app.services;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app_router = market_ephemera::api::app_router(
            ServiceContainer {
                content_service: content_service.clone(),
                live_view: live_view.clone(),
                account_service,
            },
            shutdown_rx.clone(),
        );
        let mgmt_router = market_ephemera::api::mgmt_router(MgmtState {
            health_service: app.health_service,
            sweeper: app.sweeper.clone(),
        });

        let api_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}", api_listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, app_router)
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });
        let mut mgmt_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router)
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });
        let _workers = app.workers.spawn_all(shutdown_rx);

        Self {
            config,
            api_url,
            mgmt_url,
            client: reqwest::Client::new(),
            store,
            directory,
            push,
            clock,
            content_service,
            live_view,
            sweeper: app.sweeper,
            shutdown_tx,
        }
    }

    pub fn advance(&self, by: time::Duration) {
        self.clock.advance(by);
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
