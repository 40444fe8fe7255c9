#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::directory::RecipientDirectory;
use crate::adapters::push::PushProvider;
use crate::adapters::store::ContentStore;
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::domain::clock::{Clock, SystemClock};
use crate::services::account_service::AccountService;
use crate::services::content_service::ContentService;
use crate::services::dispatcher::FanoutDispatcher;
use crate::services::health_service::HealthService;
use crate::services::live_view::LiveView;
use crate::services::recipients::RecipientResolver;
use crate::services::sweeper::ExpirySweeper;
use crate::workers::{SweeperWorker, TokenJanitor};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Background loops, spawned once the servers are ready.
#[derive(Debug)]
pub struct Workers {
    sweeper: SweeperWorker,
    token_janitor: TokenJanitor,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.sweeper.run(shutdown_rx.clone()).instrument(tracing::info_span!("expiry_sweeper"))),
            tokio::spawn(self.token_janitor.run(shutdown_rx).instrument(tracing::info_span!("token_janitor"))),
        ]
    }
}

/// A fully wired application.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub sweeper: ExpirySweeper,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    store: Option<Arc<dyn ContentStore>>,
    directory: Option<Arc<dyn RecipientDirectory>>,
    push_provider: Option<Arc<dyn PushProvider>>,
    clock: Arc<dyn Clock>,
}

impl AppBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, store: None, directory: None, push_provider: None, clock: Arc::new(SystemClock) }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn RecipientDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn with_push_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.push_provider = Some(provider);
        self
    }

    /// Replaces the system clock, mainly so tests can move time by hand.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wires services and workers together.
    ///
    /// # Errors
    /// Returns an error if the store, directory, or push provider was not supplied.
    pub fn build(self) -> anyhow::Result<App> {
        let store = self.store.ok_or_else(|| anyhow::anyhow!("Content store is required"))?;
        let directory = self.directory.ok_or_else(|| anyhow::anyhow!("Recipient directory is required"))?;
        let push_provider = self.push_provider.ok_or_else(|| anyhow::anyhow!("Push provider is required"))?;
        let config = self.config;
        let clock = self.clock;

        let (token_janitor, invalid_token_tx) = TokenJanitor::new(Arc::clone(&directory), &config.push);
        let dispatcher = FanoutDispatcher::new(push_provider, &config.push).with_invalid_token_sink(invalid_token_tx);
        let resolver = RecipientResolver::new(Arc::clone(&directory));

        let content_service = ContentService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            resolver,
            dispatcher,
            config.messaging.clone(),
        );
        let live_view = LiveView::new(Arc::clone(&store), Arc::clone(&clock), &config.live_view, config.messaging.clone());
        let sweeper = ExpirySweeper::new(Arc::clone(&store), clock, &config.sweeper);
        let account_service = AccountService::new(sweeper.clone());
        let health_service = HealthService::new(store, directory, config.health.clone());

        Ok(App {
            services: ServiceContainer { content_service, live_view, account_service },
            health_service,
            sweeper: sweeper.clone(),
            workers: Workers { sweeper: SweeperWorker::new(sweeper, &config.sweeper), token_janitor },
        })
    }
}

/// Flips `shutdown_tx` on Ctrl-C or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received, draining...");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach the configured log sink.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::error!(location = %location, panic = %payload, "Thread panicked");
    }));
}
