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

use market_ephemera::adapters::directory::RecipientDirectory;
use market_ephemera::adapters::store::ContentStore;
use market_ephemera::api::MgmtState;
use market_ephemera::config::Config;
use market_ephemera::{AppBuilder, adapters, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    market_ephemera::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx, workers) = async {
        // Phase 1: Infrastructure Setup (Resources)
        let (store, directory): (Arc<dyn ContentStore>, Arc<dyn RecipientDirectory>) =
            if let Some(url) = &config.database_url {
                let pool = adapters::database::init_pool(url, &config.database).await?;
                adapters::database::run_migrations(&pool).await?;
                (
                    Arc::new(adapters::database::PostgresContentStore::new(pool.clone())),
                    Arc::new(adapters::database::PostgresDirectory::new(pool)),
                )
            } else {
                tracing::warn!("No database URL configured, content will not survive a restart");
                (
                    Arc::new(adapters::memory::InMemoryContentStore::new()),
                    Arc::new(adapters::memory::InMemoryDirectory::new()),
                )
            };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        market_ephemera::spawn_signal_handler(shutdown_tx.clone());

        // Phase 2: Component Wiring (Pure logic, no side effects)
        let push_provider = Arc::new(adapters::push::fcm::FcmPushProvider);
        let app = AppBuilder::new(config.clone())
            .with_store(store)
            .with_directory(directory)
            .with_push_provider(push_provider)
            .build()?;

        // Phase 3: Runtime Setup (Listeners and Routers)
        let app_router = market_ephemera::api::app_router(app.services, shutdown_rx.clone());
        let mgmt_app =
            market_ephemera::api::mgmt_router(MgmtState { health_service: app.health_service, sweeper: app.sweeper });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<
            (
                tokio::net::TcpListener,
                tokio::net::TcpListener,
                axum::Router,
                axum::Router,
                watch::Sender<bool>,
                watch::Receiver<bool>,
                market_ephemera::Workers,
            ),
            anyhow::Error,
        >((api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx, app.workers))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Start Runtime (Explicit Spawning and Listening)
    let worker_tasks = workers.spawn_all(shutdown_rx.clone());

    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router).with_graceful_shutdown(async move {
        let _ = api_rx.wait_for(|&s| s).await;
    });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app).with_graceful_shutdown(async move {
        let _ = mgmt_rx.wait_for(|&s| s).await;
    });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: Graceful Shutdown Orchestration
    let _ = shutdown_tx.send(true);
    tokio::select! {
        () = async {
            futures::future::join_all(worker_tasks).await;
        } => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}
