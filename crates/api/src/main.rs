use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use domain::services::WaitlistPromoter;
use domain::store::{AdmissionStore, InMemoryAdmissionStore};
use event_rsvp_api::app;
use event_rsvp_api::config::{Config, StorageBackend};
use event_rsvp_api::jobs::{JobScheduler, PoolMetricsJob, PromotionSweepJob};
use event_rsvp_api::middleware::{init_metrics, logging::init_logging};
use persistence::PgAdmissionStore;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting Event RSVP API v{}", env!("CARGO_PKG_VERSION"));

    let mut scheduler = JobScheduler::new();
    let lock_timeout = config.admission.lock_timeout();

    let store: Arc<dyn AdmissionStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = persistence::db::create_pool(&(&config.database).into()).await?;

            info!("Running database migrations...");
            persistence::db::run_migrations(&pool).await?;
            info!("Migrations completed");

            scheduler.register(PoolMetricsJob::new(pool.clone()));
            Arc::new(PgAdmissionStore::new(pool, lock_timeout))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory admission store; state is lost on restart");
            Arc::new(InMemoryAdmissionStore::new(lock_timeout))
        }
    };

    if config.admission.sweep_interval_secs > 0 {
        let promoter = WaitlistPromoter::new(store.clone(), config.admission.retry_policy());
        scheduler.register(PromotionSweepJob::new(
            promoter,
            config.admission.sweep_interval_secs,
        ));
    }
    scheduler.start();

    let addr = config.socket_addr()?;
    let app = app::create_app(config, store);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
