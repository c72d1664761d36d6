//! krait server binary: wire the adapters to the engine and serve the
//! command interface.

use std::sync::Arc;

use krait_adapters::{EngineConfig, InMemoryBus, InMemorySessionStore, SqliteJobStore};
use krait_engine::{HostInventory, Orchestrator, ParserRegistry, ProcessRunner};
use krait_ports::JobStore;
use krait_server::{router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env()?;
    config.validate()?;
    info!(
        db = %config.db_path,
        max_concurrent = config.max_concurrent_jobs,
        auto_exploit = config.auto_exploit,
        "starting krait"
    );

    let bus = Arc::new(InMemoryBus::new(config.event_bus_capacity));
    let store: Arc<dyn JobStore> =
        Arc::new(SqliteJobStore::connect(&config.db_path, bus.clone()).await?);
    let sessions = Arc::new(InMemorySessionStore::new());
    let inventory = Arc::new(HostInventory::new());

    let (runner, done_rx) = ProcessRunner::new(store.clone(), config.max_concurrent_jobs);
    let orchestrator = Orchestrator::new(
        store.clone(),
        runner,
        sessions.clone(),
        bus.clone(),
        inventory.clone(),
        ParserRegistry::with_defaults(),
        config.auto_exploit,
    );
    tokio::spawn(orchestrator.clone().run(done_rx));

    let state = AppState {
        orchestrator,
        store,
        sessions,
        inventory,
        events: bus,
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "command interface listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
