//! Energy ledger service.
//!
//! Serves per-home dashboards, energy reports and savings projections over
//! HTTP. Configuration comes from `LEDGER_*` environment variables; see
//! [`energy_ledger::config`].

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use energy_ledger::api::{AppState, router};
use energy_ledger::config::Config;
use energy_ledger::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("energy_ledger=info".parse()?))
        .init();

    let config = Config::from_env();

    info!(port = config.port, db_url = %config.database_url, "Starting energy ledger");

    let storage = Storage::new(&config.database_url).await?;
    info!("Database initialized");

    let app = router(AppState::new(storage, config.savings));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Energy ledger is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
