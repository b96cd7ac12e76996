//! Shared bootstrap for the three effector binaries: tracing, config,
//! member store pool, bus adapters, bind and serve.

use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use gatehouse_postgres::PgStores;

use crate::board::BusAccessController;
use crate::config::EffectorConfig;
use crate::directory::BusDirectoryAccount;
use crate::EffectorState;

pub async fn run(
    service_name: &'static str,
    default_bind: &str,
    build_router: fn(EffectorState) -> Router,
) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatehouse_effectors=debug".into()),
        )
        .init();

    let config = match EffectorConfig::from_env(default_bind) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(service = service_name, error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    tracing::info!(service = service_name, "connected to database");

    let stores = PgStores::new(pool);
    let board = BusAccessController::open(&config.board_bus_path, config.bus_timeout)
        .expect("failed to open board bus");
    let directory = BusDirectoryAccount::open(&config.directory_bus_path, config.bus_timeout)
        .expect("failed to open directory bus");

    let state = EffectorState {
        service_name,
        members: Arc::new(stores.members),
        board: Arc::new(board),
        directory: Arc::new(directory),
    };

    let app = build_router(state);
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {}: {e}", config.bind_addr));
    tracing::info!(service = service_name, addr = %config.bind_addr, "listening");

    axum::serve(listener, app).await.expect("server error");
}
