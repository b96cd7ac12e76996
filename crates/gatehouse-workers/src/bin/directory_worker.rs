//! Directory worker binary: consumes the directory bus and drives the
//! tenant over the Graph API.

use gatehouse_bus::BusConsumer;
use gatehouse_workers::config::DirectoryWorkerConfig;
use gatehouse_workers::directory::graph::GraphDirectory;
use gatehouse_workers::directory::DirectoryHandler;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatehouse_workers=debug".into()),
        )
        .init();

    let config = match DirectoryWorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let consumer = BusConsumer::open(&config.bus_path).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to open bus");
        std::process::exit(1);
    });

    match consumer.recover_stale(config.stale_after) {
        Ok(0) => {}
        Ok(n) => tracing::info!(requeued = n, "recovered stale claims"),
        Err(e) => tracing::warn!(error = %e, "stale claim sweep failed"),
    }

    let handler = DirectoryHandler::new(GraphDirectory::new(config.graph));

    tracing::info!("directory worker started, monitoring queue");
    consumer.run(&handler).await;
}
