//! Board worker binary: consumes the board bus and drives the physical
//! access controller. The only process with a path to the device.

use gatehouse_bus::BusConsumer;
use gatehouse_workers::board::uhppote::UhppoteDriver;
use gatehouse_workers::board::BoardHandler;
use gatehouse_workers::config::BoardWorkerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatehouse_workers=debug".into()),
        )
        .init();

    let config = match BoardWorkerConfig::from_env() {
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

    let driver = UhppoteDriver::new(config.device_id, config.endpoint);
    let handler = BoardHandler::new(driver);

    tracing::info!(device_id = config.device_id, "board worker started, monitoring queue");
    consumer.run(&handler).await;
}
