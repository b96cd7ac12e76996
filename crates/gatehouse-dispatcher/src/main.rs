//! gatehouse-dispatcher binary — LISTEN loop with resume and reconnect.
//!
//! Lifecycle per connection: resume the backlog first, then LISTEN and
//! block on notifications with a bounded timeout. Any database error
//! tears the connection down and the whole sequence restarts under
//! exponential backoff; the resume pass is idempotent because processed
//! rows are filtered out.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgListener, PgPoolOptions};

use gatehouse_dispatcher::config::DispatcherConfig;
use gatehouse_dispatcher::effector::HttpEffectorClient;
use gatehouse_dispatcher::Dispatcher;
use gatehouse_postgres::PgStores;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// The timeout exists to tolerate lost notifications, not as an
/// optimization: a wakeup that never arrives costs at most one minute.
const NOTIFY_WAIT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatehouse_dispatcher=debug".into()),
        )
        .init();

    let config = match DispatcherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        channel = %config.watch_channel,
        batch_size = config.batch_size,
        poll_interval = ?config.poll_interval,
        "dispatcher starting"
    );

    let mut backoff = INITIAL_BACKOFF;
    loop {
        if let Err(e) = run_connected(&config, &mut backoff).await {
            tracing::error!(error = %e, "listener error");
            tracing::info!(?backoff, "reconnecting after backoff");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

/// One connection lifetime. Returns only on error; the caller rebuilds
/// everything from scratch.
async fn run_connected(
    config: &DispatcherConfig,
    backoff: &mut Duration,
) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    tracing::info!("connected to database");

    let stores = PgStores::new(pool.clone());
    let dispatcher = Dispatcher::new(
        Arc::new(stores.changes),
        Arc::new(stores.routes),
        Arc::new(stores.attempts),
        Arc::new(HttpEffectorClient::new(config.http_timeout)?),
        config.batch_size,
        config.policy.clone(),
    );

    // Drain anything that accumulated while we were down, before
    // subscribing, so nothing is dispatched out of id order.
    dispatcher.resume().await?;

    let mut listener = PgListener::connect_with(&pool).await?;
    listener.listen(&config.watch_channel).await?;
    tracing::info!(channel = %config.watch_channel, "listening");

    *backoff = INITIAL_BACKOFF;

    loop {
        match tokio::time::timeout(NOTIFY_WAIT, listener.recv()).await {
            Ok(Ok(_notification)) => {
                // The payload is just a wake signal. Drain whatever else
                // is buffered so an insert storm costs one pass, not one
                // pass per notification.
                drain_notifications(&mut listener).await;
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_elapsed) => {
                tracing::debug!("notification wait timed out; checking for unprocessed rows");
            }
        }

        let summary = dispatcher.run_pass().await?;
        if summary.processed + summary.failed + summary.skipped > 0 {
            tracing::info!(
                processed = summary.processed,
                failed = summary.failed,
                skipped = summary.skipped,
                "pass complete"
            );
        }
    }
}

async fn drain_notifications(listener: &mut PgListener) {
    while let Ok(result) = tokio::time::timeout(Duration::ZERO, listener.recv()).await {
        if result.is_err() {
            break;
        }
    }
}
