mod config;
mod crypto;
mod pipeline;
mod snapshot;
mod transport;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use relaymon_collector::runtime::RuntimeCollector;
use relaymon_collector::system::SystemCollector;

use crate::pipeline::{spawn_reporter, spawn_sampler, spawn_workers, QUEUE_DEPTH_PER_WORKER};
use crate::snapshot::{SharedSnapshot, Snapshot};
use crate::transport::TransportClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("relaymon=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());
    let config = config::AgentConfig::load(&config_path)?;

    tracing::info!(
        server = %config.server_address,
        poll_secs = config.poll_interval_secs,
        report_secs = config.report_interval_secs,
        workers = config.rate_limit,
        "relaymon-agent starting"
    );

    let client = TransportClient::connect(&config).await?;

    let snapshot: SharedSnapshot = Arc::new(RwLock::new(Snapshot::default()));
    let shutdown = CancellationToken::new();
    let (queue_tx, queue_rx) = mpsc::channel(config.rate_limit * QUEUE_DEPTH_PER_WORKER);

    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let report_interval = Duration::from_secs(config.report_interval_secs);

    let mut handles = vec![
        spawn_sampler(
            Box::new(RuntimeCollector::new()?),
            snapshot.clone(),
            poll_interval,
            true,
            shutdown.clone(),
        ),
        spawn_sampler(
            Box::new(SystemCollector::new()),
            snapshot.clone(),
            poll_interval,
            false,
            shutdown.clone(),
        ),
        spawn_reporter(
            snapshot.clone(),
            report_interval,
            queue_tx,
            shutdown.clone(),
        ),
    ];
    handles.extend(spawn_workers(config.rate_limit, queue_rx, client));

    signal::ctrl_c().await?;
    tracing::info!("shutting down, draining in-flight batches");
    shutdown.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "pipeline task panicked");
        }
    }

    tracing::info!("agent stopped");
    Ok(())
}
