use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

use relaymon_collector::Collector;
use relaymon_common::dto::MetricDto;

use crate::snapshot::SharedSnapshot;
use crate::transport::TransportClient;

/// Work-queue capacity per dispatch worker. A full queue blocks the reporter
/// until a worker drains space; batches are never dropped or buffered
/// unboundedly.
pub const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Runs one collector on the poll interval, merging its readings into the
/// shared snapshot under the write lock.
///
/// The sampler that owns the snapshot generation (`advance_generation`)
/// additionally bumps `poll_count` and redraws `random_value` on every tick.
pub fn spawn_sampler(
    mut collector: Box<dyn Collector>,
    snapshot: SharedSnapshot,
    poll_interval: Duration,
    advance_generation: bool,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = collector.name().to_string();
        let mut tick = interval(poll_interval);
        // The first interval tick resolves immediately; consume it so the
        // loop fires one poll interval from now, like a ticker.
        tick.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(collector = %name, "sampler stopped");
                    return;
                }
                _ = tick.tick() => {
                    match collector.collect() {
                        Ok(readings) => {
                            let mut snap = snapshot.write().await;
                            snap.apply(readings);
                            if advance_generation {
                                snap.poll_count += 1;
                                snap.random_value = rand::random::<f64>() * 100.0;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(collector = %name, error = %e, "sampling failed");
                        }
                    }
                }
            }
        }
    })
}

/// Copies the snapshot on the report interval and enqueues it as one batch.
///
/// The copy happens under the read lock, so no torn state from a concurrent
/// sampler tick is ever observed. Holds the only queue sender: when this
/// task exits, the queue closes and the workers drain and stop.
pub fn spawn_reporter(
    snapshot: SharedSnapshot,
    report_interval: Duration,
    queue: mpsc::Sender<Vec<MetricDto>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(report_interval);
        tick.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("reporter stopped");
                    return;
                }
                _ = tick.tick() => {
                    let batch = { snapshot.read().await.to_batch() };
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        sent = queue.send(batch) => {
                            if sent.is_err() {
                                tracing::warn!("work queue closed, reporter exiting");
                                return;
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Starts the dispatch worker pool.
///
/// Workers share the queue receiver and keep draining it until it is closed
/// and empty, so every batch enqueued before shutdown is still attempted.
/// Delivery failures are logged, not retried.
pub fn spawn_workers(
    count: usize,
    queue: mpsc::Receiver<Vec<MetricDto>>,
    client: TransportClient,
) -> Vec<JoinHandle<()>> {
    let queue = Arc::new(Mutex::new(queue));
    (0..count)
        .map(|worker_id| {
            let queue = Arc::clone(&queue);
            let mut client = client.clone();
            tokio::spawn(async move {
                loop {
                    let batch = { queue.lock().await.recv().await };
                    let Some(batch) = batch else {
                        tracing::debug!(worker = worker_id, "work queue drained, worker exiting");
                        return;
                    };
                    if let Err(e) = client.send_batch(&batch).await {
                        tracing::error!(worker = worker_id, error = %e, "failed to send metrics batch");
                    }
                }
            })
        })
        .collect()
}
