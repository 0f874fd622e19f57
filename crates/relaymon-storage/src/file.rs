use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

use relaymon_common::dto::MetricDto;
use relaymon_common::types::{Metric, MetricKind};

use crate::error::{Result, StoreError};
use crate::MetricStore;

/// File-persisted decorator over any other backend.
///
/// Writes go to the wrapped store first and are then flushed to disk as a
/// single JSON object mapping metric name to its wire record (write-through).
/// The mutex serializes the update-then-save sequence so concurrent writers
/// never interleave a save with a half-applied batch.
pub struct FileStore {
    inner: Arc<dyn MetricStore>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Wraps `inner`, optionally replaying state persisted at `path`.
    ///
    /// A missing file is not an error; it is treated as empty state.
    pub async fn new(inner: Arc<dyn MetricStore>, path: &Path, restore: bool) -> Result<Self> {
        let store = Self {
            inner,
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        };
        if restore {
            store.load().await?;
        }
        Ok(store)
    }

    /// Starts the periodic autosave task, or returns `None` when the
    /// interval is non-positive. The task performs one final save when the
    /// cancellation token fires, then exits.
    pub fn spawn_autosave(
        self: &Arc<Self>,
        interval_secs: i64,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if interval_secs <= 0 {
            tracing::info!(interval_secs, "autosave disabled");
            return None;
        }
        let store = Arc::clone(self);
        tracing::info!(interval_secs, path = %store.path.display(), "autosave started");
        Some(tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(interval_secs as u64));
            // Consume the immediate first tick so the first periodic save
            // happens one full interval after startup.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        if let Err(e) = store.persist().await {
                            tracing::error!(error = %e, "final save failed");
                        }
                        tracing::info!("autosave stopped");
                        return;
                    }
                    _ = tick.tick() => {
                        if let Err(e) = store.persist().await {
                            tracing::error!(error = %e, "autosave failed");
                        }
                    }
                }
            }
        }))
    }

    async fn load(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no persisted state, starting empty");
                return Ok(());
            }
            Err(e) => {
                return Err(StoreError::File {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        let records: HashMap<String, MetricDto> = serde_json::from_slice(&raw)?;
        for (name, dto) in records {
            match dto.kind.parse::<MetricKind>() {
                Ok(MetricKind::Gauge) => {
                    self.inner
                        .update_gauge(&name, dto.value.unwrap_or(0.0))
                        .await?;
                }
                Ok(MetricKind::Counter) => {
                    self.inner
                        .update_counter(&name, dto.delta.unwrap_or(0))
                        .await?;
                }
                Err(_) => {
                    tracing::warn!(name = %name, kind = %dto.kind, "skipping persisted record of unknown kind");
                }
            }
        }
        tracing::info!(path = %self.path.display(), "restored persisted state");
        Ok(())
    }

    /// Serializes the wrapped store's full state to disk. Callers hold the
    /// write lock.
    async fn save(&self) -> Result<()> {
        let metrics = self.inner.get_all().await?;
        let records: HashMap<String, MetricDto> = metrics
            .into_iter()
            .map(|(name, m)| (name, MetricDto::from(m)))
            .collect();
        let data = serde_json::to_vec(&records)?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| StoreError::File {
                path: self.path.display().to_string(),
                source: e,
            })
    }
}

#[async_trait]
impl MetricStore for FileStore {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<Metric> {
        let _guard = self.write_lock.lock().await;
        let metric = self.inner.update_gauge(name, value).await?;
        if let Err(e) = self.save().await {
            tracing::warn!(error = %e, "write-through save failed");
        }
        Ok(metric)
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<Metric> {
        let _guard = self.write_lock.lock().await;
        let metric = self.inner.update_counter(name, delta).await?;
        if let Err(e) = self.save().await {
            tracing::warn!(error = %e, "write-through save failed");
        }
        Ok(metric)
    }

    async fn get_metric(&self, name: &str, kind: MetricKind) -> Result<Option<Metric>> {
        self.inner.get_metric(name, kind).await
    }

    async fn get_all(&self) -> Result<HashMap<String, Metric>> {
        self.inner.get_all().await
    }

    async fn update_batch(&self, batch: &[Metric]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.inner.update_batch(batch).await?;
        if let Err(e) = self.save().await {
            tracing::warn!(error = %e, "write-through save failed");
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save().await
    }
}
