//! Persistence layer for ingested metrics.
//!
//! One capability contract ([`MetricStore`]) with three interchangeable
//! backends: a plain in-memory map ([`memory::MemoryStore`]), a
//! file-persisted decorator over any other backend ([`file::FileStore`]),
//! and a PostgreSQL repository with race-safe conditional upserts
//! ([`pg::PgMetricStore`]). [`build_store`] picks the backend from the
//! server configuration.

pub mod entities;
pub mod error;
pub mod file;
pub mod memory;
pub mod pg;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use relaymon_common::types::{Metric, MetricKind};

use crate::error::Result;

/// Persistence contract shared by every backend.
///
/// Implementations must be safe to share across tasks (`Send + Sync`)
/// because the store is reached from both the HTTP handlers and the gRPC
/// ingestion service concurrently. Updates to the same `(name, kind)` key
/// are linearizable in every backend.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Stores the last observed value for a gauge, overwriting any previous
    /// reading. Returns the stored record.
    async fn update_gauge(&self, name: &str, value: f64) -> Result<Metric>;

    /// Adds an increment to a counter, creating it at `delta` when absent.
    /// Returns the stored record with the accumulated sum.
    async fn update_counter(&self, name: &str, delta: i64) -> Result<Metric>;

    /// Looks up a single metric. A missing metric is `Ok(None)`, distinct
    /// from a zero-valued one.
    async fn get_metric(&self, name: &str, kind: MetricKind) -> Result<Option<Metric>>;

    /// Returns every stored record, keyed by name.
    async fn get_all(&self) -> Result<HashMap<String, Metric>>;

    /// Applies a whole batch of updates following the same overwrite /
    /// accumulate rules as the single-record operations.
    async fn update_batch(&self, metrics: &[Metric]) -> Result<()>;

    /// Forces durable state to disk where the backend has any; a no-op
    /// otherwise. Called once more at shutdown.
    async fn persist(&self) -> Result<()> {
        Ok(())
    }
}

/// Backend selection knobs, read from the server configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// When set, wrap the chosen backend in the file-persisted decorator.
    pub file_path: Option<std::path::PathBuf>,
    /// Replay persisted state into the store on startup.
    pub restore: bool,
    /// Periodic autosave interval in seconds; non-positive disables the
    /// autosave task (write-through saves still happen).
    pub autosave_interval_secs: i64,
}

/// Connects to PostgreSQL and brings the schema up to date.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;
    tracing::info!("database connected, migrations applied");
    Ok(db)
}

/// Builds the storage engine for this process.
///
/// PostgreSQL when a connection is supplied, the in-memory map otherwise;
/// either is wrapped in the file-persisted decorator when a file path is
/// configured. Returns the store plus the autosave task handle (when one was
/// spawned) so the caller can include it in its shutdown join barrier.
pub async fn build_store(
    db: Option<DatabaseConnection>,
    opts: &StoreOptions,
    shutdown: CancellationToken,
) -> Result<(Arc<dyn MetricStore>, Option<JoinHandle<()>>)> {
    let inner: Arc<dyn MetricStore> = match db {
        Some(db) => Arc::new(pg::PgMetricStore::new(db)),
        None => Arc::new(memory::MemoryStore::new()),
    };

    match &opts.file_path {
        Some(path) => {
            let store = Arc::new(file::FileStore::new(inner, Path::new(path), opts.restore).await?);
            let autosave = store.spawn_autosave(opts.autosave_interval_secs, shutdown);
            Ok((store, autosave))
        }
        None => Ok((inner, None)),
    }
}
