use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use relaymon_common::types::{Metric, MetricKind};

use crate::error::Result;
use crate::MetricStore;

/// In-memory backend: a name-keyed map.
///
/// Keying by name alone means a gauge write to a name currently holding a
/// counter replaces the record wholesale (and vice versa) — the two kinds do
/// not coexist under one name here, unlike the PostgreSQL backend.
pub struct MemoryStore {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<Metric> {
        let mut metrics = self.metrics.write().await;
        let metric = Metric::gauge(name, value);
        metrics.insert(name.to_string(), metric.clone());
        Ok(metric)
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<Metric> {
        let mut metrics = self.metrics.write().await;
        let metric = match metrics.get(name) {
            Some(existing) if existing.kind == MetricKind::Counter => {
                Metric::counter(name, existing.delta.unwrap_or(0) + delta)
            }
            _ => Metric::counter(name, delta),
        };
        metrics.insert(name.to_string(), metric.clone());
        Ok(metric)
    }

    async fn get_metric(&self, name: &str, kind: MetricKind) -> Result<Option<Metric>> {
        let metrics = self.metrics.read().await;
        Ok(metrics.get(name).filter(|m| m.kind == kind).cloned())
    }

    async fn get_all(&self) -> Result<HashMap<String, Metric>> {
        let metrics = self.metrics.read().await;
        Ok(metrics.clone())
    }

    async fn update_batch(&self, batch: &[Metric]) -> Result<()> {
        for metric in batch {
            match metric.kind {
                MetricKind::Gauge => {
                    self.update_gauge(&metric.name, metric.value.unwrap_or(0.0))
                        .await?;
                }
                MetricKind::Counter => {
                    self.update_counter(&metric.name, metric.delta.unwrap_or(0))
                        .await?;
                }
            }
        }
        Ok(())
    }
}
