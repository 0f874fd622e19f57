use std::sync::Arc;

use relaymon_common::dto::{MetricDto, MetricQueryDto, ValidationError};
use relaymon_common::types::{Metric, MetricKind};
use relaymon_storage::error::StoreError;
use relaymon_storage::MetricStore;

/// Errors crossing the service boundary, mapped to transport status codes
/// at the outermost handler.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("metric '{name}' ({kind}) not found")]
    NotFound { name: String, kind: MetricKind },

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Validates wire records, translates them into domain metrics, and
/// delegates persistence to the storage engine.
pub struct MetricsService {
    store: Arc<dyn MetricStore>,
}

impl MetricsService {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    /// Creates or updates one metric and returns the stored record —
    /// the accumulated sum for counters, the fresh value for gauges.
    pub async fn create_or_update(&self, dto: MetricDto) -> Result<MetricDto, ServiceError> {
        let metric = dto.into_metric()?;
        let stored = match metric.kind {
            MetricKind::Gauge => {
                self.store
                    .update_gauge(&metric.name, metric.value.unwrap_or(0.0))
                    .await?
            }
            MetricKind::Counter => {
                self.store
                    .update_counter(&metric.name, metric.delta.unwrap_or(0))
                    .await?
            }
        };
        Ok(stored.into())
    }

    /// Reads one metric by `(name, kind)`. A missing metric is an explicit
    /// `NotFound`, never a zero-valued record.
    pub async fn get(&self, query: MetricQueryDto) -> Result<MetricDto, ServiceError> {
        if query.id.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let kind: MetricKind =
            query
                .kind
                .parse()
                .map_err(|_| ValidationError::UnknownKind {
                    id: query.id.clone(),
                    kind: query.kind.clone(),
                })?;

        match self.store.get_metric(&query.id, kind).await? {
            Some(metric) => Ok(metric.into()),
            None => Err(ServiceError::NotFound {
                name: query.id,
                kind,
            }),
        }
    }

    /// Returns every stored record.
    pub async fn get_all(&self) -> Result<Vec<MetricDto>, ServiceError> {
        let metrics = self.store.get_all().await?;
        let mut dtos: Vec<MetricDto> = metrics.into_values().map(Into::into).collect();
        dtos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(dtos)
    }

    /// Validates and applies a whole batch. The first invalid record rejects
    /// the batch before anything is written.
    pub async fn update_batch(&self, dtos: Vec<MetricDto>) -> Result<(), ServiceError> {
        if dtos.is_empty() {
            return Ok(());
        }
        let metrics: Vec<Metric> = dtos
            .into_iter()
            .map(MetricDto::into_metric)
            .collect::<Result<_, _>>()?;
        self.store.update_batch(&metrics).await?;
        Ok(())
    }
}
