use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait, QueryFilter,
    QueryResult, Statement, Value,
};
use tokio::time::{sleep, Duration};

use relaymon_common::types::{Metric, MetricKind};

use crate::entities::metric::{Column as MetricCol, Entity as MetricEntity, Model};
use crate::error::{Result, StoreError};
use crate::MetricStore;

/// Fixed backoff schedule for connection-class failures. Three attempts in
/// total; the delay after the final attempt is never slept.
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(5),
];

const UPDATE_GAUGE_SQL: &str = r#"
WITH updated AS (
    UPDATE metrics
    SET value = $2,
        delta = NULL
    WHERE name = $1
      AND metric_type = 'gauge'
    RETURNING name, metric_type, value, delta
),
inserted AS (
    INSERT INTO metrics (name, metric_type, value, delta)
    SELECT $1, 'gauge', $2, NULL
    WHERE NOT EXISTS (SELECT 1 FROM updated)
    RETURNING name, metric_type, value, delta
)
SELECT name, metric_type, value, delta FROM updated
UNION ALL
SELECT name, metric_type, value, delta FROM inserted
"#;

const UPDATE_COUNTER_SQL: &str = r#"
WITH updated AS (
    UPDATE metrics
    SET delta = metrics.delta + $2,
        value = NULL
    WHERE name = $1
      AND metric_type = 'counter'
    RETURNING name, metric_type, value, delta
),
inserted AS (
    INSERT INTO metrics (name, metric_type, value, delta)
    SELECT $1, 'counter', NULL, $2
    WHERE NOT EXISTS (SELECT 1 FROM updated)
    RETURNING name, metric_type, value, delta
)
SELECT name, metric_type, value, delta FROM updated
UNION ALL
SELECT name, metric_type, value, delta FROM inserted
"#;

/// PostgreSQL backend, keyed by `(name, metric_type)` so a gauge and a
/// counter may coexist under one name.
///
/// Every write is a single conditional-CTE statement (update if the row
/// exists, insert otherwise, return the resulting row either way), which
/// pushes same-key exclusion down to the database's row locking instead of
/// a read-then-write sequence in the application.
pub struct PgMetricStore {
    db: DatabaseConnection,
}

impl PgMetricStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn is_connection_error(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
}

/// Runs `op` under the storage retry policy: connection-class errors are
/// retried on the fixed backoff schedule, anything else surfaces at once.
pub(crate) async fn with_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, DbErr>>,
{
    let last = RETRY_DELAYS.len() - 1;
    for (attempt, delay) in RETRY_DELAYS.iter().enumerate() {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_connection_error(&e) && attempt < last => {
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "database connection error, retrying"
                );
                sleep(*delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!("retry loop returns on the last attempt")
}

fn row_to_metric(row: &QueryResult) -> std::result::Result<Metric, DbErr> {
    let name: String = row.try_get("", "name")?;
    let kind_str: String = row.try_get("", "metric_type")?;
    let value: Option<f64> = row.try_get("", "value")?;
    let delta: Option<i64> = row.try_get("", "delta")?;
    let kind = kind_str
        .parse::<MetricKind>()
        .map_err(|e| DbErr::Custom(format!("metrics row with bad kind: {e}")))?;
    Ok(Metric {
        name,
        kind,
        value,
        delta,
    })
}

fn model_to_metric(m: Model) -> std::result::Result<Metric, DbErr> {
    let kind = m
        .metric_type
        .parse::<MetricKind>()
        .map_err(|e| DbErr::Custom(format!("metrics row with bad kind: {e}")))?;
    Ok(Metric {
        name: m.name,
        kind,
        value: m.value,
        delta: m.delta,
    })
}

/// Collapses same-key entries of a batch before submission: counter deltas
/// are summed, the last gauge value wins. First-appearance order is kept so
/// the generated statement is deterministic.
pub(crate) fn dedup_batch(metrics: &[Metric]) -> Vec<Metric> {
    let mut order: Vec<Metric> = Vec::with_capacity(metrics.len());
    let mut index: HashMap<(String, MetricKind), usize> = HashMap::new();

    for m in metrics {
        let key = (m.name.clone(), m.kind);
        match index.get(&key) {
            Some(&i) => match m.kind {
                MetricKind::Counter => {
                    let merged = order[i].delta.unwrap_or(0) + m.delta.unwrap_or(0);
                    order[i].delta = Some(merged);
                }
                MetricKind::Gauge => {
                    order[i].value = m.value;
                }
            },
            None => {
                index.insert(key, order.len());
                order.push(m.clone());
            }
        }
    }
    order
}

/// Builds the `VALUES` list of the batch-upsert CTE for `count` rows, four
/// numbered placeholders per row.
pub(crate) fn batch_values_sql(count: usize) -> String {
    let mut rows = Vec::with_capacity(count);
    for i in 0..count {
        let base = i * 4 + 1;
        rows.push(format!(
            "(${}::text, ${}::text, ${}::double precision, ${}::bigint)",
            base,
            base + 1,
            base + 2,
            base + 3
        ));
    }
    rows.join(",\n        ")
}

fn batch_statement(metrics: &[Metric]) -> Statement {
    let sql = format!(
        r#"
WITH input (name, metric_type, val, delt) AS (
    VALUES
        {}
),
updated AS (
    UPDATE metrics mt
    SET value = CASE WHEN i.metric_type = 'gauge' THEN i.val ELSE NULL END,
        delta = CASE WHEN i.metric_type = 'counter' THEN mt.delta + i.delt ELSE NULL END
    FROM input i
    WHERE mt.name = i.name
      AND mt.metric_type = i.metric_type
    RETURNING mt.name, mt.metric_type
),
inserted AS (
    INSERT INTO metrics (name, metric_type, value, delta)
    SELECT i.name,
           i.metric_type,
           CASE WHEN i.metric_type = 'gauge' THEN i.val ELSE NULL END,
           CASE WHEN i.metric_type = 'counter' THEN i.delt ELSE NULL END
    FROM input i
    WHERE NOT EXISTS (
        SELECT 1 FROM updated u
        WHERE u.name = i.name
          AND u.metric_type = i.metric_type
    )
    RETURNING name, metric_type
)
SELECT 1 FROM updated
UNION ALL
SELECT 1 FROM inserted
"#,
        batch_values_sql(metrics.len())
    );

    let mut values: Vec<Value> = Vec::with_capacity(metrics.len() * 4);
    for m in metrics {
        values.push(m.name.clone().into());
        values.push(m.kind.to_string().into());
        values.push(m.value.unwrap_or(0.0).into());
        values.push(m.delta.unwrap_or(0).into());
    }

    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

#[async_trait]
impl MetricStore for PgMetricStore {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<Metric> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            UPDATE_GAUGE_SQL,
            [name.into(), value.into()],
        );
        let row = with_retry(|| {
            let stmt = stmt.clone();
            async move { self.db.query_one(stmt).await }
        })
        .await?;

        let row = row.ok_or_else(|| StoreError::UpsertReadback {
            name: name.to_string(),
        })?;
        Ok(row_to_metric(&row)?)
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<Metric> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            UPDATE_COUNTER_SQL,
            [name.into(), delta.into()],
        );
        let row = with_retry(|| {
            let stmt = stmt.clone();
            async move { self.db.query_one(stmt).await }
        })
        .await?;

        let row = row.ok_or_else(|| StoreError::UpsertReadback {
            name: name.to_string(),
        })?;
        Ok(row_to_metric(&row)?)
    }

    async fn get_metric(&self, name: &str, kind: MetricKind) -> Result<Option<Metric>> {
        let model = with_retry(|| async move {
            MetricEntity::find()
                .filter(MetricCol::Name.eq(name))
                .filter(MetricCol::MetricType.eq(kind.to_string()))
                .one(&self.db)
                .await
        })
        .await?;

        model.map(model_to_metric).transpose().map_err(Into::into)
    }

    async fn get_all(&self) -> Result<HashMap<String, Metric>> {
        let models =
            with_retry(|| async move { MetricEntity::find().all(&self.db).await }).await?;

        let mut out = HashMap::with_capacity(models.len());
        for m in models {
            let metric = model_to_metric(m)?;
            out.insert(metric.name.clone(), metric);
        }
        Ok(out)
    }

    async fn update_batch(&self, batch: &[Metric]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let stmt = batch_statement(&dedup_batch(batch));
        with_retry(|| {
            let stmt = stmt.clone();
            async move { self.db.execute(stmt).await }
        })
        .await?;
        Ok(())
    }
}
