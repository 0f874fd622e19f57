use std::sync::Arc;

use sea_orm::{DbErr, RuntimeErr};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use relaymon_common::types::{Metric, MetricKind};

use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::pg::{batch_values_sql, dedup_batch, with_retry};
use crate::{build_store, MetricStore, StoreOptions};

#[tokio::test]
async fn gauge_update_overwrites() {
    let store = MemoryStore::new();
    store.update_gauge("g1", 1.0).await.unwrap();
    let stored = store.update_gauge("g1", 2.0).await.unwrap();
    assert_eq!(stored.value, Some(2.0));

    let fetched = store.get_metric("g1", MetricKind::Gauge).await.unwrap();
    assert_eq!(fetched.unwrap().value, Some(2.0));
}

#[tokio::test]
async fn counter_update_accumulates() {
    let store = MemoryStore::new();
    store.update_counter("c1", 5).await.unwrap();
    let stored = store.update_counter("c1", 3).await.unwrap();
    assert_eq!(stored.delta, Some(8));
}

#[tokio::test]
async fn memory_store_replaces_record_on_kind_change() {
    // Name-keyed map: writing a gauge over an existing counter name replaces
    // the record instead of coexisting with it.
    let store = MemoryStore::new();
    store.update_counter("mixed", 4).await.unwrap();
    store.update_gauge("mixed", 1.5).await.unwrap();

    assert!(store
        .get_metric("mixed", MetricKind::Counter)
        .await
        .unwrap()
        .is_none());
    let gauge = store
        .get_metric("mixed", MetricKind::Gauge)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(gauge.value, Some(1.5));

    // A later counter write starts from scratch, the old sum is gone.
    let counter = store.update_counter("mixed", 2).await.unwrap();
    assert_eq!(counter.delta, Some(2));
}

#[tokio::test]
async fn missing_metric_is_distinct_from_zero_valued() {
    let store = MemoryStore::new();
    store.update_counter("present", 0).await.unwrap();

    let present = store
        .get_metric("present", MetricKind::Counter)
        .await
        .unwrap();
    assert_eq!(present.unwrap().delta, Some(0));
    assert!(store
        .get_metric("absent", MetricKind::Counter)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn batch_update_matches_sequential_updates() {
    let batched = MemoryStore::new();
    batched
        .update_batch(&[
            Metric::counter("c1", 2),
            Metric::counter("c1", 3),
            Metric::gauge("g1", 7.0),
        ])
        .await
        .unwrap();

    let sequential = MemoryStore::new();
    sequential.update_counter("c1", 2).await.unwrap();
    sequential.update_counter("c1", 3).await.unwrap();
    sequential.update_gauge("g1", 7.0).await.unwrap();

    assert_eq!(
        batched.get_all().await.unwrap(),
        sequential.get_all().await.unwrap()
    );
    assert_eq!(
        batched
            .get_metric("c1", MetricKind::Counter)
            .await
            .unwrap()
            .unwrap()
            .delta,
        Some(5)
    );
}

#[tokio::test]
async fn concurrent_counter_updates_lose_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for _ in 0..50 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.update_counter("hits", 1).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let stored = store
        .get_metric("hits", MetricKind::Counter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.delta, Some(50));
}

#[tokio::test]
async fn file_store_round_trips_through_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");

    let store = FileStore::new(Arc::new(MemoryStore::new()), &path, false)
        .await
        .unwrap();
    store.update_gauge("Alloc", 1024.0).await.unwrap();
    store.update_counter("PollCount", 12).await.unwrap();
    let before = store.get_all().await.unwrap();
    drop(store);

    let restored = FileStore::new(Arc::new(MemoryStore::new()), &path, true)
        .await
        .unwrap();
    assert_eq!(restored.get_all().await.unwrap(), before);
}

#[tokio::test]
async fn file_store_starts_empty_when_file_is_missing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("does-not-exist.json");

    let store = FileStore::new(Arc::new(MemoryStore::new()), &path, true)
        .await
        .unwrap();
    assert!(store.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn file_store_writes_through_on_every_update() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");

    let store = FileStore::new(Arc::new(MemoryStore::new()), &path, false)
        .await
        .unwrap();
    store.update_counter("c1", 3).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["c1"]["delta"], 3);
    assert_eq!(parsed["c1"]["type"], "counter");
}

#[tokio::test]
async fn factory_skips_autosave_for_non_positive_interval() {
    let dir = TempDir::new().unwrap();
    let opts = StoreOptions {
        file_path: Some(dir.path().join("metrics.json")),
        restore: false,
        autosave_interval_secs: 0,
    };
    let (store, autosave) = build_store(None, &opts, CancellationToken::new())
        .await
        .unwrap();
    assert!(autosave.is_none());

    // The final-save path still works without the autosave task.
    store.update_gauge("g1", 1.0).await.unwrap();
    store.persist().await.unwrap();
}

#[tokio::test]
async fn autosave_task_saves_once_more_on_cancellation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");
    let token = CancellationToken::new();

    let opts = StoreOptions {
        file_path: Some(path.clone()),
        restore: false,
        autosave_interval_secs: 3600,
    };
    let (store, autosave) = build_store(None, &opts, token.clone()).await.unwrap();
    let autosave = autosave.expect("autosave task should be spawned");

    store.update_gauge("g1", 5.0).await.unwrap();
    std::fs::remove_file(&path).unwrap();

    token.cancel();
    autosave.await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("g1"));
}

#[test]
fn dedup_sums_counters_and_keeps_last_gauge() {
    let deduped = dedup_batch(&[
        Metric::counter("c1", 2),
        Metric::gauge("g1", 1.0),
        Metric::counter("c1", 3),
        Metric::gauge("g1", 2.0),
    ]);

    assert_eq!(deduped.len(), 2);
    assert_eq!(deduped[0], Metric::counter("c1", 5));
    assert_eq!(deduped[1], Metric::gauge("g1", 2.0));
}

#[test]
fn dedup_keeps_same_name_different_kind_apart() {
    let deduped = dedup_batch(&[Metric::counter("x", 1), Metric::gauge("x", 9.0)]);
    assert_eq!(deduped.len(), 2);
}

#[test]
fn batch_values_sql_numbers_placeholders_per_row() {
    let sql = batch_values_sql(2);
    assert!(sql.contains("($1::text, $2::text, $3::double precision, $4::bigint)"));
    assert!(sql.contains("($5::text, $6::text, $7::double precision, $8::bigint)"));
}

#[tokio::test(start_paused = true)]
async fn retry_recovers_from_transient_connection_errors() {
    let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = attempts.clone();

    let result: crate::error::Result<u32> = with_retry(move || {
        let counter = counter.clone();
        async move {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n < 2 {
                Err(DbErr::Conn(RuntimeErr::Internal(
                    "connection refused".to_string(),
                )))
            } else {
                Ok(42)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn retry_gives_up_after_the_attempt_budget() {
    let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = attempts.clone();

    let result: crate::error::Result<u32> = with_retry(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(DbErr::Conn(RuntimeErr::Internal(
                "connection refused".to_string(),
            )))
        }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_surfaces_non_connection_errors_immediately() {
    let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = attempts.clone();

    let result: crate::error::Result<u32> = with_retry(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(DbErr::Custom("constraint violation".to_string()))
        }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
}
