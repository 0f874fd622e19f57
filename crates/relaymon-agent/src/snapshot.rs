use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use relaymon_collector::Reading;
use relaymon_common::dto::MetricDto;
use relaymon_common::types::Metric;

/// The agent's current view of all sampled values.
///
/// Mutated only by the sampler loops (under the write lock), copied only by
/// the reporter (under the read lock), never persisted. `poll_count` grows
/// monotonically with each runtime-sampler tick; `random_value` is redrawn
/// on the same ticks and doubles as a pipeline liveness probe.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub readings: BTreeMap<String, f64>,
    pub poll_count: i64,
    pub random_value: f64,
}

impl Snapshot {
    /// Overwrites every reading owned by one sampler with its fresh values.
    pub fn apply(&mut self, readings: Vec<Reading>) {
        for r in readings {
            self.readings.insert(r.name, r.value);
        }
    }

    /// Converts the snapshot into one wire batch: every reading as a gauge,
    /// plus the `PollCount` counter and the `RandomValue` gauge.
    pub fn to_batch(&self) -> Vec<MetricDto> {
        let mut batch: Vec<MetricDto> = self
            .readings
            .iter()
            .map(|(name, value)| MetricDto::from(Metric::gauge(name.clone(), *value)))
            .collect();
        batch.push(MetricDto::from(Metric::counter("PollCount", self.poll_count)));
        batch.push(MetricDto::from(Metric::gauge("RandomValue", self.random_value)));
        batch
    }
}

pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_overwrites_existing_readings() {
        let mut snap = Snapshot::default();
        snap.apply(vec![Reading::new("Alloc", 100.0)]);
        snap.apply(vec![Reading::new("Alloc", 200.0), Reading::new("Sys", 5.0)]);

        assert_eq!(snap.readings["Alloc"], 200.0);
        assert_eq!(snap.readings.len(), 2);
    }

    #[test]
    fn batch_carries_readings_plus_derived_fields() {
        let mut snap = Snapshot::default();
        snap.apply(vec![Reading::new("Alloc", 1024.0)]);
        snap.poll_count = 7;
        snap.random_value = 42.5;

        let batch = snap.to_batch();
        assert_eq!(batch.len(), 3);

        let alloc = batch.iter().find(|m| m.id == "Alloc").unwrap();
        assert_eq!(alloc.kind, "gauge");
        assert_eq!(alloc.value, Some(1024.0));

        let poll = batch.iter().find(|m| m.id == "PollCount").unwrap();
        assert_eq!(poll.kind, "counter");
        assert_eq!(poll.delta, Some(7));
        assert_eq!(poll.value, None);

        let random = batch.iter().find(|m| m.id == "RandomValue").unwrap();
        assert_eq!(random.value, Some(42.5));
    }
}
