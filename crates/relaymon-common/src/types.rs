use serde::{Deserialize, Serialize};

/// Metric kind, a closed enumeration.
///
/// # Examples
///
/// ```
/// use relaymon_common::types::MetricKind;
///
/// let kind: MetricKind = "gauge".parse().unwrap();
/// assert_eq!(kind, MetricKind::Gauge);
/// assert_eq!(kind.to_string(), "gauge");
/// assert!("histogram".parse::<MetricKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Counter => write!(f, "counter"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            _ => Err(format!("unknown metric kind: {s}")),
        }
    }
}

/// One metric record in domain form.
///
/// Invariant: exactly the payload field matching `kind` is populated —
/// `value` for a gauge, `delta` for a counter. The constructors uphold this;
/// code that builds a `Metric` by hand is expected to as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub kind: MetricKind,
    pub value: Option<f64>,
    pub delta: Option<i64>,
}

impl Metric {
    /// A gauge record carrying the last observed value.
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Gauge,
            value: Some(value),
            delta: None,
        }
    }

    /// A counter record carrying one increment.
    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Counter,
            value: None,
            delta: Some(delta),
        }
    }
}
