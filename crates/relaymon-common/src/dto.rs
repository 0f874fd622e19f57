use serde::{Deserialize, Serialize};

use crate::types::{Metric, MetricKind};

/// Why a wire record was rejected before reaching storage.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("metric name (id) is required")]
    EmptyName,

    #[error("metric '{id}': invalid metric type '{kind}'")]
    UnknownKind { id: String, kind: String },

    #[error("metric '{id}': value is required for gauge")]
    MissingValue { id: String },

    #[error("metric '{id}': delta is required for counter")]
    MissingDelta { id: String },
}

/// JSON wire record for a single metric update or read response.
///
/// The `type` field stays a plain string on the wire so that an unknown kind
/// is reported as a validation error with the offending id, not as a decode
/// failure.
///
/// # Examples
///
/// ```
/// use relaymon_common::dto::MetricDto;
///
/// let dto: MetricDto =
///     serde_json::from_str(r#"{"id":"Alloc","type":"gauge","value":1024.0}"#).unwrap();
/// let metric = dto.into_metric().unwrap();
/// assert_eq!(metric.value, Some(1024.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDto {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl MetricDto {
    /// Validates the record and converts it to its domain form.
    ///
    /// Enforces the wire contract: non-empty id, known kind, and the payload
    /// field matching the kind present. The other payload field is dropped so
    /// a stored record never carries both.
    pub fn into_metric(self) -> Result<Metric, ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let kind: MetricKind = self.kind.parse().map_err(|_| ValidationError::UnknownKind {
            id: self.id.clone(),
            kind: self.kind.clone(),
        })?;
        match kind {
            MetricKind::Gauge => {
                let value = self
                    .value
                    .ok_or(ValidationError::MissingValue { id: self.id.clone() })?;
                Ok(Metric::gauge(self.id, value))
            }
            MetricKind::Counter => {
                let delta = self
                    .delta
                    .ok_or(ValidationError::MissingDelta { id: self.id.clone() })?;
                Ok(Metric::counter(self.id, delta))
            }
        }
    }
}

impl From<Metric> for MetricDto {
    fn from(m: Metric) -> Self {
        Self {
            id: m.name,
            kind: m.kind.to_string(),
            value: m.value,
            delta: m.delta,
        }
    }
}

/// Request body for a single-metric read (`POST /value`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricQueryDto {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_dto_converts_and_drops_stray_delta() {
        let dto = MetricDto {
            id: "Alloc".to_string(),
            kind: "gauge".to_string(),
            value: Some(2.5),
            delta: Some(7),
        };
        let metric = dto.into_metric().unwrap();
        assert_eq!(metric.kind, MetricKind::Gauge);
        assert_eq!(metric.value, Some(2.5));
        assert_eq!(metric.delta, None);
    }

    #[test]
    fn empty_id_is_rejected() {
        let dto = MetricDto {
            id: String::new(),
            kind: "gauge".to_string(),
            value: Some(1.0),
            delta: None,
        };
        assert_eq!(dto.into_metric(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let dto = MetricDto {
            id: "x".to_string(),
            kind: "histogram".to_string(),
            value: Some(1.0),
            delta: None,
        };
        assert!(matches!(
            dto.into_metric(),
            Err(ValidationError::UnknownKind { .. })
        ));
    }

    #[test]
    fn counter_without_delta_is_rejected() {
        let dto = MetricDto {
            id: "PollCount".to_string(),
            kind: "counter".to_string(),
            value: None,
            delta: None,
        };
        assert!(matches!(
            dto.into_metric(),
            Err(ValidationError::MissingDelta { .. })
        ));
    }

    #[test]
    fn serialization_omits_absent_payload_field() {
        let json = serde_json::to_string(&MetricDto::from(Metric::counter("c1", 3))).unwrap();
        assert_eq!(json, r#"{"id":"c1","type":"counter","delta":3}"#);
    }
}
