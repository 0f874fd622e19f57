use tonic::{Request, Response, Status};

use relaymon_common::dto::MetricDto;
use relaymon_common::proto::metric_service_server::MetricService;
use relaymon_common::proto::{MetricBatchProto, UpdateAck};

use crate::state::AppState;

/// Binary RPC ingestion service, functionally equivalent to `POST /updates`
/// without the HTTP/JSON/gzip/signing overhead.
pub struct MetricServiceImpl {
    state: AppState,
}

impl MetricServiceImpl {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl MetricService for MetricServiceImpl {
    async fn update_batch(
        &self,
        request: Request<MetricBatchProto>,
    ) -> Result<Response<UpdateAck>, Status> {
        let proto = request.into_inner();
        if proto.metrics.is_empty() {
            return Ok(Response::new(UpdateAck {
                success: true,
                message: "ok".to_string(),
            }));
        }

        let count = proto.metrics.len();
        let batch: Vec<MetricDto> = proto
            .metrics
            .into_iter()
            .map(|m| {
                // Only the payload field matching the declared kind is taken
                // from the proto; an unknown kind leaves both empty and is
                // rejected by service validation.
                let (value, delta) = match m.kind.as_str() {
                    "gauge" => (Some(m.value), None),
                    "counter" => (None, Some(m.delta)),
                    _ => (None, None),
                };
                MetricDto {
                    id: m.id,
                    kind: m.kind,
                    value,
                    delta,
                }
            })
            .collect();

        match self.state.service.update_batch(batch).await {
            Ok(()) => {
                tracing::debug!(count, "metrics batch ingested over grpc");
                Ok(Response::new(UpdateAck {
                    success: true,
                    message: "ok".to_string(),
                }))
            }
            Err(e) => {
                tracing::warn!(error = %e, "grpc batch rejected");
                Ok(Response::new(UpdateAck {
                    success: false,
                    message: e.to_string(),
                }))
            }
        }
    }
}
