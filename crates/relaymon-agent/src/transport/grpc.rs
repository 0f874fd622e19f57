use tonic::transport::Channel;

use relaymon_common::dto::MetricDto;
use relaymon_common::proto::metric_service_client::MetricServiceClient;
use relaymon_common::proto::{MetricBatchProto, MetricProto};

use super::TransportError;

/// Binary RPC transport: one `UpdateBatch` call per reporter cycle, no
/// compression or signing overhead.
#[derive(Clone)]
pub struct GrpcTransport {
    client: MetricServiceClient<Channel>,
}

impl GrpcTransport {
    pub async fn connect(endpoint: String) -> anyhow::Result<Self> {
        let client = MetricServiceClient::connect(endpoint).await?;
        Ok(Self { client })
    }

    pub async fn send_batch(&mut self, batch: &[MetricDto]) -> Result<(), TransportError> {
        let metrics: Vec<MetricProto> = batch
            .iter()
            .map(|m| MetricProto {
                id: m.id.clone(),
                kind: m.kind.clone(),
                value: m.value.unwrap_or(0.0),
                delta: m.delta.unwrap_or(0),
            })
            .collect();

        let count = metrics.len();
        let ack = self
            .client
            .update_batch(MetricBatchProto { metrics })
            .await?
            .into_inner();

        if !ack.success {
            return Err(TransportError::Rejected(ack.message));
        }
        tracing::debug!(count, "metrics batch sent over grpc");
        Ok(())
    }
}
