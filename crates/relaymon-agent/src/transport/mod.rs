pub mod grpc;
pub mod http;

use relaymon_common::dto::MetricDto;
use relaymon_common::sign::Signer;

use crate::config::AgentConfig;
use crate::crypto;

/// Delivery failures seen by the dispatch workers. None of these are retried
/// at the worker layer; the next reporter cycle supersedes the lost batch.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The liveness probe exhausted its retry budget; the batch was never
    /// sent.
    #[error("health check failed after {attempts} attempts")]
    HealthCheckFailed { attempts: u32 },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("grpc call failed: {0}")]
    Grpc(#[from] tonic::Status),

    /// The receiver answered but refused the batch.
    #[error("receiver rejected batch: {0}")]
    Rejected(String),

    #[error("failed to serialize batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to compress batch: {0}")]
    Compress(#[source] std::io::Error),

    #[error("failed to encrypt batch: {0}")]
    Encrypt(#[from] rsa::Error),
}

/// Wire protocol client, selected once per deployment from the agent
/// configuration. Each dispatch worker holds its own clone.
#[derive(Clone)]
pub enum TransportClient {
    Http(http::HttpTransport),
    Grpc(grpc::GrpcTransport),
}

impl TransportClient {
    /// Builds the client for the configured protocol. The gRPC channel is
    /// dialed eagerly so a misconfigured endpoint fails at startup.
    pub async fn connect(config: &AgentConfig) -> anyhow::Result<Self> {
        if config.use_grpc {
            if let Some(addr) = config.server_address.strip_prefix("grpc://") {
                let transport = grpc::GrpcTransport::connect(format!("http://{addr}")).await?;
                tracing::info!(addr, "using binary transport");
                return Ok(Self::Grpc(transport));
            }
            anyhow::bail!(
                "use_grpc is set but server_address '{}' has no grpc:// scheme",
                config.server_address
            );
        }

        let signer = config.key.as_deref().and_then(Signer::new);
        let public_key = match &config.crypto_key {
            Some(path) => {
                let key = crypto::load_public_key(std::path::Path::new(path))?;
                tracing::info!(path, "payload encryption enabled");
                Some(key)
            }
            None => None,
        };
        Ok(Self::Http(http::HttpTransport::new(
            config.server_address.clone(),
            signer,
            public_key,
        )))
    }

    pub async fn send_batch(&mut self, batch: &[MetricDto]) -> Result<(), TransportError> {
        match self {
            Self::Http(t) => t.send_batch(batch).await,
            Self::Grpc(t) => t.send_batch(batch).await,
        }
    }
}
