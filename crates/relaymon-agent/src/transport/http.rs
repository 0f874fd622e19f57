use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use rsa::RsaPublicKey;
use tokio::time::{sleep, Duration};

use relaymon_common::dto::MetricDto;
use relaymon_common::sign::Signer;

use super::TransportError;
use crate::crypto;

/// Liveness probe retry budget and backoff: the probe interval starts at one
/// second and grows by two per attempt, capped at five.
const PROBE_ATTEMPTS: u32 = 3;
const PROBE_MIN_INTERVAL: Duration = Duration::from_secs(1);
const PROBE_MAX_INTERVAL: Duration = Duration::from_secs(5);
const PROBE_INTERVAL_STEP: Duration = Duration::from_secs(2);

/// HTTP/JSON transport: gzip the serialized batch, then either sign it with
/// the shared secret or encrypt it with the receiver's public key (never
/// both), probe the receiver's liveness, and POST to `/updates`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    signer: Option<Signer>,
    public_key: Option<RsaPublicKey>,
}

impl HttpTransport {
    pub fn new(base_url: String, signer: Option<Signer>, public_key: Option<RsaPublicKey>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            public_key,
        }
    }

    pub async fn send_batch(&self, batch: &[MetricDto]) -> Result<(), TransportError> {
        self.health_check().await?;

        let body = serde_json::to_vec(batch)?;
        let compressed = compress(&body)?;

        let mut request = self
            .client
            .post(format!("{}/updates", self.base_url))
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip");

        let payload = match &self.public_key {
            Some(key) => {
                request = request.header("Content-Encryption", "rsa-oaep-sha256");
                crypto::encrypt(key, &compressed)?
            }
            None => {
                if let Some(signer) = &self.signer {
                    request = request.header("HashSHA256", signer.compute(&compressed));
                }
                compressed
            }
        };

        let response = request.body(payload).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::UnexpectedStatus(response.status()));
        }

        tracing::debug!(count = batch.len(), "metrics batch sent");
        Ok(())
    }

    /// Probes `GET /healthcheck` with the bounded retry policy. Exhaustion
    /// fails the whole send attempt; the batch is discarded, not retried.
    async fn health_check(&self) -> Result<(), TransportError> {
        let url = format!("{}/healthcheck", self.base_url);
        let mut probe_interval = PROBE_MIN_INTERVAL;

        for attempt in 1..=PROBE_ATTEMPTS {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    tracing::info!(
                        status = response.status().as_u16(),
                        attempt,
                        max = PROBE_ATTEMPTS,
                        "unexpected status during health check"
                    );
                }
                Err(e) => {
                    tracing::info!(
                        error = %e,
                        attempt,
                        max = PROBE_ATTEMPTS,
                        "health check request failed"
                    );
                }
            }

            if attempt < PROBE_ATTEMPTS {
                sleep(probe_interval).await;
                probe_interval = (probe_interval + PROBE_INTERVAL_STEP).min(PROBE_MAX_INTERVAL);
            }
        }

        Err(TransportError::HealthCheckFailed {
            attempts: PROBE_ATTEMPTS,
        })
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data).map_err(TransportError::Compress)?;
    encoder.finish().map_err(TransportError::Compress)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;

    #[derive(Clone, Default)]
    struct ServerState {
        health_calls: Arc<AtomicU32>,
        health_failures: Arc<AtomicU32>,
        received: Arc<Mutex<Option<(HeaderMap, Vec<u8>)>>>,
    }

    async fn healthcheck(State(state): State<ServerState>) -> StatusCode {
        state.health_calls.fetch_add(1, Ordering::SeqCst);
        if state.health_failures.load(Ordering::SeqCst) > 0 {
            state.health_failures.fetch_sub(1, Ordering::SeqCst);
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }

    async fn updates(
        State(state): State<ServerState>,
        headers: HeaderMap,
        body: axum::body::Bytes,
    ) -> StatusCode {
        *state.received.lock().unwrap() = Some((headers, body.to_vec()));
        StatusCode::OK
    }

    /// Starts a capture server on an ephemeral port, failing the first
    /// `health_failures` liveness probes.
    async fn spawn_server(health_failures: u32) -> (String, ServerState) {
        let state = ServerState::default();
        state
            .health_failures
            .store(health_failures, Ordering::SeqCst);

        let app = Router::new()
            .route("/healthcheck", get(healthcheck))
            .route("/updates", post(updates))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), state)
    }

    fn sample_batch() -> Vec<MetricDto> {
        vec![
            MetricDto {
                id: "Alloc".to_string(),
                kind: "gauge".to_string(),
                value: Some(1024.0),
                delta: None,
            },
            MetricDto {
                id: "PollCount".to_string(),
                kind: "counter".to_string(),
                value: None,
                delta: Some(3),
            },
        ]
    }

    fn decompress(data: &[u8]) -> Vec<u8> {
        let mut decoder = flate2::read::GzDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn sends_compressed_signed_batch() {
        let (base_url, state) = spawn_server(0).await;
        let transport = HttpTransport::new(base_url, Signer::new("secret"), None);

        transport.send_batch(&sample_batch()).await.unwrap();

        let (headers, body) = state.received.lock().unwrap().clone().unwrap();
        assert_eq!(headers.get("content-encoding").unwrap(), "gzip");

        let tag = headers.get("HashSHA256").unwrap().to_str().unwrap();
        assert!(Signer::new("secret").unwrap().verify(tag, &body));

        let decoded: Vec<MetricDto> = serde_json::from_slice(&decompress(&body)).unwrap();
        assert_eq!(decoded, sample_batch());
    }

    #[tokio::test]
    async fn omits_signature_without_a_secret() {
        let (base_url, state) = spawn_server(0).await;
        let transport = HttpTransport::new(base_url, None, None);

        transport.send_batch(&sample_batch()).await.unwrap();

        let (headers, _) = state.received.lock().unwrap().clone().unwrap();
        assert!(headers.get("HashSHA256").is_none());
        assert!(headers.get("Content-Encryption").is_none());
    }

    #[tokio::test]
    async fn liveness_recovers_within_the_retry_budget() {
        // Two failing probes, then success: the send goes through using
        // exactly three liveness attempts.
        let (base_url, state) = spawn_server(2).await;
        let transport = HttpTransport::new(base_url, None, None);

        transport.send_batch(&sample_batch()).await.unwrap();

        assert_eq!(state.health_calls.load(Ordering::SeqCst), 3);
        assert!(state.received.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn liveness_exhaustion_discards_the_batch() {
        let (base_url, state) = spawn_server(u32::MAX).await;
        let transport = HttpTransport::new(base_url, None, None);

        let err = transport.send_batch(&sample_batch()).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::HealthCheckFailed { attempts: 3 }
        ));
        assert_eq!(state.health_calls.load(Ordering::SeqCst), 3);
        assert!(state.received.lock().unwrap().is_none(), "batch must not be sent");
    }

    #[tokio::test]
    async fn unreachable_receiver_exhausts_the_probe_budget() {
        // Nothing listens on this port; every probe errors at the connection
        // level and the budget still bounds the attempts.
        let transport = HttpTransport::new("http://127.0.0.1:1".to_string(), None, None);
        let err = transport.send_batch(&sample_batch()).await.unwrap_err();
        assert!(matches!(err, TransportError::HealthCheckFailed { .. }));
    }
}
