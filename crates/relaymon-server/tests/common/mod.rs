#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use tower::util::ServiceExt;

use relaymon_common::sign::Signer;
use relaymon_server::app;
use relaymon_server::crypto::Decryptor;
use relaymon_server::service::MetricsService;
use relaymon_server::state::AppState;
use relaymon_storage::memory::MemoryStore;

pub struct TestContext {
    pub state: AppState,
    pub app: Router,
}

#[derive(Default)]
pub struct TestOptions {
    pub key: Option<String>,
    pub decryptor: Option<Decryptor>,
    pub trusted_subnet: Option<String>,
}

pub fn build_test_context() -> TestContext {
    build_test_context_with(TestOptions::default())
}

pub fn build_test_context_with(opts: TestOptions) -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        service: Arc::new(MetricsService::new(store)),
        signer: opts.key.as_deref().and_then(Signer::new),
        decryptor: opts.decryptor.map(Arc::new),
        trusted_subnet: opts
            .trusted_subnet
            .map(|s| s.parse().expect("test CIDR should parse")),
        db: None,
    };
    TestContext {
        app: app::build_http_app(state.clone()),
        state,
    }
}

/// Sends one request through the app and collects the response.
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec();
    (status, headers, body)
}

pub fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn body_json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}
