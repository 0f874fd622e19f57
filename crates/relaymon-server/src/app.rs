use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;
use crate::{api, logging, middleware};

/// Assembles the HTTP app: routes plus the receiver half of the transport
/// integrity pipeline.
///
/// Layer order matters. A request passes logging → trusted-subnet filter →
/// decryption → signature verification → gzip decompression → handler, so
/// the signature is checked over the payload exactly as the sender signed it
/// (post-compression), and decompression only ever sees plaintext.
pub fn build_http_app(state: AppState) -> Router {
    Router::new()
        .route("/update", post(api::update_metric))
        .route("/updates", post(api::update_batch))
        .route("/value", post(api::get_metric))
        .route("/", get(api::dump_metrics))
        .route("/healthcheck", get(api::healthcheck))
        .route("/ping", get(api::ping))
        .layer(from_fn(middleware::gzip::decompress_request))
        .layer(from_fn_with_state(state.clone(), middleware::sign::signature))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::crypt::decrypt_request,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::subnet::trusted_subnet,
        ))
        .layer(from_fn(logging::request_logging))
        .with_state(state)
}
