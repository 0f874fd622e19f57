use std::io::Read;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use flate2::read::GzDecoder;

/// Decompresses gzip request bodies, passing unmarked requests through
/// unmodified. A malformed compressed stream is a client error.
pub async fn decompress_request(req: Request, next: Next) -> Response {
    let is_gzip = req
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

    if !is_gzip {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let compressed = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "error read body").into_response();
        }
    };

    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut plain = Vec::new();
    if decoder.read_to_end(&mut plain).is_err() {
        return (StatusCode::BAD_REQUEST, "invalid gzip body").into_response();
    }

    parts.headers.remove(header::CONTENT_ENCODING);
    parts.headers.remove(header::CONTENT_LENGTH);
    next.run(Request::from_parts(parts, Body::from(plain))).await
}
