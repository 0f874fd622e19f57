use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

const SIGNATURE_HEADER: &str = "HashSHA256";

/// Verifies the `HashSHA256` header of state-changing requests against the
/// body as received (the post-compression payload the sender signed), and
/// signs every response body so the sender can verify server responses too.
///
/// Entirely a no-op when no shared secret is configured; a request without
/// the header passes unverified, matching the sender side where an absent
/// secret sends no header.
pub async fn signature(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(signer) = state.signer.clone() else {
        return next.run(req).await;
    };

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::BAD_REQUEST, "error read body").into_response(),
    };

    let mutating = matches!(parts.method, Method::POST | Method::PUT | Method::PATCH);
    if mutating {
        if let Some(tag) = parts
            .headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if !tag.is_empty() && !signer.verify(tag, &bytes) {
                return (StatusCode::BAD_REQUEST, "invalid signature").into_response();
            }
        }
    }

    let response = next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await;

    // Re-sign the full response body.
    let (mut parts, body) = response.into_parts();
    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "error read response").into_response()
        }
    };

    let tag = signer.compute(&body_bytes);
    parts.headers.remove(header::CONTENT_LENGTH);
    if let Ok(val) = HeaderValue::from_str(&tag) {
        parts.headers.insert(SIGNATURE_HEADER, val);
    }
    Response::from_parts(parts, Body::from(body_bytes))
}
