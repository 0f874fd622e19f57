use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

const ENCRYPTION_HEADER: &str = "Content-Encryption";
const ENCRYPTION_SCHEME: &str = "rsa-oaep-sha256";

/// Decrypts request bodies marked `Content-Encryption: rsa-oaep-sha256`
/// back to the compressed payload. Unmarked requests pass through.
pub async fn decrypt_request(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let encrypted = req
        .headers()
        .get(ENCRYPTION_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == ENCRYPTION_SCHEME);

    if !encrypted {
        return next.run(req).await;
    }

    let Some(decryptor) = state.decryptor.clone() else {
        return (StatusCode::BAD_REQUEST, "encryption not configured").into_response();
    };

    let (mut parts, body) = req.into_parts();
    let ciphertext = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::BAD_REQUEST, "error read body").into_response(),
    };

    let plain = match decryptor.decrypt(&ciphertext) {
        Ok(plain) => plain,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("decrypt error: {e}")).into_response();
        }
    };

    parts.headers.remove(ENCRYPTION_HEADER);
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    next.run(Request::from_parts(parts, Body::from(plain))).await
}
