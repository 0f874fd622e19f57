use std::net::IpAddr;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

const REAL_IP_HEADER: &str = "X-Real-IP";

/// Rejects any request whose declared source address (`X-Real-IP`) does not
/// fall inside the configured trusted CIDR. Without a configured subnet the
/// layer passes everything through.
pub async fn trusted_subnet(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(subnet) = state.trusted_subnet else {
        return next.run(req).await;
    };

    let Some(ip_str) = req
        .headers()
        .get(REAL_IP_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::FORBIDDEN, "X-Real-IP header required").into_response();
    };

    match ip_str.parse::<IpAddr>() {
        Ok(ip) if subnet.contains(&ip) => next.run(req).await,
        _ => (StatusCode::FORBIDDEN, "forbidden").into_response(),
    }
}
