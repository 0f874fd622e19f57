use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use relaymon_common::dto::{MetricDto, MetricQueryDto};

use crate::logging::TraceId;
use crate::service::ServiceError;
use crate::state::AppState;

fn trace(trace_id: &Option<Extension<TraceId>>) -> &str {
    trace_id.as_ref().map(|t| t.0.0.as_str()).unwrap_or("-")
}

fn error_response(trace_id: &str, err: &ServiceError) -> Response {
    let status = match err {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(trace_id = %trace_id, error = %err, "request failed");
    } else {
        tracing::warn!(trace_id = %trace_id, error = %err, "request rejected");
    }
    (status, err.to_string()).into_response()
}

/// `POST /update` — single-metric upsert; echoes the stored record.
pub async fn update_metric(
    State(state): State<AppState>,
    trace_id: Option<Extension<TraceId>>,
    Json(input): Json<MetricDto>,
) -> Response {
    match state.service.create_or_update(input).await {
        Ok(stored) => (StatusCode::OK, Json(stored)).into_response(),
        Err(e) => error_response(trace(&trace_id), &e),
    }
}

/// `POST /updates` — batch upsert.
pub async fn update_batch(
    State(state): State<AppState>,
    trace_id: Option<Extension<TraceId>>,
    Json(input): Json<Vec<MetricDto>>,
) -> Response {
    match state.service.update_batch(input).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(trace(&trace_id), &e),
    }
}

/// `POST /value` — single-metric read; a missing metric is 404.
pub async fn get_metric(
    State(state): State<AppState>,
    trace_id: Option<Extension<TraceId>>,
    Json(query): Json<MetricQueryDto>,
) -> Response {
    match state.service.get(query).await {
        Ok(metric) => (StatusCode::OK, Json(metric)).into_response(),
        Err(e) => error_response(trace(&trace_id), &e),
    }
}

/// `GET /` — full dump of every stored record.
pub async fn dump_metrics(
    State(state): State<AppState>,
    trace_id: Option<Extension<TraceId>>,
) -> Response {
    match state.service.get_all().await {
        Ok(metrics) => (StatusCode::OK, Json(metrics)).into_response(),
        Err(e) => error_response(trace(&trace_id), &e),
    }
}

/// `GET /healthcheck` — receiver liveness, probed by agents before a send.
pub async fn healthcheck() -> StatusCode {
    StatusCode::OK
}

/// `GET /ping` — database reachability.
pub async fn ping(
    State(state): State<AppState>,
    trace_id: Option<Extension<TraceId>>,
) -> Response {
    match &state.db {
        Some(db) => match db.ping().await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(e) => {
                tracing::error!(trace_id = %trace(&trace_id), error = %e, "database ping failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "database unreachable").into_response()
            }
        },
        None => {
            (StatusCode::INTERNAL_SERVER_ERROR, "no database configured").into_response()
        }
    }
}
