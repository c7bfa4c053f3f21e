/**
 * Client Log Intake
 * Re-emits browser log batches as structured `client_log` events
 */
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use tower_http::request_id::RequestId;

use crate::logging::config::{ClientLogBatch, ClientLogEntry, LogLevel, LogResponse, MAX_BATCH_SIZE};

/// POST /api/logs
#[tracing::instrument(skip_all, fields(batch_size = batch.logs.len()))]
pub async fn receive_client_logs(
    request_id: Option<Extension<RequestId>>,
    Json(batch): Json<ClientLogBatch>,
) -> impl IntoResponse {
    let req_id = request_id
        .as_ref()
        .and_then(|ext| ext.0.header_value().to_str().ok())
        .unwrap_or("unknown");

    let received = batch.logs.len();
    if received > MAX_BATCH_SIZE {
        tracing::warn!(request_id = %req_id, received, "client log batch truncated");
    }

    let mut processed = 0;
    for entry in batch.logs.iter().take(MAX_BATCH_SIZE) {
        emit(entry, req_id);
        processed += 1;
    }

    (
        StatusCode::ACCEPTED,
        Json(LogResponse {
            success: true,
            received,
            processed,
        }),
    )
}

fn emit(entry: &ClientLogEntry, request_id: &str) {
    let span = tracing::info_span!(
        "client_log",
        request_id = %request_id,
        timestamp = %entry.timestamp,
        page = entry.page.as_deref().unwrap_or("-"),
        source = "client",
    );
    let _enter = span.enter();

    match entry.level {
        LogLevel::Trace => tracing::trace!(message = %entry.message, context = ?entry.context, "client log"),
        LogLevel::Debug => tracing::debug!(message = %entry.message, context = ?entry.context, "client log"),
        LogLevel::Info => tracing::info!(message = %entry.message, context = ?entry.context, "client log"),
        LogLevel::Warn => tracing::warn!(message = %entry.message, context = ?entry.context, "client log"),
        LogLevel::Error => tracing::error!(message = %entry.message, context = ?entry.context, "client log"),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{send_json, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_batch_is_accepted() {
        let t = test_app().await;
        let (status, body) = send_json(
            &t.app,
            "POST",
            "/api/logs",
            None,
            &json!({ "logs": [
                { "timestamp": "2026-01-01T00:00:00Z", "level": "error", "message": "boom", "page": "/donate" },
                { "timestamp": "2026-01-01T00:00:01Z", "level": "info", "message": "hello" }
            ] }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["received"], 2);
        assert_eq!(body["processed"], 2);
    }

    #[tokio::test]
    async fn test_unknown_level_is_rejected() {
        let t = test_app().await;
        let (status, _) = send_json(
            &t.app,
            "POST",
            "/api/logs",
            None,
            &json!({ "logs": [{ "timestamp": "t", "level": "fatal", "message": "x" }] }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
