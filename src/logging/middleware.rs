//! Per-request logging and `x-request-id` handling.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

/// Probes hit these every few seconds; they are logged at debug only.
fn is_probe(path: &str) -> bool {
    path == "/health" || path.starts_with("/health/")
}

pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let probe = is_probe(&path);

    let req_id: String = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    if !probe {
        tracing::info!(request_id = %req_id, method = %method, path = %path, "incoming request");
    }

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            request_id = %req_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "request completed with error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            request_id = %req_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "request completed with client error"
        );
    } else if probe {
        tracing::debug!(path = %path, status = status.as_u16(), duration_ms, "probe");
    } else {
        tracing::info!(
            request_id = %req_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms,
            "request completed"
        );
    }

    response
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_paths() {
        assert!(is_probe("/health"));
        assert!(is_probe("/health/ready"));
        assert!(!is_probe("/healthy-kids"));
        assert!(!is_probe("/api/campaigns"));
    }
}
