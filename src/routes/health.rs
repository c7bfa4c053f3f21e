/**
 * Health Routes
 * Liveness, backend round-trip timing and readiness
 */
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

// Track server start time for uptime calculation
lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

/// Initialize the server start time
pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

/// Single service check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub cached_pages: usize,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub backend: ServiceCheck,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

/// GET /health
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

async fn check_backend(state: &AppState) -> ServiceCheck {
    let start = Instant::now();
    match state.cms.store().ping().await {
        Ok(()) => ServiceCheck {
            status: "healthy".to_string(),
            response_time: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "backend health check failed");
            ServiceCheck {
                status: "unhealthy".to_string(),
                response_time: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// GET /health/detailed - Backend round-trip timing
pub async fn health_detailed(State(state): State<AppState>) -> impl IntoResponse {
    let backend = check_backend(&state).await;
    let status = if backend.status == "healthy" {
        "ok"
    } else {
        "degraded"
    };

    let response = DetailedHealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        uptime: SERVER_START.elapsed().as_secs(),
        cached_pages: state.pages.cache().len().await,
        checks: HealthChecks { backend },
    };

    (StatusCode::OK, Json(response))
}

/// GET /health/ready - 503 until the backend answers
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let backend = check_backend(&state).await;
    let ready = backend.status == "healthy";

    let response = ReadyResponse {
        status: if ready { "ready" } else { "not ready" }.to_string(),
        timestamp: Utc::now(),
        uptime: SERVER_START.elapsed().as_secs(),
        reason: backend.error,
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
