//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use licensecore_common::services::ConsistencyReport;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: CheckResult,
    /// Informational only; drift does not make the service unready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_log: Option<ConsistencyReport>,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness check - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: licensecore_common::VERSION,
    })
}

/// Readiness check - pings the license store, then compares use counters
/// with the activation log
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = std::time::Instant::now();

    let store_check = match state.store.ping().await {
        Ok(()) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let ready = store_check.status == "up";

    let activation_log = if ready {
        match state.aggregator.consistency().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "Activation log consistency check failed");
                None
            }
        }
    } else {
        None
    };

    Json(ReadyResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            store: store_check,
            activation_log,
        },
    })
}
