//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::services::EnrichmentStatsSnapshot;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" or "degraded")
    pub status: String,
    /// Module name ("ptrack-api")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Storage backend in use
    pub storage: String,
    /// Whether a collaborator credential is configured
    pub collaborator_configured: bool,
    pub enrichment: EnrichmentHealth,
    /// Most recent enrichment failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EnrichmentHealth {
    pub in_flight: usize,
    #[serde(flatten)]
    pub counters: EnrichmentStatsSnapshot,
}

/// GET /health
///
/// Reports "degraded" when no collaborator credential is configured.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let collaborator_configured = state.enrichment.is_enabled();
    let stats = state.enrichment.stats();

    Json(HealthResponse {
        status: if collaborator_configured { "ok" } else { "degraded" }.to_string(),
        module: "ptrack-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        storage: state.settings.storage.to_string(),
        collaborator_configured,
        enrichment: EnrichmentHealth {
            in_flight: state.enrichment.in_flight(),
            counters: stats.snapshot(),
        },
        last_error: stats.last_error(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
