use axum::{extract::State, http::StatusCode, response::Json};
use broker_storage::{Storage, StorageStats};
use serde::{Deserialize, Serialize};
use tracing::warn;
#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check endpoint
#[cfg_attr(feature = "openapi", utoipa::path(
	get,
	path = "/health",
	responses((status = 200, description = "Service healthy", body = String)),
	tag = "health"
))]
pub async fn health() -> &'static str {
	"OK"
}

/// Readiness response
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ReadinessResponse {
	pub status: String,
	pub storage_healthy: bool,
	pub pending_jobs: Option<usize>,
	pub in_progress_jobs: Option<usize>,
}

/// GET /ready - Readiness probe backed by a storage check
#[cfg_attr(feature = "openapi", utoipa::path(
	get,
	path = "/ready",
	responses(
		(status = 200, description = "Ready", body = ReadinessResponse),
		(status = 503, description = "Storage unavailable", body = ReadinessResponse)
	),
	tag = "health"
))]
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
	let storage_healthy = match state.storage.health_check().await {
		Ok(healthy) => healthy,
		Err(e) => {
			warn!("Storage health check failed: {}", e);
			false
		},
	};
	let stats: Option<StorageStats> = if storage_healthy {
		state.storage.stats().await.ok()
	} else {
		None
	};

	let status = if storage_healthy { "ready" } else { "degraded" };
	let body = ReadinessResponse {
		status: status.to_string(),
		storage_healthy,
		pending_jobs: stats.as_ref().map(|s| s.pending_jobs),
		in_progress_jobs: stats.as_ref().map(|s| s.in_progress_jobs),
	};
	let code = if storage_healthy {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};
	(code, Json(body))
}
