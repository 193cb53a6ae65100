//! Admin maintenance endpoints

use axum::{extract::State, response::Json};
use broker_service::require_admin;
use broker_types::{
	InvalidateCacheRequest, InvalidateCacheResponse, TimeoutSweepRequest, TimeoutSweepResponse,
};
use tracing::info;

use crate::auth::Caller;
use crate::handlers::common::{parse_job_type, service_error, ApiError};
#[cfg(feature = "openapi")]
use crate::handlers::common::ErrorResponse;
use crate::state::AppState;

/// POST /api/v1/admin/cache/invalidate - Stop reusing results of a job type
#[cfg_attr(feature = "openapi", utoipa::path(
	post,
	path = "/api/v1/admin/cache/invalidate",
	request_body = InvalidateCacheRequest,
	responses(
		(status = 200, description = "Results invalidated", body = InvalidateCacheResponse),
		(status = 400, description = "Unknown job type", body = ErrorResponse),
		(status = 403, description = "Caller is not an admin", body = ErrorResponse)
	),
	tag = "admin"
))]
pub async fn invalidate_cache(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Json(request): Json<InvalidateCacheRequest>,
) -> Result<Json<InvalidateCacheResponse>, ApiError> {
	require_admin(&caller).map_err(service_error)?;
	let job_type = parse_job_type(&request.job_type)?;

	info!("{} requested cache invalidation for {}", caller.caller_id, job_type);
	state
		.maintenance_service
		.invalidate_cache(job_type)
		.await
		.map(Json)
		.map_err(service_error)
}

/// POST /api/v1/admin/jobs/timeout - Time out jobs older than a threshold
#[cfg_attr(feature = "openapi", utoipa::path(
	post,
	path = "/api/v1/admin/jobs/timeout",
	request_body = TimeoutSweepRequest,
	responses(
		(status = 200, description = "Sweep summary", body = TimeoutSweepResponse),
		(status = 400, description = "Negative threshold or unknown job type", body = ErrorResponse),
		(status = 403, description = "Caller is not an admin", body = ErrorResponse)
	),
	tag = "admin"
))]
pub async fn timeout_sweep(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Json(request): Json<TimeoutSweepRequest>,
) -> Result<Json<TimeoutSweepResponse>, ApiError> {
	require_admin(&caller).map_err(service_error)?;
	let job_type = request
		.job_type
		.as_deref()
		.map(parse_job_type)
		.transpose()?;

	info!(
		"{} requested a timeout sweep (threshold {} min)",
		caller.caller_id, request.threshold_minutes
	);
	state
		.maintenance_service
		.sweep_timed_out_jobs(request.threshold_minutes, job_type)
		.await
		.map(Json)
		.map_err(service_error)
}
