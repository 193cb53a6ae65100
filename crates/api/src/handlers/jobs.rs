//! Client-facing job endpoints

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
};
use broker_types::{
	Job, JobDetailsResponse, JobsListResponse, ListJobsQuery, SubmitJobRequest, SubmitJobResponse,
};
use tracing::debug;

use crate::auth::Caller;
use crate::handlers::common::{service_error, ApiError};
#[cfg(feature = "openapi")]
use crate::handlers::common::ErrorResponse;
use crate::pagination::page_window;
use crate::state::AppState;

/// POST /api/v1/jobs - Submit a job, reusing a cached one when possible
///
/// Answers 201 when a new job was created and 200 when an existing job was reused.
#[cfg_attr(feature = "openapi", utoipa::path(
	post,
	path = "/api/v1/jobs",
	request_body = SubmitJobRequest,
	responses(
		(status = 201, description = "New job created", body = SubmitJobResponse),
		(status = 200, description = "Existing job reused", body = SubmitJobResponse),
		(status = 400, description = "Unknown job type or invalid input", body = ErrorResponse),
		(status = 401, description = "Missing caller identity", body = ErrorResponse)
	),
	tag = "jobs"
))]
pub async fn submit_job(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), ApiError> {
	let response = state
		.job_service
		.submit_job(&caller, request)
		.await
		.map_err(service_error)?;

	let status = if response.cached {
		StatusCode::OK
	} else {
		StatusCode::CREATED
	};
	Ok((status, Json(response)))
}

/// GET /api/v1/jobs - Page through the caller's jobs (every job, for admins)
#[cfg_attr(feature = "openapi", utoipa::path(
	get,
	path = "/api/v1/jobs",
	params(ListJobsQuery),
	responses(
		(status = 200, description = "Jobs, newest first", body = JobsListResponse),
		(status = 400, description = "Unknown status filter", body = ErrorResponse)
	),
	tag = "jobs"
))]
pub async fn list_jobs(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Query(query): Query<ListJobsQuery>,
) -> Result<Json<JobsListResponse>, ApiError> {
	let window = page_window(query.page, query.page_size);
	let (jobs, total) = state
		.job_service
		.list_jobs(&caller, &query, window.offset, window.limit)
		.await
		.map_err(service_error)?;

	debug!(
		"Listed {} of {} jobs for {} (page {})",
		jobs.len(),
		total,
		caller.caller_id,
		window.page
	);
	Ok(Json(JobsListResponse {
		jobs,
		total,
		page: window.page,
		page_size: window.page_size,
	}))
}

/// GET /api/v1/jobs/{id} - A job with its assignments and results
#[cfg_attr(feature = "openapi", utoipa::path(
	get,
	path = "/api/v1/jobs/{id}",
	params(("id" = String, Path, description = "Job ID")),
	responses(
		(status = 200, description = "Job details", body = JobDetailsResponse),
		(status = 404, description = "Job not found or not visible", body = ErrorResponse)
	),
	tag = "jobs"
))]
pub async fn get_job(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Path(job_id): Path<String>,
) -> Result<Json<JobDetailsResponse>, ApiError> {
	state
		.job_service
		.get_job_details(&caller, &job_id)
		.await
		.map(Json)
		.map_err(service_error)
}

/// POST /api/v1/jobs/{id}/cancel - Cancel a pending job
#[cfg_attr(feature = "openapi", utoipa::path(
	post,
	path = "/api/v1/jobs/{id}/cancel",
	params(("id" = String, Path, description = "Job ID")),
	responses(
		(status = 200, description = "Cancelled job", body = Job),
		(status = 400, description = "Job is no longer pending", body = ErrorResponse),
		(status = 403, description = "Caller neither owns the job nor is an admin", body = ErrorResponse),
		(status = 404, description = "Job not found", body = ErrorResponse)
	),
	tag = "jobs"
))]
pub async fn cancel_job(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
	state
		.job_service
		.cancel_job(&caller, &job_id)
		.await
		.map(Json)
		.map_err(service_error)
}
