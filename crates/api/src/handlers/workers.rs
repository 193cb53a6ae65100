//! Worker-facing endpoints

use axum::{
	extract::{Path, Query, State},
	response::Json,
};
use broker_types::{
	AssignJobRequest, Job, JobAssignment, JobTypesResponse, PollJobsQuery, PollJobsResponse,
	SubmitResultRequest,
};

use crate::auth::Caller;
use crate::handlers::common::{service_error, ApiError};
#[cfg(feature = "openapi")]
use crate::handlers::common::ErrorResponse;
use crate::state::AppState;

/// GET /api/v1/jobs/poll - Pending jobs a worker may claim, oldest first
#[cfg_attr(feature = "openapi", utoipa::path(
	get,
	path = "/api/v1/jobs/poll",
	params(PollJobsQuery),
	responses(
		(status = 200, description = "Claimable jobs", body = PollJobsResponse),
		(status = 403, description = "Caller is not a worker", body = ErrorResponse)
	),
	tag = "workers"
))]
pub async fn poll_jobs(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Query(query): Query<PollJobsQuery>,
) -> Result<Json<PollJobsResponse>, ApiError> {
	let jobs = state
		.worker_service
		.poll_jobs(&caller, query.job_type)
		.await
		.map_err(service_error)?;
	Ok(Json(PollJobsResponse { jobs }))
}

/// POST /api/v1/jobs/{id}/assign - Claim a pending job
#[cfg_attr(feature = "openapi", utoipa::path(
	post,
	path = "/api/v1/jobs/{id}/assign",
	params(("id" = String, Path, description = "Job ID")),
	request_body = AssignJobRequest,
	responses(
		(status = 200, description = "Assignment created", body = JobAssignment),
		(status = 400, description = "Job already claimed or not pending", body = ErrorResponse),
		(status = 404, description = "Job not found", body = ErrorResponse)
	),
	tag = "workers"
))]
pub async fn assign_job(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Path(job_id): Path<String>,
	Json(request): Json<AssignJobRequest>,
) -> Result<Json<JobAssignment>, ApiError> {
	state
		.worker_service
		.assign_job(&caller, &job_id, request)
		.await
		.map(Json)
		.map_err(service_error)
}

/// POST /api/v1/assignments/{id}/result - Report the outcome of an assignment
#[cfg_attr(feature = "openapi", utoipa::path(
	post,
	path = "/api/v1/assignments/{id}/result",
	params(("id" = String, Path, description = "Assignment ID")),
	request_body = SubmitResultRequest,
	responses(
		(status = 200, description = "Job after completion", body = Job),
		(status = 400, description = "Already completed, bad status or invalid result", body = ErrorResponse),
		(status = 404, description = "Assignment not found", body = ErrorResponse)
	),
	tag = "workers"
))]
pub async fn submit_result(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Path(assignment_id): Path<String>,
	Json(request): Json<SubmitResultRequest>,
) -> Result<Json<Job>, ApiError> {
	state
		.worker_service
		.submit_result(&caller, &assignment_id, request)
		.await
		.map(Json)
		.map_err(service_error)
}

/// POST /api/v1/assignments/{id}/heartbeat - Mark an assignment as alive
#[cfg_attr(feature = "openapi", utoipa::path(
	post,
	path = "/api/v1/assignments/{id}/heartbeat",
	params(("id" = String, Path, description = "Assignment ID")),
	responses(
		(status = 200, description = "Updated assignment", body = JobAssignment),
		(status = 400, description = "Assignment already completed", body = ErrorResponse),
		(status = 404, description = "Assignment not found", body = ErrorResponse)
	),
	tag = "workers"
))]
pub async fn heartbeat(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Path(assignment_id): Path<String>,
) -> Result<Json<JobAssignment>, ApiError> {
	state
		.worker_service
		.record_heartbeat(&caller, &assignment_id)
		.await
		.map(Json)
		.map_err(service_error)
}

/// GET /api/v1/job-types - Registered job types
#[cfg_attr(feature = "openapi", utoipa::path(
	get,
	path = "/api/v1/job-types",
	responses((status = 200, description = "Job type catalogue", body = JobTypesResponse)),
	tag = "workers"
))]
pub async fn job_types(
	State(state): State<AppState>,
	Caller(_caller): Caller,
) -> Json<JobTypesResponse> {
	Json(state.worker_service.job_types())
}
