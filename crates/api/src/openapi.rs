use crate::handlers::{admin, common::ErrorResponse, health, jobs, workers};
use utoipa::OpenApi;

use broker_types::{
	AssignJobRequest, AssignmentDetails, InvalidateCacheRequest, InvalidateCacheResponse, Job,
	JobAssignment, JobDetailsResponse, JobResult, JobStatus, JobType, JobTypeInfo,
	JobTypesResponse, JobsListResponse, PollJobsResponse, SubmitJobRequest, SubmitJobResponse,
	SubmitResultRequest, TimeoutSweepRequest, TimeoutSweepResponse, WorkerIdentity,
};

#[derive(OpenApi)]
#[openapi(
	paths(
		health::health,
		health::ready,
		jobs::submit_job,
		jobs::list_jobs,
		jobs::get_job,
		jobs::cancel_job,
		workers::poll_jobs,
		workers::assign_job,
		workers::submit_result,
		workers::heartbeat,
		workers::job_types,
		admin::invalidate_cache,
		admin::timeout_sweep,
	),
	components(schemas(
		ErrorResponse, health::ReadinessResponse,
		Job, JobStatus, JobType, JobAssignment, WorkerIdentity, JobResult,
		SubmitJobRequest, SubmitJobResponse, JobsListResponse, JobDetailsResponse, AssignmentDetails,
		PollJobsResponse, AssignJobRequest, SubmitResultRequest, JobTypeInfo, JobTypesResponse,
		InvalidateCacheRequest, InvalidateCacheResponse, TimeoutSweepRequest, TimeoutSweepResponse
	)),
	tags(
		(name = "jobs", description = "Job submission, listing and cancellation"),
		(name = "workers", description = "Polling, assignment and result submission"),
		(name = "admin", description = "Cache invalidation and timeout sweeps"),
		(name = "health", description = "Health and readiness endpoints")
	)
)]
pub struct ApiDoc;
