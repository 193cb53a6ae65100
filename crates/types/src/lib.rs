//! Broker Types
//!
//! Shared models and traits for the compute-job broker.
//! This crate contains the domain entities (jobs, assignments, results and
//! the audit trail of submissions), the job type registration table, the
//! caller identity model and the storage traits every backend implements.

pub mod auth;
pub mod jobs;
pub mod secrets;
pub mod storage;

// Re-export chrono and serde_json for convenience
pub use chrono;
pub use serde_json;

pub use jobs::{
	AssignJobRequest, AssignmentDetails, CacheCandidate, InvalidateCacheRequest,
	InvalidateCacheResponse, Job, JobAssignment, JobDetailsResponse, JobFilter, JobRequest,
	JobResult, JobStatus, JobTransitionError, JobType, JobTypeInfo, JobTypeSpec,
	JobTypesResponse, JobValidationError, JobsListResponse, ListJobsQuery, PollJobsQuery,
	PollJobsResponse, SubmitJobRequest, SubmitJobResponse, SubmitResultRequest,
	TimeoutSweepRequest, TimeoutSweepResponse, WorkerIdentity, DEFAULT_EXPIRY_MINUTES,
	MAX_DURATION_MINUTES,
};

pub use auth::{CallerContext, ROLE_ADMIN, ROLE_WORKER};

pub use secrets::SecretString;

pub use storage::{
	AssignmentStorageTrait, JobStorageTrait, ResultStorageTrait, StorageError, StorageResult,
	StorageStats, StorageTrait,
};
