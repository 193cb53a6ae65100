//! Storage traits for pluggable storage implementations
//!
//! Every mutating method is one atomic unit: either all of its writes are
//! visible afterwards or none are. Methods that guard a state change
//! (`create_assignment`, `complete_assignment`, `cancel_job`,
//! `record_heartbeat`) re-check the expected prior state inside that unit
//! and fail with [`StorageError::Conflict`] when another caller got there
//! first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::StorageResult;
use crate::{
	CacheCandidate, Job, JobAssignment, JobFilter, JobRequest, JobResult, JobStatus, JobType,
};

/// Statistics about storage usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
	pub total_jobs: usize,
	pub pending_jobs: usize,
	pub in_progress_jobs: usize,
	pub total_requests: usize,
	pub total_assignments: usize,
	pub total_results: usize,
	pub valid_results: usize,
}

/// Trait for job and submission-audit storage
#[async_trait]
pub trait JobStorageTrait: Send + Sync {
	/// All jobs sharing `hash`, each flagged with whether it still has a
	/// cache-valid result
	async fn find_cache_candidates(&self, hash: &str) -> StorageResult<Vec<CacheCandidate>>;

	/// Persist an admission: the new job (on a cache miss) and its audit row
	/// together
	async fn record_admission(&self, new_job: Option<Job>, request: JobRequest)
		-> StorageResult<()>;

	/// Get a job by ID
	async fn get_job(&self, job_id: &str) -> StorageResult<Option<Job>>;

	/// Get a submission audit row by ID
	async fn get_job_request(&self, request_id: &str) -> StorageResult<Option<JobRequest>>;

	/// One page of jobs matching `filter`, newest first, plus the total match count
	async fn list_jobs(
		&self,
		filter: &JobFilter,
		offset: usize,
		limit: usize,
	) -> StorageResult<(Vec<Job>, usize)>;

	/// `PENDING` jobs without an active assignment at `now`, oldest first
	async fn list_pollable_jobs(
		&self,
		job_type: Option<JobType>,
		now: DateTime<Utc>,
		limit: usize,
	) -> StorageResult<Vec<Job>>;

	/// Move a `PENDING` job to `CANCELLED`
	async fn cancel_job(&self, job_id: &str, now: DateTime<Utc>) -> StorageResult<Job>;

	/// Move every `PENDING` or `IN_PROGRESS` job created before
	/// `created_before` to `TIMED_OUT`, returning the updated jobs
	async fn time_out_stale_jobs(
		&self,
		created_before: DateTime<Utc>,
		job_type: Option<JobType>,
		now: DateTime<Utc>,
	) -> StorageResult<Vec<Job>>;
}

/// Trait for worker assignment storage
#[async_trait]
pub trait AssignmentStorageTrait: Send + Sync {
	/// Claim the assignment's job: insert the assignment and move the job
	/// from `PENDING` to `IN_PROGRESS`
	async fn create_assignment(
		&self,
		assignment: JobAssignment,
		now: DateTime<Utc>,
	) -> StorageResult<JobAssignment>;

	/// Get an assignment by ID
	async fn get_assignment(&self, assignment_id: &str) -> StorageResult<Option<JobAssignment>>;

	/// All assignments of a job, oldest first
	async fn list_assignments_for_job(&self, job_id: &str) -> StorageResult<Vec<JobAssignment>>;

	/// Stamp `heartbeat_at` on an outstanding assignment
	async fn record_heartbeat(
		&self,
		assignment_id: &str,
		now: DateTime<Utc>,
	) -> StorageResult<JobAssignment>;

	/// Finish an outstanding assignment: store its result, set
	/// `completed_at` and move the job from `IN_PROGRESS` to `final_status`
	async fn complete_assignment(
		&self,
		assignment_id: &str,
		result: JobResult,
		final_status: JobStatus,
		now: DateTime<Utc>,
	) -> StorageResult<Job>;
}

/// Trait for job result storage
#[async_trait]
pub trait ResultStorageTrait: Send + Sync {
	/// Get the result recorded for an assignment
	async fn get_result_for_assignment(
		&self,
		assignment_id: &str,
	) -> StorageResult<Option<JobResult>>;

	/// All results of a job, oldest first
	async fn list_results_for_job(&self, job_id: &str) -> StorageResult<Vec<JobResult>>;

	/// Clear `cache_valid` on every valid result of the given type,
	/// returning how many rows changed
	async fn invalidate_results_for_type(&self, job_type: JobType) -> StorageResult<usize>;
}

/// Main storage trait that combines all storage operations
#[async_trait]
pub trait StorageTrait: JobStorageTrait + AssignmentStorageTrait + ResultStorageTrait {
	/// Health check for the storage system
	async fn health_check(&self) -> StorageResult<bool>;

	/// Get overall storage statistics
	async fn stats(&self) -> StorageResult<StorageStats>;

	/// Close the storage connection
	async fn close(&self) -> StorageResult<()>;
}
