//! Core Job domain model and lifecycle rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "openapi")]
use utoipa::ToSchema;
use uuid::Uuid;

pub mod assignment;
pub mod audit;
pub mod errors;
pub mod job_type;
pub mod request;
pub mod response;
pub mod result;

pub use assignment::{JobAssignment, WorkerIdentity};
pub use audit::JobRequest;
pub use errors::{JobTransitionError, JobValidationError};
pub use job_type::{JobType, JobTypeSpec, DEFAULT_EXPIRY_MINUTES, MAX_DURATION_MINUTES};
pub use request::{
	AssignJobRequest, InvalidateCacheRequest, ListJobsQuery, PollJobsQuery, SubmitJobRequest,
	SubmitResultRequest, TimeoutSweepRequest,
};
pub use response::{
	AssignmentDetails, InvalidateCacheResponse, JobDetailsResponse, JobTypeInfo,
	JobTypesResponse, JobsListResponse, PollJobsResponse, SubmitJobResponse,
	TimeoutSweepResponse,
};
pub use result::JobResult;

/// Lifecycle state of a job
///
/// `PENDING` is the only initial state. `SUCCEEDED`, `FAILED`, `CANCELLED`
/// and `TIMED_OUT` are terminal: nothing moves a job out of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum JobStatus {
	/// Waiting for a worker to claim it
	Pending,
	/// Claimed by a worker through an assignment
	InProgress,
	/// Worker reported success
	Succeeded,
	/// Worker reported failure
	Failed,
	/// Withdrawn by its owner or an admin before any worker claimed it
	Cancelled,
	/// Force-expired by the timeout sweep
	TimedOut,
}

impl JobStatus {
	pub const ALL: [JobStatus; 6] = [
		JobStatus::Pending,
		JobStatus::InProgress,
		JobStatus::Succeeded,
		JobStatus::Failed,
		JobStatus::Cancelled,
		JobStatus::TimedOut,
	];

	/// Whether no further transitions are permitted
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
		)
	}

	/// Whether `next` is reachable from this state in a single step
	pub fn can_transition_to(&self, next: JobStatus) -> bool {
		matches!(
			(self, next),
			(JobStatus::Pending, JobStatus::InProgress)
				| (JobStatus::Pending, JobStatus::Cancelled)
				| (JobStatus::Pending, JobStatus::TimedOut)
				| (JobStatus::InProgress, JobStatus::Succeeded)
				| (JobStatus::InProgress, JobStatus::Failed)
				| (JobStatus::InProgress, JobStatus::TimedOut)
		)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Pending => "PENDING",
			JobStatus::InProgress => "IN_PROGRESS",
			JobStatus::Succeeded => "SUCCEEDED",
			JobStatus::Failed => "FAILED",
			JobStatus::Cancelled => "CANCELLED",
			JobStatus::TimedOut => "TIMED_OUT",
		}
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for JobStatus {
	type Err = JobValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_uppercase();
		JobStatus::ALL
			.into_iter()
			.find(|status| status.as_str() == normalized)
			.ok_or_else(|| JobValidationError::UnknownStatus {
				status: s.to_string(),
			})
	}
}

/// A unit of requested computation tracked through a fixed lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Job {
	pub job_id: String,
	pub job_type: JobType,
	pub status: JobStatus,
	/// Content hash of (job type, normalized input)
	pub hash: String,
	#[cfg_attr(feature = "openapi", schema(value_type = Object))]
	pub input: serde_json::Value,
	pub owner_id: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Job {
	/// Create a new `PENDING` job
	pub fn new(
		job_type: JobType,
		hash: String,
		input: serde_json::Value,
		owner_id: String,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			job_id: Uuid::new_v4().to_string(),
			job_type,
			status: JobStatus::Pending,
			hash,
			input,
			owner_id,
			created_at: now,
			updated_at: now,
		}
	}

	/// Move the job to `next`, enforcing the lifecycle rules
	pub fn transition_to(
		&mut self,
		next: JobStatus,
		now: DateTime<Utc>,
	) -> Result<(), JobTransitionError> {
		if !self.status.can_transition_to(next) {
			return Err(JobTransitionError {
				job_id: self.job_id.clone(),
				from: self.status,
				to: next,
			});
		}
		self.status = next;
		self.updated_at = now;
		Ok(())
	}

	pub fn is_owned_by(&self, caller_id: &str) -> bool {
		self.owner_id == caller_id
	}
}

/// A job sharing a content hash, annotated for cache eligibility
#[derive(Debug, Clone, PartialEq)]
pub struct CacheCandidate {
	pub job: Job,
	/// At least one result of this job still has `cache_valid = true`
	pub has_valid_result: bool,
}

/// Filter for listing jobs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
	pub owner_id: Option<String>,
	pub status: Option<JobStatus>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn pending_job() -> Job {
		Job::new(
			JobType::Test,
			"abc".to_string(),
			json!({"id": 1}),
			"user-1".to_string(),
			Utc::now(),
		)
	}

	#[test]
	fn test_new_job_is_pending() {
		let job = pending_job();
		assert_eq!(job.status, JobStatus::Pending);
		assert_eq!(job.created_at, job.updated_at);
		assert!(Uuid::parse_str(&job.job_id).is_ok());
	}

	#[test]
	fn test_happy_path_transitions() {
		let mut job = pending_job();
		job.transition_to(JobStatus::InProgress, Utc::now()).unwrap();
		job.transition_to(JobStatus::Succeeded, Utc::now()).unwrap();
		assert_eq!(job.status, JobStatus::Succeeded);
	}

	#[test]
	fn test_in_progress_cannot_be_cancelled() {
		let mut job = pending_job();
		job.transition_to(JobStatus::InProgress, Utc::now()).unwrap();
		let err = job
			.transition_to(JobStatus::Cancelled, Utc::now())
			.unwrap_err();
		assert_eq!(err.from, JobStatus::InProgress);
		assert_eq!(err.to, JobStatus::Cancelled);
	}

	#[test]
	fn test_terminal_states_are_closed() {
		for terminal in JobStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
			for next in JobStatus::ALL {
				assert!(
					!terminal.can_transition_to(next),
					"{} -> {} must be rejected",
					terminal,
					next
				);
			}
		}
	}

	#[test]
	fn test_pending_cannot_finish_directly() {
		assert!(!JobStatus::Pending.can_transition_to(JobStatus::Succeeded));
		assert!(!JobStatus::Pending.can_transition_to(JobStatus::Failed));
	}

	#[test]
	fn test_status_parsing() {
		assert_eq!("PENDING".parse::<JobStatus>().unwrap(), JobStatus::Pending);
		assert_eq!(
			"in_progress".parse::<JobStatus>().unwrap(),
			JobStatus::InProgress
		);
		assert!("RUNNING".parse::<JobStatus>().is_err());
	}

	#[test]
	fn test_status_serde_matches_display() {
		for status in JobStatus::ALL {
			let json = serde_json::to_string(&status).unwrap();
			assert_eq!(json, format!("\"{}\"", status));
		}
	}
}
