//! Response bodies of the job broker API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use super::{Job, JobAssignment, JobResult, JobStatus, JobType};

/// Outcome of a job submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SubmitJobResponse {
	pub job_id: String,
	/// The submission reused an existing job
	pub cached: bool,
	/// Audit record of this submission
	pub request_id: String,
	pub status: JobStatus,
}

/// A page of jobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobsListResponse {
	pub jobs: Vec<Job>,
	pub total: usize,
	pub page: u32,
	pub page_size: u32,
}

/// Jobs a worker may claim, oldest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PollJobsResponse {
	pub jobs: Vec<Job>,
}

/// An assignment together with its result, if it completed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AssignmentDetails {
	#[serde(flatten)]
	pub assignment: JobAssignment,
	pub result: Option<JobResult>,
}

/// A job with its full assignment history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobDetailsResponse {
	#[serde(flatten)]
	pub job: Job,
	pub assignments: Vec<AssignmentDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct InvalidateCacheResponse {
	pub job_type: JobType,
	/// Result rows that stopped being reusable
	pub invalidated: usize,
}

/// Summary of a timeout sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TimeoutSweepResponse {
	pub count: usize,
	/// Timed-out jobs per job type name
	pub by_type: BTreeMap<String, usize>,
	pub job_ids: Vec<String>,
}

impl TimeoutSweepResponse {
	/// Summarize the jobs a sweep transitioned
	pub fn from_jobs(jobs: &[Job]) -> Self {
		let mut by_type = BTreeMap::new();
		for job in jobs {
			*by_type.entry(job.job_type.to_string()).or_insert(0) += 1;
		}
		Self {
			count: jobs.len(),
			by_type,
			job_ids: jobs.iter().map(|job| job.job_id.clone()).collect(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobTypeInfo {
	pub job_type: JobType,
	pub expiry_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobTypesResponse {
	pub job_types: Vec<JobTypeInfo>,
}
