//! Job service
//!
//! Client-facing operations: admission (with cache reuse), listing, details
//! and cancellation.

use std::sync::Arc;

use async_trait::async_trait;
use broker_storage::{AssignmentStorage, JobStorage, ResultStorage, Storage};
use broker_types::chrono::Utc;
use broker_types::{
	AssignmentDetails, CallerContext, Job, JobDetailsResponse, JobFilter, JobRequest, JobStatus,
	JobType, ListJobsQuery, SubmitJobRequest, SubmitJobResponse,
};
use tracing::info;

use crate::cache::CacheSelector;
use crate::errors::BrokerServiceError;
use crate::hashing::CanonicalHasher;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobServiceTrait: Send + Sync {
	/// Admit a submission, reusing a cached job when one qualifies
	async fn submit_job(
		&self,
		caller: &CallerContext,
		request: SubmitJobRequest,
	) -> Result<SubmitJobResponse, BrokerServiceError>;

	/// One page of jobs visible to the caller, newest first, plus the total
	async fn list_jobs(
		&self,
		caller: &CallerContext,
		query: &ListJobsQuery,
		offset: usize,
		limit: usize,
	) -> Result<(Vec<Job>, usize), BrokerServiceError>;

	/// A job with its assignments and their results
	async fn get_job_details(
		&self,
		caller: &CallerContext,
		job_id: &str,
	) -> Result<JobDetailsResponse, BrokerServiceError>;

	/// Cancel a `PENDING` job owned by the caller (or any job, for admins)
	async fn cancel_job(&self, caller: &CallerContext, job_id: &str)
		-> Result<Job, BrokerServiceError>;
}

pub(crate) fn parse_job_type(raw: &str) -> Result<JobType, BrokerServiceError> {
	raw.parse::<JobType>().map_err(BrokerServiceError::from)
}

pub(crate) fn parse_status(raw: &str) -> Result<JobStatus, BrokerServiceError> {
	raw.parse::<JobStatus>().map_err(BrokerServiceError::from)
}

#[derive(Clone)]
pub struct JobService {
	storage: Arc<dyn Storage>,
	cache: CacheSelector,
	hasher: CanonicalHasher,
}

impl JobService {
	pub fn new(storage: Arc<dyn Storage>) -> Self {
		Self {
			cache: CacheSelector::new(Arc::clone(&storage)),
			storage,
			hasher: CanonicalHasher::new(),
		}
	}

	async fn load_job(&self, job_id: &str) -> Result<Job, BrokerServiceError> {
		self.storage
			.get_job(job_id)
			.await?
			.ok_or_else(|| BrokerServiceError::job_not_found(job_id))
	}
}

#[async_trait]
impl JobServiceTrait for JobService {
	async fn submit_job(
		&self,
		caller: &CallerContext,
		request: SubmitJobRequest,
	) -> Result<SubmitJobResponse, BrokerServiceError> {
		let job_type = parse_job_type(&request.job_type)?;
		job_type.validate_input(&request.input)?;

		let hash = self.hasher.hash(&request.input, job_type);
		let reused = self
			.cache
			.find_reusable(&hash, request.cache_disabled)
			.await?;
		let now = Utc::now();

		let (job, new_job) = match reused {
			Some(job) => (job, None),
			None => {
				let job = Job::new(
					job_type,
					hash,
					request.input.clone(),
					caller.caller_id.clone(),
					now,
				);
				(job.clone(), Some(job))
			},
		};
		let cached = new_job.is_none();

		let audit = JobRequest::new(
			caller.caller_id.clone(),
			job_type,
			request.input,
			cached,
			job.job_id.clone(),
			now,
		);
		let request_id = audit.request_id.clone();
		self.storage.record_admission(new_job, audit).await?;

		info!(
			"Admitted {} job {} for {} (cached: {}, request: {})",
			job_type, job.job_id, caller.caller_id, cached, request_id
		);

		Ok(SubmitJobResponse {
			job_id: job.job_id,
			cached,
			request_id,
			status: job.status,
		})
	}

	async fn list_jobs(
		&self,
		caller: &CallerContext,
		query: &ListJobsQuery,
		offset: usize,
		limit: usize,
	) -> Result<(Vec<Job>, usize), BrokerServiceError> {
		let status = query.status.as_deref().map(parse_status).transpose()?;
		let owner_id = if caller.is_admin() {
			query.owner_id.clone()
		} else {
			Some(caller.caller_id.clone())
		};

		let filter = JobFilter { owner_id, status };
		Ok(self.storage.list_jobs(&filter, offset, limit).await?)
	}

	async fn get_job_details(
		&self,
		caller: &CallerContext,
		job_id: &str,
	) -> Result<JobDetailsResponse, BrokerServiceError> {
		let job = self.load_job(job_id).await?;
		// Jobs the caller may not see are reported as missing
		if !caller.can_view(&job) {
			return Err(BrokerServiceError::job_not_found(job_id));
		}

		let mut results = self.storage.list_results_for_job(job_id).await?;
		let assignments = self
			.storage
			.list_assignments_for_job(job_id)
			.await?
			.into_iter()
			.map(|assignment| {
				let result = results
					.iter()
					.position(|r| r.assignment_id == assignment.assignment_id)
					.map(|i| results.swap_remove(i));
				AssignmentDetails { assignment, result }
			})
			.collect();

		Ok(JobDetailsResponse { job, assignments })
	}

	async fn cancel_job(
		&self,
		caller: &CallerContext,
		job_id: &str,
	) -> Result<Job, BrokerServiceError> {
		let job = self.load_job(job_id).await?;
		if !caller.can_manage(&job) {
			return Err(BrokerServiceError::Unauthorized(format!(
				"caller {} may not cancel job {}",
				caller.caller_id, job_id
			)));
		}
		if job.status != JobStatus::Pending {
			return Err(BrokerServiceError::BadRequest(format!(
				"job {} is {}, only PENDING jobs can be cancelled",
				job_id, job.status
			)));
		}

		let cancelled = self.storage.cancel_job(job_id, Utc::now()).await?;
		info!("Job {} cancelled by {}", job_id, caller.caller_id);
		Ok(cancelled)
	}
}
