//! Worker service
//!
//! Worker-facing operations: polling for eligible work, claiming a job,
//! heartbeats and result submission.

use std::sync::Arc;

use async_trait::async_trait;
use broker_storage::{AssignmentStorage, JobStorage, Storage};
use broker_types::chrono::{DateTime, Utc};
use broker_types::{
	AssignJobRequest, CallerContext, Job, JobAssignment, JobResult, JobStatus, JobType,
	JobTypeInfo, JobTypesResponse, SubmitResultRequest, DEFAULT_EXPIRY_MINUTES,
};
use tracing::{debug, info};

use crate::auth::require_worker;
use crate::errors::BrokerServiceError;
use crate::job::{parse_job_type, parse_status};

/// Tunables for the worker-facing operations
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
	/// Maximum number of jobs returned by one poll
	pub poll_batch_size: usize,
	/// Assignment expiry for job types without their own
	pub default_expiry_minutes: i64,
	/// Prefix of every derived result location
	pub results_base_uri: String,
}

impl Default for WorkerSettings {
	fn default() -> Self {
		Self {
			poll_batch_size: 10,
			default_expiry_minutes: DEFAULT_EXPIRY_MINUTES,
			results_base_uri: "s3://job-results".to_string(),
		}
	}
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkerServiceTrait: Send + Sync {
	/// Eligible `PENDING` jobs, oldest first. Claims nothing.
	async fn poll_jobs(
		&self,
		caller: &CallerContext,
		job_type: Option<String>,
	) -> Result<Vec<Job>, BrokerServiceError>;

	/// Claim a `PENDING` job for a worker
	async fn assign_job(
		&self,
		caller: &CallerContext,
		job_id: &str,
		request: AssignJobRequest,
	) -> Result<JobAssignment, BrokerServiceError>;

	/// Record that the worker holding an assignment is still alive
	async fn record_heartbeat(
		&self,
		caller: &CallerContext,
		assignment_id: &str,
	) -> Result<JobAssignment, BrokerServiceError>;

	/// Record a worker's outcome and finalize the job
	async fn submit_result(
		&self,
		caller: &CallerContext,
		assignment_id: &str,
		request: SubmitResultRequest,
	) -> Result<Job, BrokerServiceError>;

	/// Registered job types with their effective assignment expiry
	fn job_types(&self) -> JobTypesResponse;
}

#[derive(Clone)]
pub struct WorkerService {
	storage: Arc<dyn Storage>,
	settings: WorkerSettings,
}

/// Deterministic result location: `{base}/{type}/{job_id}/{timestamp}`
pub fn storage_location(
	base_uri: &str,
	job_type: JobType,
	job_id: &str,
	now: DateTime<Utc>,
) -> String {
	format!(
		"{}/{}/{}/{}",
		base_uri.trim_end_matches('/'),
		job_type.path_segment(),
		job_id,
		now.format("%Y%m%dT%H%M%SZ")
	)
}

impl WorkerService {
	pub fn new(storage: Arc<dyn Storage>, settings: WorkerSettings) -> Self {
		Self { storage, settings }
	}

	pub fn settings(&self) -> &WorkerSettings {
		&self.settings
	}
}

#[async_trait]
impl WorkerServiceTrait for WorkerService {
	async fn poll_jobs(
		&self,
		caller: &CallerContext,
		job_type: Option<String>,
	) -> Result<Vec<Job>, BrokerServiceError> {
		require_worker(caller)?;
		let job_type = job_type.as_deref().map(parse_job_type).transpose()?;

		let jobs = self
			.storage
			.list_pollable_jobs(job_type, Utc::now(), self.settings.poll_batch_size)
			.await?;
		debug!(
			"Worker {} polled {} jobs (type: {:?})",
			caller.caller_id,
			jobs.len(),
			job_type
		);
		Ok(jobs)
	}

	async fn assign_job(
		&self,
		caller: &CallerContext,
		job_id: &str,
		request: AssignJobRequest,
	) -> Result<JobAssignment, BrokerServiceError> {
		require_worker(caller)?;
		let worker = request.into_worker()?;

		let job = self
			.storage
			.get_job(job_id)
			.await?
			.ok_or_else(|| BrokerServiceError::job_not_found(job_id))?;
		if job.status != JobStatus::Pending {
			return Err(BrokerServiceError::BadRequest(format!(
				"job {} is {}, expected PENDING",
				job_id, job.status
			)));
		}

		let now = Utc::now();
		let default_expiry = self.settings.default_expiry_minutes;
		let expires_at = job
			.job_type
			.expiry(default_expiry)
			.and_then(|ttl| now.checked_add_signed(ttl))
			.ok_or_else(|| {
				BrokerServiceError::Internal(format!(
					"assignment expiry of {} minutes for {} is out of range",
					job.job_type.expiry_minutes(default_expiry),
					job.job_type
				))
			})?;
		let location =
			storage_location(&self.settings.results_base_uri, job.job_type, job_id, now);
		let assignment = JobAssignment::new(job.job_id.clone(), worker, location, expires_at, now);

		// The store re-checks PENDING atomically; losing a race surfaces as BadRequest
		let assignment = self.storage.create_assignment(assignment, now).await?;
		info!(
			"Job {} assigned to task {} (assignment {}, expires {})",
			job_id, assignment.worker.task_id, assignment.assignment_id, assignment.expires_at
		);
		Ok(assignment)
	}

	async fn record_heartbeat(
		&self,
		caller: &CallerContext,
		assignment_id: &str,
	) -> Result<JobAssignment, BrokerServiceError> {
		require_worker(caller)?;
		let assignment = self
			.storage
			.record_heartbeat(assignment_id, Utc::now())
			.await
			.map_err(|e| match BrokerServiceError::from(e) {
				BrokerServiceError::NotFound(_) => {
					BrokerServiceError::assignment_not_found(assignment_id)
				},
				other => other,
			})?;
		debug!("Heartbeat for assignment {}", assignment_id);
		Ok(assignment)
	}

	async fn submit_result(
		&self,
		caller: &CallerContext,
		assignment_id: &str,
		request: SubmitResultRequest,
	) -> Result<Job, BrokerServiceError> {
		require_worker(caller)?;

		let assignment = self
			.storage
			.get_assignment(assignment_id)
			.await?
			.ok_or_else(|| BrokerServiceError::assignment_not_found(assignment_id))?;
		if assignment.is_completed() {
			return Err(BrokerServiceError::BadRequest(format!(
				"assignment {} already completed",
				assignment_id
			)));
		}

		let final_status = parse_status(&request.status)?;
		if !JobStatus::InProgress.can_transition_to(final_status) {
			return Err(BrokerServiceError::BadRequest(format!(
				"{} is not a final status for an assignment",
				final_status
			)));
		}

		let job = self
			.storage
			.get_job(&assignment.job_id)
			.await?
			.ok_or_else(|| BrokerServiceError::job_not_found(&assignment.job_id))?;
		if let Some(payload) = &request.result {
			job.job_type.validate_result(payload)?;
		}

		let now = Utc::now();
		let result = JobResult::for_assignment(&assignment, request.result, request.metadata, now);
		let job = self
			.storage
			.complete_assignment(assignment_id, result, final_status, now)
			.await?;

		info!(
			"Assignment {} completed, job {} is now {}",
			assignment_id, job.job_id, job.status
		);
		Ok(job)
	}

	fn job_types(&self) -> JobTypesResponse {
		JobTypesResponse {
			job_types: JobType::ALL
				.into_iter()
				.map(|job_type| JobTypeInfo {
					job_type,
					expiry_minutes: job_type.expiry_minutes(self.settings.default_expiry_minutes),
				})
				.collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::{JobService, JobServiceTrait};
	use broker_storage::{MemoryStore, ResultStorage};
	use broker_types::chrono::{Duration, TimeZone};
	use broker_types::SubmitJobRequest;
	use serde_json::json;

	struct Fixture {
		jobs: JobService,
		workers: WorkerService,
		store: MemoryStore,
	}

	fn fixture() -> Fixture {
		let store = MemoryStore::new();
		let storage: Arc<dyn Storage> = Arc::new(store.clone());
		Fixture {
			jobs: JobService::new(Arc::clone(&storage)),
			workers: WorkerService::new(storage, WorkerSettings::default()),
			store,
		}
	}

	fn claim() -> AssignJobRequest {
		AssignJobRequest {
			task_id: "task-1".to_string(),
			cluster: Some("cluster-a".to_string()),
		}
	}

	fn outcome(status: &str, result: Option<serde_json::Value>) -> SubmitResultRequest {
		SubmitResultRequest {
			status: status.to_string(),
			result,
			metadata: None,
		}
	}

	async fn submit(f: &Fixture, job_type: &str, input: serde_json::Value) -> String {
		f.jobs
			.submit_job(
				&CallerContext::user("alice"),
				SubmitJobRequest::new(job_type, input),
			)
			.await
			.unwrap()
			.job_id
	}

	#[test]
	fn test_storage_location_layout() {
		let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
		assert_eq!(
			storage_location("s3://bucket/", JobType::ZonalStatistics, "j1", now),
			"s3://bucket/zonal-statistics/j1/20240305T070809Z"
		);
	}

	#[tokio::test]
	async fn test_assign_then_second_assign_is_bad_request() {
		let f = fixture();
		let worker = CallerContext::worker("w1");
		let job_id = submit(&f, "TEST", json!({"id": 1})).await;

		let assignment = f.workers.assign_job(&worker, &job_id, claim()).await.unwrap();
		assert_eq!(assignment.job_id, job_id);
		assert!(assignment.storage_location.starts_with("s3://job-results/test/"));
		let ttl = assignment.expires_at - assignment.created_at;
		assert_eq!(ttl, Duration::minutes(60));

		let job = f.store.get_job(&job_id).await.unwrap().unwrap();
		assert_eq!(job.status, JobStatus::InProgress);

		let err = f
			.workers
			.assign_job(&worker, &job_id, claim())
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::BadRequest(msg) if msg.contains("IN_PROGRESS")));
	}

	#[tokio::test]
	async fn test_assign_uses_type_expiry() {
		let f = fixture();
		let job_id = submit(
			&f,
			"RASTER_EXPORT",
			json!({"project_id": "p1", "format": "COG"}),
		)
		.await;
		let assignment = f
			.workers
			.assign_job(&CallerContext::worker("w1"), &job_id, claim())
			.await
			.unwrap();
		assert_eq!(
			assignment.expires_at - assignment.created_at,
			Duration::minutes(180)
		);
	}

	#[tokio::test]
	async fn test_assign_errors() {
		let f = fixture();
		let err = f
			.workers
			.assign_job(&CallerContext::worker("w1"), "missing", claim())
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::NotFound(_)));

		let job_id = submit(&f, "TEST", json!({"id": 2})).await;
		let err = f
			.workers
			.assign_job(&CallerContext::user("alice"), &job_id, claim())
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::Unauthorized(_)));

		let blank = AssignJobRequest {
			task_id: "  ".to_string(),
			cluster: None,
		};
		let err = f
			.workers
			.assign_job(&CallerContext::worker("w1"), &job_id, blank)
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::BadRequest(_)));
	}

	#[tokio::test]
	async fn test_assign_with_unrepresentable_expiry_fails_cleanly() {
		let store = MemoryStore::new();
		let storage: Arc<dyn Storage> = Arc::new(store.clone());
		let jobs = JobService::new(Arc::clone(&storage));
		let settings = WorkerSettings {
			default_expiry_minutes: i64::MAX,
			..WorkerSettings::default()
		};
		let workers = WorkerService::new(storage, settings);
		let job = jobs
			.submit_job(
				&CallerContext::user("alice"),
				SubmitJobRequest::new("TEST", json!({"id": 9})),
			)
			.await
			.unwrap();

		let err = workers
			.assign_job(&CallerContext::worker("w1"), &job.job_id, claim())
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::Internal(msg) if msg.contains("out of range")));
		let stored = store.get_job(&job.job_id).await.unwrap().unwrap();
		assert_eq!(stored.status, JobStatus::Pending);

		// Types with their own expiry are unaffected
		let catalogue = workers.job_types();
		let series = catalogue
			.job_types
			.iter()
			.find(|info| info.job_type == JobType::TimeSeries)
			.unwrap();
		assert_eq!(series.expiry_minutes, 120);
	}

	#[tokio::test]
	async fn test_concurrent_assign_has_single_winner() {
		let f = fixture();
		let job_id = submit(&f, "TEST", json!({"id": 3})).await;
		let workers = Arc::new(f.workers.clone());

		let attempts = (0..8).map(|i| {
			let workers = Arc::clone(&workers);
			let job_id = job_id.clone();
			tokio::spawn(async move {
				let request = AssignJobRequest {
					task_id: format!("task-{}", i),
					cluster: None,
				};
				workers
					.assign_job(&CallerContext::worker("w"), &job_id, request)
					.await
			})
		});
		let outcomes = futures::future::join_all(attempts).await;
		let winners = outcomes
			.into_iter()
			.filter(|joined| matches!(joined, Ok(Ok(_))))
			.count();
		assert_eq!(winners, 1);
		assert_eq!(f.store.list_assignments_for_job(&job_id).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_submit_result_then_resubmit_is_rejected() {
		let f = fixture();
		let worker = CallerContext::worker("w1");
		let job_id = submit(&f, "TEST", json!({"id": 4})).await;
		let assignment = f.workers.assign_job(&worker, &job_id, claim()).await.unwrap();

		let job = f
			.workers
			.submit_result(
				&worker,
				&assignment.assignment_id,
				outcome("SUCCEEDED", Some(json!({"answer": 42}))),
			)
			.await
			.unwrap();
		assert_eq!(job.status, JobStatus::Succeeded);

		let stored = f
			.store
			.get_result_for_assignment(&assignment.assignment_id)
			.await
			.unwrap()
			.unwrap();
		assert!(stored.cache_valid);
		assert_eq!(stored.storage_location, assignment.storage_location);

		let err = f
			.workers
			.submit_result(&worker, &assignment.assignment_id, outcome("FAILED", None))
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::BadRequest(msg) if msg.contains("already completed")));
	}

	#[tokio::test]
	async fn test_submit_result_validation() {
		let f = fixture();
		let worker = CallerContext::worker("w1");

		let err = f
			.workers
			.submit_result(&worker, "missing", outcome("SUCCEEDED", None))
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::NotFound(_)));

		let job_id = submit(
			&f,
			"RASTER_EXPORT",
			json!({"project_id": "p1", "format": "PNG"}),
		)
		.await;
		let assignment = f.workers.assign_job(&worker, &job_id, claim()).await.unwrap();

		let err = f
			.workers
			.submit_result(&worker, &assignment.assignment_id, outcome("CANCELLED", None))
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::BadRequest(_)));

		let err = f
			.workers
			.submit_result(
				&worker,
				&assignment.assignment_id,
				outcome("SUCCEEDED", Some(json!({"path": "nowhere"}))),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerServiceError::BadRequest(msg) if msg.contains("RASTER_EXPORT")));

		// Rejections leave the assignment outstanding
		let job = f
			.workers
			.submit_result(&worker, &assignment.assignment_id, outcome("FAILED", None))
			.await
			.unwrap();
		assert_eq!(job.status, JobStatus::Failed);
	}

	#[tokio::test]
	async fn test_poll_excludes_claimed_jobs() {
		let f = fixture();
		let worker = CallerContext::worker("w1");
		let first = submit(&f, "TEST", json!({"id": 5})).await;
		let second = submit(&f, "TEST", json!({"id": 6})).await;
		f.workers.assign_job(&worker, &first, claim()).await.unwrap();

		let polled = f.workers.poll_jobs(&worker, None).await.unwrap();
		let ids: Vec<_> = polled.into_iter().map(|job| job.job_id).collect();
		assert_eq!(ids, vec![second]);

		let none = f
			.workers
			.poll_jobs(&worker, Some("time_series".to_string()))
			.await
			.unwrap();
		assert!(none.is_empty());

		assert!(matches!(
			f.workers.poll_jobs(&worker, Some("BOGUS".to_string())).await,
			Err(BrokerServiceError::BadRequest(_))
		));
		assert!(matches!(
			f.workers.poll_jobs(&CallerContext::user("alice"), None).await,
			Err(BrokerServiceError::Unauthorized(_))
		));
	}

	#[tokio::test]
	async fn test_poll_batch_is_bounded() {
		let store = MemoryStore::new();
		let storage: Arc<dyn Storage> = Arc::new(store);
		let jobs = JobService::new(Arc::clone(&storage));
		let settings = WorkerSettings {
			poll_batch_size: 2,
			..Default::default()
		};
		let workers = WorkerService::new(storage, settings);

		for id in 0..5 {
			jobs.submit_job(
				&CallerContext::user("alice"),
				SubmitJobRequest::new("TEST", json!({"id": id})),
			)
			.await
			.unwrap();
		}
		let polled = workers
			.poll_jobs(&CallerContext::worker("w1"), None)
			.await
			.unwrap();
		assert_eq!(polled.len(), 2);
	}

	#[tokio::test]
	async fn test_heartbeat() {
		let f = fixture();
		let worker = CallerContext::worker("w1");
		let job_id = submit(&f, "TEST", json!({"id": 8})).await;
		let assignment = f.workers.assign_job(&worker, &job_id, claim()).await.unwrap();

		let beat = f
			.workers
			.record_heartbeat(&worker, &assignment.assignment_id)
			.await
			.unwrap();
		assert!(beat.heartbeat_at.is_some());
		assert_eq!(beat.expires_at, assignment.expires_at);

		let err = f.workers.record_heartbeat(&worker, "missing").await.unwrap_err();
		assert!(matches!(err, BrokerServiceError::NotFound(msg) if msg.contains("assignment")));
	}

	#[test]
	fn test_job_type_catalogue() {
		let store: Arc<dyn Storage> = Arc::new(MemoryStore::new());
		let workers = WorkerService::new(store, WorkerSettings::default());
		let catalogue = workers.job_types();
		assert_eq!(catalogue.job_types.len(), JobType::ALL.len());
		let test = catalogue
			.job_types
			.iter()
			.find(|info| info.job_type == JobType::Test)
			.unwrap();
		assert_eq!(test.expiry_minutes, 60);
	}
}
