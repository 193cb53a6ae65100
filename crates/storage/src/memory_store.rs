//! In-memory storage implementation
//!
//! All tables live behind one `RwLock`, so every trait method runs against a
//! consistent snapshot and its writes land together, which gives the same
//! atomicity the relational backend gets from a transaction.

use crate::traits::{
	AssignmentStorage, JobStorage, ResultStorage, Storage, StorageError, StorageResult,
	StorageStats,
};
use async_trait::async_trait;
use broker_types::chrono::{DateTime, Utc};
use broker_types::{
	CacheCandidate, Job, JobAssignment, JobFilter, JobRequest, JobResult, JobStatus, JobType,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
	jobs: HashMap<String, Job>,
	requests: HashMap<String, JobRequest>,
	assignments: HashMap<String, JobAssignment>,
	results: HashMap<String, JobResult>,
}

impl Tables {
	fn has_active_assignment(&self, job_id: &str, now: DateTime<Utc>) -> bool {
		self.assignments
			.values()
			.any(|a| a.job_id == job_id && a.is_active(now))
	}

	fn has_valid_result(&self, job_id: &str) -> bool {
		self.results
			.values()
			.any(|r| r.job_id == job_id && r.cache_valid)
	}
}

/// In-memory storage for jobs, submission audit rows, assignments and results
///
/// Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
	tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
	/// Create a new, empty memory store
	pub fn new() -> Self {
		Self::default()
	}
}

fn oldest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, &str)) {
	items.sort_by(|a, b| key(a).cmp(&key(b)));
}

#[async_trait]
impl JobStorage for MemoryStore {
	async fn find_cache_candidates(&self, hash: &str) -> StorageResult<Vec<CacheCandidate>> {
		let tables = self.tables.read().await;
		Ok(tables
			.jobs
			.values()
			.filter(|job| job.hash == hash)
			.map(|job| CacheCandidate {
				job: job.clone(),
				has_valid_result: tables.has_valid_result(&job.job_id),
			})
			.collect())
	}

	async fn record_admission(
		&self,
		new_job: Option<Job>,
		request: JobRequest,
	) -> StorageResult<()> {
		let mut tables = self.tables.write().await;

		// The audit row must point at a job that exists once we commit
		let resolves = match &new_job {
			Some(job) => job.job_id == request.job_id,
			None => tables.jobs.contains_key(&request.job_id),
		};
		if !resolves {
			return Err(StorageError::not_found(request.job_id.clone()));
		}

		if let Some(job) = new_job {
			debug!("Inserting job {} ({})", job.job_id, job.job_type);
			tables.jobs.insert(job.job_id.clone(), job);
		}
		tables.requests.insert(request.request_id.clone(), request);
		Ok(())
	}

	async fn get_job(&self, job_id: &str) -> StorageResult<Option<Job>> {
		Ok(self.tables.read().await.jobs.get(job_id).cloned())
	}

	async fn get_job_request(&self, request_id: &str) -> StorageResult<Option<JobRequest>> {
		Ok(self.tables.read().await.requests.get(request_id).cloned())
	}

	async fn list_jobs(
		&self,
		filter: &JobFilter,
		offset: usize,
		limit: usize,
	) -> StorageResult<(Vec<Job>, usize)> {
		let tables = self.tables.read().await;
		let mut jobs: Vec<Job> = tables
			.jobs
			.values()
			.filter(|job| {
				filter
					.owner_id
					.as_deref()
					.map_or(true, |owner| job.owner_id == owner)
			})
			.filter(|job| filter.status.map_or(true, |status| job.status == status))
			.cloned()
			.collect();
		oldest_first(&mut jobs, |job| (job.created_at, job.job_id.as_str()));
		jobs.reverse();

		let total = jobs.len();
		let page = jobs.into_iter().skip(offset).take(limit).collect();
		Ok((page, total))
	}

	async fn list_pollable_jobs(
		&self,
		job_type: Option<JobType>,
		now: DateTime<Utc>,
		limit: usize,
	) -> StorageResult<Vec<Job>> {
		let tables = self.tables.read().await;
		let mut jobs: Vec<Job> = tables
			.jobs
			.values()
			.filter(|job| job.status == JobStatus::Pending)
			.filter(|job| job_type.map_or(true, |t| job.job_type == t))
			.filter(|job| !tables.has_active_assignment(&job.job_id, now))
			.cloned()
			.collect();
		oldest_first(&mut jobs, |job| (job.created_at, job.job_id.as_str()));
		jobs.truncate(limit);
		Ok(jobs)
	}

	async fn cancel_job(&self, job_id: &str, now: DateTime<Utc>) -> StorageResult<Job> {
		let mut tables = self.tables.write().await;
		let job = tables
			.jobs
			.get_mut(job_id)
			.ok_or_else(|| StorageError::not_found(job_id))?;

		if job.status != JobStatus::Pending {
			return Err(StorageError::conflict(
				job_id,
				format!("expected PENDING, found {}", job.status),
			));
		}
		job.transition_to(JobStatus::Cancelled, now)
			.map_err(|e| StorageError::conflict(job_id, e.to_string()))?;
		Ok(job.clone())
	}

	async fn time_out_stale_jobs(
		&self,
		created_before: DateTime<Utc>,
		job_type: Option<JobType>,
		now: DateTime<Utc>,
	) -> StorageResult<Vec<Job>> {
		let mut tables = self.tables.write().await;
		let mut timed_out = Vec::new();

		for job in tables.jobs.values_mut() {
			let stale = matches!(job.status, JobStatus::Pending | JobStatus::InProgress)
				&& job.created_at < created_before
				&& job_type.map_or(true, |t| job.job_type == t);
			if stale && job.transition_to(JobStatus::TimedOut, now).is_ok() {
				timed_out.push(job.clone());
			}
		}

		oldest_first(&mut timed_out, |job| (job.created_at, job.job_id.as_str()));
		Ok(timed_out)
	}
}

#[async_trait]
impl AssignmentStorage for MemoryStore {
	async fn create_assignment(
		&self,
		assignment: JobAssignment,
		now: DateTime<Utc>,
	) -> StorageResult<JobAssignment> {
		let mut tables = self.tables.write().await;
		let job_id = assignment.job_id.clone();

		let status = tables
			.jobs
			.get(&job_id)
			.map(|job| job.status)
			.ok_or_else(|| StorageError::not_found(job_id.clone()))?;
		if status != JobStatus::Pending {
			return Err(StorageError::conflict(
				&job_id,
				format!("expected PENDING, found {}", status),
			));
		}
		if tables.has_active_assignment(&job_id, now) {
			return Err(StorageError::conflict(
				&job_id,
				"job already has an active assignment",
			));
		}

		if let Some(job) = tables.jobs.get_mut(&job_id) {
			job.transition_to(JobStatus::InProgress, now)
				.map_err(|e| StorageError::conflict(&job_id, e.to_string()))?;
		}
		tables
			.assignments
			.insert(assignment.assignment_id.clone(), assignment.clone());
		Ok(assignment)
	}

	async fn get_assignment(&self, assignment_id: &str) -> StorageResult<Option<JobAssignment>> {
		Ok(self
			.tables
			.read()
			.await
			.assignments
			.get(assignment_id)
			.cloned())
	}

	async fn list_assignments_for_job(&self, job_id: &str) -> StorageResult<Vec<JobAssignment>> {
		let tables = self.tables.read().await;
		let mut assignments: Vec<JobAssignment> = tables
			.assignments
			.values()
			.filter(|a| a.job_id == job_id)
			.cloned()
			.collect();
		oldest_first(&mut assignments, |a| {
			(a.created_at, a.assignment_id.as_str())
		});
		Ok(assignments)
	}

	async fn record_heartbeat(
		&self,
		assignment_id: &str,
		now: DateTime<Utc>,
	) -> StorageResult<JobAssignment> {
		let mut tables = self.tables.write().await;
		let assignment = tables
			.assignments
			.get_mut(assignment_id)
			.ok_or_else(|| StorageError::not_found(assignment_id))?;
		if assignment.is_completed() {
			return Err(StorageError::conflict(
				assignment_id,
				"assignment already completed",
			));
		}
		assignment.heartbeat_at = Some(now);
		Ok(assignment.clone())
	}

	async fn complete_assignment(
		&self,
		assignment_id: &str,
		result: JobResult,
		final_status: JobStatus,
		now: DateTime<Utc>,
	) -> StorageResult<Job> {
		let mut tables = self.tables.write().await;

		let assignment = tables
			.assignments
			.get(assignment_id)
			.ok_or_else(|| StorageError::not_found(assignment_id))?;
		if assignment.is_completed() {
			return Err(StorageError::conflict(
				assignment_id,
				"assignment already completed",
			));
		}
		let job_id = assignment.job_id.clone();

		// Validate the job transition on a copy so a rejection leaves nothing behind
		let mut job = tables
			.jobs
			.get(&job_id)
			.cloned()
			.ok_or_else(|| StorageError::not_found(job_id.clone()))?;
		job.transition_to(final_status, now)
			.map_err(|e| StorageError::conflict(&job_id, e.to_string()))?;

		if let Some(assignment) = tables.assignments.get_mut(assignment_id) {
			assignment.completed_at = Some(now);
		}
		tables.results.insert(result.result_id.clone(), result);
		tables.jobs.insert(job_id, job.clone());
		Ok(job)
	}
}

#[async_trait]
impl ResultStorage for MemoryStore {
	async fn get_result_for_assignment(
		&self,
		assignment_id: &str,
	) -> StorageResult<Option<JobResult>> {
		Ok(self
			.tables
			.read()
			.await
			.results
			.values()
			.find(|r| r.assignment_id == assignment_id)
			.cloned())
	}

	async fn list_results_for_job(&self, job_id: &str) -> StorageResult<Vec<JobResult>> {
		let tables = self.tables.read().await;
		let mut results: Vec<JobResult> = tables
			.results
			.values()
			.filter(|r| r.job_id == job_id)
			.cloned()
			.collect();
		oldest_first(&mut results, |r| (r.created_at, r.result_id.as_str()));
		Ok(results)
	}

	async fn invalidate_results_for_type(&self, job_type: JobType) -> StorageResult<usize> {
		let mut tables = self.tables.write().await;
		let Tables { jobs, results, .. } = &mut *tables;

		let mut invalidated = 0;
		for result in results.values_mut().filter(|r| r.cache_valid) {
			let matches = jobs
				.get(&result.job_id)
				.is_some_and(|job| job.job_type == job_type);
			if matches {
				result.cache_valid = false;
				invalidated += 1;
			}
		}
		Ok(invalidated)
	}
}

#[async_trait]
impl Storage for MemoryStore {
	async fn health_check(&self) -> StorageResult<bool> {
		Ok(true)
	}

	async fn stats(&self) -> StorageResult<StorageStats> {
		let tables = self.tables.read().await;
		let count_status = |status: JobStatus| {
			tables
				.jobs
				.values()
				.filter(|job| job.status == status)
				.count()
		};
		Ok(StorageStats {
			total_jobs: tables.jobs.len(),
			pending_jobs: count_status(JobStatus::Pending),
			in_progress_jobs: count_status(JobStatus::InProgress),
			total_requests: tables.requests.len(),
			total_assignments: tables.assignments.len(),
			total_results: tables.results.len(),
			valid_results: tables.results.values().filter(|r| r.cache_valid).count(),
		})
	}

	async fn close(&self) -> StorageResult<()> {
		Ok(())
	}
}
