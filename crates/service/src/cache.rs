//! Cache reuse policy
//!
//! Only jobs sharing a content hash are candidates. `PENDING` and
//! `IN_PROGRESS` jobs are always reusable; `SUCCEEDED` jobs only while they
//! keep a cache-valid result. Anything else is never handed out again.

use std::cmp::Reverse;
use std::sync::Arc;

use broker_storage::{JobStorage, Storage};
use broker_types::{CacheCandidate, Job, JobStatus};
use tracing::debug;

use crate::errors::BrokerServiceError;

/// Picks the best existing job to reuse for a content hash
#[derive(Clone)]
pub struct CacheSelector {
	storage: Arc<dyn Storage>,
}

fn priority(status: JobStatus) -> u8 {
	match status {
		JobStatus::Succeeded => 3,
		JobStatus::InProgress => 2,
		JobStatus::Pending => 1,
		_ => 0,
	}
}

impl CacheSelector {
	pub fn new(storage: Arc<dyn Storage>) -> Self {
		Self { storage }
	}

	/// Whether a candidate may be reused at all
	pub fn is_viable(candidate: &CacheCandidate) -> bool {
		match candidate.job.status {
			JobStatus::Pending | JobStatus::InProgress => true,
			JobStatus::Succeeded => candidate.has_valid_result,
			JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut => false,
		}
	}

	/// Rank viable candidates `SUCCEEDED > IN_PROGRESS > PENDING`, newest
	/// first within a status, and return the winner
	pub fn select(candidates: Vec<CacheCandidate>) -> Option<Job> {
		candidates
			.into_iter()
			.filter(Self::is_viable)
			.map(|candidate| candidate.job)
			.min_by_key(|job| {
				(
					Reverse(priority(job.status)),
					Reverse(job.created_at),
					job.job_id.clone(),
				)
			})
	}

	/// Look up the reusable job for `hash`, or none when caching is disabled
	pub async fn find_reusable(
		&self,
		hash: &str,
		cache_disabled: bool,
	) -> Result<Option<Job>, BrokerServiceError> {
		if cache_disabled {
			return Ok(None);
		}

		let candidates = self.storage.find_cache_candidates(hash).await?;
		let total = candidates.len();
		let selected = Self::select(candidates);
		debug!(
			"Cache lookup for {}: {} candidates, selected {:?}",
			hash,
			total,
			selected.as_ref().map(|job| job.job_id.as_str())
		);
		Ok(selected)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use broker_types::chrono::{Duration, Utc};
	use broker_types::JobType;
	use serde_json::json;

	fn candidate(status: JobStatus, age_minutes: i64, has_valid_result: bool) -> CacheCandidate {
		let mut job = Job::new(
			JobType::Test,
			"hash".to_string(),
			json!({"id": 1}),
			"owner".to_string(),
			Utc::now() - Duration::minutes(age_minutes),
		);
		job.status = status;
		CacheCandidate {
			job,
			has_valid_result,
		}
	}

	#[test]
	fn test_succeeded_with_valid_result_wins() {
		let pending = candidate(JobStatus::Pending, 1, false);
		let running = candidate(JobStatus::InProgress, 2, false);
		let done = candidate(JobStatus::Succeeded, 30, true);
		let expected = done.job.job_id.clone();

		let selected = CacheSelector::select(vec![pending, running, done]).unwrap();
		assert_eq!(selected.job_id, expected);
	}

	#[test]
	fn test_in_progress_beats_pending() {
		let pending = candidate(JobStatus::Pending, 1, false);
		let running = candidate(JobStatus::InProgress, 10, false);
		let expected = running.job.job_id.clone();
		assert_eq!(
			CacheSelector::select(vec![pending, running]).unwrap().job_id,
			expected
		);
	}

	#[test]
	fn test_newest_wins_within_status() {
		let old = candidate(JobStatus::Pending, 20, false);
		let new = candidate(JobStatus::Pending, 5, false);
		let expected = new.job.job_id.clone();
		assert_eq!(CacheSelector::select(vec![old, new]).unwrap().job_id, expected);
	}

	#[test]
	fn test_non_reusable_candidates_are_ignored() {
		let candidates = vec![
			candidate(JobStatus::Succeeded, 1, false),
			candidate(JobStatus::Failed, 1, true),
			candidate(JobStatus::Cancelled, 1, false),
			candidate(JobStatus::TimedOut, 1, false),
		];
		assert!(CacheSelector::select(candidates).is_none());
	}

	#[tokio::test]
	async fn test_disabled_cache_never_hits() {
		let store = broker_storage::MemoryStore::new();
		let selector = CacheSelector::new(Arc::new(store));
		assert!(selector.find_reusable("anything", true).await.unwrap().is_none());
	}
}
