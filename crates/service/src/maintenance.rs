//! Maintenance service
//!
//! Bulk operations run by admins or on a schedule: timing out stale jobs
//! and invalidating cached results for a job type.

use std::sync::Arc;

use async_trait::async_trait;
use broker_storage::{JobStorage, ResultStorage, Storage};
use broker_types::chrono::{Duration, Utc};
use broker_types::{InvalidateCacheResponse, JobType, TimeoutSweepResponse};
use tracing::info;

use crate::errors::BrokerServiceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MaintenanceServiceTrait: Send + Sync {
	/// Move every `PENDING`/`IN_PROGRESS` job older than `threshold_minutes`
	/// to `TIMED_OUT`
	async fn sweep_timed_out_jobs(
		&self,
		threshold_minutes: i64,
		job_type: Option<JobType>,
	) -> Result<TimeoutSweepResponse, BrokerServiceError>;

	/// Stop reusing every currently valid result of `job_type`
	async fn invalidate_cache(
		&self,
		job_type: JobType,
	) -> Result<InvalidateCacheResponse, BrokerServiceError>;
}

#[derive(Clone)]
pub struct MaintenanceService {
	storage: Arc<dyn Storage>,
}

impl MaintenanceService {
	pub fn new(storage: Arc<dyn Storage>) -> Self {
		Self { storage }
	}
}

#[async_trait]
impl MaintenanceServiceTrait for MaintenanceService {
	async fn sweep_timed_out_jobs(
		&self,
		threshold_minutes: i64,
		job_type: Option<JobType>,
	) -> Result<TimeoutSweepResponse, BrokerServiceError> {
		if threshold_minutes < 0 {
			return Err(BrokerServiceError::BadRequest(format!(
				"threshold_minutes must not be negative, got {}",
				threshold_minutes
			)));
		}

		let now = Utc::now();
		let cutoff = Duration::try_minutes(threshold_minutes)
			.and_then(|age| now.checked_sub_signed(age))
			.ok_or_else(|| {
				BrokerServiceError::BadRequest(format!(
					"threshold_minutes {} is out of range",
					threshold_minutes
				))
			})?;
		let timed_out = self
			.storage
			.time_out_stale_jobs(cutoff, job_type, now)
			.await?;

		let summary = TimeoutSweepResponse::from_jobs(&timed_out);
		info!(
			"Timeout sweep (threshold {} min, type {:?}) timed out {} jobs: {:?}",
			threshold_minutes, job_type, summary.count, summary.by_type
		);
		Ok(summary)
	}

	async fn invalidate_cache(
		&self,
		job_type: JobType,
	) -> Result<InvalidateCacheResponse, BrokerServiceError> {
		let invalidated = self.storage.invalidate_results_for_type(job_type).await?;
		info!("Invalidated {} cached {} results", invalidated, job_type);
		Ok(InvalidateCacheResponse {
			job_type,
			invalidated,
		})
	}
}
