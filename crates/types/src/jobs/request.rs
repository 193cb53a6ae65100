//! Request bodies and query parameters of the job broker API

use serde::{Deserialize, Serialize};
#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

use super::{JobValidationError, WorkerIdentity};

/// POST /api/v1/jobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SubmitJobRequest {
	/// Job type name, e.g. `ZONAL_STATISTICS`
	#[serde(alias = "type")]
	pub job_type: String,
	/// Type-specific input payload
	#[serde(alias = "payload")]
	#[cfg_attr(feature = "openapi", schema(value_type = Object))]
	pub input: serde_json::Value,
	/// Skip the cache lookup and always create a new job
	#[serde(default)]
	pub cache_disabled: bool,
}

impl SubmitJobRequest {
	pub fn new(job_type: impl Into<String>, input: serde_json::Value) -> Self {
		Self {
			job_type: job_type.into(),
			input,
			cache_disabled: false,
		}
	}

	pub fn without_cache(mut self) -> Self {
		self.cache_disabled = true;
		self
	}
}

/// GET /api/v1/jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
pub struct ListJobsQuery {
	/// Only jobs in this status
	pub status: Option<String>,
	/// Only jobs of this owner (admins only; other callers always see their own)
	pub owner_id: Option<String>,
	pub page: Option<u32>,
	pub page_size: Option<u32>,
}

/// GET /api/v1/jobs/poll
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
pub struct PollJobsQuery {
	/// Only jobs of this type
	pub job_type: Option<String>,
}

/// POST /api/v1/jobs/{id}/assign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AssignJobRequest {
	pub task_id: String,
	#[serde(default)]
	pub cluster: Option<String>,
}

impl AssignJobRequest {
	/// Validate and convert into the worker identity stored on the assignment
	pub fn into_worker(self) -> Result<WorkerIdentity, JobValidationError> {
		if self.task_id.trim().is_empty() {
			return Err(JobValidationError::MissingRequiredField {
				field: "task_id".to_string(),
			});
		}
		let cluster = self.cluster.filter(|c| !c.trim().is_empty());
		Ok(WorkerIdentity::new(self.task_id.trim(), cluster))
	}
}

/// POST /api/v1/assignments/{id}/result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SubmitResultRequest {
	/// Final status asserted by the worker, e.g. `SUCCEEDED` or `FAILED`
	pub status: String,
	#[serde(default)]
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub result: Option<serde_json::Value>,
	#[serde(default)]
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub metadata: Option<serde_json::Value>,
}

/// POST /api/v1/admin/cache/invalidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct InvalidateCacheRequest {
	#[serde(alias = "type")]
	pub job_type: String,
}

/// POST /api/v1/admin/jobs/timeout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TimeoutSweepRequest {
	/// Jobs created more than this many minutes ago are timed out
	pub threshold_minutes: i64,
	#[serde(default)]
	pub job_type: Option<String>,
}
