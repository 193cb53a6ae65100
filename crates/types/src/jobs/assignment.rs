//! Worker assignments: a worker's time-bounded claim on a job

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "openapi")]
use utoipa::ToSchema;
use uuid::Uuid;

/// Identity of the remote worker holding an assignment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkerIdentity {
	/// Task reference of the worker process (e.g. a container task id)
	pub task_id: String,
	/// Cluster the task runs in, when the worker fleet is clustered
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cluster: Option<String>,
}

impl WorkerIdentity {
	pub fn new(task_id: impl Into<String>, cluster: Option<String>) -> Self {
		Self {
			task_id: task_id.into(),
			cluster,
		}
	}
}

/// One worker's claim on a job
///
/// A job may collect many assignments over its lifetime, but at most one is
/// active (not completed and not yet expired) at any instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobAssignment {
	pub assignment_id: String,
	pub job_id: String,
	pub worker: WorkerIdentity,
	/// Where the worker must write its artifacts
	pub storage_location: String,
	pub expires_at: DateTime<Utc>,
	pub heartbeat_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl JobAssignment {
	pub fn new(
		job_id: String,
		worker: WorkerIdentity,
		storage_location: String,
		expires_at: DateTime<Utc>,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			assignment_id: Uuid::new_v4().to_string(),
			job_id,
			worker,
			storage_location,
			expires_at,
			heartbeat_at: None,
			completed_at: None,
			created_at: now,
		}
	}

	pub fn is_completed(&self) -> bool {
		self.completed_at.is_some()
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at <= now
	}

	/// Outstanding and still within its deadline
	pub fn is_active(&self, now: DateTime<Utc>) -> bool {
		!self.is_completed() && !self.is_expired(now)
	}
}
