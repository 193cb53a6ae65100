//! Stored outcomes of completed assignments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "openapi")]
use utoipa::ToSchema;
use uuid::Uuid;

use super::JobAssignment;

/// Outcome of one completed assignment
///
/// `cache_valid` only governs cache eligibility; it is independent of the
/// job's terminal status and is the only field that changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobResult {
	pub result_id: String,
	pub assignment_id: String,
	pub job_id: String,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub payload: Option<serde_json::Value>,
	pub storage_location: String,
	#[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
	pub metadata: Option<serde_json::Value>,
	pub cache_valid: bool,
	pub created_at: DateTime<Utc>,
}

impl JobResult {
	/// Build the result row for `assignment`, inheriting its storage location
	pub fn for_assignment(
		assignment: &JobAssignment,
		payload: Option<serde_json::Value>,
		metadata: Option<serde_json::Value>,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			result_id: Uuid::new_v4().to_string(),
			assignment_id: assignment.assignment_id.clone(),
			job_id: assignment.job_id.clone(),
			payload,
			storage_location: assignment.storage_location.clone(),
			metadata,
			cache_valid: true,
			created_at: now,
		}
	}
}
