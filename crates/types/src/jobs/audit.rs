//! Audit trail of submission attempts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::JobType;

/// Immutable record of one submission attempt
///
/// Written in the same atomic unit as any job it creates, so the trail
/// never references a job that does not exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRequest {
	pub request_id: String,
	pub caller_id: String,
	pub job_type: JobType,
	pub input: serde_json::Value,
	pub cache_hit: bool,
	pub job_id: String,
	pub created_at: DateTime<Utc>,
}

impl JobRequest {
	pub fn new(
		caller_id: String,
		job_type: JobType,
		input: serde_json::Value,
		cache_hit: bool,
		job_id: String,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			request_id: Uuid::new_v4().to_string(),
			caller_id,
			job_type,
			input,
			cache_hit,
			job_id,
			created_at: now,
		}
	}
}
