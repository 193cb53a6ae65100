//! Service error taxonomy
//!
//! Every broker operation fails with one of four kinds. The API layer maps
//! them onto HTTP status classes.

use broker_types::{JobTransitionError, JobValidationError, StorageError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrokerServiceError {
	/// Validation or state-precondition failure the caller can act on
	#[error("bad request: {0}")]
	BadRequest(String),
	#[error("not found: {0}")]
	NotFound(String),
	/// The caller is known but not allowed to perform the operation
	#[error("unauthorized: {0}")]
	Unauthorized(String),
	#[error("internal error: {0}")]
	Internal(String),
}

impl BrokerServiceError {
	pub fn job_not_found(job_id: &str) -> Self {
		BrokerServiceError::NotFound(format!("job {}", job_id))
	}

	pub fn assignment_not_found(assignment_id: &str) -> Self {
		BrokerServiceError::NotFound(format!("assignment {}", assignment_id))
	}
}

impl From<StorageError> for BrokerServiceError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound { id } => BrokerServiceError::NotFound(id),
			StorageError::Conflict { id, message } => {
				BrokerServiceError::BadRequest(format!("{}: {}", id, message))
			},
			other => BrokerServiceError::Internal(other.to_string()),
		}
	}
}

impl From<JobValidationError> for BrokerServiceError {
	fn from(err: JobValidationError) -> Self {
		BrokerServiceError::BadRequest(err.to_string())
	}
}

impl From<JobTransitionError> for BrokerServiceError {
	fn from(err: JobTransitionError) -> Self {
		BrokerServiceError::BadRequest(err.to_string())
	}
}
