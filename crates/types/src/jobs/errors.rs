//! Error types for job validation and lifecycle transitions

use thiserror::Error;

use super::{JobStatus, JobType};

/// Validation errors for job submissions and worker results
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobValidationError {
	#[error("Unknown job type: {job_type}")]
	UnknownJobType { job_type: String },

	#[error("Unknown job status: {status}")]
	UnknownStatus { status: String },

	#[error("Invalid input for job type {job_type}: {reason}")]
	InvalidInput { job_type: JobType, reason: String },

	#[error("Invalid result for job type {job_type}: {reason}")]
	InvalidResult { job_type: JobType, reason: String },

	#[error("Missing required field: {field}")]
	MissingRequiredField { field: String },

	#[error("Invalid value for {field}: {reason}")]
	InvalidField { field: String, reason: String },
}

/// Rejected lifecycle transition
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Job {job_id} cannot move from {from} to {to}")]
pub struct JobTransitionError {
	pub job_id: String,
	pub from: JobStatus,
	pub to: JobStatus,
}
