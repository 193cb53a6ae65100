//! Error types for storage operations

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Item not found: {id}")]
	NotFound { id: String },
	/// A conditional update found the row no longer in the expected state
	#[error("Conflict on {id}: {message}")]
	Conflict { id: String, message: String },
	#[error("Connection error: {message}")]
	Connection { message: String },
	#[error("Serialization error: {message}")]
	Serialization { message: String },
	#[error("Storage operation failed: {message}")]
	Operation { message: String },
}

impl StorageError {
	pub fn not_found(id: impl Into<String>) -> Self {
		StorageError::NotFound { id: id.into() }
	}

	pub fn conflict(id: impl Into<String>, message: impl Into<String>) -> Self {
		StorageError::Conflict {
			id: id.into(),
			message: message.into(),
		}
	}
}

impl From<serde_json::Error> for StorageError {
	fn from(err: serde_json::Error) -> Self {
		StorageError::Serialization {
			message: err.to_string(),
		}
	}
}
