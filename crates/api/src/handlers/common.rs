use axum::{http::StatusCode, Json};
use broker_service::BrokerServiceError;
use broker_types::JobType;
use serde::{Deserialize, Serialize};
use tracing::error;
#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Error response format shared by handlers
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
	pub timestamp: i64,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(
	status: StatusCode,
	error: &str,
	message: impl Into<String>,
) -> ApiError {
	(
		status,
		Json(ErrorResponse {
			error: error.to_string(),
			message: message.into(),
			timestamp: chrono::Utc::now().timestamp(),
		}),
	)
}

/// Map a service failure onto its HTTP status class
pub fn service_error(err: BrokerServiceError) -> ApiError {
	match err {
		BrokerServiceError::BadRequest(message) => {
			error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
		},
		BrokerServiceError::NotFound(message) => {
			error_response(StatusCode::NOT_FOUND, "NOT_FOUND", message)
		},
		BrokerServiceError::Unauthorized(message) => {
			error_response(StatusCode::FORBIDDEN, "UNAUTHORIZED", message)
		},
		BrokerServiceError::Internal(message) => {
			error!("Internal error while handling request: {}", message);
			error_response(
				StatusCode::INTERNAL_SERVER_ERROR,
				"INTERNAL_ERROR",
				"internal server error",
			)
		},
	}
}

/// Parse a job type named in a request body or query
pub fn parse_job_type(raw: &str) -> Result<JobType, ApiError> {
	raw.parse::<JobType>()
		.map_err(|e| error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string()))
}
