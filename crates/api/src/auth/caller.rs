//! Caller identity extractor
//!
//! Authentication happens at the gateway in front of the broker. The gateway
//! forwards the authenticated caller id and role set in two headers, which
//! are trusted as-is.

use axum::{
	extract::FromRequestParts,
	http::{request::Parts, HeaderMap, StatusCode},
	Json,
};
use broker_types::CallerContext;
use tracing::debug;

use crate::handlers::common::{error_response, ErrorResponse};

pub const CALLER_ID_HEADER: &str = "x-caller-id";
/// Comma separated role names
pub const CALLER_ROLES_HEADER: &str = "x-caller-roles";

/// Authenticated caller of a request
#[derive(Debug, Clone, PartialEq)]
pub struct Caller(pub CallerContext);

impl Caller {
	/// Read the caller from request headers; `None` without a usable caller id
	pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
		let caller_id = headers
			.get(CALLER_ID_HEADER)
			.and_then(|v| v.to_str().ok())
			.map(str::trim)
			.filter(|id| !id.is_empty())?;

		let roles = headers
			.get(CALLER_ROLES_HEADER)
			.and_then(|v| v.to_str().ok())
			.map(parse_roles)
			.unwrap_or_default();

		Some(Self(CallerContext::new(caller_id, roles)))
	}
}

fn parse_roles(raw: &str) -> Vec<String> {
	raw.split(',')
		.map(str::trim)
		.filter(|role| !role.is_empty())
		.map(str::to_lowercase)
		.collect()
}

impl<S> FromRequestParts<S> for Caller
where
	S: Send + Sync,
{
	type Rejection = (StatusCode, Json<ErrorResponse>);

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		match Self::from_headers(&parts.headers) {
			Some(caller) => Ok(caller),
			None => {
				debug!("Rejecting {} without caller identity", parts.uri.path());
				Err(error_response(
					StatusCode::UNAUTHORIZED,
					"UNAUTHENTICATED",
					format!("missing {} header", CALLER_ID_HEADER),
				))
			},
		}
	}
}
