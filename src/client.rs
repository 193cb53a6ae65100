//! HTTP client for the broker API, used by `brokerctl` and the e2e tests

use std::time::Duration;

use broker_api::auth::{CALLER_ID_HEADER, CALLER_ROLES_HEADER};
use broker_api::ErrorResponse;
use broker_types::{
	InvalidateCacheRequest, InvalidateCacheResponse, Job, JobDetailsResponse, SubmitJobRequest,
	SubmitJobResponse, TimeoutSweepRequest, TimeoutSweepResponse,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("broker answered {status}: {} ({})", .body.message, .body.error)]
	Api { status: StatusCode, body: ErrorResponse },
	#[error("job {job_id} still {status} after {polls} polls")]
	WaitExhausted {
		job_id: String,
		status: String,
		polls: u32,
	},
}

impl ClientError {
	/// Failures worth retrying: connection problems, timeouts and 5xx answers
	pub fn is_transient(&self) -> bool {
		match self {
			ClientError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
			ClientError::Api { status, .. } => {
				status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
			},
			ClientError::WaitExhausted { .. } => false,
		}
	}
}

/// How `wait_for_job` polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
	pub interval: Duration,
	/// Consecutive transient failures tolerated before giving up
	pub max_retries: u32,
	/// Give up after this many status checks; `None` waits forever
	pub max_polls: Option<u32>,
}

impl Default for WaitPolicy {
	fn default() -> Self {
		Self {
			interval: Duration::from_secs(5),
			max_retries: 5,
			max_polls: None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct BrokerClient {
	http: reqwest::Client,
	base_url: String,
	caller_id: String,
	roles: Vec<String>,
}

impl BrokerClient {
	pub fn new(
		base_url: impl Into<String>,
		caller_id: impl Into<String>,
		roles: Vec<String>,
	) -> Self {
		Self {
			http: reqwest::Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
			caller_id: caller_id.into(),
			roles,
		}
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	fn with_identity(&self, request: RequestBuilder) -> RequestBuilder {
		request
			.header(CALLER_ID_HEADER, &self.caller_id)
			.header(CALLER_ROLES_HEADER, self.roles.join(","))
	}

	async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
		let status = response.status();
		if status.is_success() {
			return Ok(response.json::<T>().await?);
		}
		let body = match response.json::<ErrorResponse>().await {
			Ok(body) => body,
			Err(_) => ErrorResponse {
				error: "UNKNOWN".to_string(),
				message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
				timestamp: chrono::Utc::now().timestamp(),
			},
		};
		Err(ClientError::Api { status, body })
	}

	async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
		let response = self.with_identity(self.http.get(self.url(path))).send().await?;
		Self::decode(response).await
	}

	async fn post<B: Serialize, T: DeserializeOwned>(
		&self,
		path: &str,
		body: &B,
	) -> Result<T, ClientError> {
		let response = self
			.with_identity(self.http.post(self.url(path)))
			.json(body)
			.send()
			.await?;
		Self::decode(response).await
	}

	pub async fn submit(
		&self,
		request: &SubmitJobRequest,
	) -> Result<SubmitJobResponse, ClientError> {
		self.post("/api/v1/jobs", request).await
	}

	pub async fn job(&self, job_id: &str) -> Result<JobDetailsResponse, ClientError> {
		self.get(&format!("/api/v1/jobs/{}", job_id)).await
	}

	pub async fn cancel(&self, job_id: &str) -> Result<Job, ClientError> {
		self.post(&format!("/api/v1/jobs/{}/cancel", job_id), &serde_json::json!({}))
			.await
	}

	pub async fn sweep(
		&self,
		request: &TimeoutSweepRequest,
	) -> Result<TimeoutSweepResponse, ClientError> {
		self.post("/api/v1/admin/jobs/timeout", request).await
	}

	pub async fn invalidate(
		&self,
		request: &InvalidateCacheRequest,
	) -> Result<InvalidateCacheResponse, ClientError> {
		self.post("/api/v1/admin/cache/invalidate", request).await
	}

	/// Poll a job at a fixed interval until it reaches a terminal status
	pub async fn wait_for_job(
		&self,
		job_id: &str,
		policy: WaitPolicy,
	) -> Result<JobDetailsResponse, ClientError> {
		let mut polls = 0u32;
		let mut failures = 0u32;
		let mut last_status = String::from("UNKNOWN");

		loop {
			if let Some(max_polls) = policy.max_polls {
				if polls >= max_polls {
					return Err(ClientError::WaitExhausted {
						job_id: job_id.to_string(),
						status: last_status,
						polls,
					});
				}
			}
			polls += 1;

			match self.job(job_id).await {
				Ok(details) if details.job.status.is_terminal() => return Ok(details),
				Ok(details) => {
					failures = 0;
					last_status = details.job.status.to_string();
					debug!("Job {} is {}; poll {}", job_id, last_status, polls);
				},
				Err(e) if e.is_transient() && failures < policy.max_retries => {
					failures += 1;
					warn!(
						"Transient error while polling job {} ({}/{}): {}",
						job_id, failures, policy.max_retries, e
					);
				},
				Err(e) => return Err(e),
			}

			tokio::time::sleep(policy.interval).await;
		}
	}
}
