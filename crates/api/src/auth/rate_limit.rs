//! Fixed-window request throttling

use std::sync::Arc;

use axum::{
	extract::{Request, State},
	http::{HeaderMap, StatusCode},
	middleware::Next,
	response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::warn;

use super::caller::CALLER_ID_HEADER;
use crate::handlers::common::error_response;

const WINDOW_SECONDS: i64 = 60;
/// Expired windows are pruned once this many keys are tracked
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
	pub requests_per_minute: u32,
	/// Extra requests a window admits on top of the steady rate
	pub burst_size: u32,
}

impl RateLimits {
	fn allowance(&self) -> u32 {
		self.requests_per_minute.saturating_add(self.burst_size)
	}
}

#[derive(Debug, Clone)]
struct RequestCounter {
	count: u32,
	window_start: DateTime<Utc>,
}

impl RequestCounter {
	fn expired(&self, now: DateTime<Utc>) -> bool {
		now >= self.window_start + Duration::seconds(WINDOW_SECONDS)
	}
}

/// In-memory limiter keyed by caller
#[derive(Debug)]
pub struct MemoryRateLimiter {
	limits: RateLimits,
	counters: Arc<DashMap<String, RequestCounter>>,
}

impl MemoryRateLimiter {
	pub fn new(limits: RateLimits) -> Self {
		Self {
			limits,
			counters: Arc::new(DashMap::new()),
		}
	}

	/// Count a request against `key`; false once the window's allowance is spent
	pub fn try_acquire(&self, key: &str, now: DateTime<Utc>) -> bool {
		if self.counters.len() >= PRUNE_THRESHOLD {
			self.counters.retain(|_, counter| !counter.expired(now));
		}

		let mut counter = self
			.counters
			.entry(key.to_string())
			.or_insert_with(|| RequestCounter {
				count: 0,
				window_start: now,
			});
		if counter.expired(now) {
			counter.count = 0;
			counter.window_start = now;
		}

		if counter.count >= self.limits.allowance() {
			return false;
		}
		counter.count += 1;
		true
	}
}

fn rate_key(headers: &HeaderMap) -> String {
	if let Some(caller) = headers.get(CALLER_ID_HEADER).and_then(|v| v.to_str().ok()) {
		return format!("caller:{}", caller.trim());
	}
	let client_ip = headers
		.get("x-forwarded-for")
		.or_else(|| headers.get("x-real-ip"))
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.split(',').next())
		.map(str::trim)
		.unwrap_or("unknown");
	format!("ip:{}", client_ip)
}

/// Reject requests over the caller's allowance with 429
pub async fn rate_limit_middleware(
	State(limiter): State<Arc<MemoryRateLimiter>>,
	request: Request,
	next: Next,
) -> Response {
	let key = rate_key(request.headers());
	if !limiter.try_acquire(&key, Utc::now()) {
		warn!("Rate limit exceeded for key: {}", key);
		return error_response(
			StatusCode::TOO_MANY_REQUESTS,
			"RATE_LIMITED",
			"too many requests, retry later",
		)
		.into_response();
	}
	next.run(request).await
}
