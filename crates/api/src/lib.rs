//! Broker API
//!
//! Axum router, handlers and middleware exposing the job broker over HTTP.

pub mod auth;
pub mod handlers;
pub mod pagination;
pub mod router;
pub mod security;
pub mod state;

pub use auth::{rate_limit_middleware, Caller, MemoryRateLimiter, RateLimits};
pub use handlers::common::ErrorResponse;
pub use router::create_router;
pub use state::AppState;

#[cfg(feature = "openapi")]
pub mod openapi;
