//! Caller identity and request throttling

pub mod caller;
pub mod rate_limit;

pub use caller::{Caller, CALLER_ID_HEADER, CALLER_ROLES_HEADER};
pub use rate_limit::{rate_limit_middleware, MemoryRateLimiter, RateLimits};
