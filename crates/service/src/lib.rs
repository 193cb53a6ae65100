//! Broker Service
//!
//! Core logic of the job broker: content hashing and cache reuse, job
//! admission, worker assignment and completion, and the maintenance
//! operations (timeout sweep and cache invalidation).

pub mod auth;
pub mod background;
pub mod cache;
pub mod errors;
pub mod hashing;
pub mod job;
pub mod maintenance;
pub mod worker;

pub use auth::{require_admin, require_worker};
pub use background::{SweepConfig, SweepScheduler};
pub use cache::CacheSelector;
pub use errors::BrokerServiceError;
pub use hashing::CanonicalHasher;
pub use job::{JobService, JobServiceTrait};
pub use maintenance::{MaintenanceService, MaintenanceServiceTrait};
pub use worker::{storage_location, WorkerService, WorkerServiceTrait, WorkerSettings};
