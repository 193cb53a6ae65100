pub mod admin;
pub mod common;
pub mod health;
pub mod jobs;
pub mod workers;

pub use admin::{invalidate_cache, timeout_sweep};
pub use health::{health, ready};
pub use jobs::{cancel_job, get_job, list_jobs, submit_job};
pub use workers::{assign_job, heartbeat, job_types, poll_jobs, submit_result};
