//! Caller identity as seen by the broker
//!
//! Authentication happens upstream; the broker receives an already
//! established caller id and role set with every operation.

use serde::{Deserialize, Serialize};

use crate::Job;

/// Role granting access to every job and to the admin operations
pub const ROLE_ADMIN: &str = "admin";
/// Role granting access to the worker-facing operations
pub const ROLE_WORKER: &str = "worker";

/// Authenticated caller context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallerContext {
	/// Unique caller identifier
	pub caller_id: String,
	/// Caller roles
	pub roles: Vec<String>,
}

impl CallerContext {
	pub fn new(caller_id: impl Into<String>, roles: Vec<String>) -> Self {
		Self {
			caller_id: caller_id.into(),
			roles,
		}
	}

	/// Plain caller without any role
	pub fn user(caller_id: impl Into<String>) -> Self {
		Self::new(caller_id, Vec::new())
	}

	pub fn admin(caller_id: impl Into<String>) -> Self {
		Self::new(caller_id, vec![ROLE_ADMIN.to_string()])
	}

	pub fn worker(caller_id: impl Into<String>) -> Self {
		Self::new(caller_id, vec![ROLE_WORKER.to_string()])
	}

	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
	}

	pub fn is_admin(&self) -> bool {
		self.has_role(ROLE_ADMIN)
	}

	/// Workers and admins may poll, claim and complete jobs
	pub fn can_work(&self) -> bool {
		self.is_admin() || self.has_role(ROLE_WORKER)
	}

	/// Owners and admins may manage a job
	pub fn can_manage(&self, job: &Job) -> bool {
		self.is_admin() || job.is_owned_by(&self.caller_id)
	}

	/// Owners, admins and workers may read a job's details
	pub fn can_view(&self, job: &Job) -> bool {
		self.can_manage(job) || self.can_work()
	}
}
