//! Role checks shared by the services and the admin endpoints

use broker_types::CallerContext;

use crate::errors::BrokerServiceError;

/// Fail unless the caller may perform worker operations
pub fn require_worker(caller: &CallerContext) -> Result<(), BrokerServiceError> {
	if caller.can_work() {
		Ok(())
	} else {
		Err(BrokerServiceError::Unauthorized(format!(
			"caller {} lacks the worker role",
			caller.caller_id
		)))
	}
}

/// Fail unless the caller is an admin
pub fn require_admin(caller: &CallerContext) -> Result<(), BrokerServiceError> {
	if caller.is_admin() {
		Ok(())
	} else {
		Err(BrokerServiceError::Unauthorized(format!(
			"caller {} lacks the admin role",
			caller.caller_id
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_role_requirements() {
		assert!(require_worker(&CallerContext::worker("w")).is_ok());
		assert!(require_worker(&CallerContext::admin("a")).is_ok());
		assert!(require_worker(&CallerContext::user("u")).is_err());
		assert!(require_admin(&CallerContext::admin("a")).is_ok());
		assert!(matches!(
			require_admin(&CallerContext::worker("w")),
			Err(BrokerServiceError::Unauthorized(_))
		));
	}
}
