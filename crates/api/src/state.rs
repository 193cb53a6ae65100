use std::sync::Arc;

use broker_service::{JobServiceTrait, MaintenanceServiceTrait, WorkerServiceTrait};
use broker_storage::Storage;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
	pub job_service: Arc<dyn JobServiceTrait>,
	pub worker_service: Arc<dyn WorkerServiceTrait>,
	pub maintenance_service: Arc<dyn MaintenanceServiceTrait>,
	pub storage: Arc<dyn Storage>,
}
