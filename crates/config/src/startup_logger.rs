//! Service startup logging for the job broker

use std::env;
use tracing::{info, warn};

use crate::settings::{DatabaseBackend, Settings};

/// Logs service and environment information at startup
pub fn log_service_info() {
	info!("=== Job Broker Starting ===");
	info!("Service: job-broker v{}", env!("CARGO_PKG_VERSION"));
	info!("Platform: {} / {}", env::consts::OS, env::consts::ARCH);

	if let Ok(cwd) = env::current_dir() {
		info!("Working directory: {}", cwd.display());
	}
	if let Ok(rust_log) = env::var("RUST_LOG") {
		info!("RUST_LOG: {}", rust_log);
	}
	if let Ok(config_path) = env::var("CONFIG_PATH") {
		info!("Config path: {}", config_path);
	}

	info!(
		"Started at: {}",
		chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
	);
}

/// Logs the effective broker configuration without secrets
pub fn log_settings(settings: &Settings) {
	info!(
		"Profile: {:?}, bind address: {}",
		settings.environment.profile,
		settings.bind_address()
	);
	match settings.database.backend {
		DatabaseBackend::Memory => {
			warn!("Using in-memory storage; jobs are lost when the process exits")
		},
		DatabaseBackend::Postgres => info!(
			"Using postgres storage (url from {}, max connections {})",
			settings.database.url.description(),
			settings.database.max_connections
		),
	}
	if settings.database.backend == DatabaseBackend::Postgres && settings.database.url.is_inline() {
		warn!("database.url is configured inline; prefer an environment variable");
	}

	let broker = &settings.broker;
	info!(
		"Poll batch: {}, default expiry: {} min, results under {}",
		broker.poll_batch_size, broker.default_expiry_minutes, broker.results_base_uri
	);
	if broker.sweep.enabled {
		info!(
			"Timeout sweep every {} min for jobs older than {} min",
			broker.sweep.interval_minutes, broker.sweep.threshold_minutes
		);
	} else {
		info!("Timeout sweep disabled");
	}
}

/// Logs service shutdown information
pub fn log_service_shutdown() {
	info!("Job Broker shutting down");
	info!(
		"Shutdown at: {}",
		chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
	);
}

/// Logs startup completion
pub fn log_startup_complete(bind_address: &str) {
	info!("Job Broker started, listening on {}", bind_address);
}
