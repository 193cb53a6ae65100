//! Job Broker Library
//!
//! Compute-job brokering: clients submit deterministic computation
//! requests, identical requests are served from cache, and a pool of
//! workers polls for pending jobs, claims them and reports results.

use std::net::SocketAddr;
use std::sync::Arc;

use broker_api::{rate_limit_middleware, MemoryRateLimiter, RateLimits};
use broker_config::{
	load_config, log_service_info, log_service_shutdown, log_settings, log_startup_complete,
	DatabaseBackend, LogFormat, LoggingSettings,
};
use broker_service::{
	JobServiceTrait, MaintenanceServiceTrait, SweepConfig, SweepScheduler, WorkerServiceTrait,
};
use tracing::{info, warn};

pub mod client;

// Core domain types
pub use broker_types::{
	chrono, serde_json, CallerContext, Job, JobAssignment, JobResult, JobStatus, JobType,
	SubmitJobRequest, SubmitJobResponse,
};

// Service layer
pub use broker_service::{
	BrokerServiceError, CanonicalHasher, JobService, MaintenanceService, WorkerService,
	WorkerSettings,
};

// Storage layer
pub use broker_storage::{MemoryStore, Storage, StorageError};
#[cfg(feature = "postgres")]
pub use broker_storage::{PostgresConfig, PostgresStore};

// API layer
pub use broker_api::{create_router, AppState, ErrorResponse};

// Config
pub use broker_config::Settings;

pub mod storage {
	pub use broker_storage::*;
}

pub mod config {
	pub use broker_config::*;
}

pub mod service {
	pub use broker_service::*;
}

pub mod api {
	pub use broker_api::*;
}

/// Initialize the global tracing subscriber from logging settings.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(logging: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

	let result = match logging.format {
		LogFormat::Json => tracing_subscriber::fmt()
			.json()
			.with_env_filter(env_filter)
			.with_target(logging.structured)
			.with_thread_ids(logging.structured)
			.try_init(),
		LogFormat::Pretty => tracing_subscriber::fmt()
			.pretty()
			.with_env_filter(env_filter)
			.with_target(logging.structured)
			.with_thread_ids(logging.structured)
			.try_init(),
		LogFormat::Compact => tracing_subscriber::fmt()
			.compact()
			.with_env_filter(env_filter)
			.with_target(logging.structured)
			.with_thread_ids(logging.structured)
			.try_init(),
	};
	result.map_err(|e| format!("Failed to initialize tracing: {}", e))?;

	info!(
		"Logging configuration applied: level={}, format={:?}, structured={}",
		logging.level, logging.format, logging.structured
	);
	Ok(())
}

/// Builder wiring storage, services and the HTTP router together
#[derive(Default)]
pub struct BrokerBuilder {
	settings: Option<Settings>,
	storage: Option<Arc<dyn Storage>>,
}

impl BrokerBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Use the given storage instead of the one named in the settings
	pub fn with_storage<S>(mut self, storage: S) -> Self
	where
		S: Storage + 'static,
	{
		self.storage = Some(Arc::new(storage));
		self
	}

	/// Set custom settings
	pub fn with_settings(mut self, settings: Settings) -> Self {
		self.settings = Some(settings);
		self
	}

	/// Get the current settings
	pub fn settings(&self) -> Option<&Settings> {
		self.settings.as_ref()
	}

	async fn resolve_storage(
		&mut self,
		settings: &Settings,
	) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
		if let Some(storage) = self.storage.take() {
			return Ok(storage);
		}
		match settings.database.backend {
			DatabaseBackend::Memory => Ok(Arc::new(MemoryStore::new())),
			DatabaseBackend::Postgres => connect_postgres(settings).await,
		}
	}

	/// Build the services and return the router with its state.
	/// The periodic timeout sweep is not started; see [`BrokerBuilder::start_server`].
	pub async fn start(mut self) -> Result<(axum::Router, AppState), Box<dyn std::error::Error>> {
		let settings = self.settings.clone().unwrap_or_default();
		settings.validate()?;
		let storage = self.resolve_storage(&settings).await?;

		let worker_settings = WorkerSettings {
			poll_batch_size: settings.broker.poll_batch_size,
			default_expiry_minutes: settings.broker.default_expiry_minutes,
			results_base_uri: settings.broker.results_base_uri.clone(),
		};
		let app_state = AppState {
			job_service: Arc::new(JobService::new(Arc::clone(&storage)))
				as Arc<dyn JobServiceTrait>,
			worker_service: Arc::new(WorkerService::new(Arc::clone(&storage), worker_settings))
				as Arc<dyn WorkerServiceTrait>,
			maintenance_service: Arc::new(MaintenanceService::new(Arc::clone(&storage)))
				as Arc<dyn MaintenanceServiceTrait>,
			storage,
		};

		let mut router = create_router().with_state(app_state.clone());

		let rate_cfg = &settings.environment.rate_limiting;
		if rate_cfg.enabled {
			info!(
				"Rate limiting enabled: {} requests/min, burst {}",
				rate_cfg.requests_per_minute, rate_cfg.burst_size
			);
			let limiter = Arc::new(MemoryRateLimiter::new(RateLimits {
				requests_per_minute: rate_cfg.requests_per_minute,
				burst_size: rate_cfg.burst_size,
			}));
			router = router.layer(axum::middleware::from_fn_with_state(
				limiter,
				rate_limit_middleware,
			));
		}

		Ok((router, app_state))
	}

	/// Start the complete server:
	/// - Loading .env and the configuration file
	/// - Initializing tracing
	/// - Starting the periodic timeout sweep
	/// - Binding and serving until ctrl-c
	pub async fn start_server(mut self) -> Result<(), Box<dyn std::error::Error>> {
		dotenvy::dotenv().ok();

		let settings = match self.settings.take() {
			Some(settings) => settings,
			None => load_config()?,
		};

		init_tracing(&settings.logging)?;
		log_service_info();
		log_settings(&settings);

		let bind_addr = settings.bind_address();
		let addr: SocketAddr = bind_addr
			.parse()
			.map_err(|e| format!("Invalid bind address '{}': {}", bind_addr, e))?;

		let sweep = &settings.broker.sweep;
		let sweep_config = SweepConfig {
			enabled: sweep.enabled,
			interval_minutes: sweep.interval_minutes,
			threshold_minutes: sweep.threshold_minutes,
		};

		self.settings = Some(settings);
		let (app, state) = self.start().await?;
		let sweeper =
			SweepScheduler::new(Arc::clone(&state.maintenance_service), sweep_config).spawn();

		let listener = tokio::net::TcpListener::bind(addr).await?;
		log_startup_complete(&bind_addr);
		if cfg!(feature = "openapi") {
			info!("API docs at /swagger-ui and /api-docs/openapi.json");
		}

		axum::serve(listener, app)
			.with_graceful_shutdown(shutdown_signal())
			.await?;

		if let Some(handle) = sweeper {
			handle.abort();
		}
		if let Err(e) = state.storage.close().await {
			warn!("Failed to close storage cleanly: {}", e);
		}
		log_service_shutdown();
		Ok(())
	}
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		warn!("Failed to listen for shutdown signal: {}", e);
		std::future::pending::<()>().await;
	}
}

#[cfg(feature = "postgres")]
async fn connect_postgres(
	settings: &Settings,
) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
	let url = settings.database_url()?;
	info!("Connecting to postgres at {}", url.redacted_url());
	let config = PostgresConfig {
		url: url.expose_secret().to_string(),
		max_connections: settings.database.max_connections,
		run_migrations: settings.database.run_migrations,
	};
	Ok(Arc::new(PostgresStore::connect(&config).await?))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(
	_settings: &Settings,
) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
	Err("database.backend is 'postgres' but job-broker was built without the 'postgres' feature".into())
}
