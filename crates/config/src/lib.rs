//! Broker Configuration
//!
//! Settings, loading and startup logging for the job broker.

pub mod configurable_value;
pub mod loader;
pub mod settings;
pub mod startup_logger;

pub use configurable_value::{ConfigurableValue, ConfigurableValueError, ValueType};
pub use loader::{load_config, load_config_from, ConfigLoadError, ENV_PREFIX};
pub use settings::{
	BrokerSettings, ConfigValidationError, DatabaseBackend, DatabaseSettings,
	EnvironmentProfile, EnvironmentSettings, LogFormat, LoggingSettings, RateLimitSettings,
	ServerSettings, Settings, SweepSettings,
};
pub use startup_logger::{
	log_service_info, log_service_shutdown, log_settings, log_startup_complete,
};
