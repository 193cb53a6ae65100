//! Configuration settings structures

use crate::{configurable_value::ConfigurableValue, ConfigurableValueError};
use broker_types::{SecretString, DEFAULT_EXPIRY_MINUTES, MAX_DURATION_MINUTES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main application settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
	pub server: ServerSettings,
	pub database: DatabaseSettings,
	pub broker: BrokerSettings,
	pub environment: EnvironmentSettings,
	pub logging: LoggingSettings,
}

/// Server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
	pub host: String,
	pub port: u16,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self {
			host: "0.0.0.0".to_string(),
			port: 3000,
		}
	}
}

/// Storage backend selection
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
	#[default]
	Memory,
	Postgres,
}

/// Database configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
	pub backend: DatabaseBackend,
	/// Connection URL, only read for the postgres backend
	pub url: ConfigurableValue,
	pub max_connections: u32,
	pub run_migrations: bool,
}

impl Default for DatabaseSettings {
	fn default() -> Self {
		Self {
			backend: DatabaseBackend::Memory,
			url: ConfigurableValue::from_env("DATABASE_URL"),
			max_connections: 10,
			run_migrations: true,
		}
	}
}

/// Job broker tunables
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BrokerSettings {
	/// Maximum number of jobs a single poll returns
	pub poll_batch_size: usize,
	/// Assignment expiry for job types without their own
	pub default_expiry_minutes: i64,
	/// Prefix of derived result storage locations
	pub results_base_uri: String,
	pub sweep: SweepSettings,
}

impl Default for BrokerSettings {
	fn default() -> Self {
		Self {
			poll_batch_size: 10,
			default_expiry_minutes: DEFAULT_EXPIRY_MINUTES,
			results_base_uri: "s3://job-results".to_string(),
			sweep: SweepSettings::default(),
		}
	}
}

/// Periodic timeout sweep
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SweepSettings {
	pub enabled: bool,
	pub interval_minutes: u64,
	/// Jobs older than this are timed out by the scheduled sweep
	pub threshold_minutes: i64,
}

impl Default for SweepSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			interval_minutes: 60,
			threshold_minutes: 24 * 60,
		}
	}
}

/// Environment-specific settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EnvironmentSettings {
	pub profile: EnvironmentProfile,
	pub rate_limiting: RateLimitSettings,
}

/// Environment profiles
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentProfile {
	#[default]
	Development,
	Staging,
	Production,
}

/// Rate limiting configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitSettings {
	pub enabled: bool,
	pub requests_per_minute: u32,
	pub burst_size: u32,
}

impl Default for RateLimitSettings {
	fn default() -> Self {
		Self {
			enabled: false,
			requests_per_minute: 600,
			burst_size: 50,
		}
	}
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingSettings {
	pub level: String,
	pub format: LogFormat,
	/// Include targets and thread ids
	pub structured: bool,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::Pretty,
			structured: false,
		}
	}
}

/// Log format options
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	Json,
	Pretty,
	Compact,
}

/// Settings that load but cannot run
#[derive(Debug, Error, PartialEq)]
pub enum ConfigValidationError {
	#[error("broker.poll_batch_size must be at least 1")]
	EmptyPollBatch,
	#[error("broker.default_expiry_minutes must be positive, got {0}")]
	NonPositiveExpiry(i64),
	#[error("broker.results_base_uri must not be empty")]
	MissingResultsBaseUri,
	#[error("broker.sweep.interval_minutes must be positive when the sweep is enabled")]
	ZeroSweepInterval,
	#[error("broker.sweep.threshold_minutes must not be negative, got {0}")]
	NegativeSweepThreshold(i64),
	#[error("broker.{field} must be at most {max} minutes, got {value}")]
	DurationTooLarge {
		field: &'static str,
		value: i64,
		max: i64,
	},
	#[error("server.port must not be 0")]
	ZeroPort,
}

impl Settings {
	/// Get server bind address
	pub fn bind_address(&self) -> String {
		format!("{}:{}", self.server.host, self.server.port)
	}

	pub fn is_production(&self) -> bool {
		self.environment.profile == EnvironmentProfile::Production
	}

	/// Resolve the database URL for the postgres backend
	pub fn database_url(&self) -> Result<SecretString, ConfigurableValueError> {
		self.database.url.resolve_secret()
	}

	/// Reject settings the broker cannot run with
	pub fn validate(&self) -> Result<(), ConfigValidationError> {
		if self.server.port == 0 {
			return Err(ConfigValidationError::ZeroPort);
		}
		let broker = &self.broker;
		if broker.poll_batch_size == 0 {
			return Err(ConfigValidationError::EmptyPollBatch);
		}
		if broker.default_expiry_minutes <= 0 {
			return Err(ConfigValidationError::NonPositiveExpiry(
				broker.default_expiry_minutes,
			));
		}
		if broker.results_base_uri.trim().is_empty() {
			return Err(ConfigValidationError::MissingResultsBaseUri);
		}
		if broker.sweep.enabled && broker.sweep.interval_minutes == 0 {
			return Err(ConfigValidationError::ZeroSweepInterval);
		}
		if broker.sweep.threshold_minutes < 0 {
			return Err(ConfigValidationError::NegativeSweepThreshold(
				broker.sweep.threshold_minutes,
			));
		}
		for (field, value) in [
			("default_expiry_minutes", broker.default_expiry_minutes),
			("sweep.threshold_minutes", broker.sweep.threshold_minutes),
		] {
			if value > MAX_DURATION_MINUTES {
				return Err(ConfigValidationError::DurationTooLarge {
					field,
					value,
					max: MAX_DURATION_MINUTES,
				});
			}
		}
		Ok(())
	}
}
