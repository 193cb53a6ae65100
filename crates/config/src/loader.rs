//! Configuration loading utilities

use crate::settings::ConfigValidationError;
use crate::Settings;
use config::{Config, ConfigError, Environment, File};
use thiserror::Error;

/// Prefix of environment overrides, e.g. `BROKER__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "BROKER";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_PATH: &str = "config/config";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
	#[error("failed to load configuration: {0}")]
	Config(#[from] ConfigError),
	#[error("invalid configuration: {0}")]
	Validation(#[from] ConfigValidationError),
}

/// Load settings from `config/config.*` (optional) and `BROKER__*` variables
pub fn load_config() -> Result<Settings, ConfigLoadError> {
	let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
	load_config_from(&path)
}

/// Load settings from the given file stem (optional) and the environment
pub fn load_config_from(path: &str) -> Result<Settings, ConfigLoadError> {
	let s = Config::builder()
		.add_source(File::with_name(path).required(false))
		.add_source(
			Environment::with_prefix(ENV_PREFIX)
				.prefix_separator(ENV_SEPARATOR)
				.separator(ENV_SEPARATOR)
				.try_parsing(true),
		)
		.build()?;

	let settings: Settings = s.try_deserialize()?;
	settings.validate()?;
	Ok(settings)
}
