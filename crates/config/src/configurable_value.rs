//! Configurable values that resolve from environment variables or plain text
//!
//! Used for secrets such as the database URL so that config files can name
//! an environment variable instead of embedding credentials.

use broker_types::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value loaded from an environment variable or given inline
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConfigurableValue {
	/// "env" reads the variable named by `value`, "plain" uses `value` as-is
	#[serde(rename = "type")]
	pub value_type: ValueType,
	pub value: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
	Env,
	Plain,
}

/// Errors that can occur when resolving configurable values
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigurableValueError {
	#[error("Environment variable '{0}' not found")]
	EnvironmentVariableNotFound(String),
	#[error("Configured value is empty")]
	Empty,
}

impl ConfigurableValue {
	pub fn from_env(env_var_name: &str) -> Self {
		Self {
			value_type: ValueType::Env,
			value: env_var_name.to_string(),
		}
	}

	pub fn from_plain(plain_value: &str) -> Self {
		Self {
			value_type: ValueType::Plain,
			value: plain_value.to_string(),
		}
	}

	/// Resolve the actual value
	pub fn resolve(&self) -> Result<String, ConfigurableValueError> {
		let resolved = match self.value_type {
			ValueType::Env => std::env::var(&self.value).map_err(|_| {
				ConfigurableValueError::EnvironmentVariableNotFound(self.value.clone())
			})?,
			ValueType::Plain => self.value.clone(),
		};
		if resolved.trim().is_empty() {
			return Err(ConfigurableValueError::Empty);
		}
		Ok(resolved)
	}

	/// Resolve straight into a [`SecretString`]
	pub fn resolve_secret(&self) -> Result<SecretString, ConfigurableValueError> {
		self.resolve().map(SecretString::new)
	}

	/// Inline secrets end up in config files and process listings
	pub fn is_inline(&self) -> bool {
		self.value_type == ValueType::Plain
	}

	/// Where the value comes from, safe to log
	pub fn description(&self) -> String {
		match self.value_type {
			ValueType::Env => format!("environment variable '{}'", self.value),
			ValueType::Plain => "inline value".to_string(),
		}
	}
}

impl fmt::Display for ConfigurableValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.value_type {
			ValueType::Env => write!(f, "env:{}", self.value),
			ValueType::Plain => write!(f, "plain:[REDACTED]"),
		}
	}
}

/// `"env:NAME"` names a variable, anything else is a plain value
impl From<&str> for ConfigurableValue {
	fn from(value: &str) -> Self {
		match value.strip_prefix("env:") {
			Some(env_var) => Self::from_env(env_var),
			None => Self::from_plain(value),
		}
	}
}

impl From<String> for ConfigurableValue {
	fn from(value: String) -> Self {
		ConfigurableValue::from(value.as_str())
	}
}
