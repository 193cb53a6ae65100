//! Job types and their registration table
//!
//! Every job type is a closed variant. Per-type behavior (payload
//! validation and assignment expiry) lives in a [`JobTypeSpec`] entry, so
//! adding a job type means adding a variant and its table entry.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use super::errors::JobValidationError;

/// Expiry applied to assignments of job types without their own setting
pub const DEFAULT_EXPIRY_MINUTES: i64 = 60;

/// Upper bound for configured expiries and sweep thresholds (100 years)
pub const MAX_DURATION_MINUTES: i64 = 100 * 365 * 24 * 60;

/// Validates a JSON payload, returning a human readable reason on failure
pub type PayloadValidator = fn(&Value) -> Result<(), String>;

/// Supported computation types
#[derive(
	Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum JobType {
	/// Diagnostic job used by smoke tests and tooling
	Test,
	/// Per-polygon statistics over a raster
	ZonalStatistics,
	/// Per-polygon time series extraction from a dataset
	TimeSeries,
	/// Export of a project's raster layers to a file format
	RasterExport,
}

/// Registration entry for a job type
pub struct JobTypeSpec {
	pub job_type: JobType,
	/// Assignment expiry override, `None` falls back to the default
	pub expiry_minutes: Option<i64>,
	pub validate_input: PayloadValidator,
	pub validate_result: PayloadValidator,
}

static TEST_SPEC: JobTypeSpec = JobTypeSpec {
	job_type: JobType::Test,
	expiry_minutes: None,
	validate_input: validate_test_input,
	validate_result: accept_any,
};

static ZONAL_STATISTICS_SPEC: JobTypeSpec = JobTypeSpec {
	job_type: JobType::ZonalStatistics,
	expiry_minutes: Some(30),
	validate_input: validate_zonal_statistics_input,
	validate_result: validate_zonal_statistics_result,
};

static TIME_SERIES_SPEC: JobTypeSpec = JobTypeSpec {
	job_type: JobType::TimeSeries,
	expiry_minutes: Some(120),
	validate_input: validate_time_series_input,
	validate_result: validate_time_series_result,
};

static RASTER_EXPORT_SPEC: JobTypeSpec = JobTypeSpec {
	job_type: JobType::RasterExport,
	expiry_minutes: Some(180),
	validate_input: validate_raster_export_input,
	validate_result: validate_raster_export_result,
};

const ZONAL_STATISTICS: [&str; 6] = ["mean", "min", "max", "sum", "count", "std"];
const EXPORT_FORMATS: [&str; 3] = ["GTIFF", "COG", "PNG"];

impl JobType {
	pub const ALL: [JobType; 4] = [
		JobType::Test,
		JobType::ZonalStatistics,
		JobType::TimeSeries,
		JobType::RasterExport,
	];

	/// Registration entry for this type
	pub fn spec(&self) -> &'static JobTypeSpec {
		match self {
			JobType::Test => &TEST_SPEC,
			JobType::ZonalStatistics => &ZONAL_STATISTICS_SPEC,
			JobType::TimeSeries => &TIME_SERIES_SPEC,
			JobType::RasterExport => &RASTER_EXPORT_SPEC,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			JobType::Test => "TEST",
			JobType::ZonalStatistics => "ZONAL_STATISTICS",
			JobType::TimeSeries => "TIME_SERIES",
			JobType::RasterExport => "RASTER_EXPORT",
		}
	}

	/// Lower-case path segment used when deriving storage locations
	pub fn path_segment(&self) -> String {
		self.as_str().to_ascii_lowercase().replace('_', "-")
	}

	/// Validate a submission payload against this type's input schema
	pub fn validate_input(&self, input: &Value) -> Result<(), JobValidationError> {
		(self.spec().validate_input)(input).map_err(|reason| JobValidationError::InvalidInput {
			job_type: *self,
			reason,
		})
	}

	/// Validate a worker's result payload against this type's result schema
	pub fn validate_result(&self, result: &Value) -> Result<(), JobValidationError> {
		(self.spec().validate_result)(result).map_err(|reason| {
			JobValidationError::InvalidResult {
				job_type: *self,
				reason,
			}
		})
	}

	/// Assignment expiry in minutes, falling back to `default_minutes`
	pub fn expiry_minutes(&self, default_minutes: i64) -> i64 {
		self.spec().expiry_minutes.unwrap_or(default_minutes)
	}

	/// Assignment expiry as a duration; `None` when it does not fit one
	pub fn expiry(&self, default_minutes: i64) -> Option<Duration> {
		Duration::try_minutes(self.expiry_minutes(default_minutes))
	}
}

impl fmt::Display for JobType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for JobType {
	type Err = JobValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
		JobType::ALL
			.into_iter()
			.find(|job_type| job_type.as_str() == normalized)
			.ok_or_else(|| JobValidationError::UnknownJobType {
				job_type: s.to_string(),
			})
	}
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, String> {
	value
		.as_object()
		.ok_or_else(|| "payload must be a JSON object".to_string())
}

fn required_str<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a str, String> {
	match object.get(field) {
		Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
		Some(Value::String(_)) => Err(format!("'{}' must not be empty", field)),
		Some(_) => Err(format!("'{}' must be a string", field)),
		None => Err(format!("missing required field '{}'", field)),
	}
}

fn accept_any(_: &Value) -> Result<(), String> {
	Ok(())
}

fn validate_test_input(input: &Value) -> Result<(), String> {
	as_object(input).map(|_| ())
}

fn validate_zonal_statistics_input(input: &Value) -> Result<(), String> {
	let object = as_object(input)?;
	required_str(object, "polygon_id")?;
	required_str(object, "raster")?;

	let statistics = object
		.get("statistics")
		.and_then(Value::as_array)
		.ok_or_else(|| "'statistics' must be an array".to_string())?;
	if statistics.is_empty() {
		return Err("'statistics' must not be empty".to_string());
	}
	for statistic in statistics {
		match statistic.as_str() {
			Some(name) if ZONAL_STATISTICS.contains(&name.trim()) => {},
			Some(name) => {
				return Err(format!(
					"unsupported statistic '{}' (expected one of {})",
					name,
					ZONAL_STATISTICS.join(", ")
				))
			},
			None => return Err("'statistics' entries must be strings".to_string()),
		}
	}
	Ok(())
}

fn validate_zonal_statistics_result(result: &Value) -> Result<(), String> {
	let object = as_object(result)?;
	match object.get("statistics") {
		Some(Value::Object(_)) => Ok(()),
		Some(_) => Err("'statistics' must be an object".to_string()),
		None => Err("missing required field 'statistics'".to_string()),
	}
}

fn validate_time_series_input(input: &Value) -> Result<(), String> {
	let object = as_object(input)?;
	required_str(object, "polygon_id")?;
	required_str(object, "dataset")?;

	let parse_date = |field: &str| -> Result<NaiveDate, String> {
		let raw = required_str(object, field)?;
		NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
			.map_err(|_| format!("'{}' must be a YYYY-MM-DD date", field))
	};
	let start = parse_date("start")?;
	let end = parse_date("end")?;
	if start > end {
		return Err("'start' must not be after 'end'".to_string());
	}
	Ok(())
}

fn validate_time_series_result(result: &Value) -> Result<(), String> {
	let object = as_object(result)?;
	match object.get("series") {
		Some(Value::Array(_)) => Ok(()),
		Some(_) => Err("'series' must be an array".to_string()),
		None => Err("missing required field 'series'".to_string()),
	}
}

fn validate_raster_export_input(input: &Value) -> Result<(), String> {
	let object = as_object(input)?;
	required_str(object, "project_id")?;
	let format = required_str(object, "format")?;
	if !EXPORT_FORMATS.contains(&format.trim().to_ascii_uppercase().as_str()) {
		return Err(format!(
			"unsupported format '{}' (expected one of {})",
			format,
			EXPORT_FORMATS.join(", ")
		));
	}
	Ok(())
}

fn validate_raster_export_result(result: &Value) -> Result<(), String> {
	let object = as_object(result)?;
	required_str(object, "uri").map(|_| ())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_registry_entries_match_variants() {
		for job_type in JobType::ALL {
			assert_eq!(job_type.spec().job_type, job_type);
		}
	}

	#[test]
	fn test_parse_job_type() {
		assert_eq!("TEST".parse::<JobType>().unwrap(), JobType::Test);
		assert_eq!(
			"zonal-statistics".parse::<JobType>().unwrap(),
			JobType::ZonalStatistics
		);
		let err = "MAGIC".parse::<JobType>().unwrap_err();
		assert_eq!(
			err,
			JobValidationError::UnknownJobType {
				job_type: "MAGIC".to_string()
			}
		);
	}

	#[test]
	fn test_serde_uses_wire_names() {
		for job_type in JobType::ALL {
			let json = serde_json::to_string(&job_type).unwrap();
			assert_eq!(json, format!("\"{}\"", job_type.as_str()));
		}
	}

	#[test]
	fn test_expiry_defaults() {
		assert_eq!(JobType::Test.expiry(60), Some(Duration::minutes(60)));
		assert_eq!(JobType::Test.expiry(15), Some(Duration::minutes(15)));
		assert_eq!(JobType::ZonalStatistics.expiry(60), Some(Duration::minutes(30)));
		assert_eq!(JobType::RasterExport.expiry(60), Some(Duration::minutes(180)));
	}

	#[test]
	fn test_expiry_out_of_range() {
		assert_eq!(JobType::Test.expiry(i64::MAX), None);
		assert_eq!(JobType::Test.expiry_minutes(i64::MAX), i64::MAX);
		// Types with their own expiry ignore the default
		assert_eq!(
			JobType::TimeSeries.expiry(i64::MAX),
			Some(Duration::minutes(120))
		);
		assert!(JobType::Test.expiry(MAX_DURATION_MINUTES).is_some());
	}

	#[test]
	fn test_test_type_requires_object() {
		assert!(JobType::Test.validate_input(&json!({"id": 1})).is_ok());
		assert!(JobType::Test.validate_input(&json!([1, 2])).is_err());
		assert!(JobType::Test.validate_result(&json!("anything")).is_ok());
	}

	#[test]
	fn test_zonal_statistics_validation() {
		let valid = json!({
			"polygon_id": "poly-1",
			"raster": "ndvi-2024",
			"statistics": ["mean", "max"]
		});
		assert!(JobType::ZonalStatistics.validate_input(&valid).is_ok());

		let unsupported = json!({
			"polygon_id": "poly-1",
			"raster": "ndvi-2024",
			"statistics": ["median"]
		});
		let err = JobType::ZonalStatistics
			.validate_input(&unsupported)
			.unwrap_err();
		assert!(err.to_string().contains("ZONAL_STATISTICS"));
		assert!(err.to_string().contains("median"));

		let empty = json!({"polygon_id": "p", "raster": "r", "statistics": []});
		assert!(JobType::ZonalStatistics.validate_input(&empty).is_err());

		assert!(JobType::ZonalStatistics
			.validate_result(&json!({"statistics": {"mean": 0.4}}))
			.is_ok());
		assert!(JobType::ZonalStatistics
			.validate_result(&json!({"mean": 0.4}))
			.is_err());
	}

	#[test]
	fn test_time_series_date_range() {
		let valid = json!({
			"polygon_id": "poly-1",
			"dataset": "sentinel-2",
			"start": "2024-01-01",
			"end": "2024-06-30"
		});
		assert!(JobType::TimeSeries.validate_input(&valid).is_ok());

		let reversed = json!({
			"polygon_id": "poly-1",
			"dataset": "sentinel-2",
			"start": "2024-06-30",
			"end": "2024-01-01"
		});
		assert!(JobType::TimeSeries.validate_input(&reversed).is_err());

		let malformed = json!({
			"polygon_id": "poly-1",
			"dataset": "sentinel-2",
			"start": "January",
			"end": "2024-01-01"
		});
		assert!(JobType::TimeSeries.validate_input(&malformed).is_err());
	}

	#[test]
	fn test_raster_export_formats() {
		assert!(JobType::RasterExport
			.validate_input(&json!({"project_id": "p1", "format": "cog"}))
			.is_ok());
		assert!(JobType::RasterExport
			.validate_input(&json!({"project_id": "p1", "format": "BMP"}))
			.is_err());
		assert!(JobType::RasterExport
			.validate_result(&json!({"uri": "s3://bucket/export.tif"}))
			.is_ok());
		assert!(JobType::RasterExport
			.validate_result(&json!({"uri": 42}))
			.is_err());
	}
}
