//! Content hashing for job deduplication
//!
//! A job's hash depends only on its type and the normalized form of its
//! input, so it is stable across restarts and independent of key order or
//! incidental whitespace in string values.

use broker_types::JobType;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// Deterministic hasher over (job type, normalized input)
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalHasher;

impl CanonicalHasher {
	pub fn new() -> Self {
		Self
	}

	/// `hex(SHA256(hex(SHA256(canonical)) || job_type))`
	pub fn hash(&self, input: &Value, job_type: JobType) -> String {
		let canonical = Self::canonical_string(input);
		let content_digest = hex::encode(Sha256::digest(canonical.as_bytes()));

		let mut outer = Sha256::new();
		outer.update(content_digest.as_bytes());
		outer.update(job_type.as_str().as_bytes());
		hex::encode(outer.finalize())
	}

	/// Normalize a value: sorted keys, trimmed strings with collapsed
	/// whitespace runs, integral floats as integers, array order preserved
	pub fn normalize(value: &Value) -> Value {
		match value {
			Value::String(s) => Value::String(collapse_whitespace(s)),
			Value::Number(n) => Value::Number(normalize_number(n)),
			Value::Array(items) => Value::Array(items.iter().map(Self::normalize).collect()),
			Value::Object(fields) => {
				let mut keys: Vec<&String> = fields.keys().collect();
				keys.sort();
				let mut normalized = Map::new();
				for key in keys {
					normalized.insert(key.clone(), Self::normalize(&fields[key.as_str()]));
				}
				Value::Object(normalized)
			},
			Value::Null | Value::Bool(_) => value.clone(),
		}
	}

	/// Key-order-stable encoding of the normalized value
	pub fn canonical_string(value: &Value) -> String {
		let mut out = String::new();
		write_canonical(&Self::normalize(value), &mut out);
		out
	}
}

// `1`, `1.0`, `1e0` and `-0.0` all denote one value and must encode alike.
fn normalize_number(n: &Number) -> Number {
	if n.is_i64() || n.is_u64() {
		return n.clone();
	}
	match n.as_f64() {
		Some(f) if f.is_finite() && f.fract() == 0.0 => {
			if f >= i64::MIN as f64 && f < i64::MAX as f64 {
				Number::from(f as i64)
			} else if f >= 0.0 && f < u64::MAX as f64 {
				Number::from(f as u64)
			} else {
				n.clone()
			}
		},
		_ => n.clone(),
	}
}

fn collapse_whitespace(s: &str) -> String {
	s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Writes objects with explicitly sorted keys so the encoding does not
// depend on the map implementation serde_json was built with.
fn write_canonical(value: &Value, out: &mut String) {
	match value {
		Value::Array(items) => {
			out.push('[');
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					out.push(',');
				}
				write_canonical(item, out);
			}
			out.push(']');
		},
		Value::Object(fields) => {
			let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
			entries.sort_by(|a, b| a.0.cmp(b.0));
			out.push('{');
			for (i, (key, item)) in entries.into_iter().enumerate() {
				if i > 0 {
					out.push(',');
				}
				out.push_str(&Value::String(key.clone()).to_string());
				out.push(':');
				write_canonical(item, out);
			}
			out.push('}');
		},
		scalar => out.push_str(&scalar.to_string()),
	}
}
