//! Writes the broker's OpenAPI document to disk.
//!
//! ```bash
//! cargo run -p broker-api --bin generate_openapi --features openapi -- [OUTPUT]
//! ```
//!
//! `OUTPUT` defaults to `docs/api/openapi.json`.

use std::path::PathBuf;

use broker_api::openapi::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "docs/api/openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let output = std::env::args()
		.nth(1)
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

	if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
		std::fs::create_dir_all(dir)?;
	}

	let doc = ApiDoc::openapi();
	std::fs::write(&output, serde_json::to_string_pretty(&doc)?)?;

	let operations: usize = doc
		.paths
		.paths
		.values()
		.map(|item| {
			[&item.get, &item.post, &item.put, &item.delete, &item.patch]
				.iter()
				.filter(|op| op.is_some())
				.count()
		})
		.sum();
	println!(
		"wrote {} ({} paths, {} operations, version {})",
		output.display(),
		doc.paths.paths.len(),
		operations,
		doc.info.version
	);
	Ok(())
}
