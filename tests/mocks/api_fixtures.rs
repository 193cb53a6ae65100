//! API request fixtures and helpers for end-to-end tests

use broker_storage::JobStorage;
use broker_types::JobRequest;
use job_broker::chrono::{Duration, Utc};
use job_broker::serde_json::{json, Value};
use job_broker::{Job, JobType, MemoryStore};
use reqwest::{Client, Response};

use super::test_server::TestServer;

/// Caller id and comma separated roles
pub type Identity = (&'static str, &'static str);

#[allow(dead_code)]
pub const ALICE: Identity = ("alice", "");
#[allow(dead_code)]
pub const BOB: Identity = ("bob", "");
#[allow(dead_code)]
pub const WORKER: Identity = ("worker-1", "worker");
#[allow(dead_code)]
pub const ADMIN: Identity = ("ops", "admin");

#[allow(dead_code)]
pub struct ApiFixtures;

#[allow(dead_code)]
impl ApiFixtures {
	pub fn submit(job_type: &str, input: Value) -> Value {
		json!({ "job_type": job_type, "input": input })
	}

	pub fn zonal_statistics_input() -> Value {
		json!({
			"polygon_id": "poly-42",
			"raster": "ndvi-2024",
			"statistics": ["mean", "max"]
		})
	}

	pub fn time_series_input() -> Value {
		json!({
			"polygon_id": "poly-42",
			"dataset": "precipitation",
			"start": "2024-01-01",
			"end": "2024-06-30"
		})
	}

	pub fn raster_export_input() -> Value {
		json!({ "project_id": "proj-7", "format": "COG" })
	}

	pub fn assign(task_id: &str) -> Value {
		json!({ "task_id": task_id, "cluster": "batch-a" })
	}

	pub fn outcome(status: &str, result: Value) -> Value {
		json!({ "status": status, "result": result, "metadata": {"runtime_ms": 1200} })
	}

	pub async fn get(
		client: &Client,
		server: &TestServer,
		identity: Identity,
		path: &str,
	) -> Response {
		client
			.get(server.url(path))
			.header("x-caller-id", identity.0)
			.header("x-caller-roles", identity.1)
			.send()
			.await
			.unwrap()
	}

	pub async fn post(
		client: &Client,
		server: &TestServer,
		identity: Identity,
		path: &str,
		body: Value,
	) -> Response {
		client
			.post(server.url(path))
			.header("x-caller-id", identity.0)
			.header("x-caller-roles", identity.1)
			.json(&body)
			.send()
			.await
			.unwrap()
	}

	/// Insert a `PENDING` job created `age_minutes` ago, bypassing the API
	pub async fn seed_job(store: &MemoryStore, job_type: JobType, age_minutes: i64) -> Job {
		let created_at = Utc::now() - Duration::minutes(age_minutes);
		let input = json!({ "seeded": age_minutes });
		let job = Job::new(
			job_type,
			format!("seeded-{}-{}", job_type, age_minutes),
			input.clone(),
			"alice".to_string(),
			created_at,
		);
		let request = JobRequest::new(
			"alice".to_string(),
			job_type,
			input,
			false,
			job.job_id.clone(),
			created_at,
		);
		store
			.record_admission(Some(job.clone()), request)
			.await
			.unwrap();
		job
	}
}
