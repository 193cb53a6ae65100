//! Timeout sweeps and cache invalidation over HTTP

mod mocks;

use crate::mocks::{ApiFixtures, TestServer, ADMIN, ALICE, WORKER};
use broker_storage::JobStorage;
use job_broker::{JobStatus, JobType};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const TIMEOUT: &str = "/api/v1/admin/jobs/timeout";
const INVALIDATE: &str = "/api/v1/admin/cache/invalidate";

#[tokio::test]
async fn test_sweep_times_out_stale_jobs() {
	let server = TestServer::spawn().await.unwrap();
	let client = Client::new();

	let stale_test = ApiFixtures::seed_job(&server.store, JobType::Test, 120).await;
	let stale_export = ApiFixtures::seed_job(&server.store, JobType::RasterExport, 90).await;
	let fresh = ApiFixtures::seed_job(&server.store, JobType::Test, 5).await;

	let sweep = json!({ "threshold_minutes": 60, "job_type": "TEST" });
	let resp = ApiFixtures::post(&client, &server, WORKER, TIMEOUT, sweep.clone()).await;
	assert_eq!(resp.status(), StatusCode::FORBIDDEN);

	let resp = ApiFixtures::post(&client, &server, ADMIN, TIMEOUT, sweep).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let summary: Value = resp.json().await.unwrap();
	assert_eq!(summary["count"], 1);
	assert_eq!(summary["job_ids"], json!([stale_test.job_id]));

	let sweep = json!({ "threshold_minutes": 60 });
	let resp = ApiFixtures::post(&client, &server, ADMIN, TIMEOUT, sweep).await;
	let summary: Value = resp.json().await.unwrap();
	assert_eq!(summary["count"], 1);
	assert_eq!(summary["by_type"]["RASTER_EXPORT"], 1);

	let job = server.store.get_job(&stale_export.job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::TimedOut);
	let job = server.store.get_job(&fresh.job_id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Pending);

	// Thresholds beyond the representable range are rejected, not fatal
	let sweep = json!({ "threshold_minutes": 1_000_000_000_000i64 });
	let resp = ApiFixtures::post(&client, &server, ADMIN, TIMEOUT, sweep).await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	let body: Value = resp.json().await.unwrap();
	assert_eq!(body["error"], "BAD_REQUEST");

	// A timed-out job can no longer be claimed
	let path = format!("/api/v1/jobs/{}/assign", stale_test.job_id);
	let claim = ApiFixtures::assign("late");
	let resp = ApiFixtures::post(&client, &server, WORKER, &path, claim).await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

	server.abort();
}

#[tokio::test]
async fn test_invalidation_forces_recomputation() {
	let server = TestServer::spawn().await.unwrap();
	let client = Client::new();
	let submit = ApiFixtures::submit("RASTER_EXPORT", ApiFixtures::raster_export_input());

	let resp = ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", submit.clone()).await;
	let first: Value = resp.json().await.unwrap();
	let job_id = first["job_id"].as_str().unwrap();

	let path = format!("/api/v1/jobs/{}/assign", job_id);
	let claim = ApiFixtures::assign("t-1");
	let resp = ApiFixtures::post(&client, &server, WORKER, &path, claim).await;
	let assignment: Value = resp.json().await.unwrap();
	let path = format!(
		"/api/v1/assignments/{}/result",
		assignment["assignment_id"].as_str().unwrap()
	);
	let outcome = ApiFixtures::outcome("SUCCEEDED", json!({"uri": "s3://exports/proj-7.tif"}));
	let resp = ApiFixtures::post(&client, &server, WORKER, &path, outcome).await;
	assert_eq!(resp.status(), StatusCode::OK);

	let resp = ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", submit.clone()).await;
	let hit: Value = resp.json().await.unwrap();
	assert_eq!(hit["cached"], true);
	assert_eq!(hit["job_id"], first["job_id"]);

	let body = json!({ "job_type": "RASTER_EXPORT" });
	let resp = ApiFixtures::post(&client, &server, ADMIN, INVALIDATE, body).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let invalidated: Value = resp.json().await.unwrap();
	assert_eq!(invalidated["invalidated"], 1);

	let resp = ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", submit).await;
	assert_eq!(resp.status(), StatusCode::CREATED);
	let miss: Value = resp.json().await.unwrap();
	assert_eq!(miss["cached"], false);
	assert_ne!(miss["job_id"], first["job_id"]);

	server.abort();
}

#[tokio::test]
async fn test_failed_result_is_not_reused() {
	let server = TestServer::spawn().await.unwrap();
	let client = Client::new();
	let submit = ApiFixtures::submit("TEST", json!({"flaky": true}));

	let resp = ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", submit.clone()).await;
	let first: Value = resp.json().await.unwrap();
	let path = format!("/api/v1/jobs/{}/assign", first["job_id"].as_str().unwrap());
	let claim = ApiFixtures::assign("t-1");
	let resp = ApiFixtures::post(&client, &server, WORKER, &path, claim).await;
	let assignment: Value = resp.json().await.unwrap();
	let path = format!(
		"/api/v1/assignments/{}/result",
		assignment["assignment_id"].as_str().unwrap()
	);
	let outcome = ApiFixtures::outcome("FAILED", json!({"error": "out of memory"}));
	let resp = ApiFixtures::post(&client, &server, WORKER, &path, outcome).await;
	let job: Value = resp.json().await.unwrap();
	assert_eq!(job["status"], "FAILED");

	let resp = ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", submit).await;
	let retry: Value = resp.json().await.unwrap();
	assert_eq!(retry["cached"], false);
	assert_ne!(retry["job_id"], first["job_id"]);

	server.abort();
}
