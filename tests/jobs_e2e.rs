//! Job submission, caching, listing and cancellation over HTTP

mod mocks;

use crate::mocks::{ApiFixtures, TestServer, ADMIN, ALICE, BOB, WORKER};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn test_full_lifecycle() {
	let server = TestServer::spawn().await.unwrap();
	let client = Client::new();

	let submit = ApiFixtures::submit("ZONAL_STATISTICS", ApiFixtures::zonal_statistics_input());
	let resp = ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", submit).await;
	assert_eq!(resp.status(), StatusCode::CREATED);
	let submitted: Value = resp.json().await.unwrap();
	assert_eq!(submitted["cached"], false);
	assert_eq!(submitted["status"], "PENDING");
	let job_id = submitted["job_id"].as_str().unwrap().to_string();

	let resp = ApiFixtures::get(&client, &server, WORKER, "/api/v1/jobs/poll").await;
	let polled: Value = resp.json().await.unwrap();
	assert_eq!(polled["jobs"][0]["job_id"], job_id);

	let path = format!("/api/v1/jobs/{}/assign", job_id);
	let claim = ApiFixtures::assign("t-1");
	let resp = ApiFixtures::post(&client, &server, WORKER, &path, claim).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let assignment: Value = resp.json().await.unwrap();
	let assignment_id = assignment["assignment_id"].as_str().unwrap().to_string();
	let location = assignment["storage_location"].as_str().unwrap();
	assert!(location.starts_with(&format!("s3://job-results/zonal-statistics/{}/", job_id)));

	// Claimed jobs drop out of the poll
	let resp = ApiFixtures::get(&client, &server, WORKER, "/api/v1/jobs/poll").await;
	let polled: Value = resp.json().await.unwrap();
	assert!(polled["jobs"].as_array().unwrap().is_empty());

	let path = format!("/api/v1/assignments/{}/heartbeat", assignment_id);
	let resp = ApiFixtures::post(&client, &server, WORKER, &path, json!({})).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let beat: Value = resp.json().await.unwrap();
	assert!(!beat["heartbeat_at"].is_null());

	let path = format!("/api/v1/assignments/{}/result", assignment_id);
	let outcome = ApiFixtures::outcome("SUCCEEDED", json!({"statistics": {"mean": 0.42}}));
	let resp = ApiFixtures::post(&client, &server, WORKER, &path, outcome).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let job: Value = resp.json().await.unwrap();
	assert_eq!(job["status"], "SUCCEEDED");

	let path = format!("/api/v1/jobs/{}", job_id);
	let resp = ApiFixtures::get(&client, &server, ALICE, &path).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let details: Value = resp.json().await.unwrap();
	assert_eq!(details["status"], "SUCCEEDED");
	let result = &details["assignments"][0]["result"];
	assert_eq!(result["payload"]["statistics"]["mean"], 0.42);
	assert_eq!(result["cache_valid"], true);

	server.abort();
}

#[tokio::test]
async fn test_identical_submissions_share_a_job() {
	let server = TestServer::spawn().await.unwrap();
	let client = Client::new();

	let first = ApiFixtures::submit("TIME_SERIES", ApiFixtures::time_series_input());
	// Same content, different key order and whitespace
	let second: Value = serde_json::from_str(
		r#"{"job_type": "TIME_SERIES", "input": {"end": "2024-06-30",  "start": "2024-01-01",
		"dataset": "precipitation", "polygon_id": "poly-42"}}"#,
	)
	.unwrap();

	let resp = ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", first).await;
	let first: Value = resp.json().await.unwrap();

	let resp = ApiFixtures::post(&client, &server, BOB, "/api/v1/jobs", second.clone()).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let hit: Value = resp.json().await.unwrap();
	assert_eq!(hit["cached"], true);
	assert_eq!(hit["job_id"], first["job_id"]);
	assert_ne!(hit["request_id"], first["request_id"]);

	let mut uncached = second;
	uncached["cache_disabled"] = json!(true);
	let resp = ApiFixtures::post(&client, &server, BOB, "/api/v1/jobs", uncached).await;
	assert_eq!(resp.status(), StatusCode::CREATED);
	let fresh: Value = resp.json().await.unwrap();
	assert_eq!(fresh["cached"], false);
	assert_ne!(fresh["job_id"], first["job_id"]);

	server.abort();
}

#[tokio::test]
async fn test_submission_validation() {
	let server = TestServer::spawn().await.unwrap();
	let client = Client::new();

	let resp = ApiFixtures::post(
		&client,
		&server,
		ALICE,
		"/api/v1/jobs",
		ApiFixtures::submit("PAINT_FENCE", json!({})),
	)
	.await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	let body: Value = resp.json().await.unwrap();
	assert_eq!(body["error"], "BAD_REQUEST");

	let resp = ApiFixtures::post(
		&client,
		&server,
		ALICE,
		"/api/v1/jobs",
		ApiFixtures::submit("RASTER_EXPORT", json!({"project_id": "p", "format": "BMP"})),
	)
	.await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

	let resp = client
		.post(server.url("/api/v1/jobs"))
		.json(&ApiFixtures::submit("TEST", json!({})))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

	server.abort();
}

#[tokio::test]
async fn test_cancel_rules() {
	let server = TestServer::spawn().await.unwrap();
	let client = Client::new();

	let submit = ApiFixtures::submit("RASTER_EXPORT", ApiFixtures::raster_export_input());
	let resp = ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", submit).await;
	let job: Value = resp.json().await.unwrap();
	let cancel = format!("/api/v1/jobs/{}/cancel", job["job_id"].as_str().unwrap());

	let resp = ApiFixtures::post(&client, &server, BOB, &cancel, json!({})).await;
	assert_eq!(resp.status(), StatusCode::FORBIDDEN);

	let resp = ApiFixtures::post(&client, &server, ALICE, &cancel, json!({})).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let cancelled: Value = resp.json().await.unwrap();
	assert_eq!(cancelled["status"], "CANCELLED");

	let resp = ApiFixtures::post(&client, &server, ADMIN, &cancel, json!({})).await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

	let missing = "/api/v1/jobs/nope/cancel";
	let resp = ApiFixtures::post(&client, &server, ALICE, missing, json!({})).await;
	assert_eq!(resp.status(), StatusCode::NOT_FOUND);

	server.abort();
}

#[tokio::test]
async fn test_list_scoping_and_pagination() {
	let server = TestServer::spawn().await.unwrap();
	let client = Client::new();

	for i in 0..3 {
		let submit = ApiFixtures::submit("TEST", json!({ "n": i }));
		ApiFixtures::post(&client, &server, ALICE, "/api/v1/jobs", submit).await;
	}
	let submit = ApiFixtures::submit("TEST", json!({ "n": "bob" }));
	ApiFixtures::post(&client, &server, BOB, "/api/v1/jobs", submit).await;

	let resp = ApiFixtures::get(&client, &server, ALICE, "/api/v1/jobs?page_size=2").await;
	let page: Value = resp.json().await.unwrap();
	assert_eq!(page["total"], 3);
	assert_eq!(page["jobs"].as_array().unwrap().len(), 2);
	// Newest first
	assert_eq!(page["jobs"][0]["input"]["n"], 2);

	let path = "/api/v1/jobs?page=2&page_size=2";
	let resp = ApiFixtures::get(&client, &server, ALICE, path).await;
	let page: Value = resp.json().await.unwrap();
	assert_eq!(page["jobs"].as_array().unwrap().len(), 1);

	let resp = ApiFixtures::get(&client, &server, ADMIN, "/api/v1/jobs?status=PENDING").await;
	let page: Value = resp.json().await.unwrap();
	assert_eq!(page["total"], 4);

	let resp = ApiFixtures::get(&client, &server, ADMIN, "/api/v1/jobs?owner_id=bob").await;
	let page: Value = resp.json().await.unwrap();
	assert_eq!(page["total"], 1);

	let resp = ApiFixtures::get(&client, &server, ALICE, "/api/v1/jobs?status=DONE").await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

	server.abort();
}
