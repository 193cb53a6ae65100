use axum::{
	routing::{get, post},
	Router,
};
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	cors::CorsLayer,
	limit::RequestBodyLimitLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};
use tracing::Level;

use crate::handlers::{
	assign_job, cancel_job, get_job, health, heartbeat, invalidate_cache, job_types, list_jobs,
	poll_jobs, ready, submit_job, submit_result, timeout_sweep,
};
use crate::security::add_security_headers;
use crate::state::AppState;
// State is applied at the application level using `.with_state(...)`.
#[cfg(feature = "openapi")]
use crate::openapi::ApiDoc;
#[cfg(feature = "openapi")]
use utoipa::OpenApi;
#[cfg(feature = "openapi")]
use utoipa_swagger_ui::SwaggerUi;

/// Request bodies above this size are rejected with 413
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_router() -> Router<AppState> {
	let cors = CorsLayer::permissive();
	let body_limit = RequestBodyLimitLayer::new(MAX_BODY_BYTES);
	let trace = TraceLayer::new_for_http()
		.make_span_with(|req: &axum::http::Request<_>| {
			let req_id = req
				.headers()
				.get("x-request-id")
				.and_then(|v| v.to_str().ok())
				.unwrap_or("-");
			tracing::info_span!(
				"http_request",
				method = %req.method(),
				uri = %req.uri(),
				req_id
			)
		})
		.on_request(tower_http::trace::DefaultOnRequest::new().level(Level::DEBUG))
		.on_response(
			tower_http::trace::DefaultOnResponse::new()
				.level(Level::INFO)
				.latency_unit(tower_http::LatencyUnit::Millis),
		);
	let req_id = ServiceBuilder::new()
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.layer(PropagateRequestIdLayer::x_request_id());

	let base_router = Router::new()
		.route("/health", get(health))
		.route("/health/", get(health))
		.route("/ready", get(ready))
		.route("/ready/", get(ready))
		// Clients
		.route("/api/v1/jobs", post(submit_job).get(list_jobs))
		.route("/api/v1/jobs/", post(submit_job).get(list_jobs))
		.route("/api/v1/jobs/{id}", get(get_job))
		.route("/api/v1/jobs/{id}/", get(get_job))
		.route("/api/v1/jobs/{id}/cancel", post(cancel_job))
		.route("/api/v1/jobs/{id}/cancel/", post(cancel_job))
		// Workers
		.route("/api/v1/jobs/poll", get(poll_jobs))
		.route("/api/v1/jobs/poll/", get(poll_jobs))
		.route("/api/v1/jobs/{id}/assign", post(assign_job))
		.route("/api/v1/jobs/{id}/assign/", post(assign_job))
		.route("/api/v1/assignments/{id}/result", post(submit_result))
		.route("/api/v1/assignments/{id}/result/", post(submit_result))
		.route("/api/v1/assignments/{id}/heartbeat", post(heartbeat))
		.route("/api/v1/assignments/{id}/heartbeat/", post(heartbeat))
		.route("/api/v1/job-types", get(job_types))
		.route("/api/v1/job-types/", get(job_types))
		// Admin
		.route("/api/v1/admin/cache/invalidate", post(invalidate_cache))
		.route("/api/v1/admin/cache/invalidate/", post(invalidate_cache))
		.route("/api/v1/admin/jobs/timeout", post(timeout_sweep))
		.route("/api/v1/admin/jobs/timeout/", post(timeout_sweep));

	#[cfg(feature = "openapi")]
	let router = base_router
		.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

	#[cfg(not(feature = "openapi"))]
	let router = base_router;

	let router = router
		.layer(cors)
		.layer(CompressionLayer::new())
		.layer(trace)
		.layer(req_id)
		.layer(body_limit);

	add_security_headers(router)
}
