//! Prometheus metrics for the form server.
//!
//! Request timing is recorded by [`track_requests`], submission outcomes by
//! the submit handler. `main` installs the recorder and serves `/metrics`.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

const HTTP_REQUESTS_TOTAL: &str = "formkit_http_requests_total";
const HTTP_REQUEST_DURATION: &str = "formkit_http_request_duration_seconds";
const SUBMISSIONS_TOTAL: &str = "formkit_submissions_total";
const VALIDATION_FAILURES_TOTAL: &str = "formkit_validation_failures_total";

/// Install the global Prometheus recorder.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Render the scrape body.
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Record one HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        HTTP_REQUEST_DURATION,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

/// Record a validated submission for `form_id`.
pub fn record_submission(form_id: &str, accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    counter!(
        SUBMISSIONS_TOTAL,
        "form" => form_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a request rejected before validation (`form_id`, `body`, ...).
pub fn record_validation_failure(kind: &str) {
    counter!(VALIDATION_FAILURES_TOTAL, "type" => kind.to_string()).increment(1);
}

/// Middleware timing every routed request.
///
/// The route template (`/api/forms/{form_id}`) is used as the path label.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |p| p.as_str().to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
