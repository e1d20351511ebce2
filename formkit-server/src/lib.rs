//! # Formkit Server Library
//!
//! Receiving side of Formkit remote actions: rebuilds key-path payloads and
//! validates them against registered schemas. Used by the binary and the
//! integration tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod routes;
pub mod validation;

pub use config::ServerConfig;
pub use error::ServerError;
pub use registry::FormRegistry;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Registered form schemas.
    pub forms: FormRegistry,
}

impl AppState {
    /// Create state over a registry.
    #[must_use]
    pub fn new(forms: FormRegistry) -> Self {
        Self { forms }
    }
}

/// Build the API router with request metrics but without transport
/// middleware (tracing, CORS, request ids).
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .route("/api/forms", get(routes::list_forms))
        .route("/api/forms/{form_id}", post(routes::submit_form))
        .route_layer(middleware::from_fn(metrics::track_requests))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use formkit_core::Schema;
    use tower::ServiceExt;

    fn app() -> Router {
        let forms = FormRegistry::new();
        forms.register("signup", Schema::new()).expect("register");
        router(AppState::new(forms))
    }

    #[tokio::test]
    async fn test_unknown_form_is_404() {
        let response = app()
            .oneshot(
                Request::post("/api/forms/missing")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("a=1"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_form_id_is_400() {
        let response = app()
            .oneshot(
                Request::post("/api/forms/bad%20id")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_content_type_is_400() {
        let response = app()
            .oneshot(
                Request::post("/api/forms/signup")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deeply_nested_key_is_accepted_flat() {
        let body = format!("a{}=x", "%5Ba%5D".repeat(200_000));
        let response = app()
            .oneshot(
                Request::post("/api/forms/signup")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = app()
            .oneshot(Request::get("/health/live").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
