//! Health endpoints.
//!
//! The server is live as soon as it accepts connections. It is ready once
//! the form registry holds at least one schema: before that every
//! `POST /api/forms/{form_id}` would answer 404, so a load balancer should
//! keep traffic away. `/health` is an alias for `/health/ready`.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
    /// Individual component checks
    pub checks: HealthChecks,
}

/// Individual health checks.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// At least one form schema is registered
    pub forms_registered: bool,
    /// Number of registered forms
    pub form_count: usize,
}

/// Always 200 while the process serves requests.
#[tracing::instrument(name = "liveness_probe")]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// 200 with the registered form count, or 503 while the registry is empty.
#[tracing::instrument(name = "readiness_probe", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let form_count = state.forms.len();
    let ready = form_count > 0;

    let status = HealthStatus {
        status: if ready { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            forms_registered: ready,
            form_count,
        },
    };

    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FormRegistry;
    use formkit_core::Schema;

    #[tokio::test]
    async fn test_readiness_requires_forms() {
        let state = AppState::new(FormRegistry::new());
        let (code, Json(status)) = readiness(State(state.clone())).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status.status, "unhealthy");

        state.forms.register("signup", Schema::new()).expect("register");
        let (code, Json(status)) = readiness(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(status.checks.form_count, 1);
    }

    #[test]
    fn test_health_status_serialization() {
        let status = HealthStatus {
            status: "healthy",
            version: "0.2.0",
            checks: HealthChecks {
                forms_registered: true,
                form_count: 3,
            },
        };

        let json = serde_json::to_string(&status).expect("should serialize");
        assert!(json.contains("healthy"));
        assert!(json.contains("forms_registered"));
        assert!(json.contains("\"form_count\":3"));
    }
}
