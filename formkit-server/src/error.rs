//! Error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use formkit_core::FormkitError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors a request handler can answer with.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The form id failed validation.
    #[error(transparent)]
    InvalidFormId(#[from] ValidationError),

    /// No schema is registered under this id.
    #[error("Unknown form: {0}")]
    UnknownForm(String),

    /// The body could not be read or is not a form encoding.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation could not run.
    #[error(transparent)]
    Formkit(#[from] FormkitError),
}

impl ServerError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidFormId(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownForm(_) => StatusCode::NOT_FOUND,
            Self::Formkit(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
