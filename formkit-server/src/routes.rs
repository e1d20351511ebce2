//! Form submission endpoints.
//!
//! ## Endpoints
//!
//! - `GET /api/forms` - List registered form ids
//! - `POST /api/forms/{form_id}` - Validate a submission
//!
//! A submission body is `multipart/form-data` or
//! `application/x-www-form-urlencoded` with key-path names
//! (`user[tags][0]=a`). The values are rebuilt, validated against the form's
//! schema and answered with:
//!
//! ```text
//! 200 {"isValid": true,  "values": {...}}
//! 422 {"isValid": false, "errors": {"field": {"message": "..."}}}
//! 404 {"error": "Unknown form: ..."}
//! ```

use axum::{
    body::to_bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use formkit_core::{Blob, FormPayload, ValidationResult, Validator, Values};
use serde::Serialize;

use crate::error::ServerError;
use crate::metrics::{record_submission, record_validation_failure};
use crate::validation::{validate_form_id, MAX_BODY_SIZE};
use crate::AppState;

/// Body of an accepted submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    /// Always `true`.
    pub is_valid: bool,
    /// The rebuilt values.
    pub values: Values,
}

/// Body of the form listing.
#[derive(Debug, Serialize)]
pub struct FormList {
    /// Registered form ids.
    pub forms: Vec<String>,
}

/// List registered forms.
#[tracing::instrument(name = "list_forms", skip(state))]
pub async fn list_forms(State(state): State<AppState>) -> Json<FormList> {
    Json(FormList {
        forms: state.forms.ids(),
    })
}

/// Validate a submission against the schema registered for `form_id`.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:9474/api/forms/signup \
///   -d 'username=ada&address[city]=London'
/// ```
#[tracing::instrument(name = "submit_form", skip(state, request))]
pub async fn submit_form(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    request: Request,
) -> Result<Response, ServerError> {
    validate_form_id(&form_id).inspect_err(|_| record_validation_failure("form_id"))?;
    let validator = state
        .forms
        .get(&form_id)
        .ok_or_else(|| ServerError::UnknownForm(form_id.clone()))?;

    let payload = read_payload(request, &state)
        .await
        .inspect_err(|_| record_validation_failure("body"))?;
    let values = payload.to_values();
    let result = validator.validate(&values, None).await?;
    record_submission(&form_id, result.is_valid);

    if result.is_valid {
        tracing::info!(%form_id, fields = values.len(), "Submission accepted");
        Ok((
            StatusCode::OK,
            Json(Accepted {
                is_valid: true,
                values,
            }),
        )
            .into_response())
    } else {
        tracing::info!(%form_id, errors = result.errors.len(), "Submission rejected");
        Ok(rejected(result))
    }
}

fn rejected(result: ValidationResult) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(result)).into_response()
}

/// Decode the request body by content type.
async fn read_payload(request: Request, state: &AppState) -> Result<FormPayload, ServerError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        read_multipart(multipart).await
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let body = to_bytes(request.into_body(), MAX_BODY_SIZE)
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        Ok(FormPayload::from_urlencoded(&body))
    } else {
        Err(ServerError::BadRequest(format!(
            "unsupported content type '{content_type}'"
        )))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<FormPayload, ServerError> {
    let mut payload = FormPayload::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;

        match file_name {
            Some(file_name) => payload.append_blob(name, Blob::new(file_name, content_type, bytes.to_vec())),
            None => payload.append_text(name, String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
    Ok(payload)
}
