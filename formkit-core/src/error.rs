//! Error types for form operations.

use thiserror::Error;

use crate::validator::ErrorMap;

/// Result type for form operations.
pub type FormkitResult<T> = Result<T, FormkitError>;

/// Errors that can occur in form operations.
///
/// Field validation failures are never reported through this type; they are
/// data in the [`ErrorMap`]. These variants cover misconfiguration and
/// failures of collaborators.
#[derive(Debug, Error)]
pub enum FormkitError {
    /// The schema is malformed (bad regex, malformed rule pair).
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// An external resolver failed for a reason other than validation issues.
    #[error("Resolver failed: {0}")]
    Resolver(String),

    /// A remote action URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A handler failure carrying field errors reported by the receiving server.
///
/// Submission handlers return this (wrapped in [`anyhow::Error`]) when the
/// server rejected the payload with per-field messages. The submission
/// pipeline injects the errors into the store instead of treating them as an
/// opaque handler failure.
#[derive(Debug, Clone, Error)]
#[error("Server rejected submission ({} field errors)", .0.len())]
pub struct ServerRejection(pub ErrorMap);
