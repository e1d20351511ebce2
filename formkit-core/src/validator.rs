//! Validation orchestration.
//!
//! Every validation source implements the one-method [`Validator`]
//! capability, so the built-in [`RuleValidator`] and external resolvers are
//! interchangeable. [`merge_errors`] applies a result to a form's error map:
//! single-field passes only touch that field's entry, whole-form passes
//! replace the map.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FormkitResult;
use crate::rules::evaluate_field;
use crate::schema::Schema;
use crate::value::{FieldValue, Values};

/// A validation message for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormError {
    /// Human-readable message.
    pub message: String,
}

impl FormError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Mapping from field name to its current error.
pub type ErrorMap = IndexMap<String, FormError>;

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True when no field failed.
    pub is_valid: bool,
    /// Errors keyed by field name (or joined path for resolvers).
    pub errors: ErrorMap,
}

impl ValidationResult {
    /// A passing result.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: ErrorMap::new(),
        }
    }

    /// Build a result from collected errors; valid when there are none.
    #[must_use]
    pub fn from_errors(errors: ErrorMap) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Record a failure for `name`.
    pub fn add_error(&mut self, name: impl Into<String>, error: FormError) {
        self.is_valid = false;
        self.errors.insert(name.into(), error);
    }
}

/// A source of validation results.
///
/// Implementations receive the full values and, for field-scoped passes, the
/// target field name; they decide themselves how much to validate.
/// Validation failures are data in the returned [`ValidationResult`]. An
/// `Err` means the validator itself could not run.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Validate `values`, optionally scoped to the field `name`.
    async fn validate(&self, values: &Values, name: Option<&str>)
        -> FormkitResult<ValidationResult>;
}

/// Run the built-in rules over `values`.
///
/// With `name`, only that field is evaluated; otherwise every field in
/// `schema` is, whether or not it has a value.
#[must_use]
pub fn validate_values(values: &Values, schema: &Schema, name: Option<&str>) -> ValidationResult {
    let null = FieldValue::Null;
    let mut result = ValidationResult::valid();

    let mut check = |field: &str| {
        let value = values.get(field).unwrap_or(&null);
        if let Some(error) = evaluate_field(field, value, schema) {
            result.add_error(field, error);
        }
    };

    match name {
        Some(field) => check(field),
        None => schema.keys().for_each(|field| check(field)),
    }

    result
}

/// The built-in validator backed by a schema snapshot.
#[derive(Debug, Clone, Default)]
pub struct RuleValidator {
    schema: Schema,
}

impl RuleValidator {
    /// Create a validator over the given schema.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// The schema this validator checks against.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl Validator for RuleValidator {
    async fn validate(
        &self,
        values: &Values,
        name: Option<&str>,
    ) -> FormkitResult<ValidationResult> {
        Ok(validate_values(values, &self.schema, name))
    }
}

/// Apply a validation result to an error map.
///
/// A field-scoped result sets or removes only `name`'s entry; a whole-form
/// result replaces the map.
pub fn merge_errors(errors: &mut ErrorMap, result: &ValidationResult, name: Option<&str>) {
    match name {
        Some(field) => match result.errors.get(field) {
            Some(error) => {
                errors.insert(field.to_string(), error.clone());
            }
            None => {
                errors.shift_remove(field);
            }
        },
        None => errors.clone_from(&result.errors),
    }
}
