//! Registered form schemas.
//!
//! A [`FormRegistry`] maps form ids to the rule validator used for that
//! form's submissions. It is shared by every request handler.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use formkit_core::{RuleValidator, Schema};
use indexmap::IndexMap;

use crate::error::ServerError;
use crate::validation::validate_form_id;

/// Thread-safe map of form id to validator.
///
/// # Example
///
/// ```
/// use formkit_server::registry::FormRegistry;
///
/// let registry = FormRegistry::from_json(r#"{
///     "signup": { "username": { "required": true } }
/// }"#).unwrap();
///
/// assert!(registry.get("signup").is_some());
/// assert_eq!(registry.ids(), vec!["signup".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    forms: Arc<RwLock<IndexMap<String, Arc<RuleValidator>>>>,
}

impl FormRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a JSON object mapping form id to schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, a schema is invalid, or a
    /// form id fails validation.
    pub fn from_json(json: &str) -> Result<Self, ServerError> {
        let schemas: IndexMap<String, Schema> =
            serde_json::from_str(json).map_err(formkit_core::FormkitError::from)?;
        let registry = Self::new();
        for (id, schema) in schemas {
            registry.register(&id, schema)?;
        }
        Ok(registry)
    }

    /// Load a registry from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its content is invalid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let registry = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), forms = registry.len(), "Loaded form schemas");
        Ok(registry)
    }

    /// Register (or replace) the schema for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidFormId`] if `id` fails validation.
    pub fn register(&self, id: &str, schema: Schema) -> Result<(), ServerError> {
        validate_form_id(id)?;
        let fields = schema.len();
        self.forms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::new(RuleValidator::new(schema)));
        tracing::debug!(form_id = id, fields, "Registered form");
        Ok(())
    }

    /// The validator for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<RuleValidator>> {
        self.forms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Registered ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.forms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of registered forms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forms.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check whether no forms are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
