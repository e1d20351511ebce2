//! Form state storage.
//!
//! [`FormStore`] is the single owner of a form's values, errors, submitting
//! flag and effective schema. It is a cheap clonable handle: bound field
//! handlers and submission handlers capture clones of it. Locks are never
//! held across an `.await`, so validation may be asynchronous.
//!
//! # Example
//!
//! ```
//! use formkit_core::{FieldSchema, FormOptions, Mode};
//!
//! # tokio_test_block(async {
//! let form = FormOptions::new()
//!     .value("username", "")
//!     .field("username", FieldSchema::new().required())
//!     .mode(Mode::Change)
//!     .build();
//!
//! form.set_value("username", "").await.unwrap();
//! assert!(form.error("username").is_some());
//!
//! form.set_value("username", "bob").await.unwrap();
//! assert!(form.error("username").is_none());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     futures::executor::block_on(f)
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FormkitResult;
use crate::options::FormOptions;
use crate::payload::{serialize, FormPayload};
use crate::schema::{EffectiveSchema, FieldSchema, Schema};
use crate::submit::{SubmitHandlers, SubmitPhase};
use crate::validator::{merge_errors, ErrorMap, FormError, RuleValidator, ValidationResult, Validator};
use crate::value::{FieldValue, Values};

/// Which interactions trigger automatic validation.
///
/// Forms store an `Option<Mode>`; `None` (unset) validates on both change and
/// blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Validate the edited field on every change.
    Change,
    /// Validate a field when it loses focus.
    Blur,
    /// Validate only explicitly or on submission.
    Submit,
}

impl Mode {
    /// Whether a change validates under `mode`.
    #[must_use]
    pub const fn validates_on_change(mode: Option<Self>) -> bool {
        matches!(mode, None | Some(Self::Change))
    }

    /// Whether a blur validates under `mode`.
    #[must_use]
    pub const fn validates_on_blur(mode: Option<Self>) -> bool {
        matches!(mode, None | Some(Self::Blur))
    }
}

/// Extra attributes merged into every [`InputProps`].
pub(crate) type EnhanceInputProps = Arc<dyn Fn(&FormStore) -> IndexMap<String, String> + Send + Sync>;

/// Attribute names owned by the bound props themselves.
const RESERVED_ATTRIBUTES: [&str; 3] = ["name", "value", "error"];

/// Mutable state behind the lock.
#[derive(Debug)]
struct FormState {
    values: Values,
    errors: ErrorMap,
    submitting: bool,
    phase: SubmitPhase,
    schema: EffectiveSchema,
    /// Bumped by every reset; validation passes started earlier are dropped.
    epoch: u64,
}

struct Inner {
    state: RwLock<FormState>,
    initial: Values,
    mode: Option<Mode>,
    resolver: Option<Arc<dyn Validator>>,
    handlers: SubmitHandlers,
    enhance_input_props: Option<EnhanceInputProps>,
}

/// Shared handle to one form's state.
#[derive(Clone)]
pub struct FormStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for FormStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormStore")
            .field("state", &*self.read())
            .field("mode", &self.inner.mode)
            .field("resolver", &self.inner.resolver.is_some())
            .field("enhance_input_props", &self.inner.enhance_input_props.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for FormStore {
    fn default() -> Self {
        FormOptions::new().build()
    }
}

impl FormStore {
    /// Create a store from options.
    #[must_use]
    pub fn new(options: FormOptions) -> Self {
        let FormOptions {
            values,
            schema,
            mode,
            resolver,
            handlers,
            enhance_input_props,
        } = options;

        let state = FormState {
            values: values.clone(),
            errors: ErrorMap::new(),
            submitting: false,
            phase: SubmitPhase::Idle,
            schema: EffectiveSchema::new(schema),
            epoch: 0,
        };

        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                initial: values,
                mode,
                resolver,
                handlers,
                enhance_input_props,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FormState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FormState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The configured validation mode (`None` when unset).
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        self.inner.mode
    }

    pub(crate) fn handlers(&self) -> &SubmitHandlers {
        &self.inner.handlers
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Snapshot of every value.
    #[must_use]
    pub fn get_values(&self) -> Values {
        self.read().values.clone()
    }

    /// Current value of one field; the empty string when it has none.
    #[must_use]
    pub fn get_value(&self, name: &str) -> FieldValue {
        self.read()
            .values
            .get(name)
            .cloned()
            .unwrap_or_else(FieldValue::empty)
    }

    /// Set one field's value, validating that field when the mode allows.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured resolver fails.
    pub async fn set_value(&self, name: &str, value: impl Into<FieldValue>) -> FormkitResult<()> {
        let (snapshot, epoch) = {
            let mut state = self.write();
            state.values.insert(name.to_string(), value.into());
            (state.values.clone(), state.epoch)
        };

        if Mode::validates_on_change(self.inner.mode) {
            self.validate_snapshot(Some(name), snapshot, epoch).await?;
        }
        Ok(())
    }

    /// Merge `partial` over the current values, validating the whole form
    /// when the mode allows.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured resolver fails.
    pub async fn set_values(&self, partial: Values) -> FormkitResult<()> {
        let (snapshot, epoch) = {
            let mut state = self.write();
            state.values.extend(partial);
            (state.values.clone(), state.epoch)
        };

        if Mode::validates_on_change(self.inner.mode) {
            self.validate_snapshot(None, snapshot, epoch).await?;
        }
        Ok(())
    }

    /// The serialized transport payload of the current values.
    #[must_use]
    pub fn data(&self) -> FormPayload {
        serialize(&self.read().values)
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Validate one field (or the whole form) against the current values and
    /// merge the result into the error map.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured resolver fails.
    pub async fn validate(&self, name: Option<&str>) -> FormkitResult<ValidationResult> {
        let (snapshot, epoch) = {
            let state = self.read();
            (state.values.clone(), state.epoch)
        };
        self.validate_snapshot(name, snapshot, epoch).await
    }

    /// Run one validation pass over `values`.
    ///
    /// The schema is captured when the pass starts. There is no cancellation:
    /// when passes overlap, whichever finishes last writes its result. A pass
    /// that started before a [`reset`](Self::reset) never writes.
    async fn validate_snapshot(
        &self,
        name: Option<&str>,
        values: Values,
        epoch: u64,
    ) -> FormkitResult<ValidationResult> {
        let result = match &self.inner.resolver {
            Some(resolver) => resolver.validate(&values, name).await?,
            None => {
                let schema = self.read().schema.snapshot();
                RuleValidator::new(schema).validate(&values, name).await?
            }
        };

        {
            let mut state = self.write();
            if state.epoch != epoch {
                tracing::debug!(
                    field = name.unwrap_or("*"),
                    "Form was reset during validation, result dropped"
                );
                return Ok(result);
            }
            merge_errors(&mut state.errors, &result, name);
        }
        tracing::debug!(
            field = name.unwrap_or("*"),
            is_valid = result.is_valid,
            errors = result.errors.len(),
            "Validation pass complete"
        );
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    /// Register rules for `name` unless rules were already registered for it.
    ///
    /// Returns `true` when the rules were registered by this call.
    pub fn register_rules(&self, name: &str, rules: &FieldSchema) -> bool {
        let mut state = self.write();
        if state.schema.is_registered(name) {
            return false;
        }
        state.schema.register(name, rules);
        true
    }

    /// The merged effective schema.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.read().schema.snapshot()
    }

    /// Number of rule registrations made so far.
    #[must_use]
    pub fn schema_version(&self) -> u64 {
        self.read().schema.version()
    }

    // ------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------

    /// Bind a field for a rendering layer.
    ///
    /// `rules` are merged into the effective schema the first time they are
    /// supplied for `name`; later calls only read. Attributes from the
    /// configured enhancer are attached, minus any that would shadow `name`,
    /// `value` or `error`.
    #[must_use]
    pub fn get_input_props(&self, name: &str, rules: Option<&FieldSchema>) -> InputProps {
        if let Some(rules) = rules {
            self.register_rules(name, rules);
        }

        // The enhancer may read the store, so it runs before the guard is taken
        let mut attributes = self
            .inner
            .enhance_input_props
            .as_ref()
            .map(|enhance| enhance(self))
            .unwrap_or_default();
        attributes.retain(|key, _| !RESERVED_ATTRIBUTES.contains(&key.as_str()));

        let state = self.read();
        InputProps {
            attributes,
            name: name.to_string(),
            value: state
                .values
                .get(name)
                .cloned()
                .unwrap_or_else(FieldValue::empty),
            error: state.errors.get(name).map(|e| e.message.clone()),
            handlers: FieldHandlers {
                store: self.clone(),
                name: name.to_string(),
            },
        }
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Snapshot of the error map.
    #[must_use]
    pub fn errors(&self) -> ErrorMap {
        self.read().errors.clone()
    }

    /// Current error for one field.
    #[must_use]
    pub fn error(&self, name: &str) -> Option<FormError> {
        self.read().errors.get(name).cloned()
    }

    /// Set an error directly, bypassing validation.
    pub fn set_error(&self, name: &str, message: impl Into<String>) {
        self.write()
            .errors
            .insert(name.to_string(), FormError::new(message));
    }

    /// Clear one field's error, or every error when `name` is `None`.
    pub fn clear_errors(&self, name: Option<&str>) {
        let mut state = self.write();
        match name {
            Some(name) => {
                state.errors.shift_remove(name);
            }
            None => state.errors.clear(),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Restore the initial values and clear every error.
    ///
    /// Validation passes still in flight are discarded when they finish. The
    /// submitting flag is left alone.
    pub fn reset(&self) {
        let mut state = self.write();
        state.values.clone_from(&self.inner.initial);
        state.errors.clear();
        state.epoch += 1;
        tracing::debug!(epoch = state.epoch, "Form reset");
    }

    /// Set the submitting flag.
    pub fn set_submitting(&self, submitting: bool) {
        self.write().submitting = submitting;
    }

    /// Check whether a submission is in flight.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.read().submitting
    }

    /// Current submission phase.
    #[must_use]
    pub fn phase(&self) -> SubmitPhase {
        self.read().phase
    }

    pub(crate) fn set_phase(&self, phase: SubmitPhase) {
        let mut state = self.write();
        if state.phase != phase {
            tracing::trace!(from = ?state.phase, to = ?phase, "Submission phase");
            state.phase = phase;
        }
    }
}

/// A bound field: its current value and error plus its event handlers.
#[derive(Debug, Clone)]
pub struct InputProps {
    /// Extra attributes from [`FormOptions::enhance_input_props`].
    pub attributes: IndexMap<String, String>,
    /// Field name.
    pub name: String,
    /// Current value (empty string when unset).
    pub value: FieldValue,
    /// Current error message.
    pub error: Option<String>,
    /// Event handlers bound to this field.
    pub handlers: FieldHandlers,
}

/// Event handlers bound to one field of a store.
#[derive(Debug, Clone)]
pub struct FieldHandlers {
    store: FormStore,
    name: String,
}

impl FieldHandlers {
    /// The bound field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The input changed: store the value, validate when the mode allows.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured resolver fails.
    pub async fn on_change(&self, value: impl Into<FieldValue>) -> FormkitResult<()> {
        self.store.set_value(&self.name, value).await
    }

    /// The input lost focus: validate the field when the mode allows.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured resolver fails.
    pub async fn on_blur(&self) -> FormkitResult<()> {
        if Mode::validates_on_blur(self.store.mode()) {
            self.store.validate(Some(&self.name)).await?;
        }
        Ok(())
    }

    /// The input gained focus. Nothing is validated.
    pub fn on_focus(&self) {
        tracing::trace!(field = %self.name, "Focus");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FnResolver;
    use crate::value::values_from_json;
    use serde_json::json;

    fn form(mode: Option<Mode>) -> FormStore {
        let mut options = FormOptions::new()
            .values(values_from_json(json!({"username": "", "age": 30})))
            .field("username", FieldSchema::new().required())
            .field("age", FieldSchema::new().min(18.0));
        if let Some(mode) = mode {
            options = options.mode(mode);
        }
        options.build()
    }

    #[test]
    fn test_mode_gates() {
        assert!(Mode::validates_on_change(None));
        assert!(Mode::validates_on_blur(None));
        assert!(Mode::validates_on_change(Some(Mode::Change)));
        assert!(!Mode::validates_on_blur(Some(Mode::Change)));
        assert!(!Mode::validates_on_change(Some(Mode::Blur)));
        assert!(Mode::validates_on_blur(Some(Mode::Blur)));
        assert!(!Mode::validates_on_change(Some(Mode::Submit)));
        assert!(!Mode::validates_on_blur(Some(Mode::Submit)));
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        let mode: Mode = serde_json::from_str("\"blur\"").expect("parse");
        assert_eq!(mode, Mode::Blur);
    }

    #[test]
    fn test_get_value_defaults_to_empty_string() {
        let form = form(None);
        assert_eq!(form.get_value("missing"), FieldValue::empty());
        assert_eq!(form.get_value("age"), FieldValue::from(30));
    }

    #[tokio::test]
    async fn test_set_value_validates_only_that_field() {
        let form = form(None);
        form.set_error("age", "server says no");

        form.set_value("username", "").await.expect("set");
        assert_eq!(form.error("username").map(|e| e.message), Some("username is required".into()));
        assert_eq!(form.error("age").map(|e| e.message), Some("server says no".into()));

        form.set_value("username", "bob").await.expect("set");
        assert!(form.error("username").is_none());
        assert!(form.error("age").is_some());
    }

    #[tokio::test]
    async fn test_set_values_validates_whole_form() {
        let form = form(Some(Mode::Change));
        form.set_error("stale", "left over");

        form.set_values(values_from_json(json!({"age": 5})))
            .await
            .expect("set");

        let errors = form.errors();
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("age"));
        assert!(!errors.contains_key("stale"));
    }

    #[tokio::test]
    async fn test_submit_mode_never_validates_on_edit() {
        let form = form(Some(Mode::Submit));
        let props = form.get_input_props("username", None);

        props.handlers.on_change("").await.expect("change");
        props.handlers.on_blur().await.expect("blur");
        assert!(form.errors().is_empty());
        assert_eq!(form.get_value("username"), FieldValue::empty());

        let result = form.validate(None).await.expect("validate");
        assert!(!result.is_valid);
        assert!(form.error("username").is_some());
    }

    #[tokio::test]
    async fn test_blur_mode_validates_on_blur_only() {
        let form = form(Some(Mode::Blur));
        let handlers = form.get_input_props("username", None).handlers;

        handlers.on_change("").await.expect("change");
        assert!(form.error("username").is_none());

        handlers.on_blur().await.expect("blur");
        assert!(form.error("username").is_some());
    }

    #[test]
    fn test_get_input_props_registers_rules_once() {
        let form = form(None);
        let _ = form.get_input_props("email", Some(&FieldSchema::new().required()));
        assert_eq!(form.schema_version(), 1);

        let _ = form.get_input_props("email", Some(&FieldSchema::new().max_length(3)));
        assert_eq!(form.schema_version(), 1);
        assert!(form.schema()["email"].max_length.is_none());

        // Overlay merges over the static entry instead of replacing it
        let _ = form.get_input_props("username", Some(&FieldSchema::new().min_length(3)));
        let schema = form.schema();
        let username = &schema["username"];
        assert!(username.required.is_some());
        assert!(username.min_length.is_some());
    }

    #[test]
    fn test_input_props_reflect_state() {
        let form = form(None);
        form.set_error("username", "taken");
        let props = form.get_input_props("username", None);
        assert_eq!(props.name, "username");
        assert_eq!(props.value, FieldValue::empty());
        assert_eq!(props.error.as_deref(), Some("taken"));
        assert_eq!(props.handlers.name(), "username");
    }

    #[tokio::test]
    async fn test_enhanced_input_props() {
        let form = FormOptions::new()
            .value("email", "")
            .enhance_input_props(|store| {
                let mut attributes = IndexMap::new();
                attributes.insert("autocomplete".to_string(), "off".to_string());
                let dirty = store.get_value("email") != FieldValue::empty();
                attributes.insert("data-dirty".to_string(), dirty.to_string());
                attributes.insert("name".to_string(), "shadowed".to_string());
                attributes
            })
            .build();

        let props = form.get_input_props("email", None);
        assert_eq!(props.name, "email");
        assert_eq!(props.attributes.get("autocomplete").map(String::as_str), Some("off"));
        assert_eq!(props.attributes.get("data-dirty").map(String::as_str), Some("false"));
        assert!(!props.attributes.contains_key("name"));

        props.handlers.on_change("a@b.c").await.expect("change");
        let props = form.get_input_props("email", None);
        assert_eq!(props.attributes.get("data-dirty").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_input_props_without_enhancer_have_no_attributes() {
        assert!(form(None).get_input_props("username", None).attributes.is_empty());
    }

    #[test]
    fn test_clear_errors() {
        let form = form(None);
        form.set_error("a", "1");
        form.set_error("b", "2");

        form.clear_errors(Some("a"));
        assert_eq!(form.errors().len(), 1);

        form.clear_errors(None);
        assert!(form.errors().is_empty());
    }

    #[tokio::test]
    async fn test_reset_restores_initial_snapshot() {
        let form = form(None);
        let initial = form.get_values();

        form.set_value("username", "bob").await.expect("set");
        form.set_value("extra", json!({"nested": [1, 2]})).await.expect("set");
        form.set_error("age", "nope");
        form.set_submitting(true);

        form.reset();
        assert_eq!(form.get_values(), initial);
        assert!(form.errors().is_empty());
        // Submitting flag is independent of reset
        assert!(form.is_submitting());
    }

    #[tokio::test]
    async fn test_resolver_replaces_rules() {
        let form = FormOptions::new()
            .field("username", FieldSchema::new().required())
            .resolver(FnResolver::new(|_values: Values, name: Option<String>| async move {
                let mut result = ValidationResult::valid();
                result.add_error(name.unwrap_or_else(|| "form".into()), FormError::new("resolver"));
                Ok(result)
            }))
            .build();

        form.set_value("username", "bob").await.expect("set");
        assert_eq!(form.error("username").map(|e| e.message), Some("resolver".into()));
    }

    #[test]
    fn test_data_serializes_current_values() {
        let form = FormOptions::new()
            .values(values_from_json(json!({"a": {"b": [1, 2]}})))
            .build();
        let data = form.data();
        assert_eq!(data.len(), 2);
        assert!(data.get("a[b][1]").is_some());
    }
}
