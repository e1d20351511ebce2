//! Form configuration.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::FutureExt;
use indexmap::IndexMap;

use crate::payload::FormPayload;
use crate::schema::{FieldSchema, Schema};
use crate::store::{EnhanceInputProps, FormStore, Mode};
use crate::submit::{FnAction, HandlerResult, SubmitAction, SubmitEvent, SubmitFailure, SubmitHandlers};
use crate::validator::Validator;
use crate::value::{FieldValue, Values};

/// Builder for a [`FormStore`].
///
/// ```
/// use formkit_core::{FieldSchema, FormOptions, Mode};
///
/// let form = FormOptions::new()
///     .value("email", "")
///     .field("email", FieldSchema::new().required())
///     .mode(Mode::Blur)
///     .on_submit_payload(|payload| async move {
///         Ok(serde_json::json!({ "fields": payload.len() }))
///     })
///     .build();
///
/// assert_eq!(form.mode(), Some(Mode::Blur));
/// ```
#[derive(Default)]
pub struct FormOptions {
    pub(crate) values: Values,
    pub(crate) schema: Schema,
    pub(crate) mode: Option<Mode>,
    pub(crate) resolver: Option<Arc<dyn Validator>>,
    pub(crate) handlers: SubmitHandlers,
    pub(crate) enhance_input_props: Option<EnhanceInputProps>,
}

impl fmt::Debug for FormOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormOptions")
            .field("values", &self.values)
            .field("schema", &self.schema)
            .field("mode", &self.mode)
            .field("resolver", &self.resolver.is_some())
            .field("handlers", &self.handlers)
            .field("enhance_input_props", &self.enhance_input_props.is_some())
            .finish()
    }
}

impl FormOptions {
    /// Empty options: no values, no schema, mode unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial values. They are also the snapshot `reset` restores.
    #[must_use]
    pub fn values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    /// Set one initial value.
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Static base schema.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Add one field to the static base schema.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rules: FieldSchema) -> Self {
        self.schema.insert(name.into(), rules);
        self
    }

    /// Validation mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// External resolver replacing the built-in rules.
    #[must_use]
    pub fn resolver(mut self, resolver: impl Validator + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Event-bound submit handler. Receives the submit event and a values
    /// snapshot.
    #[must_use]
    pub fn on_submit<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(SubmitEvent, Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers.on_submit = Some(Arc::new(move |event, values| handler(event, values).boxed()));
        self
    }

    /// Payload-bound submit handler. Receives the serialized payload.
    #[must_use]
    pub fn on_submit_payload<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(FormPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers.on_submit_payload = Some(Arc::new(move |payload| handler(payload).boxed()));
        self
    }

    /// Server action. Takes precedence over the other submit handlers.
    #[must_use]
    pub fn action(mut self, action: impl SubmitAction + 'static) -> Self {
        self.handlers.action = Some(Arc::new(action));
        self
    }

    /// Server action from an async closure.
    #[must_use]
    pub fn action_fn<F, Fut>(self, action: F) -> Self
    where
        F: Fn(FormPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.action(FnAction::new(action))
    }

    /// Called when validation rejects a submission or a handler fails.
    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&SubmitFailure) + Send + Sync + 'static,
    {
        self.handlers.on_error = Some(Arc::new(callback));
        self
    }

    /// Called after a handler succeeds, with its result and the submitted
    /// values.
    #[must_use]
    pub fn on_after_submit<F>(mut self, callback: F) -> Self
    where
        F: Fn(&serde_json::Value, &Values) + Send + Sync + 'static,
    {
        self.handlers.on_after_submit = Some(Arc::new(callback));
        self
    }

    /// Extra attributes attached to every bound field, computed from the
    /// store at bind time (`autocomplete`, `data-*` and the like).
    #[must_use]
    pub fn enhance_input_props<F>(mut self, enhance: F) -> Self
    where
        F: Fn(&FormStore) -> IndexMap<String, String> + Send + Sync + 'static,
    {
        self.enhance_input_props = Some(Arc::new(enhance));
        self
    }

    /// Build the store.
    #[must_use]
    pub fn build(self) -> FormStore {
        FormStore::new(self)
    }
}
