//! Render-prop field binding.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::FormkitResult;
use crate::schema::FieldSchema;
use crate::store::FormStore;
use crate::validator::ErrorMap;
use crate::value::FieldValue;

type ChangeListener = dyn Fn(&FieldValue) + Send + Sync;
type BlurListener = dyn Fn() + Send + Sync;

/// The field part of [`RenderProps`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProps {
    /// Field name.
    pub name: String,
    /// Current value.
    pub value: FieldValue,
}

/// The per-field state part of [`RenderProps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldState {
    /// Current error message.
    pub error: Option<String>,
}

/// The form-wide state part of [`RenderProps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormState {
    /// Every current error.
    pub errors: ErrorMap,
    /// Whether a submission is in flight.
    pub submitting: bool,
}

/// Everything a custom input needs to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProps {
    /// Name and value.
    pub field: FieldProps,
    /// This field's error.
    pub field_state: FieldState,
    /// Form-wide errors and submitting flag.
    pub form_state: FormState,
}

/// Binds one field of a store for a custom input.
///
/// Rules given at construction are registered the same way
/// [`FormStore::get_input_props`] registers them. `on_change` and `on_blur`
/// forward to the store first, then notify the caller's listeners.
#[derive(Clone)]
pub struct FieldController {
    store: FormStore,
    name: String,
    on_change: Option<Arc<ChangeListener>>,
    on_blur: Option<Arc<BlurListener>>,
}

impl fmt::Debug for FieldController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldController")
            .field("name", &self.name)
            .field("on_change", &self.on_change.is_some())
            .field("on_blur", &self.on_blur.is_some())
            .finish_non_exhaustive()
    }
}

impl FieldController {
    /// Bind `name` on `store`, registering `rules` if given.
    #[must_use]
    pub fn new(store: &FormStore, name: impl Into<String>, rules: Option<&FieldSchema>) -> Self {
        let name = name.into();
        if let Some(rules) = rules {
            store.register_rules(&name, rules);
        }
        Self {
            store: store.clone(),
            name,
            on_change: None,
            on_blur: None,
        }
    }

    /// Listener called after each change has been applied.
    #[must_use]
    pub fn with_on_change(mut self, listener: impl Fn(&FieldValue) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(listener));
        self
    }

    /// Listener called after each blur has been handled.
    #[must_use]
    pub fn with_on_blur(mut self, listener: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_blur = Some(Arc::new(listener));
        self
    }

    /// The bound field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current render props.
    #[must_use]
    pub fn render_props(&self) -> RenderProps {
        let errors = self.store.errors();
        RenderProps {
            field: FieldProps {
                name: self.name.clone(),
                value: self.store.get_value(&self.name),
            },
            field_state: FieldState {
                error: errors.get(&self.name).map(|e| e.message.clone()),
            },
            form_state: FormState {
                errors,
                submitting: self.store.is_submitting(),
            },
        }
    }

    /// Apply a change, then notify the change listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured resolver fails. The listener is not
    /// called in that case.
    pub async fn on_change(&self, value: impl Into<FieldValue>) -> FormkitResult<()> {
        let value = value.into();
        self.store.set_value(&self.name, value.clone()).await?;
        if let Some(listener) = &self.on_change {
            listener(&value);
        }
        Ok(())
    }

    /// Handle a blur, then notify the blur listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured resolver fails.
    pub async fn on_blur(&self) -> FormkitResult<()> {
        self.store
            .get_input_props(&self.name, None)
            .handlers
            .on_blur()
            .await?;
        if let Some(listener) = &self.on_blur {
            listener();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FormOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_construction_registers_rules() {
        let form = FormOptions::new().build();
        let controller = FieldController::new(&form, "email", Some(&FieldSchema::new().required()));
        assert_eq!(controller.name(), "email");
        assert_eq!(form.schema_version(), 1);
        assert!(form.schema().contains_key("email"));
    }

    #[tokio::test]
    async fn test_render_props_follow_store() {
        let form = FormOptions::new().value("email", "").build();
        let controller = FieldController::new(&form, "email", Some(&FieldSchema::new().required()));

        controller.on_change("").await.expect("change");
        let props = controller.render_props();
        assert_eq!(props.field.name, "email");
        assert_eq!(props.field_state.error.as_deref(), Some("email is required"));
        assert_eq!(props.form_state.errors.len(), 1);
        assert!(!props.form_state.submitting);

        let json = serde_json::to_value(&props).expect("serialize");
        assert!(json.get("fieldState").is_some());
        assert!(json.get("formState").is_some());
    }

    #[tokio::test]
    async fn test_listeners_run_after_store() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let blurs = Arc::new(AtomicUsize::new(0));

        let form = FormOptions::new().build();
        let seen_in = Arc::clone(&seen);
        let blurs_in = Arc::clone(&blurs);
        let store = form.clone();
        let controller = FieldController::new(&form, "qty", None)
            .with_on_change(move |value| {
                // Store already holds the new value
                assert_eq!(&store.get_value("qty"), value);
                seen_in.lock().expect("lock").push(value.clone());
            })
            .with_on_blur(move || {
                blurs_in.fetch_add(1, Ordering::SeqCst);
            });

        controller.on_change(3).await.expect("change");
        controller.on_blur().await.expect("blur");

        assert_eq!(*seen.lock().expect("lock"), vec![FieldValue::from(3)]);
        assert_eq!(blurs.load(Ordering::SeqCst), 1);
    }
}
