//! Submission pipeline.
//!
//! ```text
//! idle -> validating -> submitting -> idle
//!                    \-> rejected  -> idle
//! ```
//!
//! A submission always validates the whole form first, whatever the mode.
//! Only a valid form reaches a handler, and exactly one handler runs: the
//! server action if configured, else the event-bound handler, else the
//! payload-bound handler, else a pass-through with no result. The submitting
//! flag is cleared on every path once the handler has finished.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use thiserror::Error;

use crate::error::ServerRejection;
use crate::payload::{serialize, FormPayload};
use crate::store::FormStore;
use crate::validator::ErrorMap;
use crate::value::Values;

/// What a submit handler returns. `Null` when there is nothing to report.
pub type HandlerResult = anyhow::Result<serde_json::Value>;

pub(crate) type EventHandler =
    dyn Fn(SubmitEvent, Values) -> BoxFuture<'static, HandlerResult> + Send + Sync;
pub(crate) type PayloadHandler =
    dyn Fn(FormPayload) -> BoxFuture<'static, HandlerResult> + Send + Sync;
pub(crate) type ErrorCallback = dyn Fn(&SubmitFailure) + Send + Sync;
pub(crate) type AfterSubmitCallback = dyn Fn(&serde_json::Value, &Values) + Send + Sync;

/// A handler that receives the serialized payload, like a server action.
#[async_trait]
pub trait SubmitAction: Send + Sync {
    /// Handle one submission.
    async fn submit(&self, payload: FormPayload) -> HandlerResult;
}

/// A [`SubmitAction`] backed by an async closure.
pub struct FnAction {
    action: Arc<PayloadHandler>,
}

impl FnAction {
    /// Wrap an async closure.
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn(FormPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            action: Arc::new(move |payload| action(payload).boxed()),
        }
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").finish_non_exhaustive()
    }
}

#[async_trait]
impl SubmitAction for FnAction {
    async fn submit(&self, payload: FormPayload) -> HandlerResult {
        (self.action)(payload).await
    }
}

/// Submit handlers and callbacks configured on a form.
#[derive(Clone, Default)]
pub(crate) struct SubmitHandlers {
    pub(crate) action: Option<Arc<dyn SubmitAction>>,
    pub(crate) on_submit: Option<Arc<EventHandler>>,
    pub(crate) on_submit_payload: Option<Arc<PayloadHandler>>,
    pub(crate) on_error: Option<Arc<ErrorCallback>>,
    pub(crate) on_after_submit: Option<Arc<AfterSubmitCallback>>,
}

impl fmt::Debug for SubmitHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitHandlers")
            .field("action", &self.action.is_some())
            .field("on_submit", &self.on_submit.is_some())
            .field("on_submit_payload", &self.on_submit_payload.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_after_submit", &self.on_after_submit.is_some())
            .finish()
    }
}

/// A submit event.
///
/// Clones share their flags, so a handler calling
/// [`prevent_default`](Self::prevent_default) is visible to the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct SubmitEvent {
    default_prevented: Arc<AtomicBool>,
    propagation_stopped: Arc<AtomicBool>,
    submitter: Option<String>,
}

impl SubmitEvent {
    /// A new event with no submitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the control that triggered the submission.
    #[must_use]
    pub fn with_submitter(mut self, submitter: impl Into<String>) -> Self {
        self.submitter = Some(submitter.into());
        self
    }

    /// The triggering control, if any.
    #[must_use]
    pub fn submitter(&self) -> Option<&str> {
        self.submitter.as_deref()
    }

    /// Suppress the default action.
    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::SeqCst);
    }

    /// Stop the event from reaching enclosing forms.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::SeqCst);
    }

    /// Check whether the default action was suppressed.
    #[must_use]
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }

    /// Check whether propagation was stopped.
    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.load(Ordering::SeqCst)
    }
}

/// Where a form is in the submission lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitPhase {
    /// No submission running.
    #[default]
    Idle,
    /// Whole-form validation in progress.
    Validating,
    /// A handler is running.
    Submitting,
    /// Validation failed; failure callback pending.
    Rejected,
}

/// Why a submission did not succeed. Passed to the failure callback.
#[derive(Debug, Error)]
pub enum SubmitFailure {
    /// The form (or the receiving server) rejected one or more fields.
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(ErrorMap),

    /// The handler or the resolver failed.
    #[error("Submit handler failed: {0}")]
    Handler(anyhow::Error),
}

impl SubmitFailure {
    /// The field errors, for validation failures.
    #[must_use]
    pub fn errors(&self) -> Option<&ErrorMap> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Handler(_) => None,
        }
    }
}

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// A handler ran and succeeded.
    Submitted {
        /// What the handler returned.
        result: serde_json::Value,
    },
    /// Validation or the receiving server rejected fields.
    Rejected {
        /// The field errors.
        errors: ErrorMap,
    },
    /// The handler or resolver failed.
    Failed {
        /// Rendered error.
        message: String,
    },
}

impl SubmitOutcome {
    /// Check whether a handler ran successfully.
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }
}

impl FormStore {
    /// Submit the form programmatically.
    pub async fn submit(&self) -> SubmitOutcome {
        self.handle_submit(SubmitEvent::new()).await
    }

    /// Handle a submit event.
    ///
    /// The event's default action is prevented and its propagation stopped
    /// before anything else happens.
    pub async fn handle_submit(&self, event: SubmitEvent) -> SubmitOutcome {
        event.prevent_default();
        event.stop_propagation();

        self.set_phase(SubmitPhase::Validating);
        let validated = match self.validate(None).await {
            Ok(result) => result,
            Err(e) => {
                self.set_phase(SubmitPhase::Idle);
                return self.fail(anyhow::Error::new(e));
            }
        };

        if !validated.is_valid {
            self.set_phase(SubmitPhase::Rejected);
            tracing::info!(errors = validated.errors.len(), "Submission rejected by validation");
            let outcome = self.reject(validated.errors);
            self.set_phase(SubmitPhase::Idle);
            return outcome;
        }

        let values = self.get_values();
        self.set_submitting(true);
        self.set_phase(SubmitPhase::Submitting);

        let dispatched = AssertUnwindSafe(self.dispatch(event, &values))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow::anyhow!("Submit handler panicked")));

        self.set_submitting(false);
        self.set_phase(SubmitPhase::Idle);

        match dispatched {
            Ok(result) => {
                tracing::info!(fields = values.len(), "Form submitted");
                if let Some(callback) = &self.handlers().on_after_submit {
                    callback(&result, &values);
                }
                SubmitOutcome::Submitted { result }
            }
            Err(err) => match err.downcast::<ServerRejection>() {
                Ok(ServerRejection(errors)) => {
                    tracing::info!(errors = errors.len(), "Submission rejected by server");
                    for (name, error) in &errors {
                        self.set_error(name, error.message.clone());
                    }
                    self.reject(errors)
                }
                Err(err) => self.fail(err),
            },
        }
    }

    async fn dispatch(&self, event: SubmitEvent, values: &Values) -> HandlerResult {
        let handlers = self.handlers();
        if let Some(action) = &handlers.action {
            return action.submit(serialize(values)).await;
        }
        if let Some(handler) = &handlers.on_submit {
            return handler(event, values.clone()).await;
        }
        if let Some(handler) = &handlers.on_submit_payload {
            return handler(serialize(values)).await;
        }
        Ok(serde_json::Value::Null)
    }

    fn reject(&self, errors: ErrorMap) -> SubmitOutcome {
        if let Some(callback) = &self.handlers().on_error {
            callback(&SubmitFailure::Validation(errors.clone()));
        }
        SubmitOutcome::Rejected { errors }
    }

    fn fail(&self, err: anyhow::Error) -> SubmitOutcome {
        tracing::warn!(error = %err, "Submission failed");
        let message = format!("{err:#}");
        if let Some(callback) = &self.handlers().on_error {
            callback(&SubmitFailure::Handler(err));
        }
        SubmitOutcome::Failed { message }
    }
}

#[cfg(feature = "http")]
pub use remote::RemoteAction;

#[cfg(feature = "http")]
mod remote {
    use anyhow::Context;
    use async_trait::async_trait;
    use serde::Deserialize;
    use url::Url;

    use super::{HandlerResult, SubmitAction};
    use crate::error::{FormkitResult, ServerRejection};
    use crate::payload::FormPayload;
    use crate::validator::ErrorMap;

    #[derive(Deserialize)]
    struct RejectionBody {
        errors: ErrorMap,
    }

    /// A server action that posts the payload as multipart to a URL.
    ///
    /// A 2xx answer yields its JSON body (`Null` when empty). A 422 answer
    /// with an `errors` map yields a [`ServerRejection`]. Anything else is a
    /// handler error.
    #[derive(Debug, Clone)]
    pub struct RemoteAction {
        client: reqwest::Client,
        url: Url,
    }

    impl RemoteAction {
        /// Post to `url` with a default client.
        #[must_use]
        pub fn new(url: Url) -> Self {
            Self {
                client: reqwest::Client::new(),
                url,
            }
        }

        /// Parse `url` and post to it.
        ///
        /// # Errors
        ///
        /// Returns an error if `url` is not a valid absolute URL.
        pub fn parse(url: &str) -> FormkitResult<Self> {
            Ok(Self::new(Url::parse(url)?))
        }

        /// Use a preconfigured client.
        #[must_use]
        pub fn with_client(mut self, client: reqwest::Client) -> Self {
            self.client = client;
            self
        }

        /// The endpoint URL.
        #[must_use]
        pub fn url(&self) -> &Url {
            &self.url
        }
    }

    #[async_trait]
    impl SubmitAction for RemoteAction {
        async fn submit(&self, payload: FormPayload) -> HandlerResult {
            tracing::debug!(url = %self.url, entries = payload.len(), "Posting form payload");
            let response = self
                .client
                .post(self.url.clone())
                .multipart(payload.into_multipart())
                .send()
                .await
                .with_context(|| format!("Failed to reach {}", self.url))?;

            let status = response.status();
            if status.is_success() {
                let body = response.bytes().await.context("Failed to read response body")?;
                if body.is_empty() {
                    return Ok(serde_json::Value::Null);
                }
                return serde_json::from_slice(&body).context("Response body is not JSON");
            }

            if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
                let body: RejectionBody = response
                    .json()
                    .await
                    .context("Rejection body has no errors map")?;
                return Err(ServerRejection(body.errors).into());
            }

            anyhow::bail!("{} answered {status}", self.url)
        }
    }
}
