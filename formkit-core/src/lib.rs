//! # Formkit Core
//!
//! Form-state engine: field values, declarative validation rules, pluggable
//! resolvers, a submission pipeline and key-path payload encoding.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 FormStore                   │
//! │  values · errors · submitting · schema      │
//! ├──────────────────────┬──────────────────────┤
//! │  Validation          │  Submission          │
//! │  - RuleValidator     │  - validate all      │
//! │  - FnResolver        │  - one handler       │
//! │  - IssueResolver     │  - failure callback  │
//! ├──────────────────────┴──────────────────────┤
//! │  Payload: user[tags][0] = "a"               │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod error;
pub mod options;
pub mod payload;
pub mod resolver;
pub mod rules;
pub mod schema;
pub mod store;
pub mod submit;
pub mod validator;
pub mod value;

pub use controller::{FieldController, RenderProps};
pub use error::{FormkitError, FormkitResult, ServerRejection};
pub use options::FormOptions;
pub use payload::{serialize, FormPayload, PayloadValue};
pub use resolver::{FnResolver, Issue, IssueResolver, IssueSource, PathSegment, PathStyle, SourceError};
pub use schema::{parse_schema, EffectiveSchema, FieldSchema, Pattern, Rule, Schema};
pub use store::{FieldHandlers, FormStore, InputProps, Mode};
pub use submit::{
    FnAction, HandlerResult, SubmitAction, SubmitEvent, SubmitFailure, SubmitOutcome, SubmitPhase,
};
#[cfg(feature = "http")]
pub use submit::RemoteAction;
pub use validator::{
    merge_errors, validate_values, ErrorMap, FormError, RuleValidator, ValidationResult, Validator,
};
pub use value::{values_from_json, Blob, FieldValue, Values};

/// Formkit core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
